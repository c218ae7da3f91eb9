//! Myconn CLI probe.
//!
//! Performs a real connection-phase handshake against a server and
//! prints the negotiated state. Useful for checking reachability,
//! capability flags, auth plugin selection and TLS setup without a full
//! SQL client.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use myconn::{Conn, ConnectProfile, VERSION};

#[derive(Parser)]
#[command(name = "myconn")]
#[command(version = VERSION)]
#[command(about = "Probe a MySQL server's connection handshake", long_about = None)]
struct Cli {
    /// TOML connection profile (flags below override it)
    #[arg(long)]
    profile: Option<PathBuf>,

    /// Server host
    #[arg(long)]
    host: Option<String>,

    /// Server port
    #[arg(short = 'P', long)]
    port: Option<u16>,

    /// Username
    #[arg(short, long)]
    user: Option<String>,

    /// Password
    #[arg(short, long)]
    password: Option<String>,

    /// Default database
    #[arg(short = 'D', long)]
    database: Option<String>,

    /// Collation name
    #[arg(long)]
    collation: Option<String>,

    /// Connection attribute as key=value (repeatable)
    #[arg(long = "attr")]
    attributes: Vec<String>,

    /// Upgrade the connection to TLS during the handshake
    #[arg(long)]
    tls: bool,

    /// PEM bundle of trusted roots for TLS
    #[arg(long)]
    tls_ca: Option<PathBuf>,

    /// Encrypt without validating the server certificate
    #[arg(long)]
    insecure: bool,

    /// Read/write timeout in seconds
    #[arg(long, default_value_t = 10)]
    timeout: u64,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let mut profile = match &cli.profile {
        Some(path) => ConnectProfile::from_file(path)?,
        None => ConnectProfile::default(),
    };
    profile = profile.apply_env();

    if let Some(host) = cli.host {
        profile.host = host;
    }
    if let Some(port) = cli.port {
        profile.port = port;
    }
    if let Some(user) = cli.user {
        profile.user = user;
    }
    if let Some(password) = cli.password {
        profile.password = password;
    }
    if let Some(database) = cli.database {
        profile.database = database;
    }
    if cli.collation.is_some() {
        profile.collation = cli.collation;
    }
    for attr in &cli.attributes {
        let (key, value) = attr
            .split_once('=')
            .with_context(|| format!("attribute {attr:?} is not key=value"))?;
        profile
            .attributes
            .insert(key.to_string(), value.to_string());
    }
    if cli.tls {
        profile.tls.enabled = true;
    }
    if cli.insecure {
        profile.tls.insecure_skip_verify = true;
    }
    if cli.tls_ca.is_some() {
        profile.tls.ca_file = cli.tls_ca;
    }

    let timeout = Some(Duration::from_secs(cli.timeout));
    let config = profile.client_config()?.with_timeouts(timeout, timeout);

    let address = profile.address();
    let conn =
        Conn::connect(&address, config).with_context(|| format!("handshake with {address}"))?;

    println!("server version:      {}", conn.server_version());
    println!("connection id:       {}", conn.connection_id());
    println!("auth plugin:         {}", conn.auth_plugin());
    println!(
        "transport:           {}",
        if conn.is_tls() { "tls" } else { "plain tcp" }
    );
    if let Some(status) = conn.status_flags() {
        println!("status flags:        {status:#06x}");
    }
    println!("server capabilities: {}", conn.server_capabilities());
    println!("client capabilities: {}", conn.capability());

    Ok(())
}
