//! Connection-phase handshake components.
//!
//! Three pieces, consumed in order by [`crate::conn::Conn`]:
//!
//! 1. [`greeting`] parses the server's initial HandshakeV10 packet into a
//!    typed negotiation state.
//! 2. [`auth`] turns the negotiated plugin, challenge and password into
//!    the credential bytes for the response.
//! 3. [`response`] computes the final capability set, serializes the
//!    HandshakeResponse41 packet and transmits it, upgrading the
//!    transport to TLS first when configured.

pub mod auth;
pub mod greeting;
pub mod response;

pub use auth::{AuthPlugin, AuthResponse};
pub use greeting::Greeting;
pub use response::HandshakeResponse;
