//! This crate provides a client for the Minecraft RCON protocol, a length-prefixed binary
//! protocol over TCP used to run console commands on a game server.
//!
//! Two flavors share the same packet codec and validation rules:
//!
//! - [`sync`] (default `sync` feature) is built on [`std::net::TcpStream`] and blocks the
//!   calling thread.
//! - The crate root (`async` feature) is built on [Tokio](https://tokio.rs/).
//!
//! A session is connected, authenticated exactly once, and then used for any number of command
//! round trips. Authentication consumes the unauthenticated client, so a command can never be
//! sent before the server has accepted the password.
//!
//! # Example
//! ```rust,no_run
//! use mcrcon_client::sync::connect;
//!
//! let client = connect("localhost", 25575).unwrap();
//! let mut client = client.authenticate("password123").unwrap();
//!
//! let response = client.exec_command("list").unwrap();
//! println!("{}", String::from_utf8_lossy(&response));
//! ```

#[cfg(feature = "async")]
mod client;
pub mod packet;
#[cfg(feature = "sync")]
pub mod sync;

use crate::packet::{Packet, PacketType, HEADER_LEN, MAX_COMMAND_LEN};
use std::time::Duration;

/// Correlation identifier used for every request of a session.
pub const SESSION_ID: i32 = 0x0BAD_C0DE;

/// Identifier the server answers an authentication request with when the password is wrong.
pub const AUTH_REJECTED_ID: i32 = -1;

/// Port Minecraft servers listen for RCON on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 25575;

/// Error type for RCON operations.
#[derive(Debug, thiserror::Error)]
#[error(transparent)]
pub struct Error(RconError);

#[derive(Debug, thiserror::Error)]
pub(crate) enum RconError {
    #[error("failed to connect to {addr}")]
    Connect {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("authentication rejected")]
    AuthRejected,

    #[error("command too long ({len} bytes), maximum is {max}")]
    CommandTooLong { len: usize, max: usize },

    #[error("failed to send packet")]
    Send(#[source] std::io::Error),

    #[error("failed to read packet size")]
    Header(#[source] std::io::Error),

    #[error("invalid packet size: {size} (must be 10-4096)")]
    InvalidSize { size: i32 },

    #[error("failed to read packet payload")]
    Payload(#[source] std::io::Error),

    #[error("no response within {0:?}")]
    Timeout(Duration),

    #[error("invalid response ID {0}")]
    InvalidId(i32),
}

/// Category of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Every connection attempt failed.
    Connect,
    /// The server refused the password.
    AuthRejected,
    /// The command was rejected locally before anything was sent.
    CommandTooLong,
    /// Writing a request to the socket failed.
    Send,
    /// The size prefix of a response could not be read.
    MalformedHeader,
    /// The size prefix of a response was outside the valid range.
    InvalidSize,
    /// The connection ended before the full response arrived.
    TruncatedPayload,
    /// The response deadline passed.
    Timeout,
    /// The response did not carry the session's correlation identifier.
    InvalidResponseId,
}

/// [`Result`] alias for [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

impl<T> From<T> for Error
where
    T: Into<RconError>,
{
    fn from(inner: T) -> Self {
        Error(inner.into())
    }
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match &self.0 {
            RconError::Connect { .. } => ErrorKind::Connect,
            RconError::AuthRejected => ErrorKind::AuthRejected,
            RconError::CommandTooLong { .. } => ErrorKind::CommandTooLong,
            RconError::Send(_) => ErrorKind::Send,
            RconError::Header(_) => ErrorKind::MalformedHeader,
            RconError::InvalidSize { .. } => ErrorKind::InvalidSize,
            RconError::Payload(_) => ErrorKind::TruncatedPayload,
            RconError::Timeout(_) => ErrorKind::Timeout,
            RconError::InvalidId(_) => ErrorKind::InvalidResponseId,
        }
    }
}

/// Connection and response timing.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// How many times to try connecting before giving up.
    pub attempts: u32,
    /// Upper bound for a single connection attempt.
    pub attempt_timeout: Duration,
    /// Pause between failed attempts. Not applied after the last one.
    pub retry_delay: Duration,
    /// Deadline for receiving one full response.
    pub read_timeout: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        ConnectOptions {
            attempts: 3,
            attempt_timeout: Duration::from_secs(10),
            retry_delay: Duration::from_secs(1),
            read_timeout: Duration::from_secs(10),
        }
    }
}

#[cfg(feature = "async")]
pub use self::client::*;

/// Format a host and port the way they are shown in errors, bracketing IPv6 literals.
pub(crate) fn join_host_port(host: &str, port: u16) -> String {
    if host.contains(':') {
        format!("[{}]:{}", host, port)
    } else {
        format!("{}:{}", host, port)
    }
}

pub(crate) fn auth_packet(password: &str) -> Packet {
    Packet::new(SESSION_ID, PacketType::AUTH, password)
}

pub(crate) fn command_packet(cmd: &str) -> Result<Packet> {
    if cmd.len() > MAX_COMMAND_LEN {
        return Err(RconError::CommandTooLong {
            len: cmd.len(),
            max: MAX_COMMAND_LEN,
        }
        .into());
    }
    Ok(Packet::new(SESSION_ID, PacketType::EXEC_COMMAND, cmd))
}

/// Only the rejection sentinel is checked; any other id counts as acceptance.
pub(crate) fn check_auth_response(response: &Packet) -> Result<()> {
    if response.id == AUTH_REJECTED_ID {
        return Err(RconError::AuthRejected.into());
    }
    Ok(())
}

pub(crate) fn check_command_response(response: Packet) -> Result<Vec<u8>> {
    if response.id != SESSION_ID {
        return Err(RconError::InvalidId(response.id).into());
    }
    Ok(response.body)
}

/// Classify a failed or short read by how far into the frame it happened.
pub(crate) fn read_error(filled: usize, err: std::io::Error) -> RconError {
    if filled < HEADER_LEN {
        RconError::Header(err)
    } else {
        RconError::Payload(err)
    }
}

pub(crate) fn connection_closed() -> std::io::Error {
    std::io::Error::new(
        std::io::ErrorKind::UnexpectedEof,
        "connection closed by server",
    )
}
