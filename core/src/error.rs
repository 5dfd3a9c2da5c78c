use std::fmt;

/// Error type shared by the session table, transactor and round-trippers.
///
/// Hand-rolled rather than pulled in from a derive-macro crate, matching the
/// reference corpus's own wire-protocol `Error` enums.
#[derive(Debug)]
pub enum Error {
    /// `X-Session-Id` was missing or shorter than [`crate::constants::MIN_SESSION_ID_LENGTH`].
    SessionIdTooShort,
    /// The request or response body exceeded [`crate::constants::MAX_PAYLOAD_LENGTH`].
    PayloadTooLarge,
    /// Opening the downstream connection for a new session failed.
    DownstreamDial(std::io::Error),
    /// A read or write on an established downstream connection failed.
    DownstreamIo(std::io::Error),
    /// The HTTP round trip itself failed (connect/TLS/transport error).
    Transport(String),
    /// The round trip completed but the status code was not 200, even after
    /// retrying.
    BadStatus(u16),
    /// A capability that this build deliberately does not implement end to
    /// end (helper round-tripper, uTLS, ACME) was invoked.
    Unimplemented(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::SessionIdTooShort => write!(f, "session id shorter than the minimum length"),
            Self::PayloadTooLarge => write!(f, "payload exceeds the maximum length"),
            Self::DownstreamDial(e) => write!(f, "failed to dial downstream: {e}"),
            Self::DownstreamIo(e) => write!(f, "downstream i/o error: {e}"),
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::BadStatus(code) => write!(f, "non-200 status after retries: {code}"),
            Self::Unimplemented(what) => write!(f, "not implemented in this build: {what}"),
        }
    }
}

impl std::error::Error for Error {}

pub type Result<T> = std::result::Result<T, Error>;
