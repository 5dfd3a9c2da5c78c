//! Shared pieces of the httptun session-multiplexed HTTP-polling tunnel:
//! protocol constants, the session table, session id minting/validation, the
//! shared error type, and log scrubbing. Used by both the `httptun-server`
//! and `httptun-client` binaries.

pub mod constants;
pub mod error;
pub mod pt;
pub mod scrub;
pub mod session;
pub mod session_id;
pub mod shutdown;

pub use error::{Error, Result};
pub use session::{Downstream, Session, SessionTable};
