//! Client-side error type, matching `httptun_core::Error`'s hand-rolled
//! `Display` + `std::error::Error` style (no `thiserror`).

#[derive(Debug)]
pub enum Error {
    Transport(reqwest::Error),
    BadStatus(u16),
    Core(httptun_core::Error),
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        Self::Transport(e)
    }
}

impl From<httptun_core::Error> for Error {
    fn from(e: httptun_core::Error) -> Self {
        Self::Core(e)
    }
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport(e) => write!(f, "transport error: {e}"),
            Self::BadStatus(code) => write!(f, "round trip returned non-200 status {code}"),
            Self::Core(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}
