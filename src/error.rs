use thiserror::Error;

/// Failures the core can hand back to the host. Everything else is a
/// return value, never a panic.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("invalid image: {0}")]
    InvalidImage(&'static str),
    #[error("invalid boot ROM: {0}")]
    InvalidBootRom(&'static str),
}
