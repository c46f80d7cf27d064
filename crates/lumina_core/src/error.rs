//! crates/lumina_core/src/error.rs
//!
//! Typed failures returned by the core components. Storage corruption never
//! appears here: it is absorbed by the collection store.

use crate::ports::PortError;

/// Why a login or sign-up was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no student matches that name and secret code")]
    NotFound,
    #[error("that name is already used by another student")]
    NameTaken,
    #[error("secret code must be at least 3 characters long")]
    WeakCode,
}

/// A required field was left empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("{field} must not be empty")]
pub struct ValidationError {
    pub field: &'static str,
}

impl ValidationError {
    pub fn new(field: &'static str) -> Self {
        Self { field }
    }

    /// Fails with a `ValidationError` naming `field` when `value` is blank.
    pub fn require(field: &'static str, value: &str) -> Result<(), Self> {
        if value.trim().is_empty() {
            Err(Self::new(field))
        } else {
            Ok(())
        }
    }
}

/// Every failure a core component can hand back to its caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Port(#[from] PortError),
}

/// A convenience type alias for `Result<T, CoreError>`.
pub type CoreResult<T> = Result<T, CoreError>;
