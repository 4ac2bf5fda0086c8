//! The `InternalError` type and the `internal!` macro that constructs it.

use super::{ErrorKind, HasKind};
use std::fmt::{self, Display};
use std::panic;

/// Internal error (a bug).
///
/// Boxed because it is fairly large, and will show up as a variant in many
/// other error enums.
#[derive(Debug, Clone)]
pub struct InternalError(Box<InternalErrorRepr>);

#[derive(Debug, Clone)]
struct InternalErrorRepr {
    /// Message, usually produced by [`internal!`].
    message: String,
    /// File and line number of the call site.
    location: &'static panic::Location<'static>,
}

impl InternalError {
    /// Create an internal error capturing this call site.
    ///
    /// Prefer [`internal!`], which makes it easy to add format parameters.
    #[track_caller]
    pub fn new<S: Into<String>>(message: S) -> Self {
        InternalError(Box::new(InternalErrorRepr {
            message: message.into(),
            location: panic::Location::caller(),
        }))
    }
}

impl std::error::Error for InternalError {}

impl Display for InternalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "internal error (bug) at {}: {}",
            &self.0.location, &self.0.message
        )
    }
}

impl HasKind for InternalError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Internal
    }
}

/// Create an [`InternalError`], including a message like `format!`, and
/// capturing this call site.
///
/// # Examples
///
/// ```
/// use veil_error::internal;
///
/// # fn main() -> Result<(), veil_error::InternalError> {
/// # let mut cells = [()].iter();
/// let need_cell = cells.next().ok_or_else(|| internal!("no cells"))?;
/// # Ok(())
/// # }
/// ```
#[macro_export]
macro_rules! internal {
    { $( $arg:tt )* } => {
        $crate::InternalError::new(format!($($arg)*))
    }
}
