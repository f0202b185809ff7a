use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Syntax,
    UnresolvedName,
    Redeclaration,
    Arity,
    UnsupportedOperator,
    Type,
    Verification,
    Backend,
    Trap,
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            ErrorKind::Syntax => "SyntaxError",
            ErrorKind::UnresolvedName => "NameError",
            ErrorKind::Redeclaration => "RedeclarationError",
            ErrorKind::Arity => "ArityError",
            ErrorKind::UnsupportedOperator => "OperatorError",
            ErrorKind::Type => "TypeError",
            ErrorKind::Verification => "VerificationError",
            ErrorKind::Backend => "BackendError",
            ErrorKind::Trap => "Trap",
        };

        write!(f, "{}", name)
    }
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct Error {
    pub kind: ErrorKind,
    pub message: String,
}

impl Error {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[cfg(feature = "llvm")]
impl From<inkwell::builder::BuilderError> for Error {
    fn from(err: inkwell::builder::BuilderError) -> Self {
        Self::new(ErrorKind::Backend, format!("{:?}", err))
    }
}

/// Shorthand for `Err(Error::new(kind, format!(...)))`.
macro_rules! error {
    ($kind:ident, $($arg:tt)*) => {
        Err($crate::error::Error::new(
            $crate::error::ErrorKind::$kind,
            format!($($arg)*),
        ))
    };
}

pub(crate) use error;
