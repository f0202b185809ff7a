pub mod backend;
pub mod diagnostics;
pub mod engine;
pub mod error;
pub mod frontend;
#[cfg(feature = "llvm")]
pub mod gcc;

pub use diagnostics::{Diagnostic, Diagnostics};
pub use engine::{compile, Options, Report};
pub use error::{Error, ErrorKind};
