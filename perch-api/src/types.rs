use std::any::Any;

use crate::errors::{ResolutionError, SystemError};

// Type aliases for common types
pub type BoxedMessage = Box<dyn Any + Send>;
pub type ResolveResult<T> = Result<T, ResolutionError>;
pub type SystemResult<T> = Result<T, SystemError>;
