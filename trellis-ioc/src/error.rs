use std::fmt::Display;
use std::process;
use thiserror::Error;
use tracing::error;

/// Errors related to resolving bean instances. Returned by the best-effort lookup APIs; the
/// must-succeed APIs panic with the same rendered message.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum BeanResolutionError {
    #[error("No component definition matches '{namespace}:{type_name}'.")]
    NoSuchDefinition {
        namespace: String,
        type_name: String,
    },
    #[error("No binding named '{variant}' exists in the pool for '{namespace}:{type_name}'.")]
    UnknownVariant {
        namespace: String,
        type_name: String,
        variant: String,
    },
    #[error("No bean named '{0}' exists.")]
    NoSuchBean(String),
    #[error("Bean '{0}' cannot be cast to the requested type.")]
    IncompatibleBean(String),
}

/// Errors raised when assigning a resolved dependency into an injection point. Both variants
/// signal a structural defect in a component declaration and are treated as fatal by the
/// injection engine.
#[derive(Error, Clone, Copy, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum AssignmentError {
    #[error("owning instance is not of the declared component type")]
    OwnerTypeMismatch,
    #[error("resolved dependency cannot be cast to the declared field type")]
    DependencyTypeMismatch,
}

/// Error from parsing the field tag mini-language.
#[derive(Error, Clone, Ord, PartialOrd, Eq, PartialEq, Hash, Debug)]
pub enum TagParseError {
    #[error("Empty value for field tag directive '{0}'.")]
    EmptyValue(String),
}

/// Terminates the process after logging the given message. Wiring mistakes are startup defects,
/// not recoverable runtime errors, so the whole process goes down regardless of which thread
/// discovered the problem.
pub(crate) fn fatal(message: impl Display) -> ! {
    error!("{message}");
    process::exit(1);
}
