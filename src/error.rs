use thiserror::Error;

/// Problems with the supplied flags, reported to the user with a usage hint.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("/{0} is a required command.")]
    MissingFlag(&'static str),
}
