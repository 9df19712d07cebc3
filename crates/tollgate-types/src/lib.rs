//! Typed argument validators.
//!
//! Every validator is built once from its options (which are checked at
//! construction time) and then turns a raw command-line string into a
//! normalized [`serde_json::Value`], or rejects it with an
//! [`InvalidArgument`] describing what is wrong.
//!
//! Only the two X.509 validators touch the filesystem, and they read exactly
//! the one path they are given.

mod domain;
mod restricted;
mod uri;
mod x509;

pub use domain::{Domain, DomainOptions};
pub use restricted::{
    RestrictedInt, RestrictedIntOptions, RestrictedString, RestrictedStringOptions,
};
pub use uri::{Uri, UriOptions, UriParts};
pub use x509::{Certificate, PrivateKey, X509Certificate, X509CertificateOptions, X509PrivateKey};

use serde_json::Value;
use thiserror::Error;

/// A value (or validator configuration) was rejected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct InvalidArgument {
    message: String,
}

impl InvalidArgument {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

pub type ValidationResult<T> = Result<T, InvalidArgument>;

/// A typed check applied to a single raw argument value.
pub trait Validator: std::fmt::Debug + Send + Sync {
    /// Short type name used in help and error output (e.g. `domain`).
    fn name(&self) -> &'static str;

    /// Validate `raw` and return its normalized form.
    fn validate(&self, raw: &str) -> ValidationResult<Value>;
}
