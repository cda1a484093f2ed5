//!
//! Defines error types for URL reservation operations.

use std::fmt;

use crate::config::ConfigError;
use crate::sddl::SddlError;
use crate::win32::Win32Error;

/// Which reservation change found the record missing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Delete,
    Update,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operation::Delete => f.write_str("delete"),
            Operation::Update => f.write_str("update"),
        }
    }
}

/// Errors returned by [`crate::UrlAclClient`] operations.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UrlAclError {
    /// The configuration store failed with a native error code.
    #[error("HTTP Server API call failed: {code}")]
    Native { code: Win32Error },
    /// A reservation for the URL prefix is already registered.
    #[error("The '{url}' URL has already been registered in the HTTP server.")]
    AlreadyExists { url: String, code: Win32Error },
    /// The reservation disappeared from the store before it could be changed.
    #[error("The '{url}' URL to {operation} has not been registered in the HTTP server.")]
    NotFound { url: String, operation: Operation, code: Win32Error },
    /// The URL prefix was rejected before calling the store.
    #[error("invalid URL prefix '{url}': {reason}")]
    InvalidUrl { url: String, reason: String },
    /// A security descriptor could not be parsed or contains entries a URL reservation cannot hold.
    #[error("invalid security descriptor: {0}")]
    Sddl(#[from] SddlError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    /// The store asked for an output buffer larger than the configured limit.
    #[error("query buffer of {required} bytes exceeds the limit of {limit} bytes")]
    BufferLimit { required: usize, limit: usize },
}

impl UrlAclError {
    /// The native status code behind the error, if any.
    pub fn code(&self) -> Option<Win32Error> {
        match self {
            UrlAclError::Native { code }
            | UrlAclError::AlreadyExists { code, .. }
            | UrlAclError::NotFound { code, .. } => Some(*code),
            _ => None,
        }
    }
}

impl From<Win32Error> for UrlAclError {
    fn from(code: Win32Error) -> Self {
        UrlAclError::Native { code }
    }
}

pub type Result<T> = std::result::Result<T, UrlAclError>;
