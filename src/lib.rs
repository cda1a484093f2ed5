#![deny(unsafe_code)]
#![deny(clippy::all)]
#![deny(deprecated)]

//!
//! urlacl manages http.sys URL reservations (URL-ACLs).
//!
//! A URL reservation says which security principals may bind a listener to
//! a URL prefix on the Windows kernel HTTP stack. This crate registers,
//! enumerates, updates and deletes those reservations, and translates their
//! SDDL permissions to and from typed [`AccessRule`]s.
//!
//! The native store is only available on Windows ([`store::NativeStore`]).
//! [`store::MemoryStore`] and [`store::FileStore`] speak the same protocol
//! everywhere.
//!
//! ```no_run
//! use urlacl::{AccessRights, AccessRule, Sid, UrlAclClient};
//! use urlacl::store::MemoryStore;
//!
//! let client = UrlAclClient::new(MemoryStore::new());
//! let network_service: Sid = "NS".parse().unwrap();
//! let reservation = client
//!     .register("http://+:8080/api/", AccessRule::new(network_service, AccessRights::Listen))
//!     .unwrap();
//! assert_eq!(client.reservations().unwrap(), vec![reservation]);
//! ```

// Win32 status codes of the configuration API.
pub mod win32;

// Module for error types.
pub mod error;

pub mod config;

// Rights that can be granted on a reservation.
pub mod rights;

pub mod sid;
pub mod sddl;
pub mod rule;
pub mod reservation;

// Configuration store backends.
pub mod store;

pub mod session;
pub mod client;

pub use client::UrlAclClient;
pub use config::{ApiVersion, ClientConfig, ConfigError};
pub use error::{Operation, Result, UrlAclError};
pub use reservation::{validate_url_prefix, UrlReservation};
pub use rights::AccessRights;
pub use rule::{AccessRule, Identity, RuleSet};
pub use sid::Sid;
pub use win32::Win32Error;
