//! smtprule Common - Shared types and utilities
//!
//! This crate provides the envelope model consulted by the rule engine,
//! the configuration document, and the error type shared by all smtprule
//! components.

pub mod config;
pub mod error;
pub mod types;

pub use config::{Config, KeyKind};
pub use error::{Error, Result};
pub use types::{Envelope, EnvelopeFlags, MailAddress, Origin};
