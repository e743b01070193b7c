//! Configuration module for the Parapet proxy TLS core
//!
//! This module provides the typed TLS configuration consumed by the
//! `parapet-tls` crate, plus startup validation with a focus on
//! security-first defaults and operational clarity.
//!
//! # Module Organization
//!
//! - [`types`]: Shared enumerations (TLS protocol versions)
//! - [`server`]: Listener-side and upstream-side TLS configuration
//! - [`validate`]: Startup validation of certificate material
//!
//! Parsing a configuration file into these structs is the embedding
//! binary's job; everything here is format-agnostic and serde-ready.

// ============================================================================
// Module Declarations
// ============================================================================

pub mod server;
pub mod types;
pub mod validate;

// ============================================================================
// Re-exports
// ============================================================================

pub use server::{SniCertificate, TlsConfig, UpstreamTlsConfig};
pub use types::{TlsVersion, UnknownTlsVersion};
pub use validate::{validate_tls, ErrorCategory, ValidationError, ValidationResult, ValidationWarning};
