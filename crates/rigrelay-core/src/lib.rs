//! rigrelay-core: Error types and Hamlib result codes shared across the
//! rigrelay workspace.
//!
//! All other crates depend on this one for [`Error`], [`Result`], and the
//! [`HamlibError`] table that maps the daemon's negative `RPRT` codes to
//! typed errors.

pub mod error;

pub use error::{Error, HamlibError, Result};
