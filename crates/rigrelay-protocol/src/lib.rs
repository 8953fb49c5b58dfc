//! rigrelay-protocol: The Hamlib "net rigctl" protocol engine.
//!
//! This crate carries everything needed to speak the line-based rigctl
//! protocol on both sides of the proxy:
//!
//! - [`commands`] -- the static command catalog with short-byte and
//!   long-name lookup
//! - [`types`] -- [`Request`], [`Response`], [`CommandKey`] and their wire
//!   formatting
//! - [`parse`] -- the restartable [`RequestReader`] for client input and
//!   the [`ResponseReader`] for daemon output
//! - [`transceive`] -- the [`Transceiver`] that owns the upstream stream
//!   and serializes concurrent requests into strict write-then-read turns
//! - [`responses`] -- canned [`Response`] values for common queries
//!
//! All parsing and formatting is pure; only the transceiver performs I/O.

pub mod commands;
pub mod parse;
pub mod responses;
pub mod transceive;
pub mod types;

pub use commands::{long_command, short_command, Command};
pub use parse::{RequestReader, ResponseReader};
pub use transceive::Transceiver;
pub use types::{CommandKey, Request, Response};
