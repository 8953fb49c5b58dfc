//! rigrelay-client: Typed access to rigctld servers through the Hamlib
//! net protocol (model #2).
//!
//! Connect to a local rigctld server (or a rigrelay proxy in front of it)
//! and retrieve the current frequency:
//!
//! ```no_run
//! use rigrelay_client::Conn;
//!
//! # async fn example() -> rigrelay_core::Result<()> {
//! let conn = Conn::open("").await?; // "" = localhost:4532
//! let frequency = conn.frequency().await?;
//! println!("current frequency: {} Hz", frequency);
//! # Ok(())
//! # }
//! ```
//!
//! Poll the current frequency periodically:
//!
//! ```no_run
//! use std::time::Duration;
//! use rigrelay_client::{on_frequency, Conn};
//!
//! # async fn example() -> rigrelay_core::Result<()> {
//! let conn = Conn::open("").await?;
//! conn.start_polling(
//!     Duration::from_millis(500),
//!     Duration::from_millis(100),
//!     vec![on_frequency(|f| println!("current frequency: {} Hz", f))?],
//! )?;
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod polling;

pub use client::{Conn, Mode, PowerStatus, Ptt};
pub use polling::{
    on_frequency, on_mode_and_passband, on_power_level, on_power_status, on_ptt, PollRequest,
    ResponseHandler,
};
