//! Recorder for Forza "Data Out" UDP telemetry.
//!
//! Slipstream listens for the simulator's fixed-layout datagrams, keeps only
//! the ones worth recording, writes them as rows and maintains running
//! statistics for every numeric field.
//!
//! # Features
//!
//! - **Static schema**: the 331-byte layout is declared once; decoder, encoder,
//!   row header and statistics all derive from that declaration
//! - **Gating**: race-on, lap-zero start in race mode, stationary and neutral
//!   filtering, and a minimum write interval
//! - **Single-pass statistics**: mean, variance, skewness, kurtosis, extrema
//!   and exact quartiles per field
//! - **Controlled lifecycle**: start/stop from any thread through a queued
//!   control handle, with a JSON summary exported on stop
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use slipstream::{RecorderConfig, ReferenceNames, SessionController, SessionMode};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = RecorderConfig::default();
//!     let names = ReferenceNames::load(config.car_names.as_deref(), config.track_names.as_deref())?;
//!     let handle = SessionController::new(config, Arc::new(names)).spawn();
//!
//!     handle.start(SessionMode::Race).await?;
//!     tokio::time::sleep(std::time::Duration::from_secs(60)).await;
//!     handle.stop().await?;
//!     Ok(())
//! }
//! ```

// Core types and error handling
mod error;
#[cfg(any(test, feature = "benchmark"))]
pub mod test_utils;
pub mod types;

// Wire format and record processing
pub mod gate;
pub mod names;
pub mod packet;
pub mod sink;
pub mod stats;

// Sources, loop and lifecycle
pub mod config;
pub mod provider;
pub mod providers;
pub mod recorder;
pub mod session;
pub mod stream;

// Core exports
pub use error::*;
pub use types::*;

pub use config::RecorderConfig;
pub use gate::{GateDecision, RejectReason, SessionGate};
pub use names::{NameLookup, ReferenceNames};
pub use packet::{decode, encode};
pub use provider::PacketSource;
pub use providers::UdpSource;
pub use recorder::{SessionCounters, SessionSnapshot};
pub use session::{
    ControlHandle, ControlOutcome, ListeningSession, SessionController, SessionReport,
    SessionStatus,
};
pub use stats::{FieldSummary, StatisticsAggregator, Summary};
