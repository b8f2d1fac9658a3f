//! Warmup learning-rate scheduling for candle training loops
//!
//! A Rust take on the inverse-square-root warmup schedule used for
//! conformer-style speech models, together with the pieces a training loop
//! needs around it.
//!
//! # Overview
//!
//! - **Schedule**: linear warmup up to the configured base rate, then
//!   inverse-square-root decay. The peak is the base rate itself.
//! - **Resume**: the step counter can be re-synchronised from an
//!   epoch / steps-per-epoch pair exactly once after a restore.
//! - **Host**: parameter groups (plain or backed by `candle_nn` optimizers)
//!   receive the scheduled rate once per optimizer step.
//! - **Power**: a background sampler records per-device power draw for the
//!   duration of a run and integrates it into energy.
//!
//! # Example
//!
//! ```ignore
//! use warmup_schedule::training::{WarmupScheduler, LrSchedule};
//!
//! let mut scheduler = WarmupScheduler::new(vec![1e-3], 256.0, 25_000)?;
//! let rates = scheduler.compute_rate();
//! ```

pub mod config;
pub mod power;
pub mod training;
pub mod utils;

// Re-export commonly used items
pub use config::ScheduleConfig;
pub use training::{ResumePosition, WarmupScheduler};

/// Library error types
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Candle error: {0}")]
    Candle(#[from] candle_core::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Training error: {0}")]
    Training(String),

    #[error("Sampler error: {0}")]
    Sampler(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, ScheduleError>;
