//! Callgate - Windowed Call-Rate Limiter
//!
//! This crate throttles a stream of asynchronous calls so that no more than
//! `limit` of them start within a window. Excess calls are delayed, never
//! rejected, and each call's own result or error is handed back unchanged.
//!
//! ```no_run
//! use std::time::Duration;
//! use callgate::throttle::Limiter;
//!
//! # async fn run() -> callgate::error::Result<()> {
//! let limiter = Limiter::new(15, Duration::from_secs(60))?;
//! let body = limiter.execute(|| async { "response" }).await;
//! # let _ = body;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod throttle;

pub use error::{GateError, Result};
pub use throttle::{Limiter, LimiterRegistry};
