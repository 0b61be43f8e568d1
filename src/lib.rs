// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Append Upload Service
//!
//! A keyed, throttled endpoint that appends small payloads to named files
//! under a fixed storage directory:
//!
//! - Pre-shared upload key (constant-time comparison)
//! - One global upload interval (100 s default), safe under concurrency
//! - Payload size and file name length limits
//! - Strict `name(.ext)*` file names with an optional allow-list
//! - Append-only storage that cannot escape its root

pub mod clock;
pub mod config;
pub mod error;
pub mod handlers;
pub mod limiter;
pub mod metrics;
pub mod pipeline;
pub mod store;
pub mod validator;

pub use config::Config;
pub use error::SubmissionError;
pub use limiter::{RateLimitResult, RateLimiter};
pub use pipeline::{Submission, UploadPipeline};
pub use store::AppendStore;
pub use validator::{UploadValidator, ValidationResult};
