// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! The upload pipeline: key, interval, size and name checks, then append.
//!
//! A submission moves linearly through [`Stage`]s. Any failed check ends it
//! immediately, and nothing touches the filesystem before the append. The
//! limiter admission is held from the interval check until the upload time
//! is recorded, so concurrent submissions are serialized through that point.

use crate::clock::Clock;
use crate::error::SubmissionError;
use crate::limiter::{RateLimitResult, RateLimiter};
use crate::store::AppendStore;
use crate::validator::UploadValidator;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error};

/// Progress of a submission through the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
    Received,
    KeyChecked,
    RateChecked,
    SizeChecked,
    NameChecked,
    Appended,
    Recorded,
    /// Terminal; a response has been produced.
    Responded,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Received => "received",
            Self::KeyChecked => "key_checked",
            Self::RateChecked => "rate_checked",
            Self::SizeChecked => "size_checked",
            Self::NameChecked => "name_checked",
            Self::Appended => "appended",
            Self::Recorded => "recorded",
            Self::Responded => "responded",
        };
        f.write_str(name)
    }
}

/// One upload request.
#[derive(Clone, PartialEq, Eq)]
pub struct Submission {
    pub key: String,
    pub data: Vec<u8>,
    pub fname: String,
}

impl Submission {
    pub fn new(key: impl Into<String>, data: impl Into<Vec<u8>>, fname: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            data: data.into(),
            fname: fname.into(),
        }
    }
}

// Keeps the key out of logs.
impl fmt::Debug for Submission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Submission")
            .field("data_len", &self.data.len())
            .field("fname", &self.fname)
            .finish_non_exhaustive()
    }
}

/// An accepted upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Receipt {
    pub fname: String,
    pub bytes: usize,
    pub accepted_at: i64,
}

/// A submission that did not complete.
#[derive(Debug, Error)]
#[error("{error}")]
pub struct Rejection {
    /// Last stage the submission reached
    pub stage: Stage,
    #[source]
    pub error: SubmissionError,
}

impl Rejection {
    fn at(stage: Stage, error: impl Into<SubmissionError>) -> Self {
        Self {
            stage,
            error: error.into(),
        }
    }
}

/// Validates submissions and appends accepted payloads.
pub struct UploadPipeline {
    validator: UploadValidator,
    limiter: RateLimiter,
    store: AppendStore,
    clock: Arc<dyn Clock>,
}

impl UploadPipeline {
    pub fn new(
        validator: UploadValidator,
        limiter: RateLimiter,
        store: AppendStore,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            validator,
            limiter,
            store,
            clock,
        }
    }

    pub fn store(&self) -> &AppendStore {
        &self.store
    }

    /// Run a submission through every check and append it if accepted.
    pub async fn submit(&self, submission: &Submission) -> Result<Receipt, Rejection> {
        let mut stage = Stage::Received;

        self.validator
            .validate_key(&submission.key)
            .into_result()
            .map_err(|e| Rejection::at(stage, e))?;
        stage = Stage::KeyChecked;

        let admission = match self.limiter.admit(self.clock.now()).await {
            RateLimitResult::Allowed(admission) => admission,
            RateLimitResult::Limited { retry_after } => {
                return Err(Rejection::at(
                    stage,
                    SubmissionError::RateLimited { retry_after },
                ));
            }
        };
        stage = Stage::RateChecked;

        self.validator
            .validate_data_size(&submission.data)
            .into_result()
            .map_err(|e| Rejection::at(stage, e))?;
        stage = Stage::SizeChecked;

        let fname = submission.fname.as_str();
        self.validator
            .validate_name_length(fname)
            .into_result()
            .and_then(|()| self.validator.validate_name_pattern(fname).into_result())
            .and_then(|()| self.validator.validate_allowed_name(fname).into_result())
            .map_err(|e| Rejection::at(stage, e))?;
        stage = Stage::NameChecked;
        debug!(fname = %fname, %stage, "Submission passed validation");

        self.store
            .append(fname, &submission.data)
            .await
            .map_err(|e| Rejection::at(stage, e))?;
        stage = Stage::Appended;

        let accepted_at = admission.now();
        if let Err(e) = admission.record().await {
            // The bytes are already on disk and stay there.
            error!(
                fname = %fname,
                error = %e,
                "Appended but failed to persist upload time"
            );
            return Err(Rejection::at(stage, SubmissionError::StatePersist(e)));
        }
        stage = Stage::Recorded;
        debug!(fname = %fname, accepted_at, %stage, "Upload recorded");

        Ok(Receipt {
            fname: submission.fname.clone(),
            bytes: submission.data.len(),
            accepted_at,
        })
    }
}
