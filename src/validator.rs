// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Upload submission validator.
//!
//! Implements the ingress checks for an upload submission:
//! - Upload key comparison (constant time)
//! - Payload size limit
//! - File name length limit
//! - File name pattern (`name(.ext)*` over `[A-Za-z0-9_]`)
//! - Optional file name allow-list
//!
//! Every check is a pure function of its inputs and the configuration.

use crate::config::{ConfigError, ValidationConfig};
use regex::Regex;
use thiserror::Error;
use tracing::debug;

/// Anchored file name pattern. Rust's `$` only matches at the very end of
/// the haystack, so a trailing newline cannot slip through.
const FILE_NAME_PATTERN: &str = r"^[A-Za-z0-9_]+(\.[A-Za-z0-9_]+)*$";

/// Validation error types.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Upload key mismatch")]
    InvalidKey,

    #[error("Payload of {size} bytes exceeds limit of {max} bytes")]
    PayloadTooLarge { size: usize, max: usize },

    #[error("File name of {len} bytes exceeds limit of {max} bytes")]
    NameTooLong { len: usize, max: usize },

    #[error("File name {0:?} does not match the allowed pattern")]
    InvalidName(String),

    #[error("File name {0:?} is not on the allow-list")]
    NameNotAllowed(String),
}

/// Result of validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ValidationResult {
    /// Submission passed the check
    Valid,
    /// Submission failed the check
    Invalid(ValidationError),
}

impl ValidationResult {
    pub fn is_valid(&self) -> bool {
        matches!(self, ValidationResult::Valid)
    }

    pub fn error(&self) -> Option<&ValidationError> {
        match self {
            ValidationResult::Valid => None,
            ValidationResult::Invalid(e) => Some(e),
        }
    }

    /// Convert into a `Result` so checks can be chained with `?`.
    pub fn into_result(self) -> Result<(), ValidationError> {
        match self {
            ValidationResult::Valid => Ok(()),
            ValidationResult::Invalid(e) => Err(e),
        }
    }
}

/// Upload submission validator.
#[derive(Debug, Clone)]
pub struct UploadValidator {
    config: ValidationConfig,
    file_name: Regex,
    allowed_name: Option<Regex>,
}

impl UploadValidator {
    /// Create a new validator, compiling the configured patterns.
    pub fn new(config: ValidationConfig) -> Result<Self, ConfigError> {
        let file_name = Regex::new(FILE_NAME_PATTERN)?;
        let allowed_name = match &config.allowed_name_pattern {
            // Anchor so an allow-list entry cannot match a substring.
            Some(pattern) => Some(Regex::new(&format!("^(?:{pattern})$"))?),
            None => None,
        };

        Ok(Self {
            config,
            file_name,
            allowed_name,
        })
    }

    /// Validate the upload key.
    pub fn validate_key(&self, key: &str) -> ValidationResult {
        if constant_time_eq(key.as_bytes(), self.config.shared_key.as_bytes()) {
            ValidationResult::Valid
        } else {
            debug!("Upload key mismatch");
            ValidationResult::Invalid(ValidationError::InvalidKey)
        }
    }

    /// Validate the payload size.
    pub fn validate_data_size(&self, data: &[u8]) -> ValidationResult {
        let max = self.config.max_data_bytes;
        if data.len() <= max {
            ValidationResult::Valid
        } else {
            debug!(size = data.len(), max, "Payload too large");
            ValidationResult::Invalid(ValidationError::PayloadTooLarge {
                size: data.len(),
                max,
            })
        }
    }

    /// Validate the file name length in bytes.
    pub fn validate_name_length(&self, fname: &str) -> ValidationResult {
        let max = self.config.max_name_bytes;
        if fname.len() <= max {
            ValidationResult::Valid
        } else {
            debug!(len = fname.len(), max, "File name too long");
            ValidationResult::Invalid(ValidationError::NameTooLong {
                len: fname.len(),
                max,
            })
        }
    }

    /// Validate the file name against the fixed pattern.
    pub fn validate_name_pattern(&self, fname: &str) -> ValidationResult {
        if self.file_name.is_match(fname) {
            ValidationResult::Valid
        } else {
            debug!(fname = ?fname, "File name rejected by pattern");
            ValidationResult::Invalid(ValidationError::InvalidName(fname.to_string()))
        }
    }

    /// Validate the file name against the optional allow-list.
    pub fn validate_allowed_name(&self, fname: &str) -> ValidationResult {
        match &self.allowed_name {
            Some(allowed) if !allowed.is_match(fname) => {
                debug!(fname = %fname, "File name not on allow-list");
                ValidationResult::Invalid(ValidationError::NameNotAllowed(fname.to_string()))
            }
            _ => ValidationResult::Valid,
        }
    }

    /// Validate size, name length, name pattern and allow-list, in that order.
    pub fn validate_payload(&self, data: &[u8], fname: &str) -> ValidationResult {
        let size = self.validate_data_size(data);
        if !size.is_valid() {
            return size;
        }

        let length = self.validate_name_length(fname);
        if !length.is_valid() {
            return length;
        }

        let pattern = self.validate_name_pattern(fname);
        if !pattern.is_valid() {
            return pattern;
        }

        self.validate_allowed_name(fname)
    }

    /// Validate a complete submission without throttling.
    pub fn validate(&self, key: &str, data: &[u8], fname: &str) -> ValidationResult {
        let key_result = self.validate_key(key);
        if !key_result.is_valid() {
            return key_result;
        }

        self.validate_payload(data, fname)
    }
}

/// Compare two byte strings without short-circuiting on the first mismatch.
///
/// The length is not secret; only the content comparison is constant time.
fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}
