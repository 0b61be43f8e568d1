// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: Apache-2.0

//! Attack simulation patterns for security testing.

/// Attack pattern configuration.
#[derive(Debug, Clone)]
pub struct AttackConfig {
    /// Submissions fired per wave
    pub requests_per_wave: usize,
    /// Number of waves; the clock moves between waves
    pub waves: usize,
    /// Seconds the clock advances between waves
    pub wave_spacing_secs: i64,
    /// Number of distinct target file names
    pub unique_names: usize,
    /// Whether submissions carry the right key
    pub valid_key: bool,
    /// Use path traversal names instead of valid ones
    pub traversal_names: bool,
    /// Payload size in bytes
    pub payload_bytes: usize,
}

impl Default for AttackConfig {
    fn default() -> Self {
        Self {
            requests_per_wave: 32,
            waves: 1,
            wave_spacing_secs: 0,
            unique_names: 1,
            valid_key: true,
            traversal_names: false,
            payload_bytes: 16,
        }
    }
}

/// Predefined attack patterns.
impl AttackConfig {
    /// Concurrent flood of one file within a single interval window.
    pub fn same_file_flood() -> Self {
        Self {
            requests_per_wave: 64,
            ..Default::default()
        }
    }

    /// Concurrent flood spread over many file names.
    pub fn many_file_flood() -> Self {
        Self {
            requests_per_wave: 64,
            unique_names: 16,
            ..Default::default()
        }
    }

    /// Repeated floods, one per interval window.
    pub fn sustained_flood(interval_secs: i64) -> Self {
        Self {
            requests_per_wave: 24,
            waves: 5,
            wave_spacing_secs: interval_secs,
            unique_names: 3,
            ..Default::default()
        }
    }

    /// Submissions without the upload key.
    pub fn key_guessing() -> Self {
        Self {
            requests_per_wave: 50,
            unique_names: 5,
            valid_key: false,
            ..Default::default()
        }
    }

    /// Submissions trying to write outside the storage root.
    pub fn path_traversal() -> Self {
        Self {
            requests_per_wave: 40,
            traversal_names: true,
            ..Default::default()
        }
    }

    /// Oversized payloads.
    pub fn oversized_payloads() -> Self {
        Self {
            requests_per_wave: 20,
            payload_bytes: 4096,
            ..Default::default()
        }
    }

    /// Total submissions across all waves.
    pub fn total_requests(&self) -> usize {
        self.requests_per_wave * self.waves
    }

    /// Get expected outcomes for this attack pattern.
    pub fn expectations(&self) -> AttackExpectations {
        if !self.valid_key {
            AttackExpectations {
                max_allowed: 0,
                description: "No submission without the key may be accepted",
            }
        } else if self.traversal_names {
            AttackExpectations {
                max_allowed: 0,
                description: "No traversal name may be accepted",
            }
        } else if self.payload_bytes > 1000 {
            AttackExpectations {
                max_allowed: 0,
                description: "No oversized payload may be accepted",
            }
        } else {
            AttackExpectations {
                max_allowed: self.waves,
                description: "At most one submission per interval window",
            }
        }
    }
}

/// Expected outcomes for different attack types.
pub struct AttackExpectations {
    /// Maximum number of accepted submissions
    pub max_allowed: usize,
    /// Description of expected behavior
    pub description: &'static str,
}
