// SPDX-FileCopyrightText: 2025 Hyperpolymath
// SPDX-License-Identifier: PMPL-1.0-or-later

//! Prometheus counters for upload outcomes.

use prometheus::{Encoder, IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

/// Upload metrics registered on a private registry.
#[derive(Clone)]
pub struct UploadMetrics {
    registry: Registry,
    submissions: IntCounterVec,
    bytes_appended: IntCounter,
}

impl UploadMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let submissions = IntCounterVec::new(
            Opts::new("upload_submissions_total", "Upload submissions by outcome"),
            &["outcome"],
        )?;
        let bytes_appended = IntCounter::new(
            "upload_bytes_appended_total",
            "Payload bytes appended to storage",
        )?;

        registry.register(Box::new(submissions.clone()))?;
        registry.register(Box::new(bytes_appended.clone()))?;

        Ok(Self {
            registry,
            submissions,
            bytes_appended,
        })
    }

    /// Count an accepted upload of `bytes` bytes.
    pub fn accepted(&self, bytes: usize) {
        self.submissions.with_label_values(&["accepted"]).inc();
        self.bytes_appended.inc_by(bytes as u64);
    }

    /// Count a rejected upload under its error code.
    pub fn rejected(&self, code: &str) {
        self.submissions.with_label_values(&[code]).inc();
    }

    /// Render all metrics in the Prometheus text format.
    pub fn render(&self) -> prometheus::Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new().encode(&self.registry.gather(), &mut buffer)?;
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }
}
