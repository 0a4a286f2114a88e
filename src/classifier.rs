use rustc_hash::{FxHashMap, FxHashSet};
use serde::Serialize;
use std::sync::Mutex;

use crate::config::ScanConfig;
use crate::probe::ProbeOutcome;

/// The classifier's decision for one probe outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Surface the result to the output stream
    Report,
    /// Drop the result, counting it only
    Suppress,
    /// Re-enqueue the candidate for another attempt
    Retry,
}

/// Maps probe outcomes to verdicts based on the configured filters.
///
/// The adaptive soft-404 table is the one piece of cross-request state: a
/// (status, content-length) signature that keeps recurring across distinct
/// candidates is assumed to be a custom error page and suppressed once its
/// count passes the configured threshold.
#[derive(Debug)]
pub struct ResultClassifier {
    accepted: Option<FxHashSet<u16>>,
    excluded: FxHashSet<u16>,
    max_content_length: Option<u64>,
    soft_404_threshold: Option<usize>,
    max_attempts: u32,
    signatures: Mutex<FxHashMap<(u16, u64), usize>>,
}

impl ResultClassifier {
    pub fn new(config: &ScanConfig) -> Self {
        let accepted = config
            .accepted_status_codes
            .as_ref()
            .map(|codes| codes.iter().copied().collect());
        let excluded = config
            .excluded_status_codes
            .as_ref()
            .map(|codes| codes.iter().copied().collect())
            .unwrap_or_default();

        Self {
            accepted,
            excluded,
            max_content_length: config.max_content_length,
            soft_404_threshold: config.soft_404_threshold,
            max_attempts: config.max_attempts(),
            signatures: Mutex::new(FxHashMap::default()),
        }
    }

    /// Decide what happens to one outcome. `attempt` is 1-based.
    pub fn classify(&self, outcome: &ProbeOutcome, attempt: u32) -> Verdict {
        if outcome.is_error() {
            return if attempt < self.max_attempts {
                Verdict::Retry
            } else {
                // Surfaced as a failure-class result so unreachable paths
                // stay distinguishable from "not found"
                Verdict::Report
            };
        }

        let status = match outcome.status {
            Some(status) => status,
            None => return Verdict::Report,
        };

        if self.excluded.contains(&status) {
            return Verdict::Suppress;
        }

        if let (Some(max), Some(length)) = (self.max_content_length, outcome.content_length)
            && length > max
        {
            return Verdict::Suppress;
        }

        if let (Some(threshold), Some(length)) = (self.soft_404_threshold, outcome.content_length) {
            let mut signatures = self.signatures.lock().unwrap();
            let count = signatures.entry((status, length)).or_insert(0);
            *count += 1;
            if *count > threshold {
                return Verdict::Suppress;
            }
        }

        if self.is_accepted(status) {
            Verdict::Report
        } else {
            Verdict::Suppress
        }
    }

    fn is_accepted(&self, status: u16) -> bool {
        match self.accepted {
            Some(ref set) => set.contains(&status),
            None => (100..400).contains(&status) || status == 401 || status == 403,
        }
    }
}
