use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sync_logging::{sync_info, sync_warn};

use crate::{RunStatus, SourceId, SourceRunResult};

/// Exponential backoff applied after consecutive failed runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BackoffPolicy {
    pub base_secs: u64,
    pub max_secs: u64,
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self {
            base_secs: 5 * 60,
            max_secs: 24 * 60 * 60,
        }
    }
}

impl BackoffPolicy {
    /// `base * 2^(failures - 1)`, capped at `max`. Zero failures means no wait.
    pub fn delay_secs(&self, consecutive_failures: u32) -> u64 {
        if consecutive_failures == 0 {
            return 0;
        }
        let exponent = consecutive_failures.saturating_sub(1).min(63);
        self.base_secs
            .saturating_mul(1u64 << exponent)
            .min(self.max_secs)
    }
}

/// Health of one source across runs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthRecord {
    pub source_id: SourceId,
    pub last_success: Option<DateTime<Utc>>,
    pub last_failure: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
    pub backoff_until: Option<DateTime<Utc>>,
    pub last_status: Option<RunStatus>,
    pub last_error: Option<String>,
}

impl HealthRecord {
    pub fn new(source_id: SourceId) -> Self {
        Self {
            source_id,
            last_success: None,
            last_failure: None,
            consecutive_failures: 0,
            backoff_until: None,
            last_status: None,
            last_error: None,
        }
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.backoff_until.is_none_or(|until| now >= until)
    }
}

/// Per-source health bookkeeping. The scheduler asks `is_ready` before
/// starting a run and the engine calls `record` once the run completes.
#[derive(Debug, Clone, Default)]
pub struct ListHealthTracker {
    policy: BackoffPolicy,
    records: BTreeMap<SourceId, HealthRecord>,
}

impl ListHealthTracker {
    pub fn new(policy: BackoffPolicy) -> Self {
        Self {
            policy,
            records: BTreeMap::new(),
        }
    }

    pub fn policy(&self) -> BackoffPolicy {
        self.policy
    }

    /// Replaces tracked state with previously persisted records.
    pub fn restore(&mut self, records: impl IntoIterator<Item = HealthRecord>) {
        self.records = records
            .into_iter()
            .map(|record| (record.source_id, record))
            .collect();
    }

    pub fn records(&self) -> Vec<HealthRecord> {
        self.records.values().cloned().collect()
    }

    pub fn get(&self, source_id: SourceId) -> Option<&HealthRecord> {
        self.records.get(&source_id)
    }

    pub fn is_ready(&self, source_id: SourceId, now: DateTime<Utc>) -> bool {
        self.records
            .get(&source_id)
            .is_none_or(|record| record.is_ready(now))
    }

    pub fn next_attempt(&self, source_id: SourceId) -> Option<DateTime<Utc>> {
        self.records
            .get(&source_id)
            .and_then(|record| record.backoff_until)
    }

    pub fn record(&mut self, result: &SourceRunResult, now: DateTime<Utc>) -> HealthRecord {
        let policy = self.policy;
        let record = self
            .records
            .entry(result.source_id)
            .or_insert_with(|| HealthRecord::new(result.source_id));

        record.last_status = Some(result.status);
        match result.status {
            RunStatus::Success | RunStatus::PartialFailure => {
                if result.status == RunStatus::PartialFailure {
                    sync_warn!(
                        "Source {} completed partially with {} items: {}",
                        result.source_id,
                        result.items_fetched,
                        result.error_detail.as_deref().unwrap_or("unknown error")
                    );
                }
                record.last_success = Some(now);
                record.consecutive_failures = 0;
                record.backoff_until = None;
                record.last_error = result.error_detail.clone();
            }
            RunStatus::Failure => {
                record.consecutive_failures = record.consecutive_failures.saturating_add(1);
                record.last_failure = Some(now);
                record.last_error = result.error_detail.clone();

                let mut delay = policy.delay_secs(record.consecutive_failures);
                if let Some(hint) = result.retry_after {
                    delay = delay.max(hint.as_secs());
                }
                let until = i64::try_from(delay)
                    .ok()
                    .and_then(TimeDelta::try_seconds)
                    .and_then(|delta| now.checked_add_signed(delta))
                    .unwrap_or(DateTime::<Utc>::MAX_UTC);
                record.backoff_until = Some(until);
                sync_info!(
                    "Source {} failed {} time(s) in a row, next attempt at {}",
                    result.source_id,
                    record.consecutive_failures,
                    until.to_rfc3339()
                );
            }
        }
        record.clone()
    }
}
