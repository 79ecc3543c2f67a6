//! Idempotent apply (§5, §4.5.3): a repeated request carrying the same
//! `client_request_id` within the retention window returns the
//! original `ExecutionResult` without re-executing any upload.

use std::path::PathBuf;
use std::time::Duration;

use cae_protocol::plan::ExecutionResult;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::CoreError;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct IdempotencyRecord {
    client_request_id: String,
    recorded_at: DateTime<Utc>,
    result: ExecutionResult,
}

/// One JSON file per `client_request_id`, keyed by its content hash so
/// an arbitrary client-supplied string is always a safe file name.
pub struct IdempotencyStore {
    store: cae_repository::store::JsonStore<IdempotencyRecord>,
    retention: Duration,
}

impl IdempotencyStore {
    pub fn open(dir: PathBuf, retention: Duration) -> Result<Self, CoreError> {
        Ok(Self {
            store: cae_repository::store::JsonStore::new(dir).map_err(CoreError::from)?,
            retention,
        })
    }

    fn key(client_request_id: &str) -> String {
        cae_security::sha256_hex(client_request_id.as_bytes())
    }

    /// Returns the cached result if one exists and is still within the
    /// retention window.
    pub fn lookup(&self, client_request_id: &str) -> Result<Option<ExecutionResult>, CoreError> {
        let Some(record) = self.store.load(&Self::key(client_request_id)).map_err(CoreError::from)? else {
            return Ok(None);
        };
        if Utc::now().signed_duration_since(record.recorded_at).to_std().unwrap_or(Duration::MAX) > self.retention {
            return Ok(None);
        }
        Ok(Some(record.result))
    }

    pub fn record(&self, client_request_id: &str, result: &ExecutionResult) -> Result<(), CoreError> {
        let record = IdempotencyRecord {
            client_request_id: client_request_id.to_string(),
            recorded_at: Utc::now(),
            result: result.clone(),
        };
        self.store.save(&Self::key(client_request_id), &record).map_err(CoreError::from)
    }

    /// Drops every record older than the retention window. Not called
    /// automatically; the job worker sweeps once per start-up pass
    /// rather than on a timer, since this store is small and crash-safe
    /// resume already scans it.
    pub fn sweep_expired(&self) -> Result<usize, CoreError> {
        let mut dropped = 0;
        for record in self.store.load_all().map_err(CoreError::from)? {
            if Utc::now().signed_duration_since(record.recorded_at).to_std().unwrap_or(Duration::ZERO) > self.retention {
                self.store.delete(&Self::key(&record.client_request_id)).map_err(CoreError::from)?;
                dropped += 1;
            }
        }
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cae_ids::RunId;
    use cae_protocol::plan::ExecutionSummary;
    use tempfile::tempdir;

    fn sample_result() -> ExecutionResult {
        ExecutionResult {
            run_id: RunId::new(),
            items: Vec::new(),
            summary: ExecutionSummary { success: 1, failed: 0, skipped: 0 },
        }
    }

    #[test]
    fn repeated_request_id_returns_cached_result() {
        let dir = tempdir().unwrap();
        let store = IdempotencyStore::open(dir.path().to_path_buf(), Duration::from_secs(3600)).unwrap();
        assert!(store.lookup("req-1").unwrap().is_none());
        let result = sample_result();
        store.record("req-1", &result).unwrap();
        let cached = store.lookup("req-1").unwrap().unwrap();
        assert_eq!(cached.summary.success, result.summary.success);
    }

    #[test]
    fn expired_record_is_not_returned() {
        let dir = tempdir().unwrap();
        let store = IdempotencyStore::open(dir.path().to_path_buf(), Duration::from_secs(0)).unwrap();
        store.record("req-2", &sample_result()).unwrap();
        assert!(store.lookup("req-2").unwrap().is_none());
    }
}
