use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::{LedgerError, Result};
use crate::types::{CaseId, EntityId};

/// the two party records registered for a case
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CaseParties {
    /// the firm's client, creditor of the settlement
    pub client: EntityId,
    /// the executed party, debtor of the settlement
    pub executed: EntityId,
}

/// lookup into the external entity registry
pub trait CaseDirectory {
    fn case_parties(&self, case_id: CaseId) -> Result<CaseParties>;
}

/// external document storage, asked to archive a case on extinction
pub trait DocumentArchive {
    fn archive_case_documents(&self, case_id: CaseId) -> std::result::Result<(), String>;
}

/// one audit trail entry, emitted after every mutating operation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    pub action: String,
    pub actor: String,
    pub payload: serde_json::Value,
    pub recorded_at: DateTime<Utc>,
}

/// fire-and-forget audit sink; failures never roll back the operation
pub trait AuditSink {
    fn record(&self, entry: AuditEntry) -> std::result::Result<(), String>;
}

/// directory fake backed by a fixed map
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    parties: HashMap<CaseId, CaseParties>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_case(mut self, case_id: CaseId, client: EntityId, executed: EntityId) -> Self {
        self.parties.insert(case_id, CaseParties { client, executed });
        self
    }
}

impl CaseDirectory for StaticDirectory {
    fn case_parties(&self, case_id: CaseId) -> Result<CaseParties> {
        self.parties
            .get(&case_id)
            .copied()
            .ok_or(LedgerError::CaseUnknown { id: case_id })
    }
}

/// archive fake recording the cases it was asked to archive
#[derive(Debug, Clone, Default)]
pub struct MemoryArchive {
    archived: Arc<Mutex<Vec<CaseId>>>,
}

impl MemoryArchive {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn archived(&self) -> Vec<CaseId> {
        self.archived.lock().expect("archive lock poisoned").clone()
    }
}

impl DocumentArchive for MemoryArchive {
    fn archive_case_documents(&self, case_id: CaseId) -> std::result::Result<(), String> {
        self.archived.lock().expect("archive lock poisoned").push(case_id);
        Ok(())
    }
}

/// archive fake that always fails, for best-effort semantics tests
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingArchive;

impl DocumentArchive for FailingArchive {
    fn archive_case_documents(&self, case_id: CaseId) -> std::result::Result<(), String> {
        Err(format!("archive unavailable for case {case_id}"))
    }
}

/// audit fake recording entries for inspection
#[derive(Debug, Clone, Default)]
pub struct MemoryAudit {
    entries: Arc<Mutex<Vec<AuditEntry>>>,
}

impl MemoryAudit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().expect("audit lock poisoned").clone()
    }

    pub fn actions(&self) -> Vec<String> {
        self.entries().into_iter().map(|e| e.action).collect()
    }
}

impl AuditSink for MemoryAudit {
    fn record(&self, entry: AuditEntry) -> std::result::Result<(), String> {
        self.entries.lock().expect("audit lock poisoned").push(entry);
        Ok(())
    }
}

/// audit sink that always fails, for non-fatality tests
#[derive(Debug, Clone, Copy, Default)]
pub struct FailingAudit;

impl AuditSink for FailingAudit {
    fn record(&self, _entry: AuditEntry) -> std::result::Result<(), String> {
        Err("audit sink unavailable".to_string())
    }
}
