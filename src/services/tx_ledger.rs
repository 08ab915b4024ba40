//! Prepared-transaction ledger.
//!
//! The runtime never signs. Prepared transactions are parked here with a
//! `needs-signing` status; externally signed payloads are accepted and
//! acknowledged, and both are pollable by id.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;
use uuid::Uuid;

/// Status of a tracked transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TxStatus {
    /// Prepared by the runtime, waiting on an external signer
    NeedsSigning,
    /// Signed payload accepted for downstream submission
    Submitted,
}

impl TxStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::NeedsSigning => "needs-signing",
            Self::Submitted => "submitted",
        }
    }
}

/// One tracked transaction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TxRecord {
    pub id: String,
    pub status: TxStatus,
    pub payload: Value,
    pub created: DateTime<Utc>,
}

/// In-memory transaction table.
#[derive(Default)]
pub struct TxLedger {
    records: Mutex<HashMap<String, TxRecord>>,
}

impl TxLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parks a prepared, unsigned transaction. Returns its polling id.
    pub fn store_prepared(&self, payload: Value) -> String {
        self.insert(payload, TxStatus::NeedsSigning)
    }

    /// Accepts an externally signed payload. Returns its polling id.
    pub fn submit_signed(&self, payload: Value) -> String {
        self.insert(payload, TxStatus::Submitted)
    }

    /// Looks up a transaction by id.
    pub fn status(&self, id: &str) -> Option<TxRecord> {
        self.records.lock().expect("tx ledger lock").get(id).cloned()
    }

    pub fn len(&self) -> usize {
        self.records.lock().expect("tx ledger lock").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn insert(&self, payload: Value, status: TxStatus) -> String {
        let id = Uuid::new_v4().to_string();
        let record = TxRecord {
            id: id.clone(),
            status,
            payload,
            created: Utc::now(),
        };
        self.records
            .lock()
            .expect("tx ledger lock")
            .insert(id.clone(), record);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prepared_transactions_need_signing() {
        let ledger = TxLedger::new();
        let id = ledger.store_prepared(json!({ "to": "0xabc" }));

        let record = ledger.status(&id).expect("record");
        assert_eq!(record.status, TxStatus::NeedsSigning);
        assert_eq!(record.status.as_str(), "needs-signing");
    }

    #[test]
    fn signed_transactions_are_submitted() {
        let ledger = TxLedger::new();
        let id = ledger.submit_signed(json!({ "raw": "0xdeadbeef" }));

        let record = ledger.status(&id).expect("record");
        assert_eq!(record.status, TxStatus::Submitted);
    }

    #[test]
    fn unknown_id_is_none() {
        let ledger = TxLedger::new();
        assert!(ledger.status("missing").is_none());
    }
}
