//! Verification audit trail.
//!
//! Every redemption attempt (success, rejection, failure) and every query
//! decision is recorded. The log is append-only; writes are synced before
//! the append returns. Retention and purging are external concerns.

use std::fmt;
use std::fs::{File, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditAction {
    /// A code was issued.
    CodeIssued,

    /// A code was administratively disabled.
    CodeDisabled,

    /// A redemption attempt succeeded.
    RedemptionSucceeded,

    /// A redemption attempt was rejected.
    RedemptionRejected,

    /// A principal profile was created.
    ProfileCreated,

    /// A query was answered.
    QueryAnswered,

    /// A query was denied (quota or access).
    QueryDenied,

    /// A query timed out on the user-visible path and was deferred.
    QueryDeferred,

    /// A query failed downstream.
    QueryFailed,

    /// Credentials were imported.
    CredentialImported,
}

impl AuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditAction::CodeIssued => "CODE_ISSUED",
            AuditAction::CodeDisabled => "CODE_DISABLED",
            AuditAction::RedemptionSucceeded => "REDEMPTION_SUCCEEDED",
            AuditAction::RedemptionRejected => "REDEMPTION_REJECTED",
            AuditAction::ProfileCreated => "PROFILE_CREATED",
            AuditAction::QueryAnswered => "QUERY_ANSWERED",
            AuditAction::QueryDenied => "QUERY_DENIED",
            AuditAction::QueryDeferred => "QUERY_DEFERRED",
            AuditAction::QueryFailed => "QUERY_FAILED",
            AuditAction::CredentialImported => "CREDENTIAL_IMPORTED",
        }
    }
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Outcome of the audited action
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuditOutcome {
    Success,
    Rejected,
    Failed,
    Deferred,
}

impl AuditOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            AuditOutcome::Success => "SUCCESS",
            AuditOutcome::Rejected => "REJECTED",
            AuditOutcome::Failed => "FAILED",
            AuditOutcome::Deferred => "DEFERRED",
        }
    }
}

impl fmt::Display for AuditOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single audit record
#[derive(Debug, Clone)]
pub struct AuditRecord {
    pub id: Uuid,
    pub timestamp: DateTime<Utc>,
    pub action: AuditAction,
    pub outcome: AuditOutcome,

    /// External messaging identity involved, if any
    pub external_id: Option<String>,

    /// Verification code token involved, if any
    pub code: Option<String>,

    /// Principal profile involved, if any
    pub principal_id: Option<Uuid>,

    /// Credential involved, if any
    pub credential_id: Option<Uuid>,

    /// Rejection reason or free-form detail
    pub detail: Option<String>,
}

impl AuditRecord {
    pub fn new(action: AuditAction, outcome: AuditOutcome) -> Self {
        Self {
            id: Uuid::new_v4(),
            timestamp: Utc::now(),
            action,
            outcome,
            external_id: None,
            code: None,
            principal_id: None,
            credential_id: None,
            detail: None,
        }
    }

    pub fn with_external_id(mut self, id: impl Into<String>) -> Self {
        self.external_id = Some(id.into());
        self
    }

    pub fn with_code(mut self, code: impl Into<String>) -> Self {
        self.code = Some(code.into());
        self
    }

    pub fn with_principal(mut self, id: Uuid) -> Self {
        self.principal_id = Some(id);
        self
    }

    pub fn with_credential(mut self, id: Uuid) -> Self {
        self.credential_id = Some(id);
        self
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    /// Serialize to one JSON line for append-only storage
    pub fn to_json(&self) -> String {
        let mut json = format!(
            r#"{{"id":"{}","ts":"{}","action":"{}","outcome":"{}""#,
            self.id,
            self.timestamp.to_rfc3339(),
            self.action,
            self.outcome
        );

        if let Some(ref ext) = self.external_id {
            json.push_str(&format!(r#","external_id":"{}""#, escape_json(ext)));
        }
        if let Some(ref code) = self.code {
            json.push_str(&format!(r#","code":"{}""#, escape_json(code)));
        }
        if let Some(ref pid) = self.principal_id {
            json.push_str(&format!(r#","principal_id":"{}""#, pid));
        }
        if let Some(ref cid) = self.credential_id {
            json.push_str(&format!(r#","credential_id":"{}""#, cid));
        }
        if let Some(ref detail) = self.detail {
            json.push_str(&format!(r#","detail":"{}""#, escape_json(detail)));
        }

        json.push('}');
        json
    }
}

fn escape_json(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
        .replace('\t', "\\t")
}

/// Append-only audit log
pub trait AuditLog: Send + Sync {
    /// Append a record. Visible after this call returns.
    fn append(&self, record: &AuditRecord) -> io::Result<()>;

    /// Sync to durable storage.
    fn sync(&self) -> io::Result<()>;
}

/// File-backed audit log: one JSON record per line, synced per append
pub struct FileAuditLog {
    path: PathBuf,
    writer: Arc<Mutex<BufWriter<File>>>,
}

impl FileAuditLog {
    pub fn open(path: impl AsRef<Path>) -> io::Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new().create(true).append(true).open(&path)?;

        Ok(Self {
            path,
            writer: Arc::new(Mutex::new(BufWriter::new(file))),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl AuditLog for FileAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        let json = record.to_json();
        let mut writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "audit lock poisoned"))?;
        writeln!(writer, "{}", json)?;
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    fn sync(&self) -> io::Result<()> {
        let writer = self
            .writer
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "audit lock poisoned"))?;
        writer.get_ref().sync_all()
    }
}

/// In-memory audit log for tests
#[derive(Debug, Default)]
pub struct MemoryAuditLog {
    records: Arc<Mutex<Vec<AuditRecord>>>,
}

impl MemoryAuditLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// All recorded entries
    pub fn records(&self) -> Vec<AuditRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    /// Entries for a given action
    pub fn records_for(&self, action: AuditAction) -> Vec<AuditRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.action == action)
            .collect()
    }
}

impl AuditLog for MemoryAuditLog {
    fn append(&self, record: &AuditRecord) -> io::Result<()> {
        self.records
            .lock()
            .map_err(|_| io::Error::new(io::ErrorKind::Other, "audit lock poisoned"))?
            .push(record.clone());
        Ok(())
    }

    fn sync(&self) -> io::Result<()> {
        Ok(())
    }
}
