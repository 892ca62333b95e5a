use crate::domain::agent::PaymentAgent;
use crate::domain::enrollment::Enrollment;
use crate::domain::payment::Payment;
use crate::domain::ports::{AgentStore, EnrollmentStore, LedgerStore, PaymentStore, SessionStore};
use crate::domain::receipt::ReceiptNumber;
use crate::domain::session::VerificationSession;
use crate::error::{LedgerError, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, DB, Options, WriteBatch};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// Column Family for enrollment records.
pub const CF_ENROLLMENTS: &str = "enrollments";
/// Column Family for payment records.
pub const CF_PAYMENTS: &str = "payments";
/// Column Family for payment agents.
pub const CF_AGENTS: &str = "agents";
/// Column Family for cash verification sessions.
pub const CF_SESSIONS: &str = "sessions";

fn internal<E: Into<Box<dyn std::error::Error + Send + Sync>>>(e: E) -> LedgerError {
    LedgerError::Internal(e.into())
}

/// Persistent store backed by RocksDB.
///
/// Enrollments, payments, agents and sessions live in separate column
/// families, keyed by their UUIDs, serialized as JSON values. The validating
/// transition commits payment and enrollment together through a `WriteBatch`.
/// `Clone` shares the underlying `Arc<DB>`.
#[derive(Clone)]
pub struct RocksDbLedger {
    db: Arc<DB>,
    // Serializes session read-modify-write; RocksDB alone gives no
    // compare-and-set.
    session_guard: Arc<Mutex<()>>,
}

impl RocksDbLedger {
    /// Opens or creates the database at `path`, ensuring all column families
    /// exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cfs = vec![
            ColumnFamilyDescriptor::new(CF_ENROLLMENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_PAYMENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_AGENTS, Options::default()),
            ColumnFamilyDescriptor::new(CF_SESSIONS, Options::default()),
        ];

        let db = DB::open_cf_descriptors(&opts, path, cfs).map_err(internal)?;

        Ok(Self {
            db: Arc::new(db),
            session_guard: Arc::new(Mutex::new(())),
        })
    }

    fn cf(&self, name: &str) -> Result<&ColumnFamily> {
        self.db
            .cf_handle(name)
            .ok_or_else(|| internal(format!("column family {name} not found")))
    }

    fn put<T: Serialize>(&self, cf_name: &str, key: &[u8], value: &T) -> Result<()> {
        let cf = self.cf(cf_name)?;
        let bytes = serde_json::to_vec(value).map_err(internal)?;
        self.db.put_cf(cf, key, bytes).map_err(internal)
    }

    fn fetch<T: DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>> {
        let cf = self.cf(cf_name)?;
        match self.db.get_cf(cf, key).map_err(internal)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes).map_err(internal)?)),
            None => Ok(None),
        }
    }

    fn scan<T: DeserializeOwned>(&self, cf_name: &str) -> Result<Vec<T>> {
        let cf = self.cf(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, rocksdb::IteratorMode::Start) {
            let (_key, bytes) = item.map_err(internal)?;
            values.push(serde_json::from_slice(&bytes).map_err(internal)?);
        }
        Ok(values)
    }
}

#[async_trait]
impl EnrollmentStore for RocksDbLedger {
    async fn store(&self, enrollment: Enrollment) -> Result<()> {
        self.put(CF_ENROLLMENTS, enrollment.reference.as_bytes(), &enrollment)
    }

    async fn get(&self, reference: Uuid) -> Result<Option<Enrollment>> {
        self.fetch(CF_ENROLLMENTS, reference.as_bytes())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Enrollment>> {
        let all: Vec<Enrollment> = self.scan(CF_ENROLLMENTS)?;
        Ok(all.into_iter().find(|e| e.public_token == token))
    }

    async fn get_all(&self) -> Result<Vec<Enrollment>> {
        self.scan(CF_ENROLLMENTS)
    }
}

#[async_trait]
impl PaymentStore for RocksDbLedger {
    async fn store(&self, payment: Payment) -> Result<()> {
        self.put(CF_PAYMENTS, payment.id.as_bytes(), &payment)
    }

    async fn get(&self, id: Uuid) -> Result<Option<Payment>> {
        self.fetch(CF_PAYMENTS, id.as_bytes())
    }

    async fn get_by_receipt(&self, receipt: &ReceiptNumber) -> Result<Option<Payment>> {
        let all: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        Ok(all
            .into_iter()
            .find(|p| p.receipt_number.as_ref() == Some(receipt)))
    }

    async fn for_enrollment(&self, enrollment: Uuid) -> Result<Vec<Payment>> {
        let all: Vec<Payment> = self.scan(CF_PAYMENTS)?;
        let mut payments: Vec<Payment> = all
            .into_iter()
            .filter(|p| p.enrollment == enrollment)
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }
}

#[async_trait]
impl LedgerStore for RocksDbLedger {
    async fn commit_validation(&self, payment: Payment, enrollment: Enrollment) -> Result<()> {
        let payments_cf = self.cf(CF_PAYMENTS)?;
        let enrollments_cf = self.cf(CF_ENROLLMENTS)?;

        let mut batch = WriteBatch::default();
        batch.put_cf(
            payments_cf,
            payment.id.as_bytes(),
            serde_json::to_vec(&payment).map_err(internal)?,
        );
        batch.put_cf(
            enrollments_cf,
            enrollment.reference.as_bytes(),
            serde_json::to_vec(&enrollment).map_err(internal)?,
        );
        self.db.write(batch).map_err(internal)
    }
}

#[async_trait]
impl AgentStore for RocksDbLedger {
    async fn store(&self, agent: PaymentAgent) -> Result<()> {
        self.put(CF_AGENTS, agent.id.as_bytes(), &agent)
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentAgent>> {
        self.fetch(CF_AGENTS, id.as_bytes())
    }

    async fn all_active(&self) -> Result<Vec<PaymentAgent>> {
        let all: Vec<PaymentAgent> = self.scan(CF_AGENTS)?;
        let mut agents: Vec<PaymentAgent> = all.into_iter().filter(|a| a.is_active).collect();
        agents.sort_by(|a, b| a.agent_code.cmp(&b.agent_code));
        Ok(agents)
    }
}

#[async_trait]
impl SessionStore for RocksDbLedger {
    async fn store(&self, session: VerificationSession) -> Result<()> {
        self.put(CF_SESSIONS, session.id.as_bytes(), &session)
    }

    async fn sweep_expired(
        &self,
        enrollment: Uuid,
        agent: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let _guard = self.session_guard.lock().unwrap_or_else(|e| e.into_inner());
        let sessions: Vec<VerificationSession> = self.scan(CF_SESSIONS)?;
        for mut session in sessions {
            if session.enrollment == enrollment
                && session.agent == agent
                && !session.is_used
                && session.is_expired(now)
            {
                session.is_used = true;
                self.put(CF_SESSIONS, session.id.as_bytes(), &session)?;
            }
        }
        Ok(())
    }

    async fn find_open(
        &self,
        enrollment: Uuid,
        agent: Uuid,
    ) -> Result<Option<VerificationSession>> {
        let sessions: Vec<VerificationSession> = self.scan(CF_SESSIONS)?;
        Ok(sessions
            .into_iter()
            .filter(|s| s.enrollment == enrollment && s.agent == agent && !s.is_used)
            .max_by_key(|s| s.created_at))
    }

    async fn consume(&self, id: Uuid) -> Result<bool> {
        let _guard = self.session_guard.lock().unwrap_or_else(|e| e.into_inner());
        let session: Option<VerificationSession> = self.fetch(CF_SESSIONS, id.as_bytes())?;
        match session {
            Some(mut session) if !session.is_used => {
                session.is_used = true;
                self.put(CF_SESSIONS, session.id.as_bytes(), &session)?;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}
