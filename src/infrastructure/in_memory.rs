use crate::domain::agent::PaymentAgent;
use crate::domain::enrollment::Enrollment;
use crate::domain::payment::Payment;
use crate::domain::ports::{
    AgentStore, EnrollmentStore, LedgerStore, PaymentStore, ProvisionedStudent, SessionStore,
    StudentProvisioner,
};
use crate::domain::receipt::ReceiptNumber;
use crate::domain::session::VerificationSession;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rand::Rng;
use rand::distributions::Alphanumeric;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Thread-safe in-memory backing store for enrollments and payments.
///
/// One struct implements the enrollment, payment and atomic-commit ports so
/// `commit_validation` can take both maps' write locks in one scope. `Clone`
/// shares the underlying maps; the engine receives boxed clones of the same
/// instance.
#[derive(Default, Clone)]
pub struct InMemoryLedger {
    enrollments: Arc<RwLock<HashMap<Uuid, Enrollment>>>,
    payments: Arc<RwLock<HashMap<Uuid, Payment>>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a payment directly, the way an external gateway callback
    /// would, bypassing the initiation checks.
    pub async fn insert_payment(&self, payment: Payment) {
        self.payments.write().await.insert(payment.id, payment);
    }
}

#[async_trait]
impl EnrollmentStore for InMemoryLedger {
    async fn store(&self, enrollment: Enrollment) -> Result<()> {
        self.enrollments
            .write()
            .await
            .insert(enrollment.reference, enrollment);
        Ok(())
    }

    async fn get(&self, reference: Uuid) -> Result<Option<Enrollment>> {
        Ok(self.enrollments.read().await.get(&reference).cloned())
    }

    async fn get_by_token(&self, token: &str) -> Result<Option<Enrollment>> {
        Ok(self
            .enrollments
            .read()
            .await
            .values()
            .find(|e| e.public_token == token)
            .cloned())
    }

    async fn get_all(&self) -> Result<Vec<Enrollment>> {
        Ok(self.enrollments.read().await.values().cloned().collect())
    }
}

#[async_trait]
impl PaymentStore for InMemoryLedger {
    async fn store(&self, payment: Payment) -> Result<()> {
        self.payments.write().await.insert(payment.id, payment);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Payment>> {
        Ok(self.payments.read().await.get(&id).cloned())
    }

    async fn get_by_receipt(&self, receipt: &ReceiptNumber) -> Result<Option<Payment>> {
        Ok(self
            .payments
            .read()
            .await
            .values()
            .find(|p| p.receipt_number.as_ref() == Some(receipt))
            .cloned())
    }

    async fn for_enrollment(&self, enrollment: Uuid) -> Result<Vec<Payment>> {
        let mut payments: Vec<Payment> = self
            .payments
            .read()
            .await
            .values()
            .filter(|p| p.enrollment == enrollment)
            .cloned()
            .collect();
        payments.sort_by_key(|p| p.created_at);
        Ok(payments)
    }
}

#[async_trait]
impl LedgerStore for InMemoryLedger {
    async fn commit_validation(&self, payment: Payment, enrollment: Enrollment) -> Result<()> {
        // Both write locks held for the whole commit: either write is
        // observable only together with the other.
        let mut payments = self.payments.write().await;
        let mut enrollments = self.enrollments.write().await;
        payments.insert(payment.id, payment);
        enrollments.insert(enrollment.reference, enrollment);
        Ok(())
    }
}

/// In-memory payment agent registry.
#[derive(Default, Clone)]
pub struct InMemoryAgentStore {
    agents: Arc<RwLock<HashMap<Uuid, PaymentAgent>>>,
}

impl InMemoryAgentStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl AgentStore for InMemoryAgentStore {
    async fn store(&self, agent: PaymentAgent) -> Result<()> {
        self.agents.write().await.insert(agent.id, agent);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<PaymentAgent>> {
        Ok(self.agents.read().await.get(&id).cloned())
    }

    async fn all_active(&self) -> Result<Vec<PaymentAgent>> {
        let mut agents: Vec<PaymentAgent> = self
            .agents
            .read()
            .await
            .values()
            .filter(|a| a.is_active)
            .cloned()
            .collect();
        agents.sort_by(|a, b| a.agent_code.cmp(&b.agent_code));
        Ok(agents)
    }
}

/// In-memory verification session store.
#[derive(Default, Clone)]
pub struct InMemorySessionStore {
    sessions: Arc<RwLock<HashMap<Uuid, VerificationSession>>>,
}

impl InMemorySessionStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SessionStore for InMemorySessionStore {
    async fn store(&self, session: VerificationSession) -> Result<()> {
        self.sessions.write().await.insert(session.id, session);
        Ok(())
    }

    async fn sweep_expired(
        &self,
        enrollment: Uuid,
        agent: Uuid,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        for session in sessions.values_mut() {
            if session.enrollment == enrollment
                && session.agent == agent
                && !session.is_used
                && session.is_expired(now)
            {
                session.is_used = true;
            }
        }
        Ok(())
    }

    async fn find_open(
        &self,
        enrollment: Uuid,
        agent: Uuid,
    ) -> Result<Option<VerificationSession>> {
        Ok(self
            .sessions
            .read()
            .await
            .values()
            .filter(|s| s.enrollment == enrollment && s.agent == agent && !s.is_used)
            .max_by_key(|s| s.created_at)
            .cloned())
    }

    async fn consume(&self, id: Uuid) -> Result<bool> {
        // The write lock makes the check-and-flip a single step.
        let mut sessions = self.sessions.write().await;
        match sessions.get_mut(&id) {
            Some(session) if !session.is_used => {
                session.is_used = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

/// Student account collaborator backed by a map keyed on enrollment.
///
/// Guarantees at most one provisioned account per enrollment, which is what
/// keys the "first validated payment" post-commit branch.
#[derive(Default, Clone)]
pub struct InMemoryStudentDirectory {
    accounts: Arc<RwLock<HashMap<Uuid, ProvisionedStudent>>>,
}

impl InMemoryStudentDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn account_for(&self, enrollment: Uuid) -> Option<ProvisionedStudent> {
        self.accounts.read().await.get(&enrollment).cloned()
    }
}

#[async_trait]
impl StudentProvisioner for InMemoryStudentDirectory {
    async fn provision_if_first_payment(
        &self,
        enrollment: &Enrollment,
    ) -> Result<Option<ProvisionedStudent>> {
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&enrollment.reference) {
            return Ok(None);
        }
        let password: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(12)
            .map(char::from)
            .collect();
        let student = ProvisionedStudent {
            enrollment: enrollment.reference,
            username: enrollment.public_token.to_lowercase(),
            password,
        };
        accounts.insert(enrollment.reference, student.clone());
        Ok(Some(student))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::enrollment::{Amount, Balance};
    use crate::domain::payment::{PaymentMethod, PaymentStatus};
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn test_ledger_store_and_retrieve() {
        let ledger = InMemoryLedger::new();
        let enrollment = Enrollment::new(Balance::new(dec!(100)));
        EnrollmentStore::store(&ledger, enrollment.clone()).await.unwrap();

        let by_ref = EnrollmentStore::get(&ledger, enrollment.reference)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_ref, enrollment);

        let by_token = ledger
            .get_by_token(&enrollment.public_token)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(by_token, enrollment);

        assert!(
            EnrollmentStore::get(&ledger, Uuid::new_v4())
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_payments_filtered_per_enrollment() {
        let ledger = InMemoryLedger::new();
        let e1 = Uuid::new_v4();
        let e2 = Uuid::new_v4();
        let mk = |e| {
            Payment::new(
                e,
                Amount::new(dec!(10)).unwrap(),
                PaymentMethod::BankTransfer,
                None,
                "TEST",
            )
        };
        ledger.insert_payment(mk(e1)).await;
        ledger.insert_payment(mk(e1)).await;
        ledger.insert_payment(mk(e2)).await;

        assert_eq!(ledger.for_enrollment(e1).await.unwrap().len(), 2);
        assert_eq!(ledger.for_enrollment(e2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_receipt_lookup() {
        let ledger = InMemoryLedger::new();
        let mut payment = Payment::new(
            Uuid::new_v4(),
            Amount::new(dec!(10)).unwrap(),
            PaymentMethod::Cash,
            Some(Uuid::new_v4()),
            "TEST",
        );
        payment.status = PaymentStatus::Validated;
        let number = ReceiptNumber::derive(payment.id, 0);
        payment.receipt_number = Some(number.clone());
        ledger.insert_payment(payment.clone()).await;

        let found = ledger.get_by_receipt(&number).await.unwrap().unwrap();
        assert_eq!(found.id, payment.id);
        assert!(
            ledger
                .get_by_receipt(&ReceiptNumber::from("ESF-REC-MISSING-00"))
                .await
                .unwrap()
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_session_consume_is_single_shot() {
        let store = InMemorySessionStore::new();
        let session = VerificationSession::open(Uuid::new_v4(), Uuid::new_v4(), Utc::now());
        let id = session.id;
        store.store(session).await.unwrap();

        assert!(store.consume(id).await.unwrap());
        assert!(!store.consume(id).await.unwrap());
        assert!(!store.consume(Uuid::new_v4()).await.unwrap());
    }

    #[tokio::test]
    async fn test_sweep_marks_only_expired_pairs() {
        let store = InMemorySessionStore::new();
        let enrollment = Uuid::new_v4();
        let agent = Uuid::new_v4();
        let now = Utc::now();

        let expired = VerificationSession::open(enrollment, agent, now - chrono::Duration::minutes(10));
        let live = VerificationSession::open(enrollment, agent, now);
        let other_pair = VerificationSession::open(Uuid::new_v4(), agent, now - chrono::Duration::minutes(10));
        store.store(expired.clone()).await.unwrap();
        store.store(live.clone()).await.unwrap();
        store.store(other_pair.clone()).await.unwrap();

        store.sweep_expired(enrollment, agent, now).await.unwrap();

        let open = store.find_open(enrollment, agent).await.unwrap().unwrap();
        assert_eq!(open.id, live.id);
        // Session of another pair untouched by the sweep.
        assert!(
            store
                .find_open(other_pair.enrollment, agent)
                .await
                .unwrap()
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_student_directory_provisions_once() {
        let directory = InMemoryStudentDirectory::new();
        let enrollment = Enrollment::new(Balance::new(dec!(100)));

        let first = directory
            .provision_if_first_payment(&enrollment)
            .await
            .unwrap();
        let student = first.unwrap();
        assert_eq!(student.enrollment, enrollment.reference);
        assert_eq!(student.password.len(), 12);

        let second = directory
            .provision_if_first_payment(&enrollment)
            .await
            .unwrap();
        assert!(second.is_none());
    }
}
