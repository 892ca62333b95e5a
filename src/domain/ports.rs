use crate::domain::agent::PaymentAgent;
use crate::domain::enrollment::Enrollment;
use crate::domain::payment::Payment;
use crate::domain::receipt::ReceiptNumber;
use crate::domain::session::VerificationSession;
use crate::error::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub type EnrollmentStoreBox = Box<dyn EnrollmentStore>;
pub type PaymentStoreBox = Box<dyn PaymentStore>;
pub type LedgerStoreBox = Box<dyn LedgerStore>;
pub type AgentStoreBox = Box<dyn AgentStore>;
pub type SessionStoreBox = Box<dyn SessionStore>;
pub type ReceiptRendererBox = Box<dyn ReceiptRenderer>;
pub type StudentProvisionerBox = Box<dyn StudentProvisioner>;
pub type NotifierBox = Box<dyn Notifier>;

#[async_trait]
pub trait EnrollmentStore: Send + Sync {
    async fn store(&self, enrollment: Enrollment) -> Result<()>;
    async fn get(&self, reference: Uuid) -> Result<Option<Enrollment>>;
    async fn get_by_token(&self, token: &str) -> Result<Option<Enrollment>>;
    async fn get_all(&self) -> Result<Vec<Enrollment>>;
}

#[async_trait]
pub trait PaymentStore: Send + Sync {
    async fn store(&self, payment: Payment) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<Payment>>;
    async fn get_by_receipt(&self, receipt: &ReceiptNumber) -> Result<Option<Payment>>;
    async fn for_enrollment(&self, enrollment: Uuid) -> Result<Vec<Payment>>;
}

/// Atomic boundary of the validating transition.
#[async_trait]
pub trait LedgerStore: Send + Sync {
    /// Persists the validated payment and the recomputed enrollment as one
    /// write. Either both land or neither does.
    async fn commit_validation(&self, payment: Payment, enrollment: Enrollment) -> Result<()>;
}

#[async_trait]
pub trait AgentStore: Send + Sync {
    async fn store(&self, agent: PaymentAgent) -> Result<()>;
    async fn get(&self, id: Uuid) -> Result<Option<PaymentAgent>>;
    /// Active agents in stable `agent_code` order; ambiguous name matches
    /// collapse to the first of this ordering.
    async fn all_active(&self) -> Result<Vec<PaymentAgent>>;
}

#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn store(&self, session: VerificationSession) -> Result<()>;
    /// Marks expired-but-unused sessions of the pair as used.
    async fn sweep_expired(&self, enrollment: Uuid, agent: Uuid, now: DateTime<Utc>)
    -> Result<()>;
    /// Newest unused session for the pair, expired or not; expiry is the
    /// caller's concern.
    async fn find_open(&self, enrollment: Uuid, agent: Uuid)
    -> Result<Option<VerificationSession>>;
    /// Compare-and-set flip of unused to used. Returns whether this call won
    /// the flip; of two concurrent consumers exactly one sees `true`.
    async fn consume(&self, id: Uuid) -> Result<bool>;
}

/// Renders the receipt document fully in memory.
///
/// The QR payload is the enrollment's public URL; the renderer encodes it
/// itself. A failure is recoverable and never leaves a partial artifact.
pub trait ReceiptRenderer: Send + Sync {
    fn render(&self, payment: &Payment, enrollment: &Enrollment, public_url: &str)
    -> Result<Vec<u8>>;
}

/// Account created for a student on their first validated payment.
#[derive(Debug, Clone, PartialEq)]
pub struct ProvisionedStudent {
    pub enrollment: Uuid,
    pub username: String,
    pub password: String,
}

/// Student account collaborator, called post-commit only.
#[async_trait]
pub trait StudentProvisioner: Send + Sync {
    /// Provisions an account if this enrollment has none yet; `None` when an
    /// account already exists. At most one account per enrollment.
    async fn provision_if_first_payment(
        &self,
        enrollment: &Enrollment,
    ) -> Result<Option<ProvisionedStudent>>;
}

/// Outbound notification collaborator. Best effort: the engine logs failures
/// and never lets them roll back a committed transaction.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send_credentials(&self, student: &ProvisionedStudent) -> Result<()>;
    async fn send_payment_confirmation(&self, payment: &Payment) -> Result<()>;
}
