use crate::domain::enrollment::{Amount, Balance, Enrollment, EnrollmentStatus};
use crate::domain::payment::{Payment, PaymentEvent, PaymentMethod, PaymentStatus, Transition};
use crate::domain::ports::{
    EnrollmentStoreBox, LedgerStoreBox, NotifierBox, PaymentStoreBox, ReceiptRendererBox,
    StudentProvisionerBox,
};
use crate::domain::receipt::ReceiptNumber;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

/// Storage and collaborator ports the engine runs against.
pub struct EngineParts {
    pub enrollments: EnrollmentStoreBox,
    pub payments: PaymentStoreBox,
    pub ledger: LedgerStoreBox,
    pub renderer: ReceiptRendererBox,
    pub provisioner: StudentProvisionerBox,
    pub notifier: NotifierBox,
}

/// Outcome of a validation request.
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum ValidationOutcome {
    /// The payment moved to validated; carries the issued receipt number.
    Validated(ReceiptNumber),
    /// The payment was already validated; nothing happened.
    AlreadyValidated,
}

/// Side effect deferred until the validating transaction has committed.
///
/// The transition stages its writes, commits them, and only then walks the
/// returned actions. A rolled-back transaction therefore never leaks a
/// notification or a provisioned account.
enum PostCommitAction {
    ProvisionOrConfirm {
        payment: Payment,
        enrollment: Enrollment,
    },
}

/// Row-lock equivalent for the backing store: all multi-step mutations
/// against one enrollment serialize on its mutex.
#[derive(Default)]
struct EnrollmentLocks {
    map: std::sync::Mutex<HashMap<Uuid, Arc<tokio::sync::Mutex<()>>>>,
}

impl EnrollmentLocks {
    async fn acquire(&self, reference: Uuid) -> tokio::sync::OwnedMutexGuard<()> {
        let lock = {
            let mut map = self.map.lock().unwrap_or_else(|e| e.into_inner());
            map.entry(reference).or_default().clone()
        };
        lock.lock_owned().await
    }
}

/// The financial reconciliation pipeline.
///
/// Turns a submitted payment into a validated, immutable record: state
/// machine transition, ledger recompute, receipt issuance inside one atomic
/// commit, then the post-commit provisioning/notification actions.
pub struct ReconciliationEngine {
    enrollments: EnrollmentStoreBox,
    payments: PaymentStoreBox,
    ledger: LedgerStoreBox,
    renderer: ReceiptRendererBox,
    provisioner: StudentProvisionerBox,
    notifier: NotifierBox,
    public_base_url: String,
    locks: EnrollmentLocks,
}

impl ReconciliationEngine {
    pub fn new(parts: EngineParts, public_base_url: impl Into<String>) -> Self {
        Self {
            enrollments: parts.enrollments,
            payments: parts.payments,
            ledger: parts.ledger,
            renderer: parts.renderer,
            provisioner: parts.provisioner,
            notifier: parts.notifier,
            public_base_url: public_base_url.into(),
            locks: EnrollmentLocks::default(),
        }
    }

    /// Opens an enrollment with its fee fixed for good.
    ///
    /// The fee comes from the admissions collaborator; no fee computation
    /// happens here.
    pub async fn register_enrollment(&self, amount_due: Balance) -> Result<Enrollment> {
        if amount_due.0 < Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(
                "amount due cannot be negative".to_string(),
            ));
        }
        let enrollment = Enrollment::new(amount_due);
        self.enrollments.store(enrollment.clone()).await?;
        Ok(enrollment)
    }

    /// Creates a pending payment against an enrollment.
    ///
    /// Rejected when the enrollment is suspended, already fully paid, already
    /// has a pending payment, or the amount exceeds the remaining balance.
    /// Cash requires a previously resolved agent, attached at creation.
    pub async fn initiate_payment(
        &self,
        enrollment_ref: Uuid,
        amount: Amount,
        method: PaymentMethod,
        agent: Option<Uuid>,
        reference: &str,
    ) -> Result<Payment> {
        let _guard = self.locks.acquire(enrollment_ref).await;

        let enrollment = self
            .enrollments
            .get(enrollment_ref)
            .await?
            .ok_or(LedgerError::EnrollmentNotFound)?;

        if enrollment.status == EnrollmentStatus::Suspended {
            return Err(LedgerError::EnrollmentSuspended);
        }

        let existing = self.payments.for_enrollment(enrollment_ref).await?;
        if existing.iter().any(|p| p.status == PaymentStatus::Pending) {
            return Err(LedgerError::PendingPaymentExists);
        }

        let balance = enrollment.balance();
        if balance == Balance::ZERO {
            return Err(LedgerError::NothingLeftToPay);
        }
        if amount.value() > balance.0 {
            return Err(LedgerError::AmountExceedsBalance {
                requested: amount.value(),
                balance: balance.0,
            });
        }

        let agent = match method {
            PaymentMethod::Cash => Some(agent.ok_or(LedgerError::AgentRequired)?),
            _ => None,
        };

        let payment = Payment::new(enrollment_ref, amount, method, agent, reference);
        self.payments.store(payment.clone()).await?;
        Ok(payment)
    }

    /// Runs the validating transition for a payment.
    ///
    /// Under the enrollment lock: applies the state machine, recomputes the
    /// ledger, issues the receipt if none exists, commits everything as one
    /// write, then executes the deferred post-commit actions. Re-validating
    /// an already-validated payment is a no-op.
    pub async fn validate_payment(&self, payment_id: Uuid) -> Result<ValidationOutcome> {
        let probe = self
            .payments
            .get(payment_id)
            .await?
            .ok_or(LedgerError::PaymentNotFound)?;
        let _guard = self.locks.acquire(probe.enrollment).await;

        // Re-read under the lock; the probe may be stale.
        let mut payment = self
            .payments
            .get(payment_id)
            .await?
            .ok_or(LedgerError::PaymentNotFound)?;

        match payment.status.transition(PaymentEvent::Validate)? {
            Transition::Unchanged => return Ok(ValidationOutcome::AlreadyValidated),
            Transition::Changed(next) => payment.status = next,
        }

        let mut enrollment = self
            .enrollments
            .get(payment.enrollment)
            .await?
            .ok_or(LedgerError::EnrollmentNotFound)?;

        let mut siblings = self.payments.for_enrollment(payment.enrollment).await?;
        if let Some(stored) = siblings.iter_mut().find(|p| p.id == payment.id) {
            *stored = payment.clone();
        }
        enrollment.recompute(&siblings);

        if payment.receipt_number.is_none() {
            let number = self.allocate_receipt_number(payment.id).await?;
            let url = enrollment.public_url(&self.public_base_url);
            let pdf = self.renderer.render(&payment, &enrollment, &url)?;
            payment.receipt_number = Some(number);
            payment.receipt_pdf = Some(pdf);
        }
        let receipt = payment
            .receipt_number
            .clone()
            .ok_or_else(|| LedgerError::Internal("receipt missing after allocation".into()))?;

        let actions = vec![PostCommitAction::ProvisionOrConfirm {
            payment: payment.clone(),
            enrollment: enrollment.clone(),
        }];

        self.ledger.commit_validation(payment, enrollment).await?;
        self.run_post_commit(actions).await;

        Ok(ValidationOutcome::Validated(receipt))
    }

    /// Cancels a pending payment. No recompute, no receipt, no post-commit
    /// actions; a validated payment cannot be cancelled.
    pub async fn cancel_payment(&self, payment_id: Uuid) -> Result<()> {
        let probe = self
            .payments
            .get(payment_id)
            .await?
            .ok_or(LedgerError::PaymentNotFound)?;
        let _guard = self.locks.acquire(probe.enrollment).await;

        let mut payment = self
            .payments
            .get(payment_id)
            .await?
            .ok_or(LedgerError::PaymentNotFound)?;

        match payment.status.transition(PaymentEvent::Cancel)? {
            Transition::Changed(next) => payment.status = next,
            Transition::Unchanged => return Ok(()),
        }
        self.payments.store(payment).await?;
        Ok(())
    }

    /// Allocates a receipt number unique across all payments, retrying with a
    /// fresh salt on the improbable collision.
    async fn allocate_receipt_number(&self, payment_id: Uuid) -> Result<ReceiptNumber> {
        for attempt in 0..16 {
            let candidate = ReceiptNumber::derive(payment_id, attempt);
            if self.payments.get_by_receipt(&candidate).await?.is_none() {
                return Ok(candidate);
            }
            tracing::warn!(payment = %payment_id, attempt, "receipt number collision, retrying");
        }
        Err(LedgerError::Internal(
            "could not allocate a unique receipt number".into(),
        ))
    }

    async fn run_post_commit(&self, actions: Vec<PostCommitAction>) {
        for action in actions {
            match action {
                PostCommitAction::ProvisionOrConfirm {
                    payment,
                    enrollment,
                } => {
                    match self.provisioner.provision_if_first_payment(&enrollment).await {
                        Ok(Some(student)) => {
                            if let Err(e) = self.notifier.send_credentials(&student).await {
                                tracing::warn!(
                                    enrollment = %enrollment.reference,
                                    error = %e,
                                    "credential notification failed"
                                );
                            }
                        }
                        Ok(None) => {
                            if let Err(e) = self.notifier.send_payment_confirmation(&payment).await
                            {
                                tracing::warn!(
                                    payment = %payment.id,
                                    error = %e,
                                    "payment confirmation failed"
                                );
                            }
                        }
                        Err(e) => {
                            tracing::warn!(
                                enrollment = %enrollment.reference,
                                error = %e,
                                "student provisioning failed"
                            );
                        }
                    }
                }
            }
        }
    }

    pub async fn enrollment(&self, reference: Uuid) -> Result<Option<Enrollment>> {
        self.enrollments.get(reference).await
    }

    pub async fn enrollment_by_token(&self, token: &str) -> Result<Option<Enrollment>> {
        self.enrollments.get_by_token(token).await
    }

    pub async fn payments_for(&self, enrollment_ref: Uuid) -> Result<Vec<Payment>> {
        self.payments.for_enrollment(enrollment_ref).await
    }

    /// The single pending payment of an enrollment, if any.
    pub async fn pending_payment(&self, enrollment_ref: Uuid) -> Result<Option<Payment>> {
        let payments = self.payments.for_enrollment(enrollment_ref).await?;
        Ok(payments
            .into_iter()
            .find(|p| p.status == PaymentStatus::Pending))
    }

    /// Public receipt retrieval: a receipt resolves only while its payment is
    /// validated. Everything else is not found.
    pub async fn receipt(&self, number: &ReceiptNumber) -> Result<(Payment, Enrollment)> {
        let payment = self
            .payments
            .get_by_receipt(number)
            .await?
            .filter(|p| p.status == PaymentStatus::Validated)
            .ok_or(LedgerError::ReceiptNotFound)?;
        let enrollment = self
            .enrollments
            .get(payment.enrollment)
            .await?
            .ok_or(LedgerError::ReceiptNotFound)?;
        Ok((payment, enrollment))
    }

    /// Consumes the engine and returns the final state of all enrollments.
    pub async fn into_results(self) -> Result<Vec<Enrollment>> {
        self.enrollments.get_all().await
    }
}
