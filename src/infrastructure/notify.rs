use crate::domain::payment::Payment;
use crate::domain::ports::{Notifier, ProvisionedStudent};
use crate::error::Result;
use async_trait::async_trait;

/// Notification collaborator that emits structured log events instead of
/// actual mail. Delivery is a concern external to the ledger; the engine only
/// requires that sends are attempted post-commit and that failures surface as
/// errors it can log and swallow.
#[derive(Default, Clone)]
pub struct LogNotifier;

impl LogNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Notifier for LogNotifier {
    async fn send_credentials(&self, student: &ProvisionedStudent) -> Result<()> {
        // The generated password never reaches the logs.
        tracing::info!(
            enrollment = %student.enrollment,
            username = %student.username,
            "student account credentials issued"
        );
        Ok(())
    }

    async fn send_payment_confirmation(&self, payment: &Payment) -> Result<()> {
        tracing::info!(
            payment = %payment.id,
            enrollment = %payment.enrollment,
            amount = %payment.amount.value(),
            "payment confirmation sent"
        );
        Ok(())
    }
}
