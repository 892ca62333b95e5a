use crate::domain::enrollment::Amount;
use crate::domain::receipt::ReceiptNumber;
use crate::error::LedgerError;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    Cash,
    MobileMoney,
    BankTransfer,
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum PaymentStatus {
    Pending,
    Validated,
    Cancelled,
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PaymentStatus::Pending => "pending",
            PaymentStatus::Validated => "validated",
            PaymentStatus::Cancelled => "cancelled",
        };
        f.write_str(s)
    }
}

/// Events accepted by the payment state machine.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum PaymentEvent {
    Validate,
    Cancel,
}

/// Result of applying an event to a payment status.
///
/// `Unchanged` is the idempotent case: validating an already-validated
/// payment is legal but produces no effects (no second receipt, no ledger
/// recompute, no notifications).
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum Transition {
    Changed(PaymentStatus),
    Unchanged,
}

impl PaymentStatus {
    /// Pure transition function for the payment lifecycle.
    ///
    /// `Pending` may move to `Validated` or `Cancelled`, both terminal. Any
    /// event that would move a `Validated` payment away from `Validated`
    /// fails hard with `ImmutableValidatedPayment`; `Cancelled` accepts
    /// nothing. Transition legality lives here and nowhere else.
    pub fn transition(self, event: PaymentEvent) -> Result<Transition, LedgerError> {
        match (self, event) {
            (PaymentStatus::Pending, PaymentEvent::Validate) => {
                Ok(Transition::Changed(PaymentStatus::Validated))
            }
            (PaymentStatus::Pending, PaymentEvent::Cancel) => {
                Ok(Transition::Changed(PaymentStatus::Cancelled))
            }
            (PaymentStatus::Validated, PaymentEvent::Validate) => Ok(Transition::Unchanged),
            (PaymentStatus::Validated, PaymentEvent::Cancel) => {
                Err(LedgerError::ImmutableValidatedPayment)
            }
            (PaymentStatus::Cancelled, event) => Err(LedgerError::InvalidTransition(format!(
                "cancelled payment cannot accept {event:?}"
            ))),
        }
    }

    pub fn is_terminal(self) -> bool {
        self != PaymentStatus::Pending
    }
}

/// A single payment attempt against an enrollment.
///
/// `receipt_number` and `receipt_pdf` are assigned exactly once, during the
/// validating transition, and are immutable afterwards.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Payment {
    pub id: Uuid,
    pub enrollment: Uuid,
    /// Agent who handled the payment; cash only, non-owning.
    pub agent: Option<Uuid>,
    pub amount: Amount,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Free-text origin marker, e.g. "INITIATED_BY_STUDENT".
    pub reference: String,
    pub receipt_number: Option<ReceiptNumber>,
    pub receipt_pdf: Option<Vec<u8>>,
    pub paid_at: chrono::DateTime<chrono::Utc>,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Payment {
    pub fn new(
        enrollment: Uuid,
        amount: Amount,
        method: PaymentMethod,
        agent: Option<Uuid>,
        reference: &str,
    ) -> Self {
        let now = chrono::Utc::now();
        Self {
            id: Uuid::new_v4(),
            enrollment,
            agent,
            amount,
            method,
            status: PaymentStatus::Pending,
            reference: reference.to_string(),
            receipt_number: None,
            receipt_pdf: None,
            paid_at: now,
            created_at: now,
        }
    }
}
