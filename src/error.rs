use thiserror::Error;

pub type Result<T> = std::result::Result<T, LedgerError>;

/// Errors raised by the reconciliation core.
///
/// Validation variants are recovered at the call boundary and surfaced to the
/// initiating caller as a rejected request. `ImmutableValidatedPayment` and
/// `InvalidTransition` are invariant violations: the operation aborts and
/// nothing is persisted.
#[derive(Error, Debug)]
pub enum LedgerError {
    #[error("agent name is required")]
    AgentNameRequired,
    #[error("agent name is invalid")]
    AgentNameInvalid,
    #[error("agent not found")]
    AgentNotFound,
    #[error("cash payments require a verified agent")]
    AgentRequired,
    #[error("verification code is required")]
    CodeRequired,
    #[error("no active verification session")]
    NoActiveSession,
    #[error("verification code expired")]
    CodeExpired,
    #[error("verification code invalid")]
    InvalidCode,
    #[error("a payment is already pending for this enrollment")]
    PendingPaymentExists,
    #[error("enrollment is fully paid, nothing left to pay")]
    NothingLeftToPay,
    #[error("amount {requested} exceeds the remaining balance {balance}")]
    AmountExceedsBalance {
        requested: rust_decimal::Decimal,
        balance: rust_decimal::Decimal,
    },
    #[error("enrollment is suspended")]
    EnrollmentSuspended,
    #[error("invalid amount: {0}")]
    InvalidAmount(String),

    #[error("a validated payment cannot be modified")]
    ImmutableValidatedPayment,
    #[error("invalid payment transition: {0}")]
    InvalidTransition(String),

    #[error("enrollment not found")]
    EnrollmentNotFound,
    #[error("payment not found")]
    PaymentNotFound,
    #[error("receipt not found")]
    ReceiptNotFound,

    #[error("receipt rendering failed: {0}")]
    ReceiptRender(String),
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("internal error: {0}")]
    Internal(Box<dyn std::error::Error + Send + Sync>),
}
