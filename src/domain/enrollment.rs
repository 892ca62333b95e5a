use crate::domain::payment::{Payment, PaymentStatus};
use crate::error::LedgerError;
use rand::Rng;
use rand::distributions::Alphanumeric;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::ops::{Add, AddAssign, Sub, SubAssign};
use uuid::Uuid;

/// A monetary total in whole currency units (FCFA carries no minor unit).
///
/// Wrapper around `rust_decimal::Decimal` so ledger arithmetic stays
/// type-safe and cannot be mixed with raw numbers.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Default, Serialize, Deserialize)]
pub struct Balance(pub Decimal);

/// A positive, whole-unit amount attached to a single payment attempt.
#[derive(Debug, Clone, Copy, PartialEq, PartialOrd, Serialize, Deserialize)]
pub struct Amount(Decimal);

impl Amount {
    pub fn new(value: Decimal) -> Result<Self, LedgerError> {
        if value <= Decimal::ZERO {
            return Err(LedgerError::InvalidAmount(
                "amount must be positive".to_string(),
            ));
        }
        if !value.is_integer() {
            return Err(LedgerError::InvalidAmount(
                "amount must be a whole number of currency units".to_string(),
            ));
        }
        Ok(Self(value))
    }

    pub fn value(&self) -> Decimal {
        self.0
    }
}

impl TryFrom<Decimal> for Amount {
    type Error = LedgerError;

    fn try_from(value: Decimal) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<Amount> for Decimal {
    fn from(amount: Amount) -> Self {
        amount.0
    }
}

impl From<Amount> for Balance {
    fn from(amount: Amount) -> Self {
        Self(amount.0)
    }
}

impl Balance {
    pub const ZERO: Self = Self(Decimal::ZERO);

    pub fn new(amount: Decimal) -> Self {
        Self(amount)
    }
}

impl Add for Balance {
    type Output = Self;
    fn add(self, rhs: Self) -> Self::Output {
        Self(self.0 + rhs.0)
    }
}

impl Sub for Balance {
    type Output = Self;
    fn sub(self, rhs: Self) -> Self::Output {
        Self(self.0 - rhs.0)
    }
}

impl AddAssign for Balance {
    fn add_assign(&mut self, rhs: Self) {
        self.0 += rhs.0;
    }
}

impl SubAssign for Balance {
    fn sub_assign(&mut self, rhs: Self) {
        self.0 -= rhs.0;
    }
}

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum EnrollmentStatus {
    Created,
    Active,
    Suspended,
}

impl std::fmt::Display for EnrollmentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            EnrollmentStatus::Created => "created",
            EnrollmentStatus::Active => "active",
            EnrollmentStatus::Suspended => "suspended",
        };
        f.write_str(s)
    }
}

/// The financial record opened when an application is accepted.
///
/// `amount_due` is fixed at creation. `amount_paid` is derived: it is
/// recomputed only by [`Enrollment::recompute`], which the engine calls as
/// part of a payment's validating transition. No other code path may write
/// either field.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Enrollment {
    /// Globally unique opaque reference.
    pub reference: Uuid,
    /// Unguessable token used in public URLs.
    pub public_token: String,
    /// Private access code for the enrollment file.
    pub access_code: String,
    pub status: EnrollmentStatus,
    /// Total owed, fixed at creation.
    pub amount_due: Balance,
    /// Sum of validated payments, maintained by `recompute`.
    pub amount_paid: Balance,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl Enrollment {
    pub fn new(amount_due: Balance) -> Self {
        Self {
            reference: Uuid::new_v4(),
            public_token: Self::generate_public_token(),
            access_code: Self::generate_access_code(),
            status: EnrollmentStatus::Created,
            amount_due,
            amount_paid: Balance::ZERO,
            created_at: chrono::Utc::now(),
        }
    }

    fn generate_public_token() -> String {
        let suffix: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(16)
            .map(char::from)
            .collect();
        format!("ESF-INS-{suffix}")
    }

    fn generate_access_code() -> String {
        let bytes: [u8; 8] = rand::thread_rng().r#gen();
        bytes.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Public URL for this enrollment, derived from its token.
    pub fn public_url(&self, base: &str) -> String {
        format!("{}/inscriptions/public/{}", base.trim_end_matches('/'), self.public_token)
    }

    /// Remaining balance, never negative.
    pub fn balance(&self) -> Balance {
        if self.amount_due > self.amount_paid {
            self.amount_due - self.amount_paid
        } else {
            Balance::ZERO
        }
    }

    pub fn is_paid(&self) -> bool {
        self.amount_paid >= self.amount_due
    }

    /// Recalculates `amount_paid` from the validated payments of this
    /// enrollment and refreshes the derived status.
    ///
    /// Must be invoked only from the validating transition of a payment.
    /// Negative sums are clamped to zero; they are unreachable under correct
    /// accounting but the guard is kept. A `Suspended` enrollment keeps its
    /// status: suspension is an administrative override outside this
    /// computation.
    pub fn recompute(&mut self, payments: &[Payment]) {
        let total: Decimal = payments
            .iter()
            .filter(|p| p.enrollment == self.reference && p.status == PaymentStatus::Validated)
            .map(|p| p.amount.value())
            .sum();

        let total = total.max(Decimal::ZERO);
        self.amount_paid = Balance::new(total);

        if self.status != EnrollmentStatus::Suspended {
            self.status = if self.is_paid() {
                EnrollmentStatus::Active
            } else {
                EnrollmentStatus::Created
            };
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::payment::{Payment, PaymentMethod};
    use rust_decimal_macros::dec;

    fn validated(enrollment: &Enrollment, amount: Decimal) -> Payment {
        let mut p = Payment::new(
            enrollment.reference,
            Amount::new(amount).unwrap(),
            PaymentMethod::BankTransfer,
            None,
            "TEST",
        );
        p.status = PaymentStatus::Validated;
        p
    }

    #[test]
    fn test_amount_validation() {
        assert!(Amount::new(dec!(200000)).is_ok());
        assert!(matches!(
            Amount::new(dec!(0)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(dec!(-5)),
            Err(LedgerError::InvalidAmount(_))
        ));
        assert!(matches!(
            Amount::new(dec!(10.5)),
            Err(LedgerError::InvalidAmount(_))
        ));
    }

    #[test]
    fn test_balance_arithmetic() {
        let b1 = Balance::new(dec!(10));
        let b2 = Balance::new(dec!(5));
        assert_eq!(b1 + b2, Balance::new(dec!(15)));
        assert_eq!(b1 - b2, Balance::new(dec!(5)));
    }

    #[test]
    fn test_identity_fields_generated() {
        let e = Enrollment::new(Balance::new(dec!(500000)));
        assert!(e.public_token.starts_with("ESF-INS-"));
        assert_eq!(e.public_token.len(), "ESF-INS-".len() + 16);
        assert_eq!(e.access_code.len(), 16);
        assert_eq!(e.status, EnrollmentStatus::Created);
    }

    #[test]
    fn test_public_url_from_token() {
        let e = Enrollment::new(Balance::new(dec!(100)));
        let url = e.public_url("https://esfe.example/");
        assert_eq!(
            url,
            format!("https://esfe.example/inscriptions/public/{}", e.public_token)
        );
    }

    #[test]
    fn test_recompute_sums_only_validated() {
        let mut e = Enrollment::new(Balance::new(dec!(500000)));
        let v = validated(&e, dec!(200000));
        let mut pending = validated(&e, dec!(999999));
        pending.status = PaymentStatus::Pending;

        e.recompute(&[v, pending]);
        assert_eq!(e.amount_paid, Balance::new(dec!(200000)));
        assert_eq!(e.status, EnrollmentStatus::Created);
        assert_eq!(e.balance(), Balance::new(dec!(300000)));
    }

    #[test]
    fn test_recompute_activates_when_paid() {
        let mut e = Enrollment::new(Balance::new(dec!(500000)));
        let p1 = validated(&e, dec!(200000));
        let p2 = validated(&e, dec!(300000));

        e.recompute(&[p1, p2]);
        assert_eq!(e.amount_paid, Balance::new(dec!(500000)));
        assert_eq!(e.status, EnrollmentStatus::Active);
        assert_eq!(e.balance(), Balance::ZERO);
        assert!(e.is_paid());
    }

    #[test]
    fn test_recompute_ignores_other_enrollments() {
        let mut e = Enrollment::new(Balance::new(dec!(500000)));
        let other = Enrollment::new(Balance::new(dec!(500000)));
        let theirs = validated(&other, dec!(500000));

        e.recompute(&[theirs]);
        assert_eq!(e.amount_paid, Balance::ZERO);
    }

    #[test]
    fn test_recompute_preserves_suspension() {
        let mut e = Enrollment::new(Balance::new(dec!(100)));
        e.status = EnrollmentStatus::Suspended;
        let p = validated(&e, dec!(100));

        e.recompute(&[p]);
        assert_eq!(e.amount_paid, Balance::new(dec!(100)));
        assert_eq!(e.status, EnrollmentStatus::Suspended);
    }

    #[test]
    fn test_empty_payment_set_recomputes_to_zero() {
        let mut e = Enrollment::new(Balance::new(dec!(100)));
        e.amount_paid = Balance::new(dec!(50));
        e.recompute(&[]);
        assert_eq!(e.amount_paid, Balance::ZERO);
    }
}
