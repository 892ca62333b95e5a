use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Globally unique receipt identifier, assigned exactly once when a payment
/// is validated.
///
/// Derived from the payment's own UUID plus a mod-97 checksum rather than
/// wall-clock time, so concurrent allocations cannot collide. The `attempt`
/// salt exists for the (theoretical) case where the store already holds the
/// candidate; the allocator retries with the next salt.
#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone, Hash)]
pub struct ReceiptNumber(String);

impl ReceiptNumber {
    pub fn derive(payment_id: Uuid, attempt: u32) -> Self {
        let bytes = payment_id.as_bytes();
        let body: String = bytes[..6].iter().map(|b| format!("{b:02X}")).collect();
        let sum: u32 = bytes
            .iter()
            .map(|&b| b as u32)
            .chain(std::iter::once(attempt))
            .sum();
        let checksum = sum % 97;
        if attempt == 0 {
            Self(format!("ESF-REC-{body}-{checksum:02}"))
        } else {
            Self(format!("ESF-REC-{body}{attempt}-{checksum:02}"))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for ReceiptNumber {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ReceiptNumber {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}
