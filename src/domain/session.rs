use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Validity window of a verification session.
pub const SESSION_TTL_MINUTES: i64 = 5;

/// Short-lived single-use code binding a payment agent to an enrollment,
/// used to confirm an agent's identity before a cash payment is recorded.
///
/// At most one unused, unexpired session may exist per (enrollment, agent)
/// pair. That invariant is upheld by the sweep-then-lookup discipline in the
/// cash verification service, not by a store constraint, so session creation
/// for one pair must be serialized by the caller.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct VerificationSession {
    pub id: Uuid,
    pub enrollment: Uuid,
    pub agent: Uuid,
    /// 6-digit numeric code, delivered to the agent out-of-band.
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub is_used: bool,
    pub created_at: DateTime<Utc>,
}

impl VerificationSession {
    pub fn open(enrollment: Uuid, agent: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4(),
            enrollment,
            agent,
            code: generate_code(),
            expires_at: now + Duration::minutes(SESSION_TTL_MINUTES),
            is_used: false,
            created_at: now,
        }
    }

    /// Expired at or after `expires_at`: a code is good for strictly less
    /// than five minutes.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// True when the session can still validate the supplied code.
    pub fn is_valid(&self, code: &str, now: DateTime<Utc>) -> bool {
        !self.is_used && self.code == code && !self.is_expired(now)
    }
}

fn generate_code() -> String {
    rand::thread_rng().gen_range(100_000..=999_999).to_string()
}
