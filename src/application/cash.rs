use crate::domain::agent::PaymentAgent;
use crate::domain::ports::{AgentStoreBox, SessionStoreBox};
use crate::domain::session::VerificationSession;
use crate::error::{LedgerError, Result};
use chrono::{DateTime, Utc};
use uuid::Uuid;

/// Identity gate for manual cash payments.
///
/// Resolves an agent from a free-text name, opens a short-lived verification
/// session binding the agent to an enrollment, and validates the code the
/// agent hands over. Consulted before a cash payment record is created; no
/// other payment method goes through here.
pub struct CashVerification {
    agents: AgentStoreBox,
    sessions: SessionStoreBox,
}

impl CashVerification {
    pub fn new(agents: AgentStoreBox, sessions: SessionStoreBox) -> Self {
        Self { agents, sessions }
    }

    /// Matches an active agent from a free-text name.
    ///
    /// The name is whitespace-tokenized; an agent matches when every token is
    /// a case-insensitive substring of their first or last name. Multiple
    /// matches collapse to the first in `agent_code` order. That looseness is
    /// accepted; an exact agent-code input would be stronger.
    pub async fn resolve_agent(&self, name: &str) -> Result<PaymentAgent> {
        let name = name.trim();
        if name.is_empty() {
            return Err(LedgerError::AgentNameRequired);
        }
        if name.len() < 2 {
            return Err(LedgerError::AgentNameInvalid);
        }

        let tokens: Vec<String> = name.split_whitespace().map(|t| t.to_lowercase()).collect();
        let agents = self.agents.all_active().await?;
        agents
            .into_iter()
            .find(|agent| agent.matches_tokens(&tokens))
            .ok_or(LedgerError::AgentNotFound)
    }

    /// Opens (or reuses) the verification session for an (enrollment, agent)
    /// pair.
    ///
    /// Expired unused sessions of the pair are swept to used first. An open
    /// unexpired session is reused; otherwise a fresh one is created with a
    /// new random code and a five-minute window. The code is never returned
    /// here; it reaches the agent out-of-band.
    pub async fn open_session(
        &self,
        enrollment: Uuid,
        agent: &PaymentAgent,
        now: DateTime<Utc>,
    ) -> Result<()> {
        self.sessions.sweep_expired(enrollment, agent.id, now).await?;

        let open = self.sessions.find_open(enrollment, agent.id).await?;
        if open.is_some_and(|s| !s.is_expired(now)) {
            return Ok(());
        }

        let session = VerificationSession::open(enrollment, agent.id, now);
        self.sessions.store(session).await?;
        Ok(())
    }

    /// Validates the code an agent supplied for a pair.
    ///
    /// An expired session is consumed and reported as `CodeExpired`. A wrong
    /// code under a live session is reported as `InvalidCode` and the session
    /// stays usable: retries are allowed until expiry or a correct entry. On
    /// a match the session is consumed through a compare-and-set, so of two
    /// concurrent attempts exactly one succeeds.
    pub async fn validate_code(
        &self,
        enrollment: Uuid,
        agent: &PaymentAgent,
        code: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        if code.trim().is_empty() {
            return Err(LedgerError::CodeRequired);
        }

        let session = self
            .sessions
            .find_open(enrollment, agent.id)
            .await?
            .ok_or(LedgerError::NoActiveSession)?;

        if session.is_expired(now) {
            self.sessions.consume(session.id).await?;
            return Err(LedgerError::CodeExpired);
        }

        if session.code != code {
            return Err(LedgerError::InvalidCode);
        }

        if self.sessions.consume(session.id).await? {
            Ok(())
        } else {
            // Lost the flip to a concurrent attempt.
            Err(LedgerError::NoActiveSession)
        }
    }
}
