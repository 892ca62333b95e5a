use rand::Rng;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Staff member authorized to handle cash payments.
///
/// Inactive agents cannot be matched or open verification sessions. Agents
/// are never deleted while referenced by a payment.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct PaymentAgent {
    pub id: Uuid,
    /// Short unique code, 6 uppercase hex chars.
    pub agent_code: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
    pub created_at: chrono::DateTime<chrono::Utc>,
}

impl PaymentAgent {
    pub fn new(first_name: &str, last_name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            agent_code: Self::generate_code(),
            first_name: first_name.to_string(),
            last_name: last_name.to_string(),
            is_active: true,
            created_at: chrono::Utc::now(),
        }
    }

    fn generate_code() -> String {
        let bytes: [u8; 3] = rand::thread_rng().r#gen();
        bytes.iter().map(|b| format!("{b:02X}")).collect()
    }

    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
    }

    /// Conjunctive token match: every token must appear, case-insensitively,
    /// in the first name or the last name.
    pub fn matches_tokens(&self, tokens: &[String]) -> bool {
        let first = self.first_name.to_lowercase();
        let last = self.last_name.to_lowercase();
        tokens
            .iter()
            .all(|t| first.contains(t.as_str()) || last.contains(t.as_str()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tokens(s: &str) -> Vec<String> {
        s.split_whitespace().map(|t| t.to_lowercase()).collect()
    }

    #[test]
    fn test_agent_code_format() {
        let agent = PaymentAgent::new("Awa", "Diallo");
        assert_eq!(agent.agent_code.len(), 6);
        assert!(agent.agent_code.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(agent.agent_code, agent.agent_code.to_uppercase());
        assert!(agent.is_active);
    }

    #[test]
    fn test_matches_all_tokens_conjunctively() {
        let agent = PaymentAgent::new("Awa", "Diallo");
        assert!(agent.matches_tokens(&tokens("awa diallo")));
        assert!(agent.matches_tokens(&tokens("DIA")));
        assert!(agent.matches_tokens(&tokens("awa")));
        assert!(!agent.matches_tokens(&tokens("awa traore")));
    }

    #[test]
    fn test_token_may_match_either_name_part() {
        let agent = PaymentAgent::new("Moussa", "Kone");
        assert!(agent.matches_tokens(&tokens("kone moussa")));
        assert!(agent.matches_tokens(&tokens("ous one")));
    }
}
