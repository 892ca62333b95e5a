use chrono::{Duration, Utc};
use esfe_ledger::application::cash::CashVerification;
use esfe_ledger::domain::agent::PaymentAgent;
use esfe_ledger::domain::ports::{AgentStore, SessionStore};
use esfe_ledger::error::LedgerError;
use esfe_ledger::infrastructure::in_memory::{InMemoryAgentStore, InMemorySessionStore};
use uuid::Uuid;

async fn setup() -> (CashVerification, InMemorySessionStore, PaymentAgent) {
    let agents = InMemoryAgentStore::new();
    let agent = PaymentAgent::new("Awa", "Diallo");
    agents.store(agent.clone()).await.unwrap();
    let sessions = InMemorySessionStore::new();
    let service = CashVerification::new(Box::new(agents), Box::new(sessions.clone()));
    (service, sessions, agent)
}

#[tokio::test]
async fn test_wrong_code_then_correct_code_then_exhausted() {
    // Open at T0; wrong code at T0+1min leaves the session usable; correct
    // code at T0+2min consumes it; a later retry finds no session.
    let (service, sessions, agent) = setup().await;
    let enrollment = Uuid::new_v4();
    let t0 = Utc::now();

    service.open_session(enrollment, &agent, t0).await.unwrap();
    let code = sessions
        .find_open(enrollment, agent.id)
        .await
        .unwrap()
        .unwrap()
        .code;

    let wrong = service
        .validate_code(enrollment, &agent, "000000", t0 + Duration::minutes(1))
        .await;
    assert!(matches!(wrong, Err(LedgerError::InvalidCode)));

    service
        .validate_code(enrollment, &agent, &code, t0 + Duration::minutes(2))
        .await
        .expect("correct code within the window must validate");

    let exhausted = service
        .validate_code(enrollment, &agent, &code, t0 + Duration::minutes(2))
        .await;
    assert!(matches!(exhausted, Err(LedgerError::NoActiveSession)));
}

#[tokio::test]
async fn test_correct_code_after_expiry_fails() {
    let (service, sessions, agent) = setup().await;
    let enrollment = Uuid::new_v4();
    let t0 = Utc::now();

    service.open_session(enrollment, &agent, t0).await.unwrap();
    let code = sessions
        .find_open(enrollment, agent.id)
        .await
        .unwrap()
        .unwrap()
        .code;

    let expired = service
        .validate_code(enrollment, &agent, &code, t0 + Duration::minutes(6))
        .await;
    assert!(matches!(expired, Err(LedgerError::CodeExpired)));
}

#[tokio::test]
async fn test_sessions_are_scoped_per_pair() {
    let agents = InMemoryAgentStore::new();
    let agent_a = PaymentAgent::new("Awa", "Diallo");
    let agent_b = PaymentAgent::new("Moussa", "Kone");
    agents.store(agent_a.clone()).await.unwrap();
    agents.store(agent_b.clone()).await.unwrap();
    let sessions = InMemorySessionStore::new();
    let service = CashVerification::new(Box::new(agents), Box::new(sessions.clone()));

    let enrollment = Uuid::new_v4();
    let t0 = Utc::now();
    service.open_session(enrollment, &agent_a, t0).await.unwrap();
    service.open_session(enrollment, &agent_b, t0).await.unwrap();

    let code_a = sessions
        .find_open(enrollment, agent_a.id)
        .await
        .unwrap()
        .unwrap()
        .code;

    // Agent B's pair has its own session; A's code does not validate there
    // unless the random codes collide.
    let code_b = sessions
        .find_open(enrollment, agent_b.id)
        .await
        .unwrap()
        .unwrap()
        .code;

    service
        .validate_code(enrollment, &agent_a, &code_a, t0)
        .await
        .unwrap();
    service
        .validate_code(enrollment, &agent_b, &code_b, t0)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_resolution_and_session_flow_end_to_end() {
    let (service, sessions, agent) = setup().await;
    let enrollment = Uuid::new_v4();
    let t0 = Utc::now();

    let resolved = service.resolve_agent("awa dia").await.unwrap();
    assert_eq!(resolved.id, agent.id);

    service.open_session(enrollment, &resolved, t0).await.unwrap();
    let code = sessions
        .find_open(enrollment, resolved.id)
        .await
        .unwrap()
        .unwrap()
        .code;
    service
        .validate_code(enrollment, &resolved, &code, t0 + Duration::minutes(1))
        .await
        .unwrap();
}
