use clap::Parser;
use esfe_ledger::application::cash::CashVerification;
use esfe_ledger::application::engine::{EngineParts, ReconciliationEngine};
use esfe_ledger::domain::agent::PaymentAgent;
use esfe_ledger::domain::enrollment::{Amount, Balance};
use esfe_ledger::domain::payment::PaymentMethod;
use esfe_ledger::domain::ports::AgentStoreBox;
use esfe_ledger::error::LedgerError;
use esfe_ledger::infrastructure::in_memory::{
    InMemoryAgentStore, InMemoryLedger, InMemorySessionStore, InMemoryStudentDirectory,
};
use esfe_ledger::infrastructure::notify::LogNotifier;
use esfe_ledger::infrastructure::receipt_pdf::PdfReceiptRenderer;
use esfe_ledger::interfaces::csv::agent_roster::AgentRosterReader;
use esfe_ledger::interfaces::csv::instruction_reader::{Instruction, InstructionReader, OpKind};
use esfe_ledger::interfaces::csv::ledger_writer::LedgerWriter;
use miette::{IntoDiagnostic, Result};
use std::collections::BTreeMap;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use uuid::Uuid;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input instructions CSV file (op, enrollment, amount, method, agent)
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB;
    /// requires the `storage-rocksdb` feature.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// Base URL embedded in receipt QR codes.
    #[arg(long, default_value = "https://esfe.example")]
    public_base_url: String,

    /// Agent roster CSV (first_name, last_name) to seed the agent store.
    #[arg(long)]
    agents: Option<PathBuf>,
}

struct Services {
    engine: ReconciliationEngine,
    cash: CashVerification,
    roster: AgentStoreBox,
}

fn build_services(cli: &Cli) -> Result<Services> {
    if let Some(db_path) = &cli.db_path {
        #[cfg(feature = "storage-rocksdb")]
        {
            use esfe_ledger::infrastructure::rocksdb::RocksDbLedger;
            let store = RocksDbLedger::open(db_path).into_diagnostic()?;
            let engine = ReconciliationEngine::new(
                EngineParts {
                    enrollments: Box::new(store.clone()),
                    payments: Box::new(store.clone()),
                    ledger: Box::new(store.clone()),
                    renderer: Box::new(PdfReceiptRenderer::default()),
                    provisioner: Box::new(InMemoryStudentDirectory::new()),
                    notifier: Box::new(LogNotifier::new()),
                },
                &cli.public_base_url,
            );
            let cash =
                CashVerification::new(Box::new(store.clone()), Box::new(store.clone()));
            return Ok(Services {
                engine,
                cash,
                roster: Box::new(store),
            });
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        {
            let _ = db_path;
            return Err(miette::miette!(
                "--db-path requires a build with the storage-rocksdb feature"
            ));
        }
    }

    let ledger = InMemoryLedger::new();
    let agents = InMemoryAgentStore::new();
    let engine = ReconciliationEngine::new(
        EngineParts {
            enrollments: Box::new(ledger.clone()),
            payments: Box::new(ledger.clone()),
            ledger: Box::new(ledger),
            renderer: Box::new(PdfReceiptRenderer::default()),
            provisioner: Box::new(InMemoryStudentDirectory::new()),
            notifier: Box::new(LogNotifier::new()),
        },
        &cli.public_base_url,
    );
    let cash = CashVerification::new(
        Box::new(agents.clone()),
        Box::new(InMemorySessionStore::new()),
    );
    Ok(Services {
        engine,
        cash,
        roster: Box::new(agents),
    })
}

async fn seed_agents(roster: &AgentStoreBox, path: &PathBuf) -> Result<()> {
    let file = File::open(path).into_diagnostic()?;
    let existing = roster.all_active().await.into_diagnostic()?;
    for row in AgentRosterReader::new(file).agents() {
        let row = row.into_diagnostic()?;
        let known = existing
            .iter()
            .any(|a| a.first_name == row.first_name && a.last_name == row.last_name);
        if !known {
            roster
                .store(PaymentAgent::new(&row.first_name, &row.last_name))
                .await
                .into_diagnostic()?;
        }
    }
    Ok(())
}

async fn apply(
    services: &Services,
    labels: &mut BTreeMap<String, Uuid>,
    instruction: Instruction,
) -> esfe_ledger::error::Result<()> {
    match instruction.op {
        OpKind::Open => {
            let amount = instruction
                .amount
                .ok_or_else(|| LedgerError::InvalidAmount("open requires an amount".into()))?;
            let enrollment = services
                .engine
                .register_enrollment(Balance::new(amount))
                .await?;
            labels.insert(instruction.enrollment, enrollment.reference);
            Ok(())
        }
        OpKind::Initiate => {
            let reference = *labels
                .get(&instruction.enrollment)
                .ok_or(LedgerError::EnrollmentNotFound)?;
            let amount = Amount::new(instruction.amount.ok_or_else(|| {
                LedgerError::InvalidAmount("initiate requires an amount".into())
            })?)?;
            let method = instruction.method.ok_or_else(|| {
                LedgerError::InvalidAmount("initiate requires a method".into())
            })?;

            let agent = match (method, instruction.agent.as_deref()) {
                (PaymentMethod::Cash, Some(name)) => {
                    let agent = services.cash.resolve_agent(name).await?;
                    services
                        .cash
                        .open_session(reference, &agent, chrono::Utc::now())
                        .await?;
                    Some(agent.id)
                }
                (PaymentMethod::Cash, None) => return Err(LedgerError::AgentRequired),
                _ => None,
            };

            services
                .engine
                .initiate_payment(reference, amount, method, agent, "INITIATED_BY_OPERATOR")
                .await?;
            Ok(())
        }
        OpKind::Validate => {
            let reference = *labels
                .get(&instruction.enrollment)
                .ok_or(LedgerError::EnrollmentNotFound)?;
            let pending = services
                .engine
                .pending_payment(reference)
                .await?
                .ok_or(LedgerError::PaymentNotFound)?;
            services.engine.validate_payment(pending.id).await?;
            Ok(())
        }
        OpKind::Cancel => {
            let reference = *labels
                .get(&instruction.enrollment)
                .ok_or(LedgerError::EnrollmentNotFound)?;
            let pending = services
                .engine
                .pending_payment(reference)
                .await?
                .ok_or(LedgerError::PaymentNotFound)?;
            services.engine.cancel_payment(pending.id).await?;
            Ok(())
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();
    let services = build_services(&cli)?;

    if let Some(path) = &cli.agents {
        seed_agents(&services.roster, path).await?;
    }

    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = InstructionReader::new(file);
    let mut labels: BTreeMap<String, Uuid> = BTreeMap::new();

    for row in reader.instructions() {
        match row {
            Ok(instruction) => {
                if let Err(e) = apply(&services, &mut labels, instruction).await {
                    tracing::warn!(error = %e, "instruction rejected");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "unreadable instruction");
            }
        }
    }

    let mut rows = Vec::new();
    for (label, reference) in &labels {
        if let Some(enrollment) = services.engine.enrollment(*reference).await.into_diagnostic()? {
            rows.push((label.clone(), enrollment));
        }
    }

    let stdout = io::stdout();
    let mut writer = LedgerWriter::new(stdout.lock());
    writer
        .write_ledger(rows.iter().map(|(label, e)| (label.as_str(), e)))
        .into_diagnostic()?;

    Ok(())
}
