use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;
use tempfile::NamedTempFile;

mod common;

fn run(rows: &[&str]) -> assert_cmd::assert::Assert {
    let file = NamedTempFile::new().unwrap();
    common::write_instructions(file.path(), rows).unwrap();

    let mut cmd = Command::new(cargo_bin!("esfe-ledger"));
    cmd.arg(file.path());
    cmd.assert()
}

#[test]
fn test_partial_payment_keeps_enrollment_created() {
    run(&[
        "open, INS-1, 500000,,",
        "initiate, INS-1, 200000, bank_transfer,",
        "validate, INS-1,,,",
    ])
    .success()
    .stdout(predicate::str::contains("INS-1,500000,200000,300000,created"));
}

#[test]
fn test_full_payment_activates_enrollment() {
    run(&[
        "open, INS-1, 500000,,",
        "initiate, INS-1, 200000, bank_transfer,",
        "validate, INS-1,,,",
        "initiate, INS-1, 300000, mobile_money,",
        "validate, INS-1,,,",
    ])
    .success()
    .stdout(predicate::str::contains("INS-1,500000,500000,0,active"));
}

#[test]
fn test_payment_rejected_once_settled() {
    // The third initiate hits a zero balance and is rejected; the ledger is
    // unchanged.
    run(&[
        "open, INS-1, 500000,,",
        "initiate, INS-1, 500000, bank_transfer,",
        "validate, INS-1,,,",
        "initiate, INS-1, 1000, bank_transfer,",
    ])
    .success()
    .stdout(predicate::str::contains("INS-1,500000,500000,0,active"));
}

#[test]
fn test_second_pending_payment_rejected() {
    run(&[
        "open, INS-1, 500000,,",
        "initiate, INS-1, 100000, bank_transfer,",
        "initiate, INS-1, 100000, mobile_money,",
        "validate, INS-1,,,",
    ])
    .success()
    // Only the first initiation existed to validate.
    .stdout(predicate::str::contains("INS-1,500000,100000,400000,created"));
}

#[test]
fn test_cancelled_payment_credits_nothing() {
    run(&[
        "open, INS-1, 500000,,",
        "initiate, INS-1, 200000, bank_transfer,",
        "cancel, INS-1,,,",
        "initiate, INS-1, 500000, bank_transfer,",
        "validate, INS-1,,,",
    ])
    .success()
    .stdout(predicate::str::contains("INS-1,500000,500000,0,active"));
}

#[test]
fn test_amount_above_balance_rejected() {
    run(&[
        "open, INS-1, 100000,,",
        "initiate, INS-1, 150000, bank_transfer,",
    ])
    .success()
    .stdout(predicate::str::contains("INS-1,100000,0,100000,created"));
}

#[test]
fn test_cash_initiation_with_roster_agent() {
    let instructions = NamedTempFile::new().unwrap();
    common::write_instructions(
        instructions.path(),
        &[
            "open, INS-1, 500000,,",
            "initiate, INS-1, 200000, cash, Awa Diallo",
            "validate, INS-1,,,",
        ],
    )
    .unwrap();
    let roster = NamedTempFile::new().unwrap();
    common::write_roster(roster.path(), &[("Awa", "Diallo"), ("Moussa", "Kone")]).unwrap();

    let mut cmd = Command::new(cargo_bin!("esfe-ledger"));
    cmd.arg(instructions.path()).arg("--agents").arg(roster.path());
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("INS-1,500000,200000,300000,created"));
}

#[test]
fn test_cash_without_known_agent_rejected() {
    run(&[
        "open, INS-1, 500000,,",
        "initiate, INS-1, 200000, cash, Nobody Known",
    ])
    .success()
    .stdout(predicate::str::contains("INS-1,500000,0,500000,created"));
}
