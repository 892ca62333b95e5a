use assert_cmd::cargo_bin;
use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::process::Command;

#[test]
fn test_cli_end_to_end() -> Result<(), Box<dyn std::error::Error>> {
    let mut cmd = Command::new(cargo_bin!("esfe-ledger"));
    cmd.arg("tests/fixtures/test.csv");

    cmd.assert()
        .success()
        .stdout(predicate::str::contains(
            "enrollment,amount_due,amount_paid,balance,status",
        ))
        // INS-1: 200000 of 500000 validated
        .stdout(predicate::str::contains("INS-1,500000,200000,300000,created"))
        // INS-2: initiated then cancelled, nothing credited
        .stdout(predicate::str::contains("INS-2,300000,0,300000,created"));

    Ok(())
}
