use crate::domain::payment::PaymentMethod;
use crate::error::{LedgerError, Result};
use rust_decimal::Decimal;
use serde::Deserialize;
use std::io::Read;

#[derive(Debug, Deserialize, PartialEq, Eq, Clone, Copy)]
#[serde(rename_all = "lowercase")]
pub enum OpKind {
    /// Create an enrollment with a fixed amount due.
    Open,
    /// Create a pending payment against an enrollment.
    Initiate,
    /// Validate the enrollment's pending payment.
    Validate,
    /// Cancel the enrollment's pending payment.
    Cancel,
}

/// One row of the operation stream.
///
/// `enrollment` is a caller-chosen label; the driver maps labels to the
/// enrollment references it created. `amount` is required for `open` and
/// `initiate`, `method` for `initiate`, `agent` only for cash.
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct Instruction {
    pub op: OpKind,
    pub enrollment: String,
    pub amount: Option<Decimal>,
    pub method: Option<PaymentMethod>,
    pub agent: Option<String>,
}

/// Reads reconciliation instructions from a CSV source.
///
/// Wraps `csv::Reader` with whitespace trimming and flexible record lengths,
/// yielding `Result<Instruction>` lazily so large files stream.
pub struct InstructionReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> InstructionReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    pub fn instructions(self) -> impl Iterator<Item = Result<Instruction>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
