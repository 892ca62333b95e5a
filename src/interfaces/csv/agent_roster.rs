use crate::error::{LedgerError, Result};
use serde::Deserialize;
use std::io::Read;

/// One agent of the roster CSV (`first_name,last_name`).
#[derive(Debug, Deserialize, PartialEq, Clone)]
pub struct AgentRow {
    pub first_name: String,
    pub last_name: String,
}

/// Reads the payment agent roster used to seed the agent store.
pub struct AgentRosterReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> AgentRosterReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(source);
        Self { reader }
    }

    pub fn agents(self) -> impl Iterator<Item = Result<AgentRow>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(LedgerError::from))
    }
}
