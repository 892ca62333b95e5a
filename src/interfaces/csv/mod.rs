pub mod agent_roster;
pub mod instruction_reader;
pub mod ledger_writer;
