pub mod cash;
pub mod engine;
