pub mod agent;
pub mod enrollment;
pub mod payment;
pub mod ports;
pub mod receipt;
pub mod session;
