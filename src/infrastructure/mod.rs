pub mod in_memory;
pub mod notify;
pub mod receipt_pdf;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
