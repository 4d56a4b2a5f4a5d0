//! Persistence Adapters - JSON File Storage
//!
//! Implements the `HistoryRepository` port with a single JSON snapshot
//! file. No database dependency, lightweight and crash-recoverable.

pub mod history_file;

pub use history_file::JsonHistoryRepository;
