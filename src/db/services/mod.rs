pub mod alert_service;
pub mod memory_store;
pub mod stats_service;

pub use alert_service::AlertStore;
pub use memory_store::MemoryStore;
pub use stats_service::{StatsSummary, summary_for_user};
