//! Alert notification channels (email, in-app history, webhook) and the
//! dispatcher that fans a trigger out to them.

pub mod models;
pub mod senders;
pub mod service;
pub mod templates;

pub use service::NotificationDispatcher;
