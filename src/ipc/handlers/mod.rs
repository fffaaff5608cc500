pub mod attendance;
pub mod auth;
pub mod backup_exchange;
pub mod core;
pub mod reports;
pub mod schools;
pub mod settings;
pub mod students;
