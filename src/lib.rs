//! Attendance persistence and aggregation for multi-school deployments.

pub mod access;
pub mod admin;
pub mod attendance;
pub mod backup;
pub mod db;
pub mod error;
pub mod exchange;
pub mod ipc;
pub mod model;
pub mod rates;
pub mod reports;
pub mod roster;
pub mod store;
pub mod summary;
