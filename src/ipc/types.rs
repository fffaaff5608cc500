use crate::access::Session;
use crate::store::Store;
use serde::Deserialize;
use std::path::PathBuf;

#[derive(Debug, Deserialize, Clone)]
pub struct Request {
    pub id: String,
    pub method: String,
    #[serde(default)]
    pub params: serde_json::Value,
}

#[derive(Default)]
pub struct AppState {
    pub workspace: Option<PathBuf>,
    pub store: Option<Store>,
    pub session: Option<Session>,
    /// Display override for the school name. Lives only as long as the process.
    pub school_name: Option<String>,
}
