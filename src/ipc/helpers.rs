use crate::access::Session;
use crate::error::{AccessError, AuthError, ServiceError, StoreError};
use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::model::parse_date_key;
use crate::rates::Standing;
use crate::roster::StudentFilter;
use crate::store::Store;
use chrono::NaiveDate;
use serde::Serialize;

pub struct HandlerErr {
    pub code: &'static str,
    pub message: String,
    pub details: Option<serde_json::Value>,
}

impl HandlerErr {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    pub fn response(self, id: &str) -> serde_json::Value {
        err(id, self.code, self.message, self.details)
    }
}

impl From<ServiceError> for HandlerErr {
    fn from(e: ServiceError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

impl From<AccessError> for HandlerErr {
    fn from(e: AccessError) -> Self {
        ServiceError::from(e).into()
    }
}

impl From<StoreError> for HandlerErr {
    fn from(e: StoreError) -> Self {
        ServiceError::from(e).into()
    }
}

impl From<AuthError> for HandlerErr {
    fn from(e: AuthError) -> Self {
        Self::new(e.code(), e.to_string())
    }
}

/// Glue failures keep their access code when one is buried in the chain.
pub fn anyhow_err(code: &'static str, e: anyhow::Error) -> HandlerErr {
    match e.downcast_ref::<AccessError>() {
        Some(access) => access.clone().into(),
        None => HandlerErr::new(code, format!("{:#}", e)),
    }
}

pub fn reply(req: &Request, result: Result<serde_json::Value, HandlerErr>) -> serde_json::Value {
    match result {
        Ok(v) => ok(&req.id, v),
        Err(e) => e.response(&req.id),
    }
}

pub fn to_json<T: Serialize>(value: &T) -> Result<serde_json::Value, HandlerErr> {
    serde_json::to_value(value).map_err(|e| HandlerErr::new("encode_failed", e.to_string()))
}

pub fn get_required_str(params: &serde_json::Value, key: &str) -> Result<String, HandlerErr> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| HandlerErr::new("bad_params", format!("missing {}", key)))
}

/// Trimmed and non-empty, else `None`.
pub fn get_optional_str(params: &serde_json::Value, key: &str) -> Option<String> {
    params
        .get(key)
        .and_then(|v| v.as_str())
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

pub fn parse_date(raw: &str) -> Result<NaiveDate, HandlerErr> {
    parse_date_key(raw).ok_or_else(|| HandlerErr::new("bad_params", format!("date must be YYYY-MM-DD: {}", raw)))
}

pub fn get_optional_date(params: &serde_json::Value, key: &str) -> Result<Option<NaiveDate>, HandlerErr> {
    get_optional_str(params, key).map(|s| parse_date(&s)).transpose()
}

/// `grade`, `search` and `status` (`all`, `risk`, `excellent`) params.
pub fn get_student_filter(params: &serde_json::Value) -> Result<StudentFilter, HandlerErr> {
    let standing = match get_optional_str(params, "status").as_deref() {
        None | Some("all") => None,
        Some("risk") => Some(Standing::Risk),
        Some("excellent") => Some(Standing::Excellent),
        Some(other) => {
            return Err(HandlerErr::new(
                "bad_params",
                format!("status must be all, risk or excellent: {}", other),
            ))
        }
    };
    Ok(StudentFilter {
        grade: get_optional_str(params, "grade"),
        search: get_optional_str(params, "search"),
        standing,
    })
}

fn no_workspace() -> HandlerErr {
    HandlerErr::new("no_workspace", "select a workspace first")
}

fn not_authenticated() -> HandlerErr {
    HandlerErr::new("not_authenticated", "log in first")
}

pub fn authed(state: &AppState) -> Result<(&Store, &Session), HandlerErr> {
    let store = state.store.as_ref().ok_or_else(no_workspace)?;
    let session = state.session.as_ref().ok_or_else(not_authenticated)?;
    Ok((store, session))
}

pub fn authed_mut(state: &mut AppState) -> Result<(&mut Store, &Session), HandlerErr> {
    let store = state.store.as_mut().ok_or_else(no_workspace)?;
    let session = state.session.as_ref().ok_or_else(not_authenticated)?;
    Ok((store, session))
}
