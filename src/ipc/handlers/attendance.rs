use crate::attendance;
use crate::ipc::helpers::{
    authed, authed_mut, get_optional_date, get_required_str, get_student_filter, parse_date, reply, to_json,
    HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{today, AttendanceRecord, AttendanceStatus};
use serde::Deserialize;
use serde_json::json;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RecordInput {
    student_id: String,
    date: String,
    status: String,
    #[serde(default)]
    note: Option<String>,
}

fn parse_records(params: &serde_json::Value) -> Result<Vec<AttendanceRecord>, HandlerErr> {
    let raw = params
        .get("records")
        .cloned()
        .ok_or_else(|| HandlerErr::new("bad_params", "missing records"))?;
    let inputs: Vec<RecordInput> =
        serde_json::from_value(raw).map_err(|e| HandlerErr::new("bad_params", e.to_string()))?;

    let mut out = Vec::with_capacity(inputs.len());
    for (i, input) in inputs.into_iter().enumerate() {
        let date = parse_date(&input.date)?;
        let status = AttendanceStatus::parse(&input.status).ok_or_else(|| HandlerErr {
            code: "bad_params",
            message: format!("unknown status: {}", input.status),
            details: Some(json!({ "index": i })),
        })?;
        let note = input.note.filter(|n| !n.trim().is_empty());
        out.push(AttendanceRecord::new(&input.student_id, "", date, status, note));
    }
    Ok(out)
}

fn handle_sheet(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let date = get_optional_date(&req.params, "date")?.unwrap_or_else(today);
    let filter = get_student_filter(&req.params)?;
    let (store, session) = authed(state)?;
    let rows = attendance::attendance_sheet(store, session, date, &filter)?;
    Ok(json!({ "date": date, "rows": to_json(&rows)? }))
}

fn handle_save(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let records = parse_records(&req.params)?;
    let (store, session) = authed_mut(state)?;
    let summary = attendance::submit_attendance(store, session, records)?;
    to_json(&summary)
}

fn handle_by_date(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let date = parse_date(&get_required_str(&req.params, "date")?)?;
    let (store, session) = authed(state)?;
    let records = attendance::records_for_date(store, session, date);
    Ok(json!({ "date": date, "records": to_json(&records)? }))
}

fn handle_student_history(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let (store, session) = authed(state)?;
    let history = attendance::student_history(store, session, &student_id)?;
    to_json(&history)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "attendance.sheet" => handle_sheet(state, req),
        "attendance.save" => handle_save(state, req),
        "attendance.byDate" => handle_by_date(state, req),
        "attendance.studentHistory" => handle_student_history(state, req),
        _ => return None,
    };
    Some(reply(req, result))
}
