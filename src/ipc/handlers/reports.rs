use crate::ipc::helpers::{
    anyhow_err, authed, get_optional_date, get_optional_str, get_required_str, parse_date, reply, to_json, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::model::{today, Permission};
use crate::rates::parse_month_key;
use crate::reports;
use crate::summary::{summarize_or_fallback, FigureSummarizer, SummaryInput};
use serde_json::json;

fn month_param(params: &serde_json::Value) -> Result<(i32, u32), HandlerErr> {
    let raw = get_required_str(params, "month")?;
    parse_month_key(&raw).ok_or_else(|| HandlerErr::new("bad_params", "month must be YYYY-MM"))
}

fn handle_dashboard(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let date = get_optional_date(&req.params, "date")?.unwrap_or_else(today);
    let (store, session) = authed(state)?;
    to_json(&reports::dashboard(store, session, date)?)
}

fn handle_day_summary(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let date = parse_date(&get_required_str(&req.params, "date")?)?;
    let (store, session) = authed(state)?;
    to_json(&reports::daily_summary(store, session, date)?)
}

fn handle_monthly(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (year, month) = month_param(&req.params)?;
    let grade = get_optional_str(&req.params, "grade");
    let (store, session) = authed(state)?;
    to_json(&reports::monthly_report(store, session, year, month, grade.as_deref())?)
}

fn handle_monthly_csv(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let (year, month) = month_param(&req.params)?;
    let grade = get_optional_str(&req.params, "grade");
    let (store, session) = authed(state)?;
    let csv = reports::monthly_report_csv(store, session, year, month, grade.as_deref())
        .map_err(|e| anyhow_err("export_failed", e))?;
    Ok(json!({ "csv": csv }))
}

fn handle_export_csv(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (store, session) = authed(state)?;
    let csv = reports::attendance_csv(store, session).map_err(|e| anyhow_err("export_failed", e))?;
    Ok(json!({ "csv": csv }))
}

fn handle_summary(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let school_name = state.school_name.clone();
    let (store, session) = authed(state)?;
    session.require(Permission::ViewReports, "view reports")?;
    let input = SummaryInput::build(
        &session.students(store),
        &session.records(store),
        store.settings().attendance_threshold,
        school_name,
    );
    let text = summarize_or_fallback(&FigureSummarizer, &input);
    Ok(json!({ "text": text, "input": to_json(&input)? }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.dashboard" => handle_dashboard(state, req),
        "reports.daySummary" => handle_day_summary(state, req),
        "reports.monthly" => handle_monthly(state, req),
        "reports.monthlyCsv" => handle_monthly_csv(state, req),
        "reports.exportCsv" => handle_export_csv(state),
        "reports.summary" => handle_summary(state),
        _ => return None,
    };
    Some(reply(req, result))
}
