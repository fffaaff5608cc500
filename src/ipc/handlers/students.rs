use crate::ipc::helpers::{authed, authed_mut, get_required_str, get_student_filter, reply, to_json, HandlerErr};
use crate::ipc::types::{AppState, Request};
use crate::roster;
use serde_json::json;

fn handle_list(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let filter = get_student_filter(&req.params)?;
    let (store, session) = authed(state)?;
    let students = roster::list_students(store, session, &filter);
    Ok(json!({ "students": to_json(&students)? }))
}

fn handle_grades(state: &mut AppState) -> Result<serde_json::Value, HandlerErr> {
    let (store, session) = authed(state)?;
    Ok(json!({ "grades": roster::grades(store, session) }))
}

fn handle_create(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let name = get_required_str(&req.params, "name")?;
    let grade = get_required_str(&req.params, "grade")?;
    let (store, session) = authed_mut(state)?;
    let student = roster::add_student(store, session, &name, &grade)?;
    to_json(&student)
}

fn handle_update(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let name = get_required_str(&req.params, "name")?;
    let grade = get_required_str(&req.params, "grade")?;
    let (store, session) = authed_mut(state)?;
    let student = roster::update_student(store, session, &student_id, &name, &grade)?;
    to_json(&student)
}

fn handle_delete(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let student_id = get_required_str(&req.params, "studentId")?;
    let (store, session) = authed_mut(state)?;
    roster::delete_student(store, session, &student_id)?;
    Ok(json!({ "ok": true }))
}

fn handle_import(state: &mut AppState, req: &Request) -> Result<serde_json::Value, HandlerErr> {
    let text = get_required_str(&req.params, "text")?;
    let (store, session) = authed_mut(state)?;
    let added = roster::import_students(store, session, &text)?;
    Ok(json!({ "added": added }))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "students.list" => handle_list(state, req),
        "students.grades" => handle_grades(state),
        "students.create" => handle_create(state, req),
        "students.update" => handle_update(state, req),
        "students.delete" => handle_delete(state, req),
        "students.import" => handle_import(state, req),
        _ => return None,
    };
    Some(reply(req, result))
}
