use serde_json::json;

use crate::calc::StudentRef;
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    encode, optional_list, required_i64, required_list, required_str, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::sessions::{PresenceRecord, SeedRecord, SeedSession, SessionError, SessionLedger};

fn session_err(e: SessionError) -> HandlerErr {
    HandlerErr {
        code: e.code(),
        message: e.to_string(),
        details: None,
    }
}

fn records_param(params: &serde_json::Value) -> Result<Vec<PresenceRecord>, HandlerErr> {
    Ok(optional_list(params, "records")?.unwrap_or_default())
}

/// `sessions.load`: replace a course's ledger from fetched sessions and
/// presence records.
fn load(state: &mut AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = required_str(params, "courseId")?;
    let sessions: Vec<SeedSession> = required_list(params, "sessions")?;
    let records: Vec<SeedRecord> = optional_list(params, "records")?.unwrap_or_default();

    let (ledger, report) = SessionLedger::from_seed(&sessions, &records).map_err(session_err)?;
    state.ledgers.insert(course_id, ledger);
    encode(&report)
}

/// `sessions.create`: one (date, period); collides with `duplicate_session`.
fn create(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = required_str(params, "courseId")?;
    let date = required_str(params, "date")?;
    let period = required_i64(params, "period")?;
    let records = records_param(params)?;

    let ledger = state.ledgers.entry(course_id).or_default();
    let key = ledger.create(&date, period, &records).map_err(session_err)?;
    Ok(json!({
        "sessionKey": key,
        "totalClasses": ledger.total_classes(),
    }))
}

/// `sessions.createBulk`: consecutive periods on one date, skipping any that
/// already exist and reporting both lists.
fn create_bulk(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = required_str(params, "courseId")?;
    let date = required_str(params, "date")?;
    let start_period = required_i64(params, "startPeriod")?;
    let num_classes = required_i64(params, "numClasses")?;
    let records = records_param(params)?;

    let ledger = state.ledgers.entry(course_id).or_default();
    let outcome = ledger
        .create_bulk(&date, start_period, num_classes, &records)
        .map_err(session_err)?;
    let mut result = encode(&outcome)?;
    result["totalClasses"] = json!(ledger.total_classes());
    Ok(result)
}

/// `sessions.updateRecords`: replace the presence records of one existing
/// session; never creates.
fn update_records(
    state: &mut AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = required_str(params, "courseId")?;
    let date = required_str(params, "date")?;
    let period = required_i64(params, "period")?;
    let records = records_param(params)?;

    let ledger = state.ledgers.get_mut(&course_id).ok_or(HandlerErr {
        code: "not_found",
        message: format!("no sessions tracked for course {}", course_id),
        details: None,
    })?;
    let key = ledger
        .update_records(&date, period, &records)
        .map_err(session_err)?;
    Ok(json!({ "sessionKey": key }))
}

/// `sessions.summary`: attendance-summary rows derived from the ledger.
/// With a roster every student gets a row (zero-filled); without one only
/// students seen in the records appear.
fn summary(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = required_str(params, "courseId")?;
    let students: Option<Vec<StudentRef>> = optional_list(params, "students")?;

    let empty = SessionLedger::new();
    let ledger = state.ledgers.get(&course_id).unwrap_or(&empty);
    let total = ledger.total_classes();

    let ids: Vec<String> = match &students {
        Some(list) => list.iter().map(|s| s.id.clone()).collect(),
        None => ledger.observed_students(),
    };
    let records: Vec<serde_json::Value> = ids
        .iter()
        .map(|id| {
            json!({
                "studentId": id,
                "attendedClasses": ledger.attended_count(id),
            })
        })
        .collect();

    Ok(json!({
        "totalClasses": total,
        "records": records,
    }))
}

/// `sessions.matrix`: the sparse presence matrix plus per-student aggregates
/// in the supplied student order.
fn matrix(state: &AppState, params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_id = required_str(params, "courseId")?;
    let students: Vec<StudentRef> = required_list(params, "students")?;

    let empty = SessionLedger::new();
    let ledger = state.ledgers.get(&course_id).unwrap_or(&empty);
    encode(&ledger.matrix(&students))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "sessions.load" => load(state, &req.params),
        "sessions.create" => create(state, &req.params),
        "sessions.createBulk" => create_bulk(state, &req.params),
        "sessions.updateRecords" => update_records(state, &req.params),
        "sessions.summary" => summary(state, &req.params),
        "sessions.matrix" => matrix(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(error) => error.response(&req.id),
    })
}
