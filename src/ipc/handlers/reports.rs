use crate::calc::{Assessment, AttendanceSummaryRow, CourseType, Mark, StudentRef};
use crate::ipc::error::ok;
use crate::ipc::helpers::{
    encode, optional_list, required_list, required_str, sort_mode, HandlerErr,
};
use crate::ipc::types::{AppState, Request};
use crate::sessions::SessionLedger;
use crate::sheet;

/// `reports.marksheetModel`: ordered columns and sorted rows for the
/// spreadsheet-writing collaborator.
fn marksheet_model(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_type = CourseType::from_raw(&required_str(params, "courseType")?);
    let students: Vec<StudentRef> = required_list(params, "students")?;
    let assessments: Vec<Assessment> = required_list(params, "assessments")?;
    let marks: Option<Vec<Mark>> = optional_list(params, "marks")?;
    let attendance: Option<Vec<AttendanceSummaryRow>> =
        optional_list(params, "attendanceSummary")?;
    let sort = sort_mode(params)?;

    let model = sheet::marksheet_model(
        course_type,
        &students,
        &assessments,
        marks.as_deref(),
        attendance.as_deref(),
        sort,
    );
    encode(&model)
}

/// `reports.attendanceSheetModel`: session matrix with P/A marker cells and
/// trailing aggregates, sorted per the requested mode.
fn attendance_sheet_model(
    state: &AppState,
    params: &serde_json::Value,
) -> Result<serde_json::Value, HandlerErr> {
    let course_id = required_str(params, "courseId")?;
    let students: Vec<StudentRef> = required_list(params, "students")?;
    let sort = sort_mode(params)?;

    let empty = SessionLedger::new();
    let ledger = state.ledgers.get(&course_id).unwrap_or(&empty);
    encode(&sheet::attendance_sheet_model(ledger, &students, sort))
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    let result = match req.method.as_str() {
        "reports.marksheetModel" => marksheet_model(&req.params),
        "reports.attendanceSheetModel" => attendance_sheet_model(state, &req.params),
        _ => return None,
    };
    Some(match result {
        Ok(value) => ok(&req.id, value),
        Err(error) => error.response(&req.id),
    })
}
