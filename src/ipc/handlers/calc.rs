use serde_json::json;

use crate::calc::{self, Assessment, AttendanceSummaryRow, CourseType, Mark, StudentRef};
use crate::ipc::error::ok;
use crate::ipc::helpers::{encode, optional_list, required_list, required_str, HandlerErr};
use crate::ipc::types::{AppState, Request};

fn parse_course_type(params: &serde_json::Value) -> Result<CourseType, HandlerErr> {
    let raw = required_str(params, "courseType")?;
    Ok(CourseType::from_raw(&raw))
}

/// `calc.courseSummary`: totals, grades, breakdowns, class stats. The marks
/// and attendance sources are independently nullable; a null source is
/// reported in `result.sources` and its component contributes 0.
fn course_summary(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let course_type = parse_course_type(params)?;
    let students: Vec<StudentRef> = required_list(params, "students")?;
    let assessments: Vec<Assessment> = required_list(params, "assessments")?;
    let marks: Option<Vec<Mark>> = optional_list(params, "marks")?;
    let attendance: Option<Vec<AttendanceSummaryRow>> =
        optional_list(params, "attendanceSummary")?;

    let summary = calc::compute_course_summary(
        course_type,
        &students,
        &assessments,
        marks.as_deref(),
        attendance.as_deref(),
    );
    encode(&summary)
}

/// `attendance.summaryMarks`: derive percentage and 0-5 marks from raw
/// total/attended class counts.
fn summary_marks(params: &serde_json::Value) -> Result<serde_json::Value, HandlerErr> {
    let rows: Vec<AttendanceSummaryRow> = required_list(params, "rows")?;
    let out: Vec<serde_json::Value> = rows
        .iter()
        .map(|r| {
            let score = calc::attendance_score(r);
            json!({
                "studentId": r.student_id,
                "percentage": score.percentage,
                "marks": score.marks,
            })
        })
        .collect();
    Ok(json!({ "rows": out }))
}

fn handle(
    req: &Request,
    f: impl Fn(&serde_json::Value) -> Result<serde_json::Value, HandlerErr>,
) -> serde_json::Value {
    match f(&req.params) {
        Ok(result) => ok(&req.id, result),
        Err(error) => error.response(&req.id),
    }
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "calc.courseSummary" => Some(handle(req, course_summary)),
        "attendance.summaryMarks" => Some(handle(req, summary_marks)),
        _ => None,
    }
}
