use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

use crate::calc::{
    self, Assessment, AttendanceSummaryRow, Category, CourseType, Mark, StudentRef,
};
use crate::sessions::{SessionInfo, SessionLedger};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortMode {
    #[default]
    #[serde(rename = "entered")]
    Entered,
    #[serde(rename = "roll-asc")]
    RollAsc,
    #[serde(rename = "roll-desc")]
    RollDesc,
}

/// Numeric-aware roll comparison: when both sides parse as numbers they
/// compare numerically ("2" before "10"), otherwise lexicographically.
pub fn compare_rolls(a: &str, b: &str) -> Ordering {
    match (a.trim().parse::<f64>(), b.trim().parse::<f64>()) {
        (Ok(x), Ok(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
        _ => a.cmp(b),
    }
}

/// Entry order is the order students were supplied in; roll orders are
/// stable sorts over it.
pub fn sort_students(students: &[StudentRef], mode: SortMode) -> Vec<StudentRef> {
    let mut out = students.to_vec();
    match mode {
        SortMode::Entered => {}
        SortMode::RollAsc => out.sort_by(|a, b| compare_rolls(&a.roll, &b.roll)),
        SortMode::RollDesc => out.sort_by(|a, b| compare_rolls(&b.roll, &a.roll)),
    }
    out
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksheetColumn {
    pub assessment_id: String,
    pub label: String,
    pub full_marks: f64,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksheetRow {
    pub student_id: String,
    pub roll: String,
    pub name: String,
    pub cells: Vec<Option<f64>>,
    pub total: f64,
    pub grade: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MarksheetModel {
    pub columns: Vec<MarksheetColumn>,
    pub rows: Vec<MarksheetRow>,
}

/// Marksheet rows for the spreadsheet-writing collaborator: identity, one
/// cell per ordered assessment, trailing total and grade. Cells carry the
/// raw entered value (`None` renders as an empty cell); an attendance column
/// mirrors the summary-derived 0-5 marks and ignores any Mark records.
pub fn marksheet_model(
    course_type: CourseType,
    students: &[StudentRef],
    assessments: &[Assessment],
    marks: Option<&[Mark]>,
    attendance: Option<&[AttendanceSummaryRow]>,
    sort: SortMode,
) -> MarksheetModel {
    let ordered = calc::order_columns(assessments);
    let by_student = marks.map(calc::marks_by_student).unwrap_or_default();
    let att_scores = attendance.map(calc::attendance_by_student).unwrap_or_default();

    let columns: Vec<MarksheetColumn> = ordered
        .iter()
        .map(|a| MarksheetColumn {
            assessment_id: a.id.clone(),
            label: format!("{} ({})", a.name, a.full_marks),
            full_marks: a.full_marks,
            category: a.category_for(course_type),
        })
        .collect();

    let empty_row: HashMap<String, f64> = HashMap::new();
    let rows = sort_students(students, sort)
        .into_iter()
        .map(|s| {
            let row = by_student.get(&s.id).unwrap_or(&empty_row);
            let att5 = att_scores.get(&s.id).map(|a| a.marks as f64);
            let cells: Vec<Option<f64>> = ordered
                .iter()
                .map(|a| {
                    if a.category_for(course_type) == Category::Attendance {
                        att5
                    } else {
                        row.get(&a.id).copied()
                    }
                })
                .collect();
            let (total, _) =
                calc::compute_student_total(course_type, &ordered, row, att5.unwrap_or(0.0));
            MarksheetRow {
                student_id: s.id,
                roll: s.roll,
                name: s.name,
                cells,
                total,
                grade: calc::grade_from_total(total).to_string(),
            }
        })
        .collect();

    MarksheetModel { columns, rows }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceCell {
    pub marker: String,
    pub present: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSheetRow {
    pub student_id: String,
    pub roll: String,
    pub name: String,
    pub cells: Vec<AttendanceCell>,
    pub present_count: usize,
    pub total_classes: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSheetModel {
    pub sessions: Vec<SessionInfo>,
    pub students: Vec<StudentRef>,
    pub matrix: HashMap<String, HashMap<String, bool>>,
    pub rows: Vec<AttendanceSheetRow>,
}

/// Attendance sheet rows: one "P"/"A" cell per session in (date, period)
/// order, each cell also carrying the boolean for collaborator styling,
/// with trailing present/total/percentage columns.
pub fn attendance_sheet_model(
    ledger: &SessionLedger,
    students: &[StudentRef],
    sort: SortMode,
) -> AttendanceSheetModel {
    let sorted = sort_students(students, sort);
    let base = ledger.matrix(&sorted);

    let rows = base
        .rows
        .iter()
        .map(|r| {
            let cells: Vec<AttendanceCell> = ledger
                .sessions()
                .map(|s| {
                    let present = s.is_present(&r.student_id);
                    AttendanceCell {
                        marker: if present { "P" } else { "A" }.to_string(),
                        present,
                    }
                })
                .collect();
            AttendanceSheetRow {
                student_id: r.student_id.clone(),
                roll: r.roll.clone(),
                name: r.name.clone(),
                cells,
                present_count: r.present_count,
                total_classes: r.total_classes,
                percentage: r.percentage,
            }
        })
        .collect();

    AttendanceSheetModel {
        sessions: base.sessions,
        students: base.students,
        matrix: base.matrix,
        rows,
    }
}
