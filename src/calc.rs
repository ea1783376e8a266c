use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;

/// Lowest passing total on the 100-point scale (the "D" band floor).
pub const PASS_THRESHOLD: f64 = 40.0;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CourseType {
    Theory,
    Lab,
    Hybrid,
}

impl CourseType {
    /// Resolve a free-text course type the way the portal does: anything
    /// containing "lab" takes the lab formula, everything else is theory.
    pub fn from_raw(raw: &str) -> CourseType {
        let t = raw.to_ascii_lowercase();
        if t.contains("lab") {
            CourseType::Lab
        } else if t.contains("hybrid") {
            CourseType::Hybrid
        } else {
            CourseType::Theory
        }
    }

    pub fn uses_lab_formula(self) -> bool {
        matches!(self, CourseType::Lab)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Category {
    ClassTest,
    Midterm,
    Final,
    Attendance,
    Assignment,
    Presentation,
    LabItem,
    Other,
}

/// Name-based classification. Substring checks are case-insensitive and the
/// precedence order is fixed; "ct" wins over "mid" for theory courses, so an
/// assessment named "CT Midterm Review" is a class test.
pub fn classify(name: &str, course_type: CourseType) -> Category {
    let n = name.to_ascii_lowercase();
    if course_type.uses_lab_formula() {
        if n.contains("mid") {
            Category::Midterm
        } else if n.contains("final") {
            Category::Final
        } else if n.contains("att") {
            Category::Attendance
        } else {
            Category::LabItem
        }
    } else if n.contains("ct") {
        Category::ClassTest
    } else if n.contains("mid") {
        Category::Midterm
    } else if n.contains("final") {
        Category::Final
    } else if n.contains("att") {
        Category::Attendance
    } else if n.contains("assign") {
        Category::Assignment
    } else if n.contains("present") {
        Category::Presentation
    } else {
        Category::Other
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assessment {
    pub id: String,
    pub name: String,
    pub full_marks: f64,
    #[serde(default)]
    pub order: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<Category>,
}

impl Assessment {
    /// Explicit stored category wins; the name heuristic is the default.
    pub fn category_for(&self, course_type: CourseType) -> Category {
        self.category
            .unwrap_or_else(|| classify(&self.name, course_type))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Mark {
    pub student_id: String,
    pub assessment_id: String,
    pub obtained_marks: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceSummaryRow {
    pub student_id: String,
    pub total_classes: f64,
    pub attended_classes: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentRef {
    pub id: String,
    #[serde(default)]
    pub roll: String,
    #[serde(default)]
    pub name: String,
}

/// `clamp(obtained, 0, full) / full`, 0 whenever `full <= 0`. No rounding.
pub fn pct(obtained: f64, full: f64) -> f64 {
    if full <= 0.0 {
        return 0.0;
    }
    obtained.clamp(0.0, full) / full
}

/// Half-away-from-zero rounding to 2 decimals, matching the portal's
/// `Math.round(x * 100) / 100`.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

pub fn grade_from_total(total: f64) -> &'static str {
    if total >= 80.0 {
        "A+"
    } else if total >= 75.0 {
        "A"
    } else if total >= 70.0 {
        "A-"
    } else if total >= 65.0 {
        "B+"
    } else if total >= 60.0 {
        "B"
    } else if total >= 55.0 {
        "B-"
    } else if total >= 50.0 {
        "C+"
    } else if total >= 45.0 {
        "C"
    } else if total >= 40.0 {
        "D"
    } else {
        "F"
    }
}

pub fn attendance_percentage(total_classes: f64, attended_classes: f64) -> f64 {
    if total_classes <= 0.0 {
        return 0.0;
    }
    attended_classes.clamp(0.0, total_classes) / total_classes * 100.0
}

/// Bucketed 0-5 score. All comparisons are strict: exactly 90.0 is a 4.
pub fn attendance_marks(percentage: f64) -> u8 {
    if percentage > 90.0 {
        5
    } else if percentage > 80.0 {
        4
    } else if percentage > 70.0 {
        3
    } else if percentage > 60.0 {
        2
    } else if percentage > 50.0 {
        1
    } else {
        0
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AttendanceScore {
    pub percentage: f64,
    pub marks: u8,
}

/// Marks are bucketed from the unrounded percentage; the reported percentage
/// is rounded to 2 decimals for display.
pub fn attendance_score(row: &AttendanceSummaryRow) -> AttendanceScore {
    let p = attendance_percentage(row.total_classes, row.attended_classes);
    AttendanceScore {
        percentage: round2(p),
        marks: attendance_marks(p),
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ComponentBreakdown {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub class_test: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lab_work: Option<f64>,
    pub midterm: f64,
    #[serde(rename = "final")]
    pub final_exam: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presentation_assignment: Option<f64>,
    pub attendance: f64,
}

/// Display-order columns: ascending `order`, ties kept in creation order
/// (the order records were supplied in).
pub fn order_columns(assessments: &[Assessment]) -> Vec<Assessment> {
    let mut out = assessments.to_vec();
    out.sort_by_key(|a| a.order);
    out
}

fn component_pct(a: &Assessment, row: &HashMap<String, f64>) -> f64 {
    pct(row.get(&a.id).copied().unwrap_or(0.0), a.full_marks)
}

/// One student's 100-point total plus the per-component points behind it.
/// `row` maps assessment id to obtained marks; a missing entry counts as 0.
/// The attendance component comes only from the summary-derived 0-5 value.
pub fn compute_student_total(
    course_type: CourseType,
    assessments: &[Assessment],
    row: &HashMap<String, f64>,
    attendance_marks5: f64,
) -> (f64, ComponentBreakdown) {
    let att = attendance_marks5.clamp(0.0, 5.0);

    if course_type.uses_lab_formula() {
        let mut lab_pcts: Vec<f64> = Vec::new();
        let mut mid: Option<&Assessment> = None;
        let mut fin: Option<&Assessment> = None;
        for a in assessments {
            match a.category_for(course_type) {
                Category::Midterm => mid = mid.or(Some(a)),
                Category::Final => fin = fin.or(Some(a)),
                Category::Attendance => {}
                _ => lab_pcts.push(component_pct(a, row)),
            }
        }

        let lab_avg = if lab_pcts.is_empty() {
            0.0
        } else {
            lab_pcts.iter().sum::<f64>() / lab_pcts.len() as f64
        };
        let lab_score = lab_avg * 25.0;
        let mid_score = mid.map(|a| component_pct(a, row) * 30.0).unwrap_or(0.0);
        let final_score = fin.map(|a| component_pct(a, row) * 40.0).unwrap_or(0.0);

        let total = lab_score + mid_score + final_score + att;
        return (
            round2(total),
            ComponentBreakdown {
                class_test: None,
                lab_work: Some(round2(lab_score)),
                midterm: round2(mid_score),
                final_exam: round2(final_score),
                presentation_assignment: None,
                attendance: round2(att),
            },
        );
    }

    let mut ct_pcts: Vec<f64> = Vec::new();
    let mut mid: Option<&Assessment> = None;
    let mut fin: Option<&Assessment> = None;
    let mut pres: Option<&Assessment> = None;
    let mut assign: Option<&Assessment> = None;
    for a in assessments {
        match a.category_for(course_type) {
            Category::ClassTest => ct_pcts.push(component_pct(a, row)),
            Category::Midterm => mid = mid.or(Some(a)),
            Category::Final => fin = fin.or(Some(a)),
            Category::Presentation => pres = pres.or(Some(a)),
            Category::Assignment => assign = assign.or(Some(a)),
            Category::Attendance | Category::LabItem | Category::Other => {}
        }
    }

    // Best two class tests by percentage, averaged over however many exist.
    ct_pcts.sort_by(|a, b| b.partial_cmp(a).unwrap_or(Ordering::Equal));
    let best: &[f64] = &ct_pcts[..ct_pcts.len().min(2)];
    let ct_avg = if best.is_empty() {
        0.0
    } else {
        best.iter().sum::<f64>() / best.len() as f64
    };
    let ct_score = ct_avg * 15.0;

    let mid_score = mid.map(|a| component_pct(a, row) * 30.0).unwrap_or(0.0);
    let final_score = fin.map(|a| component_pct(a, row) * 40.0).unwrap_or(0.0);

    // Presentation and assignment split 10 points when both exist; a lone
    // one is worth the full 10.
    let pa_score = match (pres, assign) {
        (Some(p), Some(a)) => component_pct(p, row) * 5.0 + component_pct(a, row) * 5.0,
        (Some(p), None) => component_pct(p, row) * 10.0,
        (None, Some(a)) => component_pct(a, row) * 10.0,
        (None, None) => 0.0,
    };

    let total = ct_score + mid_score + final_score + pa_score + att;
    (
        round2(total),
        ComponentBreakdown {
            class_test: Some(round2(ct_score)),
            lab_work: None,
            midterm: round2(mid_score),
            final_exam: round2(final_score),
            presentation_assignment: Some(round2(pa_score)),
            attendance: round2(att),
        },
    )
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CalcWarning {
    pub code: String,
    pub assessment_id: String,
    pub message: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceState {
    Ok,
    Unavailable,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceStatus {
    pub marks: SourceState,
    pub attendance_summary: SourceState,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ColumnDef {
    pub assessment_id: String,
    pub name: String,
    pub full_marks: f64,
    pub category: Category,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentTotalRow {
    pub student_id: String,
    pub roll: String,
    pub name: String,
    pub total: f64,
    pub grade: String,
    pub breakdown: ComponentBreakdown,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClassStats {
    pub avg: f64,
    pub top: f64,
    pub pass_count: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseSummary {
    pub course_type: CourseType,
    pub columns: Vec<ColumnDef>,
    pub per_student: Vec<StudentTotalRow>,
    pub stats: ClassStats,
    pub sources: SourceStatus,
    pub warnings: Vec<CalcWarning>,
}

pub fn marks_by_student(marks: &[Mark]) -> HashMap<String, HashMap<String, f64>> {
    let mut by_student: HashMap<String, HashMap<String, f64>> = HashMap::new();
    for m in marks {
        by_student
            .entry(m.student_id.clone())
            .or_default()
            .insert(m.assessment_id.clone(), m.obtained_marks);
    }
    by_student
}

pub fn attendance_by_student(rows: &[AttendanceSummaryRow]) -> HashMap<String, AttendanceScore> {
    rows.iter()
        .map(|r| (r.student_id.clone(), attendance_score(r)))
        .collect()
}

/// Full course-summary view: totals, grades, breakdowns, class stats.
/// `marks` and `attendance` are independently optional; a missing source
/// zeroes its contribution and is reported in `sources` rather than failing
/// the computation.
pub fn compute_course_summary(
    course_type: CourseType,
    students: &[StudentRef],
    assessments: &[Assessment],
    marks: Option<&[Mark]>,
    attendance: Option<&[AttendanceSummaryRow]>,
) -> CourseSummary {
    let columns = order_columns(assessments);
    let by_student = marks.map(marks_by_student).unwrap_or_default();
    let att_scores = attendance.map(attendance_by_student).unwrap_or_default();

    let warnings: Vec<CalcWarning> = columns
        .iter()
        .filter(|a| a.full_marks <= 0.0)
        .map(|a| CalcWarning {
            code: "invalid_full_marks".to_string(),
            assessment_id: a.id.clone(),
            message: format!("assessment {:?} has non-positive full marks", a.name),
        })
        .collect();

    let empty_row: HashMap<String, f64> = HashMap::new();
    let mut per_student: Vec<StudentTotalRow> = Vec::with_capacity(students.len());
    for s in students {
        let row = by_student.get(&s.id).unwrap_or(&empty_row);
        let att5 = att_scores.get(&s.id).map(|a| a.marks as f64).unwrap_or(0.0);
        let (total, breakdown) = compute_student_total(course_type, &columns, row, att5);
        per_student.push(StudentTotalRow {
            student_id: s.id.clone(),
            roll: s.roll.clone(),
            name: s.name.clone(),
            total,
            grade: grade_from_total(total).to_string(),
            breakdown,
        });
    }

    let stats = class_stats(&per_student);
    let column_defs = columns
        .iter()
        .map(|a| ColumnDef {
            assessment_id: a.id.clone(),
            name: a.name.clone(),
            full_marks: a.full_marks,
            category: a.category_for(course_type),
        })
        .collect();

    CourseSummary {
        course_type,
        columns: column_defs,
        per_student,
        stats,
        sources: SourceStatus {
            marks: if marks.is_some() {
                SourceState::Ok
            } else {
                SourceState::Unavailable
            },
            attendance_summary: if attendance.is_some() {
                SourceState::Ok
            } else {
                SourceState::Unavailable
            },
        },
        warnings,
    }
}

pub fn class_stats(rows: &[StudentTotalRow]) -> ClassStats {
    if rows.is_empty() {
        return ClassStats {
            avg: 0.0,
            top: 0.0,
            pass_count: 0,
        };
    }
    let sum: f64 = rows.iter().map(|r| r.total).sum();
    let top = rows.iter().map(|r| r.total).fold(0.0_f64, f64::max);
    let pass_count = rows.iter().filter(|r| r.total >= PASS_THRESHOLD).count();
    ClassStats {
        avg: round2(sum / rows.len() as f64),
        top,
        pass_count,
    }
}
