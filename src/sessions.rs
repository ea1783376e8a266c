use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use uuid::Uuid;

use crate::calc::{round2, StudentRef};

pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Upper bound on periods created by one bulk request.
pub const BULK_MAX_PERIODS: i64 = 24;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionError {
    InvalidDate { date: String },
    InvalidPeriod { period: i64 },
    InvalidCount { count: i64 },
    Duplicate { date: NaiveDate, period: u32 },
    NotFound { date: NaiveDate, period: u32 },
}

impl SessionError {
    pub fn code(&self) -> &'static str {
        match self {
            SessionError::InvalidDate { .. }
            | SessionError::InvalidPeriod { .. }
            | SessionError::InvalidCount { .. } => "invalid_session",
            SessionError::Duplicate { .. } => "duplicate_session",
            SessionError::NotFound { .. } => "not_found",
        }
    }
}

impl fmt::Display for SessionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionError::InvalidDate { date } => {
                write!(f, "invalid session date: {:?} (expected YYYY-MM-DD)", date)
            }
            SessionError::InvalidPeriod { period } => {
                write!(f, "invalid period {} (must be >= 1)", period)
            }
            SessionError::InvalidCount { count } => {
                write!(f, "invalid class count {} (must be 1..={})", count, BULK_MAX_PERIODS)
            }
            SessionError::Duplicate { date, period } => {
                write!(f, "session already exists for {} period {}", date, period)
            }
            SessionError::NotFound { date, period } => {
                write!(f, "no session for {} period {}", date, period)
            }
        }
    }
}

impl std::error::Error for SessionError {}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PresenceRecord {
    pub student_id: String,
    #[serde(default)]
    pub present: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSession {
    pub date: String,
    pub period: i64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedRecord {
    pub student_id: String,
    pub session_key: String,
    #[serde(default)]
    pub present: bool,
}

pub fn session_key(date: NaiveDate, period: u32) -> String {
    format!("{}#{}", date.format(DATE_FORMAT), period)
}

fn parse_session_key(key: &str) -> Option<(NaiveDate, u32)> {
    let (date_part, period_part) = key.split_once('#')?;
    let date = NaiveDate::parse_from_str(date_part, DATE_FORMAT).ok()?;
    let period = period_part.parse::<u32>().ok().filter(|p| *p >= 1)?;
    Some((date, period))
}

/// One (date, period) class occurrence. Presence is stored sparsely: a
/// student id is in the set only if they were marked present.
#[derive(Debug, Clone)]
pub struct Session {
    pub id: String,
    pub date: NaiveDate,
    pub period: u32,
    present: HashSet<String>,
}

impl Session {
    fn new(date: NaiveDate, period: u32, records: &[PresenceRecord]) -> Session {
        Session {
            id: Uuid::new_v4().to_string(),
            date,
            period,
            present: collect_present(records),
        }
    }

    pub fn key(&self) -> String {
        session_key(self.date, self.period)
    }

    pub fn label(&self) -> String {
        format!("{} P{}", self.date.format(DATE_FORMAT), self.period)
    }

    pub fn is_present(&self, student_id: &str) -> bool {
        self.present.contains(student_id)
    }
}

fn collect_present(records: &[PresenceRecord]) -> HashSet<String> {
    records
        .iter()
        .filter(|r| r.present)
        .map(|r| r.student_id.clone())
        .collect()
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkOutcome {
    pub date: String,
    pub created_periods: Vec<u32>,
    pub skipped_periods: Vec<u32>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadReport {
    pub total_classes: usize,
    pub applied_records: usize,
    pub orphan_records: usize,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    pub id: String,
    pub key: String,
    pub label: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixRow {
    pub student_id: String,
    pub roll: String,
    pub name: String,
    pub present_count: usize,
    pub total_classes: usize,
    pub percentage: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MatrixModel {
    pub sessions: Vec<SessionInfo>,
    pub students: Vec<StudentRef>,
    pub matrix: HashMap<String, HashMap<String, bool>>,
    pub rows: Vec<MatrixRow>,
}

/// Per-course accumulator of attendance sessions, keyed by (date, period).
/// Sessions are never silently overwritten: single creation collides with
/// `Duplicate`, bulk creation skips and reports.
#[derive(Debug, Clone, Default)]
pub struct SessionLedger {
    sessions: BTreeMap<(NaiveDate, u32), Session>,
}

impl SessionLedger {
    pub fn new() -> SessionLedger {
        SessionLedger::default()
    }

    pub fn total_classes(&self) -> usize {
        self.sessions.len()
    }

    pub fn sessions(&self) -> impl Iterator<Item = &Session> {
        self.sessions.values()
    }

    fn parse_date(raw: &str) -> Result<NaiveDate, SessionError> {
        NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT).map_err(|_| SessionError::InvalidDate {
            date: raw.to_string(),
        })
    }

    fn validate_period(period: i64) -> Result<u32, SessionError> {
        if period < 1 || period > u32::MAX as i64 {
            return Err(SessionError::InvalidPeriod { period });
        }
        Ok(period as u32)
    }

    /// Single-session creation; the exact (date, period) must not exist yet.
    pub fn create(
        &mut self,
        date: &str,
        period: i64,
        records: &[PresenceRecord],
    ) -> Result<String, SessionError> {
        let date = Self::parse_date(date)?;
        let period = Self::validate_period(period)?;
        if self.sessions.contains_key(&(date, period)) {
            return Err(SessionError::Duplicate { date, period });
        }
        let session = Session::new(date, period, records);
        let key = session.key();
        self.sessions.insert((date, period), session);
        Ok(key)
    }

    /// Create `num_classes` consecutive periods on one date. Periods that
    /// already exist are skipped untouched and reported, so re-running a
    /// partially completed day is safe.
    pub fn create_bulk(
        &mut self,
        date: &str,
        start_period: i64,
        num_classes: i64,
        records: &[PresenceRecord],
    ) -> Result<BulkOutcome, SessionError> {
        let parsed = Self::parse_date(date)?;
        if start_period > u32::MAX as i64 - BULK_MAX_PERIODS {
            return Err(SessionError::InvalidPeriod {
                period: start_period,
            });
        }
        let start = Self::validate_period(start_period)?;
        if num_classes < 1 || num_classes > BULK_MAX_PERIODS {
            return Err(SessionError::InvalidCount { count: num_classes });
        }

        let mut created = Vec::new();
        let mut skipped = Vec::new();
        for offset in 0..num_classes as u32 {
            let period = start + offset;
            if self.sessions.contains_key(&(parsed, period)) {
                skipped.push(period);
                continue;
            }
            self.sessions
                .insert((parsed, period), Session::new(parsed, period, records));
            created.push(period);
        }

        Ok(BulkOutcome {
            date: parsed.format(DATE_FORMAT).to_string(),
            created_periods: created,
            skipped_periods: skipped,
        })
    }

    /// Replace the presence records of one existing session.
    pub fn update_records(
        &mut self,
        date: &str,
        period: i64,
        records: &[PresenceRecord],
    ) -> Result<String, SessionError> {
        let date = Self::parse_date(date)?;
        let period = Self::validate_period(period)?;
        let session = self
            .sessions
            .get_mut(&(date, period))
            .ok_or(SessionError::NotFound { date, period })?;
        session.present = collect_present(records);
        Ok(session.key())
    }

    /// Rebuild a ledger from already-fetched sessions and presence records.
    /// Records pointing at unknown session keys are counted as orphans and
    /// skipped; duplicate (date, period) seed sessions are rejected.
    pub fn from_seed(
        sessions: &[SeedSession],
        records: &[SeedRecord],
    ) -> Result<(SessionLedger, LoadReport), SessionError> {
        let mut ledger = SessionLedger::new();
        for s in sessions {
            ledger.create(&s.date, s.period, &[])?;
        }

        let mut applied = 0usize;
        let mut orphans = 0usize;
        for r in records {
            let Some((date, period)) = parse_session_key(&r.session_key) else {
                orphans += 1;
                continue;
            };
            let Some(session) = ledger.sessions.get_mut(&(date, period)) else {
                orphans += 1;
                continue;
            };
            if r.present {
                session.present.insert(r.student_id.clone());
            }
            applied += 1;
        }

        let report = LoadReport {
            total_classes: ledger.total_classes(),
            applied_records: applied,
            orphan_records: orphans,
        };
        Ok((ledger, report))
    }

    pub fn attended_count(&self, student_id: &str) -> usize {
        self.sessions
            .values()
            .filter(|s| s.is_present(student_id))
            .count()
    }

    /// Student ids seen in any presence set, sorted for determinism.
    pub fn observed_students(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .sessions
            .values()
            .flat_map(|s| s.present.iter().cloned())
            .collect::<HashSet<String>>()
            .into_iter()
            .collect();
        ids.sort();
        ids
    }

    /// Sparse presence matrix plus per-student aggregates, in the given
    /// student order. Only `true` cells appear in the matrix.
    pub fn matrix(&self, students: &[StudentRef]) -> MatrixModel {
        let total = self.total_classes();
        let sessions: Vec<SessionInfo> = self
            .sessions
            .values()
            .map(|s| SessionInfo {
                id: s.id.clone(),
                key: s.key(),
                label: s.label(),
            })
            .collect();

        let mut matrix: HashMap<String, HashMap<String, bool>> = HashMap::new();
        let mut rows: Vec<MatrixRow> = Vec::with_capacity(students.len());
        for student in students {
            let mut cells: HashMap<String, bool> = HashMap::new();
            let mut present_count = 0usize;
            for session in self.sessions.values() {
                if session.is_present(&student.id) {
                    cells.insert(session.key(), true);
                    present_count += 1;
                }
            }
            if !cells.is_empty() {
                matrix.insert(student.id.clone(), cells);
            }
            let percentage = if total > 0 {
                round2(present_count as f64 / total as f64 * 100.0)
            } else {
                0.0
            };
            rows.push(MatrixRow {
                student_id: student.id.clone(),
                roll: student.roll.clone(),
                name: student.name.clone(),
                present_count,
                total_classes: total,
                percentage,
            });
        }

        MatrixModel {
            sessions,
            students: students.to_vec(),
            matrix,
            rows,
        }
    }
}
