//! Database row types. These map directly to SQLite rows and stay independent
//! of the zeladoria-types API models; enums are kept as their stored text.

pub struct UserRow {
    pub id: i64,
    pub email: String,
    pub password_hash: String,
    pub role: String,
    pub active: bool,
    pub created_at: String,
}

pub struct IssueTypeRow {
    pub id: i64,
    pub key: String,
    pub title: String,
    pub category: String,
    pub icon: String,
}

pub struct NewIssueType<'a> {
    pub key: &'a str,
    pub title: &'a str,
    pub category: &'a str,
    pub icon: &'a str,
}

pub struct IssueRow {
    pub id: i64,
    pub type_key: String,
    pub description: String,
    pub lat: f64,
    pub lng: f64,
    pub status: String,
    pub confirmations: i64,
    pub citizen_validations: i64,
    pub authority_note: Option<String>,
    pub reporter_id: Option<i64>,
    pub created_at: String,
}

pub struct NewIssue<'a> {
    pub type_key: &'a str,
    pub description: &'a str,
    pub lat: f64,
    pub lng: f64,
    pub reporter_id: i64,
    pub photo_urls: &'a [String],
}

#[derive(Debug, Clone, PartialEq)]
pub struct PhotoRow {
    pub id: i64,
    pub url: String,
    pub issue_id: i64,
}

/// Outcome of recording a per-user vote or validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ballot {
    /// No issue with that id.
    Missing,
    /// This user already cast one; counters untouched.
    Duplicate,
    /// Recorded. `total` is the counter after the increment.
    Counted { total: i64, status: String },
}
