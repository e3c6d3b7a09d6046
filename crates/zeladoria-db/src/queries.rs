use crate::models::{Ballot, IssueRow, IssueTypeRow, NewIssue, NewIssueType, PhotoRow, UserRow};
use crate::Database;
use anyhow::Result;
use rusqlite::{Connection, Row};
use tracing::info;
use zeladoria_types::models::IssueStatus;

/// Citizen validations needed before an issue is archived automatically.
pub const ARCHIVE_AFTER_VALIDATIONS: i64 = 3;

const USER_COLUMNS: &str = "id, email, password_hash, role, active, created_at";

const ISSUE_COLUMNS: &str = "id, type_key, description, lat, lng, status, confirmations, \
     citizen_validations, authority_note, reporter_id, created_at";

impl Database {
    // -- Users --

    pub fn create_user(&self, email: &str, password_hash: &str, role: &str, active: bool) -> Result<i64> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (email, password_hash, role, active) VALUES (?1, ?2, ?3, ?4)",
                rusqlite::params![email, password_hash, role, active],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email = ?1", email))
    }

    pub fn get_user_by_id(&self, id: i64) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id = ?1", id))
    }

    /// Returns false when no user has that id.
    pub fn set_user_active(&self, id: i64, active: bool) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET active = ?2 WHERE id = ?1",
                rusqlite::params![id, active],
            )?;
            Ok(changed > 0)
        })
    }

    pub fn count_users_with_role(&self, role: &str) -> Result<i64> {
        self.with_conn(|conn| {
            Ok(conn.query_row("SELECT COUNT(*) FROM users WHERE role = ?1", [role], |r| r.get(0))?)
        })
    }

    // -- Issue types --

    pub fn list_issue_types(&self) -> Result<Vec<IssueTypeRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, key, title, category, icon FROM issue_types ORDER BY category, title",
            )?;
            let rows = stmt
                .query_map([], issue_type_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    pub fn get_issue_type_by_key(&self, key: &str) -> Result<Option<IssueTypeRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, key, title, category, icon FROM issue_types WHERE key = ?1",
                [key],
                issue_type_from_row,
            )
            .optional()
        })
    }

    pub fn create_issue_type(&self, new: &NewIssueType<'_>) -> Result<i64> {
        self.with_conn(|conn| insert_issue_type(conn, new))
    }

    pub fn delete_issue_type(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM issue_types WHERE id = ?1", [id])? > 0))
    }

    pub fn count_issue_types(&self) -> Result<i64> {
        self.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM issue_types", [], |r| r.get(0))?))
    }

    // -- Issues --

    /// Insert an issue with its photos. The reporter's submission counts as
    /// their vote, matching the initial confirmation count of 1.
    pub fn create_issue(&self, new: &NewIssue<'_>) -> Result<i64> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO issues (type_key, description, lat, lng, status, reporter_id)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                rusqlite::params![
                    new.type_key,
                    new.description,
                    new.lat,
                    new.lng,
                    IssueStatus::Open.as_str(),
                    new.reporter_id,
                ],
            )?;
            let issue_id = tx.last_insert_rowid();

            tx.execute(
                "INSERT INTO issue_votes (issue_id, user_id) VALUES (?1, ?2)",
                rusqlite::params![issue_id, new.reporter_id],
            )?;
            for url in new.photo_urls {
                tx.execute(
                    "INSERT INTO photos (url, issue_id) VALUES (?1, ?2)",
                    rusqlite::params![url, issue_id],
                )?;
            }

            tx.commit()?;
            Ok(issue_id)
        })
    }

    pub fn get_issue(&self, id: i64) -> Result<Option<IssueRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                &format!("SELECT {ISSUE_COLUMNS} FROM issues WHERE id = ?1"),
                [id],
                issue_from_row,
            )
            .optional()
        })
    }

    /// Newest first. `None` filters match everything.
    pub fn list_issues(&self, status: Option<&str>, type_key: Option<&str>) -> Result<Vec<IssueRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {ISSUE_COLUMNS} FROM issues
                 WHERE (?1 IS NULL OR status = ?1)
                   AND (?2 IS NULL OR type_key = ?2)
                 ORDER BY created_at DESC, id DESC"
            ))?;
            let rows = stmt
                .query_map(rusqlite::params![status, type_key], issue_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// One confirmation per user per issue.
    pub fn record_vote(&self, issue_id: i64, user_id: i64) -> Result<Ballot> {
        self.with_conn_mut(|conn| {
            cast_ballot(
                conn,
                issue_id,
                user_id,
                "INSERT OR IGNORE INTO issue_votes (issue_id, user_id) VALUES (?1, ?2)",
                "UPDATE issues SET confirmations = confirmations + 1
                 WHERE id = ?1
                 RETURNING confirmations, status",
                rusqlite::params![],
            )
        })
    }

    /// One validation per user per issue. Reaching [`ARCHIVE_AFTER_VALIDATIONS`]
    /// archives the issue whatever its current status.
    pub fn record_validation(&self, issue_id: i64, user_id: i64) -> Result<Ballot> {
        let ballot = self.with_conn_mut(|conn| {
            cast_ballot(
                conn,
                issue_id,
                user_id,
                "INSERT OR IGNORE INTO issue_validations (issue_id, user_id) VALUES (?1, ?2)",
                "UPDATE issues SET
                     citizen_validations = citizen_validations + 1,
                     status = CASE WHEN citizen_validations + 1 >= ?2 THEN ?3 ELSE status END
                 WHERE id = ?1
                 RETURNING citizen_validations, status",
                rusqlite::params![ARCHIVE_AFTER_VALIDATIONS, IssueStatus::Archived.as_str()],
            )
        })?;

        if let Ballot::Counted { total, .. } = &ballot {
            if *total == ARCHIVE_AFTER_VALIDATIONS {
                info!("Issue {} archived after {} citizen validations", issue_id, total);
            }
        }
        Ok(ballot)
    }

    /// Sets the status and, when given, replaces the authority note.
    /// Returns false when no issue has that id.
    pub fn update_issue_status(&self, id: i64, status: IssueStatus, note: Option<&str>) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE issues SET status = ?2, authority_note = COALESCE(?3, authority_note)
                 WHERE id = ?1",
                rusqlite::params![id, status.as_str(), note],
            )?;
            Ok(changed > 0)
        })
    }

    /// Photos and ballots go with it via ON DELETE CASCADE.
    pub fn delete_issue(&self, id: i64) -> Result<bool> {
        self.with_conn(|conn| Ok(conn.execute("DELETE FROM issues WHERE id = ?1", [id])? > 0))
    }

    // -- Photos --

    /// Returns `None` when the issue does not exist.
    pub fn add_photo(&self, issue_id: i64, url: &str) -> Result<Option<i64>> {
        self.with_conn(|conn| {
            let exists: Option<i64> = conn
                .query_row("SELECT id FROM issues WHERE id = ?1", [issue_id], |r| r.get(0))
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }
            conn.execute(
                "INSERT INTO photos (url, issue_id) VALUES (?1, ?2)",
                rusqlite::params![url, issue_id],
            )?;
            Ok(Some(conn.last_insert_rowid()))
        })
    }

    /// Batch-fetch photos for a set of issue IDs.
    pub fn get_photos_for_issues(&self, issue_ids: &[i64]) -> Result<Vec<PhotoRow>> {
        if issue_ids.is_empty() {
            return Ok(vec![]);
        }

        self.with_conn(|conn| {
            let placeholders: Vec<String> = (1..=issue_ids.len()).map(|i| format!("?{}", i)).collect();
            let sql = format!(
                "SELECT id, url, issue_id FROM photos WHERE issue_id IN ({}) ORDER BY id",
                placeholders.join(", ")
            );

            let mut stmt = conn.prepare(&sql)?;
            let params: Vec<&dyn rusqlite::types::ToSql> = issue_ids
                .iter()
                .map(|id| id as &dyn rusqlite::types::ToSql)
                .collect();

            let rows = stmt
                .query_map(params.as_slice(), |row| {
                    Ok(PhotoRow {
                        id: row.get(0)?,
                        url: row.get(1)?,
                        issue_id: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }
}

pub(crate) fn insert_issue_type(conn: &Connection, new: &NewIssueType<'_>) -> Result<i64> {
    conn.execute(
        "INSERT INTO issue_types (key, title, category, icon) VALUES (?1, ?2, ?3, ?4)",
        (new.key, new.title, new.category, new.icon),
    )?;
    Ok(conn.last_insert_rowid())
}

fn cast_ballot(
    conn: &mut Connection,
    issue_id: i64,
    user_id: i64,
    insert_sql: &str,
    bump_sql: &str,
    extra: &[&dyn rusqlite::types::ToSql],
) -> Result<Ballot> {
    let tx = conn.transaction()?;

    let exists: Option<i64> = tx
        .query_row("SELECT id FROM issues WHERE id = ?1", [issue_id], |r| r.get(0))
        .optional()?;
    if exists.is_none() {
        return Ok(Ballot::Missing);
    }

    if tx.execute(insert_sql, rusqlite::params![issue_id, user_id])? == 0 {
        return Ok(Ballot::Duplicate);
    }

    let mut params: Vec<&dyn rusqlite::types::ToSql> = Vec::with_capacity(1 + extra.len());
    params.push(&issue_id);
    params.extend_from_slice(extra);
    let (total, status): (i64, String) =
        tx.query_row(bump_sql, params.as_slice(), |r| Ok((r.get(0)?, r.get(1)?)))?;

    tx.commit()?;
    Ok(Ballot::Counted { total, status })
}

fn query_user<P: rusqlite::ToSql>(conn: &Connection, predicate: &str, value: P) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(&format!("SELECT {USER_COLUMNS} FROM users WHERE {predicate}"))?;

    let row = stmt
        .query_row([value], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                email: row.get(1)?,
                password_hash: row.get(2)?,
                role: row.get(3)?,
                active: row.get(4)?,
                created_at: row.get(5)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn issue_type_from_row(row: &Row<'_>) -> rusqlite::Result<IssueTypeRow> {
    Ok(IssueTypeRow {
        id: row.get(0)?,
        key: row.get(1)?,
        title: row.get(2)?,
        category: row.get(3)?,
        icon: row.get(4)?,
    })
}

fn issue_from_row(row: &Row<'_>) -> rusqlite::Result<IssueRow> {
    Ok(IssueRow {
        id: row.get(0)?,
        type_key: row.get(1)?,
        description: row.get(2)?,
        lat: row.get(3)?,
        lng: row.get(4)?,
        status: row.get(5)?,
        confirmations: row.get(6)?,
        citizen_validations: row.get(7)?,
        authority_note: row.get(8)?,
        reporter_id: row.get(9)?,
        created_at: row.get(10)?,
    })
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::is_unique_violation;

    fn db() -> Database {
        Database::open_in_memory().unwrap()
    }

    fn citizen(db: &Database, email: &str) -> i64 {
        db.create_user(email, "hash", "cidadao", true).unwrap()
    }

    fn pothole(db: &Database, reporter_id: i64, photos: &[String]) -> i64 {
        db.create_issue(&NewIssue {
            type_key: "buraco",
            description: "Buraco enorme na esquina",
            lat: -23.55,
            lng: -46.63,
            reporter_id,
            photo_urls: photos,
        })
        .unwrap()
    }

    #[test]
    fn duplicate_email_is_a_unique_violation() {
        let db = db();
        citizen(&db, "ana@example.com");
        let err = db.create_user("ana@example.com", "other", "cidadao", true).unwrap_err();
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn foreign_key_failure_is_not_a_unique_violation() {
        let db = db();
        let ana = citizen(&db, "ana@example.com");
        let id = pothole(&db, ana, &[]);

        let err = db.record_vote(id, ana + 100).unwrap_err();
        assert!(!is_unique_violation(&err));
    }

    #[test]
    fn user_lookup_and_activation() {
        let db = db();
        let id = db.create_user("fiscal@prefeitura.gov", "hash", "prefeitura", false).unwrap();

        let user = db.get_user_by_email("fiscal@prefeitura.gov").unwrap().unwrap();
        assert_eq!(user.id, id);
        assert_eq!(user.role, "prefeitura");
        assert!(!user.active);

        assert!(db.set_user_active(id, true).unwrap());
        assert!(db.get_user_by_id(id).unwrap().unwrap().active);
        assert!(!db.set_user_active(id + 100, true).unwrap());
        assert!(db.get_user_by_email("nobody@example.com").unwrap().is_none());
    }

    #[test]
    fn new_issue_starts_open_with_one_confirmation() {
        let db = db();
        let reporter = citizen(&db, "ana@example.com");
        let id = pothole(&db, reporter, &[]);

        let issue = db.get_issue(id).unwrap().unwrap();
        assert_eq!(issue.status, "aberto");
        assert_eq!(issue.confirmations, 1);
        assert_eq!(issue.citizen_validations, 0);
        assert_eq!(issue.authority_note, None);
        assert_eq!(issue.reporter_id, Some(reporter));
    }

    #[test]
    fn each_vote_adds_exactly_one() {
        let db = db();
        let reporter = citizen(&db, "ana@example.com");
        let id = pothole(&db, reporter, &[]);

        for (n, email) in ["b@example.com", "c@example.com", "d@example.com"].iter().enumerate() {
            let voter = citizen(&db, email);
            match db.record_vote(id, voter).unwrap() {
                Ballot::Counted { total, .. } => assert_eq!(total, 2 + n as i64),
                other => panic!("unexpected {:?}", other),
            }
        }
        assert_eq!(db.get_issue(id).unwrap().unwrap().confirmations, 4);
    }

    #[test]
    fn repeat_vote_is_rejected() {
        let db = db();
        let reporter = citizen(&db, "ana@example.com");
        let voter = citizen(&db, "bruno@example.com");
        let id = pothole(&db, reporter, &[]);

        assert_eq!(db.record_vote(id, reporter).unwrap(), Ballot::Duplicate);
        assert!(matches!(db.record_vote(id, voter).unwrap(), Ballot::Counted { total: 2, .. }));
        assert_eq!(db.record_vote(id, voter).unwrap(), Ballot::Duplicate);
        assert_eq!(db.get_issue(id).unwrap().unwrap().confirmations, 2);
        assert_eq!(db.record_vote(id + 1, voter).unwrap(), Ballot::Missing);
    }

    #[test]
    fn third_validation_archives() {
        let db = db();
        let reporter = citizen(&db, "ana@example.com");
        let id = pothole(&db, reporter, &[]);
        db.update_issue_status(id, IssueStatus::Resolved, None).unwrap();

        let voters: Vec<i64> = ["b@x.com", "c@x.com", "d@x.com"].iter().map(|e| citizen(&db, e)).collect();

        db.record_validation(id, voters[0]).unwrap();
        let second = db.record_validation(id, voters[1]).unwrap();
        assert_eq!(
            second,
            Ballot::Counted { total: 2, status: "resolvido".into() }
        );
        assert_eq!(db.get_issue(id).unwrap().unwrap().status, "resolvido");

        let third = db.record_validation(id, voters[2]).unwrap();
        assert_eq!(
            third,
            Ballot::Counted { total: 3, status: "arquivado".into() }
        );
    }

    #[test]
    fn validation_archives_from_any_status() {
        let db = db();
        let reporter = citizen(&db, "ana@example.com");
        let id = pothole(&db, reporter, &[]);

        for email in ["b@x.com", "c@x.com", "d@x.com"] {
            let voter = citizen(&db, email);
            db.record_validation(id, voter).unwrap();
        }
        let issue = db.get_issue(id).unwrap().unwrap();
        assert_eq!(issue.status, "arquivado");
        assert_eq!(issue.citizen_validations, 3);
        assert_eq!(db.record_validation(id, reporter).unwrap(), Ballot::Counted {
            total: 4,
            status: "arquivado".into(),
        });
        assert_eq!(db.record_validation(id, reporter).unwrap(), Ballot::Duplicate);
    }

    #[test]
    fn status_update_keeps_note_unless_replaced() {
        let db = db();
        let reporter = citizen(&db, "ana@example.com");
        let id = pothole(&db, reporter, &[]);

        assert!(db.update_issue_status(id, IssueStatus::InReview, Some("Equipe enviada")).unwrap());
        assert!(db.update_issue_status(id, IssueStatus::Resolved, None).unwrap());
        let issue = db.get_issue(id).unwrap().unwrap();
        assert_eq!(issue.status, "resolvido");
        assert_eq!(issue.authority_note.as_deref(), Some("Equipe enviada"));

        assert!(db.update_issue_status(id, IssueStatus::Open, None).unwrap());
        assert_eq!(db.get_issue(id).unwrap().unwrap().status, "aberto");
        assert!(!db.update_issue_status(id + 1, IssueStatus::Open, None).unwrap());
    }

    #[test]
    fn deleting_issue_removes_its_photos() {
        let db = db();
        let reporter = citizen(&db, "ana@example.com");
        let photos = vec!["https://img.example.com/1.jpg".to_string()];
        let doomed = pothole(&db, reporter, &photos);
        let kept = pothole(&db, reporter, &[]);
        db.add_photo(doomed, "https://img.example.com/2.jpg").unwrap().unwrap();
        db.add_photo(kept, "https://img.example.com/3.jpg").unwrap().unwrap();

        assert_eq!(db.get_photos_for_issues(&[doomed]).unwrap().len(), 2);
        assert!(db.delete_issue(doomed).unwrap());
        assert!(db.get_issue(doomed).unwrap().is_none());
        assert!(db.get_photos_for_issues(&[doomed]).unwrap().is_empty());
        assert_eq!(db.get_photos_for_issues(&[kept]).unwrap().len(), 1);
        assert!(!db.delete_issue(doomed).unwrap());
    }

    #[test]
    fn photo_on_missing_issue_is_none() {
        let db = db();
        assert_eq!(db.add_photo(42, "https://img.example.com/x.jpg").unwrap(), None);
    }

    #[test]
    fn list_filters_by_status_and_type() {
        let db = db();
        let reporter = citizen(&db, "ana@example.com");
        let a = pothole(&db, reporter, &[]);
        let b = db
            .create_issue(&NewIssue {
                type_key: "luz_queimada",
                description: "Poste apagado",
                lat: 0.0,
                lng: 0.0,
                reporter_id: reporter,
                photo_urls: &[],
            })
            .unwrap();
        db.update_issue_status(a, IssueStatus::Archived, None).unwrap();

        let all: Vec<i64> = db.list_issues(None, None).unwrap().iter().map(|i| i.id).collect();
        assert_eq!(all, vec![b, a]);

        let archived = db.list_issues(Some("arquivado"), None).unwrap();
        assert_eq!(archived.len(), 1);
        assert_eq!(archived[0].id, a);

        let lights = db.list_issues(None, Some("luz_queimada")).unwrap();
        assert_eq!(lights.len(), 1);
        assert_eq!(lights[0].id, b);

        assert!(db.list_issues(Some("aberto"), Some("buraco")).unwrap().is_empty());
    }

    #[test]
    fn issue_type_key_is_unique() {
        let db = db();
        let new = NewIssueType { key: "entulho", title: "Entulho", category: "Limpeza", icon: "" };
        let id = db.create_issue_type(&new).unwrap();
        let err = db.create_issue_type(&new).unwrap_err();
        assert!(is_unique_violation(&err));

        assert_eq!(db.get_issue_type_by_key("entulho").unwrap().unwrap().id, id);
        assert!(db.delete_issue_type(id).unwrap());
        assert!(!db.delete_issue_type(id).unwrap());
        assert!(db.get_issue_type_by_key("entulho").unwrap().is_none());
    }
}
