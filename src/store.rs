//! Typed row structs and query helpers over the SQLite schema.
//!
//! The HTTP layer hard-codes a single default user (id 1); there is no
//! session or auth layer in front of these queries.

use rusqlite::{Connection, OptionalExtension, params};
use serde::Serialize;
use tracing::info;

use crate::error::Result;

pub const DEFAULT_USER_ID: i64 = 1;

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct UserPosition {
    pub id: i64,
    pub position_name: String,
    pub position_prefix: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub position: Option<String>,
    pub position_prefix: Option<String>,
}

impl User {
    /// The `[PREFIX]` tag prepended to activity titles, or empty.
    pub fn activity_prefix(&self) -> String {
        match self.position_prefix.as_deref() {
            Some(p) if !p.is_empty() => format!("[{p}]"),
            _ => String::new(),
        }
    }

    /// Prepend the position prefix unless the title is already tagged.
    pub fn format_activity_title(&self, title: &str) -> String {
        let prefix = self.activity_prefix();
        if !prefix.is_empty() && !title.starts_with('[') {
            format!("{prefix} {title}")
        } else {
            title.to_string()
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Project {
    pub id: i64,
    pub taiga_project_id: i64,
    pub name: String,
    pub slug: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub hours_spent: f64,
    pub activity_date: String,
    pub ai_generated: bool,
    pub submitted_to_taiga: bool,
    pub created_at: String,
    pub user_position: Option<String>,
    pub position_prefix: Option<String>,
}

/// Fields for inserting a new activity row.
#[derive(Debug, Clone)]
pub struct NewActivity {
    pub user_id: i64,
    pub project_id: Option<i64>,
    pub title: String,
    pub description: String,
    pub hours_spent: f64,
    pub activity_date: String,
    pub ai_generated: bool,
    pub ai_model_used: Option<String>,
    pub user_prompt: Option<String>,
    pub submitted_to_taiga: bool,
    pub taiga_activity_id: Option<i64>,
    pub taiga_submission_error: Option<String>,
}

// ---------------------------------------------------------------------------
// Positions
// ---------------------------------------------------------------------------

pub fn list_active_positions(conn: &Connection) -> Result<Vec<UserPosition>> {
    let mut stmt = conn.prepare(
        "SELECT id, position_name, position_prefix, description
         FROM user_positions WHERE is_active = 1 ORDER BY id",
    )?;
    let rows = stmt.query_map([], position_from_row)?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

pub fn get_position(conn: &Connection, id: i64) -> Result<Option<UserPosition>> {
    let pos = conn
        .query_row(
            "SELECT id, position_name, position_prefix, description
             FROM user_positions WHERE id = ?1",
            [id],
            position_from_row,
        )
        .optional()?;
    Ok(pos)
}

pub fn position_exists(conn: &Connection, name: &str) -> Result<bool> {
    let count: i64 = conn.query_row(
        "SELECT COUNT(*) FROM user_positions WHERE position_name = ?1",
        [name],
        |row| row.get(0),
    )?;
    Ok(count > 0)
}

pub fn add_position(
    conn: &Connection,
    name: &str,
    prefix: &str,
    description: &str,
) -> Result<UserPosition> {
    conn.execute(
        "INSERT INTO user_positions (position_name, position_prefix, description)
         VALUES (?1, ?2, ?3)",
        params![name, prefix, description],
    )?;
    Ok(UserPosition {
        id: conn.last_insert_rowid(),
        position_name: name.to_string(),
        position_prefix: prefix.to_string(),
        description: if description.is_empty() {
            None
        } else {
            Some(description.to_string())
        },
    })
}

/// Populate the default position catalogue. Idempotent; returns the number
/// of rows actually inserted.
pub fn seed_positions(conn: &Connection) -> Result<usize> {
    const POSITIONS: &[(&str, &str)] = &[
        // Development
        ("Frontend Developer", "FE"),
        ("Backend Developer", "BE"),
        ("Full Stack Developer", "FS"),
        ("Mobile Developer", "MD"),
        ("DevOps Engineer", "DO"),
        // Design & UX
        ("UI/UX Designer", "UX"),
        ("Graphic Designer", "GD"),
        ("Product Designer", "PD"),
        // Management & leadership
        ("Project Manager", "PM"),
        ("Product Manager", "PDM"),
        ("Tech Lead", "TL"),
        ("Engineering Manager", "EM"),
        ("Scrum Master", "SM"),
        // Quality assurance
        ("QA Engineer", "QA"),
        ("Test Automation Engineer", "TAE"),
        ("QA Lead", "QAL"),
        // Data & analytics
        ("Data Analyst", "DA"),
        ("Data Engineer", "DE"),
        ("Data Scientist", "DS"),
        ("Business Intelligence", "BI"),
        // Security & infrastructure
        ("Security Engineer", "SE"),
        ("System Administrator", "SA"),
        ("Cloud Engineer", "CE"),
        ("Site Reliability Engineer", "SRE"),
        // Business & strategy
        ("Business Analyst", "BA"),
        ("Product Owner", "PO"),
        ("Solution Architect", "ARCH"),
        ("Technical Writer", "TW"),
        // Customer & support
        ("Customer Success", "CS"),
        ("Technical Support", "TS"),
        ("Sales Engineer", "SEN"),
    ];

    let mut added = 0;
    for (name, prefix) in POSITIONS {
        let inserted = conn.execute(
            "INSERT OR IGNORE INTO user_positions (position_name, position_prefix)
             VALUES (?1, ?2)",
            params![name, prefix],
        )?;
        added += inserted;
    }
    info!(added, "position catalogue seeded");
    Ok(added)
}

// ---------------------------------------------------------------------------
// Users
// ---------------------------------------------------------------------------

pub fn get_user(conn: &Connection, id: i64) -> Result<Option<User>> {
    let user = conn
        .query_row(
            "SELECT id, username, email, position, position_prefix
             FROM users WHERE id = ?1",
            [id],
            user_from_row,
        )
        .optional()?;
    Ok(user)
}

/// Fetch the default user, creating it if it does not exist yet.
pub fn ensure_default_user(conn: &Connection) -> Result<User> {
    if let Some(user) = get_user(conn, DEFAULT_USER_ID)? {
        return Ok(user);
    }
    conn.execute(
        "INSERT INTO users (id, username, email) VALUES (?1, 'default_user', 'user@example.com')",
        [DEFAULT_USER_ID],
    )?;
    Ok(User {
        id: DEFAULT_USER_ID,
        username: "default_user".to_string(),
        email: "user@example.com".to_string(),
        position: None,
        position_prefix: None,
    })
}

pub fn set_user_position(
    conn: &Connection,
    user_id: i64,
    position: &UserPosition,
) -> Result<User> {
    if get_user(conn, user_id)?.is_none() {
        ensure_default_user(conn)?;
    }
    conn.execute(
        "UPDATE users SET position_id = ?1, position = ?2, position_prefix = ?3 WHERE id = ?4",
        params![
            position.id,
            position.position_name,
            position.position_prefix,
            user_id
        ],
    )?;
    // The row exists after ensure_default_user
    get_user(conn, user_id)?
        .ok_or(crate::error::WrittenError::Database(
            rusqlite::Error::QueryReturnedNoRows,
        ))
}

// ---------------------------------------------------------------------------
// Projects & activities
// ---------------------------------------------------------------------------

pub fn find_project_by_taiga_id(conn: &Connection, taiga_id: i64) -> Result<Option<Project>> {
    let project = conn
        .query_row(
            "SELECT id, taiga_project_id, name, slug FROM projects WHERE taiga_project_id = ?1",
            [taiga_id],
            |row| {
                Ok(Project {
                    id: row.get(0)?,
                    taiga_project_id: row.get(1)?,
                    name: row.get(2)?,
                    slug: row.get(3)?,
                })
            },
        )
        .optional()?;
    Ok(project)
}

pub fn insert_activity(conn: &Connection, activity: &NewActivity) -> Result<i64> {
    conn.execute(
        "INSERT INTO activities (
            user_id, project_id, title, description, hours_spent, activity_date,
            ai_generated, ai_model_used, user_prompt,
            submitted_to_taiga, taiga_activity_id, taiga_submission_error
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            activity.user_id,
            activity.project_id,
            activity.title,
            activity.description,
            activity.hours_spent,
            activity.activity_date,
            activity.ai_generated,
            activity.ai_model_used,
            activity.user_prompt,
            activity.submitted_to_taiga,
            activity.taiga_activity_id,
            activity.taiga_submission_error,
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn recent_activities(
    conn: &Connection,
    project_id: Option<i64>,
    limit: usize,
) -> Result<Vec<Activity>> {
    let sql = "
        SELECT a.id, a.title, a.description, a.hours_spent, a.activity_date,
               a.ai_generated, a.submitted_to_taiga, a.created_at,
               u.position, u.position_prefix
        FROM activities a
        LEFT JOIN users u ON u.id = a.user_id
        WHERE (?1 IS NULL OR a.project_id = ?1)
        ORDER BY a.created_at DESC
        LIMIT ?2";
    let mut stmt = conn.prepare(sql)?;
    let rows = stmt.query_map(params![project_id, limit as i64], |row| {
        Ok(Activity {
            id: row.get(0)?,
            title: row.get(1)?,
            description: row.get(2)?,
            hours_spent: row.get(3)?,
            activity_date: row.get(4)?,
            ai_generated: row.get(5)?,
            submitted_to_taiga: row.get(6)?,
            created_at: row.get(7)?,
            user_position: row.get(8)?,
            position_prefix: row.get(9)?,
        })
    })?;
    Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
}

// ---------------------------------------------------------------------------
// Row mappers
// ---------------------------------------------------------------------------

fn position_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<UserPosition> {
    Ok(UserPosition {
        id: row.get(0)?,
        position_name: row.get(1)?,
        position_prefix: row.get(2)?,
        description: row.get(3)?,
    })
}

fn user_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        position: row.get(3)?,
        position_prefix: row.get(4)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rusqlite::Connection;

    fn conn() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch("PRAGMA foreign_keys = ON;").unwrap();
        crate::db::migrate(&conn).unwrap();
        conn
    }

    #[test]
    fn seed_positions_is_idempotent() {
        let conn = conn();
        let added = seed_positions(&conn).unwrap();
        assert_eq!(added, 31);
        let added_again = seed_positions(&conn).unwrap();
        assert_eq!(added_again, 0);
        assert_eq!(list_active_positions(&conn).unwrap().len(), 31);
    }

    #[test]
    fn ensure_default_user_creates_once() {
        let conn = conn();
        let user = ensure_default_user(&conn).unwrap();
        assert_eq!(user.id, DEFAULT_USER_ID);
        assert_eq!(user.username, "default_user");
        let again = ensure_default_user(&conn).unwrap();
        assert_eq!(again.id, user.id);
    }

    #[test]
    fn set_user_position_creates_missing_user() {
        let conn = conn();
        let pos = add_position(&conn, "Backend Developer", "BE", "").unwrap();
        let user = set_user_position(&conn, DEFAULT_USER_ID, &pos).unwrap();
        assert_eq!(user.position.as_deref(), Some("Backend Developer"));
        assert_eq!(user.position_prefix.as_deref(), Some("BE"));
    }

    #[test]
    fn activity_prefix_formatting() {
        let user = User {
            id: 1,
            username: "u".into(),
            email: String::new(),
            position: Some("Backend Developer".into()),
            position_prefix: Some("BE".into()),
        };
        assert_eq!(user.activity_prefix(), "[BE]");
        assert_eq!(user.format_activity_title("Fix login"), "[BE] Fix login");
        // Already tagged titles are left alone
        assert_eq!(user.format_activity_title("[QA] Fix login"), "[QA] Fix login");
    }

    #[test]
    fn activity_prefix_empty_without_position() {
        let user = User {
            id: 1,
            username: "u".into(),
            email: String::new(),
            position: None,
            position_prefix: None,
        };
        assert_eq!(user.activity_prefix(), "");
        assert_eq!(user.format_activity_title("Fix login"), "Fix login");
    }

    #[test]
    fn insert_and_list_activities() {
        let conn = conn();
        ensure_default_user(&conn).unwrap();
        let id = insert_activity(
            &conn,
            &NewActivity {
                user_id: DEFAULT_USER_ID,
                project_id: None,
                title: "[BE] Fixed login".into(),
                description: "Fixed authentication bug in login module".into(),
                hours_spent: 4.5,
                activity_date: "2024-01-15".into(),
                ai_generated: true,
                ai_model_used: Some("gemini-2.5-flash".into()),
                user_prompt: Some("fix login".into()),
                submitted_to_taiga: false,
                taiga_activity_id: None,
                taiga_submission_error: None,
            },
        )
        .unwrap();
        assert!(id > 0);

        let activities = recent_activities(&conn, None, 20).unwrap();
        assert_eq!(activities.len(), 1);
        assert_eq!(activities[0].title, "[BE] Fixed login");
        assert!(activities[0].ai_generated);
        assert!(!activities[0].submitted_to_taiga);
    }

    #[test]
    fn recent_activities_filters_by_project() {
        let conn = conn();
        ensure_default_user(&conn).unwrap();
        conn.execute(
            "INSERT INTO projects (taiga_project_id, name, slug) VALUES (123, 'Alpha', 'alpha')",
            [],
        )
        .unwrap();
        let project = find_project_by_taiga_id(&conn, 123).unwrap().unwrap();
        assert_eq!(project.name, "Alpha");

        let mut base = NewActivity {
            user_id: DEFAULT_USER_ID,
            project_id: Some(project.id),
            title: "a".into(),
            description: "d".into(),
            hours_spent: 1.0,
            activity_date: "2024-01-15".into(),
            ai_generated: false,
            ai_model_used: None,
            user_prompt: None,
            submitted_to_taiga: false,
            taiga_activity_id: None,
            taiga_submission_error: None,
        };
        insert_activity(&conn, &base).unwrap();
        base.project_id = None;
        insert_activity(&conn, &base).unwrap();

        assert_eq!(recent_activities(&conn, Some(project.id), 20).unwrap().len(), 1);
        assert_eq!(recent_activities(&conn, None, 20).unwrap().len(), 2);
    }
}
