use anyhow::{Context, Result as AnyResult};
use chrono::{DateTime, NaiveDate, Utc};
use rusqlite::{params, Connection, ErrorCode, OptionalExtension};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::Path;

use crate::credentials::{default_credentials, CredentialSource};
use crate::entities::{
    Course, CourseCatalog, CourseLevel, EnrolledCourse, Enrollment, ManagedUser, NewUser, UserDirectory, UserStatus,
};
use crate::error::{RealtyError, Result};
use crate::session::{Identity, Role};
use crate::storage::KeyValueStore;
use crate::valuation::{PropertyInput, ValuationResult};

// ============================================================================
// SCHEMA
// ============================================================================

pub fn setup_database(conn: &Connection) -> AnyResult<()> {
    // Enable WAL mode for crash recovery
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;

    // ==========================================================================
    // Users (salted password hashes)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            salt TEXT NOT NULL,
            role TEXT NOT NULL,
            email TEXT UNIQUE,
            status TEXT NOT NULL DEFAULT 'active',
            created_at TEXT NOT NULL,
            last_login TEXT
        )",
        [],
    )?;

    // ==========================================================================
    // Courses + enrollments
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS courses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            title TEXT NOT NULL,
            description TEXT,
            instructor TEXT,
            category TEXT,
            duration INTEGER,  -- minutes
            level TEXT,
            price REAL,
            created_at TEXT NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            course_id INTEGER NOT NULL,
            total_lessons INTEGER NOT NULL DEFAULT 0,
            completed_lessons INTEGER NOT NULL DEFAULT 0,
            enrolled_at TEXT NOT NULL,
            last_accessed TEXT,
            UNIQUE (user_id, course_id),
            FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE,
            FOREIGN KEY (course_id) REFERENCES courses (id)
        )",
        [],
    )?;

    // ==========================================================================
    // Saved valuations
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS property_valuations (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            property_type TEXT NOT NULL,
            address TEXT NOT NULL,
            city TEXT NOT NULL,
            state TEXT NOT NULL,
            zip_code TEXT NOT NULL,
            bedrooms INTEGER,
            bathrooms REAL,
            square_feet REAL NOT NULL,
            year_built INTEGER NOT NULL,
            valuation_amount INTEGER NOT NULL,
            created_at TEXT NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users (id) ON DELETE CASCADE
        )",
        [],
    )?;

    // ==========================================================================
    // Key-value storage (persisted session identity)
    // ==========================================================================
    conn.execute(
        "CREATE TABLE IF NOT EXISTS kv_store (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )",
        [],
    )?;

    // ==========================================================================
    // Indexes
    // ==========================================================================
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_user ON enrollments(user_id)",
        [],
    )?;

    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_valuations_user ON property_valuations(user_id)",
        [],
    )?;

    Ok(())
}

/// Insert the demo accounts, course catalog and muser's enrollments when missing
pub fn seed_reference_data(conn: &Connection) -> AnyResult<()> {
    let now = Utc::now().to_rfc3339();

    for record in default_credentials() {
        let exists: i64 = conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            params![record.username],
            |row| row.get(0),
        )?;
        if exists == 0 {
            let salt = generate_salt();
            conn.execute(
                "INSERT INTO users (id, username, password_hash, salt, role, email, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.username,
                    hash_password(&record.password, &salt),
                    salt,
                    record.role.as_str(),
                    format!("{}@example.com", record.username),
                    now,
                ],
            )?;
        }
    }

    let course_count: i64 = conn.query_row("SELECT COUNT(*) FROM courses", [], |row| row.get(0))?;
    if course_count == 0 {
        for course in CourseCatalog::new().all_courses() {
            conn.execute(
                "INSERT INTO courses (id, title, description, instructor, category, duration, level, price, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                params![
                    course.id,
                    course.title,
                    course.description,
                    course.instructor,
                    course.category,
                    course.duration_hours * 60,
                    course.level.as_str(),
                    course.price,
                    now,
                ],
            )?;
        }

        for (course_id, total, completed) in [(1, 12, 9), (2, 10, 3), (3, 8, 1)] {
            conn.execute(
                "INSERT OR IGNORE INTO enrollments (user_id, course_id, total_lessons, completed_lessons, enrolled_at)
                 VALUES (1, ?1, ?2, ?3, ?4)",
                params![course_id, total, completed, now],
            )?;
        }
    }

    Ok(())
}

/// Open (creating if needed) the application database
pub fn open_database(path: &Path) -> AnyResult<Connection> {
    let conn = Connection::open(path).with_context(|| format!("Failed to open database {:?}", path))?;
    setup_database(&conn)?;
    seed_reference_data(&conn)?;
    Ok(conn)
}

// ============================================================================
// PASSWORDS
// ============================================================================

/// Hex SHA-256 of password followed by salt
pub fn hash_password(password: &str, salt: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher.update(salt.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// 32 random hex characters
pub fn generate_salt() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

// ============================================================================
// SQLITE CREDENTIALS
// ============================================================================

pub struct SqliteCredentials<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteCredentials<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteCredentials { conn }
    }
}

fn parse_role(raw: &str) -> Result<Role> {
    raw.parse::<Role>().map_err(RealtyError::Storage)
}

impl CredentialSource for SqliteCredentials<'_> {
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<Identity>> {
        let row = self
            .conn
            .query_row(
                "SELECT id, username, password_hash, salt, role FROM users WHERE username = ?1",
                params![username],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, String>(4)?,
                    ))
                },
            )
            .optional()?;

        let Some((id, username, password_hash, salt, role)) = row else {
            return Ok(None);
        };

        if hash_password(password, &salt) != password_hash {
            return Ok(None);
        }

        self.conn.execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![Utc::now().to_rfc3339(), id],
        )?;

        Ok(Some(Identity {
            id,
            username,
            role: parse_role(&role)?,
        }))
    }

    fn username_exists(&self, username: &str) -> Result<bool> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM users WHERE username = ?1",
            params![username],
            |row| row.get(0),
        )?;
        Ok(count > 0)
    }

    fn create_user(&self, username: &str, password: &str) -> Result<Option<Identity>> {
        let salt = generate_salt();
        let inserted = self.conn.execute(
            "INSERT INTO users (username, password_hash, salt, role, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                username,
                hash_password(password, &salt),
                salt,
                Role::User.as_str(),
                Utc::now().to_rfc3339()
            ],
        );

        match inserted {
            Ok(_) => Ok(Some(Identity {
                id: self.conn.last_insert_rowid(),
                username: username.to_string(),
                role: Role::User,
            })),
            Err(e) if is_constraint_violation(&e) => Err(RealtyError::UsernameTaken(username.to_string())),
            Err(e) => Err(e.into()),
        }
    }
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err, rusqlite::Error::SqliteFailure(e, _) if e.code == ErrorCode::ConstraintViolation)
}

// ============================================================================
// SQLITE KEY-VALUE STORE
// ============================================================================

pub struct SqliteStore<'a> {
    conn: &'a Connection,
}

impl<'a> SqliteStore<'a> {
    pub fn new(conn: &'a Connection) -> Self {
        SqliteStore { conn }
    }
}

impl KeyValueStore for SqliteStore<'_> {
    fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self
            .conn
            .query_row("SELECT value FROM kv_store WHERE key = ?1", params![key], |row| row.get(0))
            .optional()?)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT INTO kv_store (key, value, updated_at) VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
            params![key, value, Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> Result<()> {
        self.conn.execute("DELETE FROM kv_store WHERE key = ?1", params![key])?;
        Ok(())
    }
}

// ============================================================================
// USERS
// ============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub role: String,
    pub email: Option<String>,
    pub created_at: String,
    pub last_login: Option<String>,
}

pub fn list_users(conn: &Connection) -> Result<Vec<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT id, username, role, email, created_at, last_login
         FROM users
         ORDER BY created_at DESC, id DESC",
    )?;

    let users = stmt
        .query_map([], |row| {
            Ok(UserRow {
                id: row.get(0)?,
                username: row.get(1)?,
                role: row.get(2)?,
                email: row.get(3)?,
                created_at: row.get(4)?,
                last_login: row.get(5)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(users)
}

pub fn delete_user(conn: &Connection, user_id: i64) -> Result<()> {
    let deleted = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
    if deleted == 0 {
        return Err(RealtyError::UserNotFound(user_id));
    }
    tracing::info!(user_id, "User deleted");
    Ok(())
}

fn date_of(timestamp: &str) -> NaiveDate {
    DateTime::parse_from_rfc3339(timestamp)
        .map(|t| t.date_naive())
        .unwrap_or_else(|_| Utc::now().date_naive())
}

/// The admin directory as stored: one entry per account, with enrollment counts
pub fn load_user_directory(conn: &Connection) -> Result<UserDirectory> {
    let mut stmt = conn.prepare(
        "SELECT u.id, u.username, u.email, u.role, u.status, u.created_at, u.last_login,
                (SELECT COUNT(*) FROM enrollments e WHERE e.user_id = u.id)
         FROM users u
         ORDER BY u.id",
    )?;

    let rows = stmt
        .query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, Option<String>>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
                row.get::<_, String>(5)?,
                row.get::<_, Option<String>>(6)?,
                row.get::<_, u32>(7)?,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    let mut users = Vec::with_capacity(rows.len());
    for (id, username, email, role, status, created_at, last_login, courses) in rows {
        let joined = date_of(&created_at);
        users.push(ManagedUser {
            id,
            username,
            email: email.unwrap_or_default(),
            role: parse_role(&role)?,
            status: UserStatus::from_column(&status),
            courses,
            joined,
            last_active: last_login.as_deref().map(date_of).unwrap_or(joined),
        });
    }

    Ok(UserDirectory::from_users(users))
}

/// Admin "add user": validates against the stored directory, inserts the account
/// with a generated temporary password and returns both
pub fn add_user(conn: &Connection, new_user: NewUser) -> Result<(ManagedUser, String)> {
    let user = load_user_directory(conn)?.add(new_user)?;
    let temporary_password = generate_salt()[..12].to_string();
    let salt = generate_salt();

    let inserted = conn.execute(
        "INSERT INTO users (id, username, password_hash, salt, role, email, status, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        params![
            user.id,
            user.username,
            hash_password(&temporary_password, &salt),
            salt,
            user.role.as_str(),
            user.email,
            user.status.as_str(),
            Utc::now().to_rfc3339(),
        ],
    );

    match inserted {
        Ok(_) => Ok((user, temporary_password)),
        Err(e) if is_constraint_violation(&e) => {
            Err(RealtyError::Storage(format!("Email already in use: {}", user.email)))
        }
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// COURSES
// ============================================================================

fn parse_level(raw: &str) -> CourseLevel {
    match raw {
        "Advanced" => CourseLevel::Advanced,
        "Intermediate" => CourseLevel::Intermediate,
        _ => CourseLevel::Beginner,
    }
}

fn course_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Course> {
    let minutes: i64 = row.get(5)?;
    let level: String = row.get(6)?;
    Ok(Course {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get::<_, Option<String>>(2)?.unwrap_or_default(),
        instructor: row.get::<_, Option<String>>(3)?.unwrap_or_default(),
        category: row.get::<_, Option<String>>(4)?.unwrap_or_default(),
        duration_hours: (minutes / 60) as u32,
        level: parse_level(&level),
        price: row.get(7)?,
    })
}

pub fn list_courses(conn: &Connection) -> Result<Vec<Course>> {
    let mut stmt = conn.prepare(
        "SELECT id, title, description, instructor, category, duration, level, price
         FROM courses
         ORDER BY id",
    )?;

    let courses = stmt
        .query_map([], course_from_row)?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(courses)
}

pub fn get_user_courses(conn: &Connection, user_id: i64) -> Result<Vec<EnrolledCourse>> {
    let mut stmt = conn.prepare(
        "SELECT c.id, c.title, c.description, c.instructor, c.category, c.duration, c.level, c.price,
                e.total_lessons, e.completed_lessons
         FROM courses c
         JOIN enrollments e ON c.id = e.course_id
         WHERE e.user_id = ?1
         ORDER BY e.enrolled_at DESC, e.id",
    )?;

    let courses = stmt
        .query_map(params![user_id], |row| {
            let course = course_from_row(row)?;
            let enrollment = Enrollment {
                course_id: course.id,
                total_lessons: row.get(8)?,
                completed_lessons: row.get(9)?,
            };
            Ok(EnrolledCourse {
                progress: enrollment.progress(),
                total_lessons: enrollment.total_lessons,
                completed_lessons: enrollment.completed_lessons,
                course,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(courses)
}

/// Catalog of every stored course plus this user's enrollments
pub fn load_catalog(conn: &Connection, user_id: i64) -> Result<CourseCatalog> {
    let courses = list_courses(conn)?;

    let mut stmt = conn.prepare(
        "SELECT course_id, total_lessons, completed_lessons
         FROM enrollments
         WHERE user_id = ?1
         ORDER BY enrolled_at, id",
    )?;

    let enrollments = stmt
        .query_map(params![user_id], |row| {
            Ok(Enrollment {
                course_id: row.get(0)?,
                total_lessons: row.get(1)?,
                completed_lessons: row.get(2)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(CourseCatalog::from_parts(courses, enrollments))
}

/// Insert or update one enrollment row
pub fn save_enrollment(conn: &Connection, user_id: i64, enrollment: &Enrollment) -> Result<()> {
    let now = Utc::now().to_rfc3339();
    let saved = conn.execute(
        "INSERT INTO enrollments (user_id, course_id, total_lessons, completed_lessons, enrolled_at, last_accessed)
         VALUES (?1, ?2, ?3, ?4, ?5, ?5)
         ON CONFLICT(user_id, course_id) DO UPDATE SET
            completed_lessons = excluded.completed_lessons,
            last_accessed = excluded.last_accessed",
        params![
            user_id,
            enrollment.course_id,
            enrollment.total_lessons,
            enrollment.completed_lessons,
            now
        ],
    );

    match saved {
        Ok(_) => Ok(()),
        Err(e) if is_constraint_violation(&e) => Err(RealtyError::UserNotFound(user_id)),
        Err(e) => Err(e.into()),
    }
}

// ============================================================================
// VALUATIONS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SavedValuation {
    pub id: i64,
    pub user_id: i64,
    pub property_type: String,
    pub address: String,
    pub city: String,
    pub state: String,
    pub zip_code: String,
    pub bedrooms: Option<u32>,
    pub bathrooms: Option<f64>,
    pub square_feet: f64,
    pub year_built: i32,
    pub valuation_amount: i64,
    pub created_at: String,
}

/// Store a computed valuation; returns the new row id
pub fn save_valuation(
    conn: &Connection,
    user_id: i64,
    input: &PropertyInput,
    result: &ValuationResult,
) -> Result<i64> {
    let location = input.address();
    let (property_type, bedrooms, bathrooms, square_feet, year_built) = match input {
        PropertyInput::Residential(r) => (
            "residential",
            Some(r.bedrooms),
            Some(r.bathrooms),
            r.square_feet,
            r.year_built,
        ),
        PropertyInput::Commercial(c) => ("commercial", None, None, c.square_feet, c.year_built),
    };

    let inserted = conn.execute(
        "INSERT INTO property_valuations
         (user_id, property_type, address, city, state, zip_code, bedrooms, bathrooms,
          square_feet, year_built, valuation_amount, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
        params![
            user_id,
            property_type,
            location.address,
            location.city,
            location.state,
            location.zip_code,
            bedrooms,
            bathrooms,
            square_feet,
            year_built,
            result.estimated_value,
            Utc::now().to_rfc3339(),
        ],
    );

    match inserted {
        Ok(_) => {}
        Err(e) if is_constraint_violation(&e) => return Err(RealtyError::UserNotFound(user_id)),
        Err(e) => return Err(e.into()),
    }

    let id = conn.last_insert_rowid();
    tracing::info!(id, user_id, property_type, value = result.estimated_value, "Valuation saved");
    Ok(id)
}

/// Newest first
pub fn get_user_valuations(conn: &Connection, user_id: i64) -> Result<Vec<SavedValuation>> {
    let mut stmt = conn.prepare(
        "SELECT id, user_id, property_type, address, city, state, zip_code, bedrooms, bathrooms,
                square_feet, year_built, valuation_amount, created_at
         FROM property_valuations
         WHERE user_id = ?1
         ORDER BY created_at DESC, id DESC",
    )?;

    let valuations = stmt
        .query_map(params![user_id], |row| {
            Ok(SavedValuation {
                id: row.get(0)?,
                user_id: row.get(1)?,
                property_type: row.get(2)?,
                address: row.get(3)?,
                city: row.get(4)?,
                state: row.get(5)?,
                zip_code: row.get(6)?,
                bedrooms: row.get(7)?,
                bathrooms: row.get(8)?,
                square_feet: row.get(9)?,
                year_built: row.get(10)?,
                valuation_amount: row.get(11)?,
                created_at: row.get(12)?,
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(valuations)
}

/// Write valuations as CSV with a header row; returns rows written
pub fn export_valuations_csv(valuations: &[SavedValuation], csv_path: &Path) -> AnyResult<usize> {
    let mut wtr = csv::Writer::from_path(csv_path).context("Failed to create CSV file")?;

    for valuation in valuations {
        wtr.serialize(valuation).context("Failed to write valuation row")?;
    }
    wtr.flush()?;

    Ok(valuations.len())
}
