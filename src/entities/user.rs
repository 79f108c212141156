// 👥 Managed User Entity - the admin's user table
//
// Separate from credentials: this is the directory an admin browses,
// searches, adds to and deletes from. db.rs loads it from the users table
// and writes additions and deletions back.

use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{RealtyError, Result};
use crate::session::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserStatus {
    Active,
    Inactive,
}

impl UserStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            UserStatus::Active => "active",
            UserStatus::Inactive => "inactive",
        }
    }

    /// Anything but "inactive" counts as active
    pub fn from_column(raw: &str) -> Self {
        if raw.eq_ignore_ascii_case("inactive") {
            UserStatus::Inactive
        } else {
            UserStatus::Active
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ManagedUser {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub role: Role,
    pub status: UserStatus,
    /// Number of enrolled courses
    pub courses: u32,
    pub joined: NaiveDate,
    pub last_active: NaiveDate,
}

impl ManagedUser {
    /// Case-insensitive substring match on username or email
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.username.to_lowercase().contains(&query) || self.email.to_lowercase().contains(&query)
    }
}

/// Form payload for "Add user"
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    #[serde(default = "default_role")]
    pub role: Role,
}

fn default_role() -> Role {
    Role::User
}

// ============================================================================
// USER DIRECTORY
// ============================================================================

pub struct UserDirectory {
    users: Vec<ManagedUser>,
}

impl UserDirectory {
    pub fn new() -> Self {
        UserDirectory { users: Vec::new() }
    }

    pub fn from_users(users: Vec<ManagedUser>) -> Self {
        UserDirectory { users }
    }

    pub fn all(&self) -> &[ManagedUser] {
        &self.users
    }

    pub fn find_by_id(&self, id: i64) -> Option<&ManagedUser> {
        self.users.iter().find(|u| u.id == id)
    }

    pub fn search(&self, query: &str) -> Vec<ManagedUser> {
        self.users.iter().filter(|u| u.matches(query)).cloned().collect()
    }

    /// Add a user dated today
    pub fn add(&mut self, new_user: NewUser) -> Result<ManagedUser> {
        self.add_on(new_user, Utc::now().date_naive())
    }

    /// Add a user with an explicit join date. Id is one past the current maximum.
    pub fn add_on(&mut self, new_user: NewUser, today: NaiveDate) -> Result<ManagedUser> {
        if new_user.username.is_empty() {
            return Err(RealtyError::MissingRequiredField { field: "username" });
        }
        if new_user.email.is_empty() {
            return Err(RealtyError::MissingRequiredField { field: "email" });
        }
        if self.users.iter().any(|u| u.username == new_user.username) {
            return Err(RealtyError::UsernameTaken(new_user.username));
        }

        let id = self.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
        let user = ManagedUser {
            id,
            username: new_user.username,
            email: new_user.email,
            role: new_user.role,
            status: UserStatus::Active,
            courses: 0,
            joined: today,
            last_active: today,
        };

        tracing::info!(id, username = %user.username, role = %user.role, "User added");
        self.users.push(user.clone());
        Ok(user)
    }

    pub fn delete(&mut self, id: i64) -> Result<ManagedUser> {
        let index = self
            .users
            .iter()
            .position(|u| u.id == id)
            .ok_or(RealtyError::UserNotFound(id))?;

        let removed = self.users.remove(index);
        tracing::info!(id, username = %removed.username, "User deleted");
        Ok(removed)
    }

    pub fn count_by_role(&self, role: Role) -> usize {
        self.users.iter().filter(|u| u.role == role).count()
    }

    pub fn active_count(&self) -> usize {
        self.users.iter().filter(|u| u.status == UserStatus::Active).count()
    }

    pub fn count(&self) -> usize {
        self.users.len()
    }
}

impl Default for UserDirectory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    /// The admin screen's demo users
    fn seeded() -> UserDirectory {
        let seed = [
            (1, "johndoe", "john@example.com", Role::User, UserStatus::Active, 2, date(2025, 4, 1), date(2025, 4, 9)),
            (2, "janedoe", "jane@example.com", Role::User, UserStatus::Active, 3, date(2025, 4, 3), date(2025, 4, 8)),
            (3, "muser", "muser@example.com", Role::User, UserStatus::Active, 1, date(2025, 4, 5), date(2025, 4, 9)),
            (4, "mvc", "mvc@example.com", Role::Admin, UserStatus::Active, 0, date(2025, 3, 15), date(2025, 4, 9)),
            (5, "steveb", "steve@example.com", Role::User, UserStatus::Inactive, 4, date(2025, 1, 10), date(2025, 3, 15)),
        ];

        let users = seed
            .into_iter()
            .map(|(id, username, email, role, status, courses, joined, last_active)| ManagedUser {
                id,
                username: username.to_string(),
                email: email.to_string(),
                role,
                status,
                courses,
                joined,
                last_active,
            })
            .collect();

        UserDirectory::from_users(users)
    }

    fn new_user(username: &str, email: &str) -> NewUser {
        NewUser {
            username: username.to_string(),
            email: email.to_string(),
            role: Role::User,
        }
    }

    #[test]
    fn test_directory_initialization() {
        let dir = seeded();
        assert_eq!(dir.count(), 5);
        assert_eq!(dir.count_by_role(Role::Admin), 1);
        assert_eq!(dir.count_by_role(Role::User), 4);
        assert_eq!(dir.active_count(), 4);
    }

    #[test]
    fn test_search_username_and_email() {
        let dir = seeded();

        let doe = dir.search("DOE");
        assert_eq!(doe.len(), 2);

        let steve = dir.search("steve@");
        assert_eq!(steve.len(), 1);
        assert_eq!(steve[0].username, "steveb");

        assert_eq!(dir.search("").len(), 5);
        assert!(dir.search("nobody").is_empty());
    }

    #[test]
    fn test_add_assigns_next_id_and_today() {
        let mut dir = seeded();
        let today = date(2025, 6, 1);

        let added = dir.add_on(new_user("alice", "alice@example.com"), today).unwrap();
        assert_eq!(added.id, 6);
        assert_eq!(added.joined, today);
        assert_eq!(added.last_active, today);
        assert_eq!(added.status, UserStatus::Active);
        assert_eq!(added.courses, 0);
        assert_eq!(dir.count(), 6);
    }

    #[test]
    fn test_add_after_delete_uses_max_id() {
        let mut dir = seeded();
        dir.delete(3).unwrap();

        let added = dir.add_on(new_user("bob", "bob@example.com"), date(2025, 6, 1)).unwrap();
        assert_eq!(added.id, 6);
    }

    #[test]
    fn test_add_to_empty_directory() {
        let mut dir = UserDirectory::from_users(Vec::new());
        let added = dir.add(new_user("first", "first@example.com")).unwrap();
        assert_eq!(added.id, 1);
    }

    #[test]
    fn test_add_requires_username_and_email() {
        let mut dir = seeded();
        assert!(matches!(
            dir.add(new_user("", "x@example.com")),
            Err(RealtyError::MissingRequiredField { field: "username" })
        ));
        assert!(matches!(
            dir.add(new_user("x", "")),
            Err(RealtyError::MissingRequiredField { field: "email" })
        ));
        assert_eq!(dir.count(), 5);
    }

    #[test]
    fn test_add_duplicate_username() {
        let mut dir = seeded();
        assert!(matches!(
            dir.add(new_user("mvc", "other@example.com")),
            Err(RealtyError::UsernameTaken(_))
        ));
    }

    #[test]
    fn test_delete() {
        let mut dir = seeded();
        let removed = dir.delete(5).unwrap();
        assert_eq!(removed.username, "steveb");
        assert!(dir.find_by_id(5).is_none());

        assert!(matches!(dir.delete(5), Err(RealtyError::UserNotFound(5))));
    }

    #[test]
    fn test_status_column_parsing() {
        assert_eq!(UserStatus::from_column("inactive"), UserStatus::Inactive);
        assert_eq!(UserStatus::from_column("INACTIVE"), UserStatus::Inactive);
        assert_eq!(UserStatus::from_column("active"), UserStatus::Active);
        assert_eq!(UserStatus::Inactive.as_str(), "inactive");
        assert_eq!(UserDirectory::new().count(), 0);
    }

    #[test]
    fn test_new_user_role_defaults_to_user() {
        let parsed: NewUser = serde_json::from_str(r#"{"username":"a","email":"a@b.c"}"#).unwrap();
        assert_eq!(parsed.role, Role::User);
    }
}
