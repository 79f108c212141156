// 🔑 Credential sources - who is allowed to log in
//
// The session never looks at a user list directly; it asks a
// `CredentialSource`. The mock source is the fixed reference set the
// front-end ships with. A SQLite-backed source lives in db.rs.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::session::{Identity, Role};

pub trait CredentialSource {
    /// Exact match on username and password. `Ok(None)` when nothing matches.
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<Identity>>;

    fn username_exists(&self, username: &str) -> Result<bool>;

    /// Create a `user`-role account. Sources that cannot create accounts
    /// return `Ok(None)`.
    fn create_user(&self, username: &str, password: &str) -> Result<Option<Identity>>;
}

/// Reference credential record, matched by plain string equality
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CredentialRecord {
    pub id: i64,
    pub username: String,
    pub password: String,
    pub role: Role,
}

impl CredentialRecord {
    pub fn new(id: i64, username: &str, password: &str, role: Role) -> Self {
        CredentialRecord {
            id,
            username: username.to_string(),
            password: password.to_string(),
            role,
        }
    }

    pub fn identity(&self) -> Identity {
        Identity {
            id: self.id,
            username: self.username.clone(),
            role: self.role,
        }
    }
}

/// The built-in demo accounts: `muser` (user) and `mvc` (admin)
pub fn default_credentials() -> Vec<CredentialRecord> {
    vec![
        CredentialRecord::new(1, "muser", "muser", Role::User),
        CredentialRecord::new(2, "mvc", "mvc", Role::Admin),
    ]
}

// ============================================================================
// MOCK CREDENTIALS
// ============================================================================

#[derive(Debug, Clone)]
pub struct MockCredentials {
    records: Vec<CredentialRecord>,
}

impl MockCredentials {
    pub fn new() -> Self {
        MockCredentials {
            records: default_credentials(),
        }
    }

    /// Build from an explicit record list. Later duplicates of a username
    /// are dropped so usernames stay unique.
    pub fn from_records(records: Vec<CredentialRecord>) -> Self {
        let mut unique: Vec<CredentialRecord> = Vec::with_capacity(records.len());
        for record in records {
            if !unique.iter().any(|r| r.username == record.username) {
                unique.push(record);
            }
        }
        MockCredentials { records: unique }
    }

    pub fn records(&self) -> &[CredentialRecord] {
        &self.records
    }
}

impl Default for MockCredentials {
    fn default() -> Self {
        Self::new()
    }
}

impl CredentialSource for MockCredentials {
    fn authenticate(&self, username: &str, password: &str) -> Result<Option<Identity>> {
        Ok(self
            .records
            .iter()
            .find(|r| r.username == username && r.password == password)
            .map(CredentialRecord::identity))
    }

    fn username_exists(&self, username: &str) -> Result<bool> {
        Ok(self.records.iter().any(|r| r.username == username))
    }

    fn create_user(&self, _username: &str, _password: &str) -> Result<Option<Identity>> {
        // Validation-only: the reference set is read-only
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_set() {
        let creds = MockCredentials::new();
        assert_eq!(creds.records().len(), 2);
        assert!(creds.username_exists("muser").unwrap());
        assert!(creds.username_exists("mvc").unwrap());
        assert!(!creds.username_exists("MVC").unwrap()); // exact match only
    }

    #[test]
    fn test_authenticate_exact_match() {
        let creds = MockCredentials::new();

        let admin = creds.authenticate("mvc", "mvc").unwrap().unwrap();
        assert_eq!(admin.id, 2);
        assert_eq!(admin.role, Role::Admin);

        assert!(creds.authenticate("mvc", "MVC").unwrap().is_none());
        assert!(creds.authenticate("mvc ", "mvc").unwrap().is_none());
        assert!(creds.authenticate("muser", "mvc").unwrap().is_none());
    }

    #[test]
    fn test_from_records_drops_duplicate_usernames() {
        let creds = MockCredentials::from_records(vec![
            CredentialRecord::new(1, "a", "first", Role::User),
            CredentialRecord::new(2, "a", "second", Role::Admin),
        ]);

        assert_eq!(creds.records().len(), 1);
        assert!(creds.authenticate("a", "second").unwrap().is_none());
    }

    #[test]
    fn test_create_user_is_noop() {
        let creds = MockCredentials::new();
        assert!(creds.create_user("new", "abcdef").unwrap().is_none());
        assert!(!creds.username_exists("new").unwrap());
    }
}
