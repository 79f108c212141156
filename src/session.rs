// 🔐 Session - the one place that knows who is logged in
//
// States: Unauthenticated, Authenticated(user), Authenticated(admin).
// Initial state comes from `restore()`. `login` moves to Authenticated,
// `logout` moves back. Switching identity requires a logout in between.
//
// The identity is persisted as JSON under a single storage key. Anything
// unreadable under that key counts as "logged out".

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::credentials::CredentialSource;
use crate::error::{RealtyError, Result};
use crate::storage::KeyValueStore;

pub const DEFAULT_SESSION_KEY: &str = "user";
pub const MIN_PASSWORD_LENGTH: usize = 6;

// ============================================================================
// ROLE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Exact match: only "user" and "admin" are roles
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            other => Err(format!("Unknown role: {}", other)),
        }
    }
}

// ============================================================================
// IDENTITY
// ============================================================================

/// The authenticated user record held for the duration of a login
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: i64,
    pub username: String,
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Unauthenticated,
    Authenticated(Identity),
}

/// Snapshot read by route guards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AuthStatus {
    pub identity: Option<Identity>,
    pub is_admin: bool,
    /// True until the persisted identity has been restored
    pub loading: bool,
}

// ============================================================================
// SESSION
// ============================================================================

pub struct Session<S: KeyValueStore, C: CredentialSource> {
    store: S,
    credentials: C,
    key: String,
    current: Option<Identity>,
    restored: bool,
}

impl<S: KeyValueStore, C: CredentialSource> Session<S, C> {
    pub fn new(store: S, credentials: C) -> Self {
        Self::with_key(store, credentials, DEFAULT_SESSION_KEY)
    }

    pub fn with_key(store: S, credentials: C, key: &str) -> Self {
        Session {
            store,
            credentials,
            key: key.to_string(),
            current: None,
            restored: false,
        }
    }

    /// Construct and immediately restore, the usual startup path
    pub fn open(store: S, credentials: C, key: &str) -> Self {
        let mut session = Self::with_key(store, credentials, key);
        session.restore();
        session
    }

    /// Load a previously persisted identity. Never fails: read errors and
    /// malformed data leave the session logged out.
    pub fn restore(&mut self) -> Option<&Identity> {
        self.current = match self.store.get(&self.key) {
            Ok(Some(raw)) => match serde_json::from_str::<Identity>(&raw) {
                Ok(identity) => {
                    tracing::info!(username = %identity.username, role = %identity.role, "Session restored");
                    Some(identity)
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Discarding malformed stored identity");
                    if let Err(e) = self.store.remove(&self.key) {
                        tracing::warn!(error = %e, "Failed to clear malformed identity");
                    }
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                tracing::warn!(error = %e, "Session storage unreadable; starting logged out");
                None
            }
        };

        self.restored = true;
        self.current.as_ref()
    }

    pub fn login(&mut self, username: &str, password: &str) -> Result<Identity> {
        if username.is_empty() {
            return Err(RealtyError::MissingRequiredField { field: "username" });
        }
        if password.is_empty() {
            return Err(RealtyError::MissingRequiredField { field: "password" });
        }

        // A different identity is refused before the credential source is touched
        if let Some(current) = &self.current {
            if current.username != username {
                return Err(RealtyError::SessionActive(current.username.clone()));
            }
        }

        let identity = match self.credentials.authenticate(username, password)? {
            Some(identity) => identity,
            None => {
                tracing::warn!(%username, "Login failed: invalid credentials");
                return Err(RealtyError::InvalidCredentials);
            }
        };

        if let Some(current) = &self.current {
            return Ok(current.clone());
        }

        // Persist before switching state so a storage failure changes nothing
        let raw = serde_json::to_string(&identity)?;
        self.store.set(&self.key, &raw)?;
        self.current = Some(identity.clone());

        tracing::info!(username = %identity.username, role = %identity.role, "Welcome back");
        Ok(identity)
    }

    /// Clear the identity and its persisted copy. Safe to call when logged out.
    pub fn logout(&mut self) {
        if let Err(e) = self.store.remove(&self.key) {
            tracing::warn!(error = %e, "Failed to clear persisted identity");
        }

        if let Some(identity) = self.current.take() {
            tracing::info!(username = %identity.username, "Logged out");
        }
    }

    /// Validate a registration. Creates the account only when the
    /// credential source supports it; never logs the new user in.
    pub fn register(&self, username: &str, password: &str, confirm_password: &str) -> Result<()> {
        if username.is_empty() {
            return Err(RealtyError::MissingRequiredField { field: "username" });
        }
        if password != confirm_password {
            return Err(RealtyError::PasswordMismatch);
        }
        if password.chars().count() < MIN_PASSWORD_LENGTH {
            return Err(RealtyError::PasswordTooShort {
                min: MIN_PASSWORD_LENGTH,
            });
        }
        if self.credentials.username_exists(username)? {
            return Err(RealtyError::UsernameTaken(username.to_string()));
        }

        match self.credentials.create_user(username, password)? {
            Some(created) => tracing::info!(username = %created.username, id = created.id, "Account created"),
            None => tracing::info!(%username, "Registration accepted"),
        }
        Ok(())
    }

    pub fn is_admin(&self) -> bool {
        self.current.as_ref().map(Identity::is_admin).unwrap_or(false)
    }

    pub fn current(&self) -> Option<&Identity> {
        self.current.as_ref()
    }

    pub fn state(&self) -> SessionState {
        match &self.current {
            Some(identity) => SessionState::Authenticated(identity.clone()),
            None => SessionState::Unauthenticated,
        }
    }

    pub fn status(&self) -> AuthStatus {
        AuthStatus {
            identity: self.current.clone(),
            is_admin: self.is_admin(),
            loading: !self.restored,
        }
    }

    pub fn credentials(&self) -> &C {
        &self.credentials
    }

    pub fn store(&self) -> &S {
        &self.store
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::credentials::MockCredentials;
    use crate::storage::MemoryStore;

    fn fresh() -> Session<MemoryStore, MockCredentials> {
        Session::open(MemoryStore::new(), MockCredentials::new(), DEFAULT_SESSION_KEY)
    }

    /// Store that fails every write
    struct BrokenStore;

    impl KeyValueStore for BrokenStore {
        fn get(&self, _key: &str) -> Result<Option<String>> {
            Err(RealtyError::Storage("disk gone".to_string()))
        }
        fn set(&mut self, _key: &str, _value: &str) -> Result<()> {
            Err(RealtyError::Storage("disk gone".to_string()))
        }
        fn remove(&mut self, _key: &str) -> Result<()> {
            Err(RealtyError::Storage("disk gone".to_string()))
        }
    }

    #[test]
    fn test_login_admin() {
        let mut session = fresh();
        let identity = session.login("mvc", "mvc").unwrap();

        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.username, "mvc");
        assert!(session.is_admin());
        assert_eq!(session.state(), SessionState::Authenticated(identity));
    }

    #[test]
    fn test_login_user() {
        let mut session = fresh();
        let identity = session.login("muser", "muser").unwrap();

        assert_eq!(identity.role, Role::User);
        assert!(!session.is_admin());
    }

    #[test]
    fn test_login_invalid_leaves_state_unchanged() {
        let mut session = fresh();
        let err = session.login("x", "wrong").unwrap_err();

        assert!(matches!(err, RealtyError::InvalidCredentials));
        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(session.store().is_empty());

        // Retrying is harmless
        assert!(session.login("x", "wrong").is_err());
        assert!(session.store().is_empty());
    }

    #[test]
    fn test_login_invalid_while_authenticated_keeps_identity() {
        let mut session = fresh();
        session.login("muser", "muser").unwrap();

        assert!(session.login("mvc", "nope").is_err());
        assert_eq!(session.current().unwrap().username, "muser");

        // Same user with a wrong password is still a credential failure
        assert!(matches!(session.login("muser", "nope"), Err(RealtyError::InvalidCredentials)));
        assert_eq!(session.current().unwrap().username, "muser");
    }

    #[test]
    fn test_login_requires_both_fields() {
        let mut session = fresh();
        assert!(matches!(
            session.login("", "mvc"),
            Err(RealtyError::MissingRequiredField { field: "username" })
        ));
        assert!(matches!(
            session.login("mvc", ""),
            Err(RealtyError::MissingRequiredField { field: "password" })
        ));
        assert!(session.current().is_none());
    }

    #[test]
    fn test_login_persists_identity() {
        let mut session = fresh();
        session.login("mvc", "mvc").unwrap();

        let raw = session.store().get("user").unwrap().unwrap();
        let stored: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(stored["id"], 2);
        assert_eq!(stored["username"], "mvc");
        assert_eq!(stored["role"], "admin");
    }

    #[test]
    fn test_switching_identity_requires_logout() {
        let mut session = fresh();
        session.login("muser", "muser").unwrap();

        let err = session.login("mvc", "mvc").unwrap_err();
        assert!(matches!(err, RealtyError::SessionActive(ref u) if u == "muser"));
        assert!(!session.is_admin());

        // Same identity again is fine
        assert_eq!(session.login("muser", "muser").unwrap().username, "muser");

        session.logout();
        assert!(session.login("mvc", "mvc").is_ok());
        assert!(session.is_admin());
    }

    #[test]
    fn test_logout_clears_storage() {
        let mut session = fresh();
        session.login("mvc", "mvc").unwrap();
        session.logout();

        assert_eq!(session.state(), SessionState::Unauthenticated);
        assert!(!session.is_admin());
        assert_eq!(session.store().get("user").unwrap(), None);
    }

    #[test]
    fn test_logout_when_logged_out_is_noop() {
        let mut session = fresh();
        session.logout();
        session.logout();
        assert!(session.current().is_none());
    }

    #[test]
    fn test_restore_from_stored_identity() {
        let mut store = MemoryStore::new();
        store
            .set("user", r#"{"id":2,"username":"mvc","role":"admin"}"#)
            .unwrap();

        let session = Session::open(store, MockCredentials::new(), "user");
        assert_eq!(session.current().unwrap().username, "mvc");
        assert!(session.is_admin());
    }

    #[test]
    fn test_restore_malformed_is_logged_out() {
        let mut store = MemoryStore::new();
        store.set("user", "{not json").unwrap();

        let session = Session::open(store, MockCredentials::new(), "user");
        assert!(session.current().is_none());
        assert!(session.store().is_empty());
    }

    #[test]
    fn test_restore_unknown_role_is_logged_out() {
        let mut store = MemoryStore::new();
        store
            .set("user", r#"{"id":9,"username":"root","role":"superuser"}"#)
            .unwrap();

        let session = Session::open(store, MockCredentials::new(), "user");
        assert!(session.current().is_none());
        assert!(!session.is_admin());
    }

    #[test]
    fn test_restore_storage_error_is_logged_out() {
        let session = Session::open(BrokenStore, MockCredentials::new(), "user");
        assert!(session.current().is_none());
        assert!(!session.status().loading);
    }

    #[test]
    fn test_login_storage_failure_changes_nothing() {
        let mut session = Session::open(BrokenStore, MockCredentials::new(), "user");
        let err = session.login("mvc", "mvc").unwrap_err();

        assert!(matches!(err, RealtyError::Storage(_)));
        assert!(session.current().is_none());
    }

    #[test]
    fn test_status_loading_until_restore() {
        let mut session = Session::new(MemoryStore::new(), MockCredentials::new());
        assert!(session.status().loading);

        session.restore();
        let status = session.status();
        assert!(!status.loading);
        assert!(status.identity.is_none());
        assert!(!status.is_admin);
    }

    #[test]
    fn test_custom_session_key() {
        let mut session = Session::open(MemoryStore::new(), MockCredentials::new(), "realty.identity");
        session.login("muser", "muser").unwrap();

        assert!(session.store().get("realty.identity").unwrap().is_some());
        assert!(session.store().get("user").unwrap().is_none());
    }

    #[test]
    fn test_register_success() {
        let session = fresh();
        assert!(session.register("new", "abcdef", "abcdef").is_ok());
        // Registration never logs in
        assert!(session.current().is_none());
    }

    #[test]
    fn test_register_password_too_short() {
        let session = fresh();
        assert!(matches!(
            session.register("new", "abc", "abc"),
            Err(RealtyError::PasswordTooShort { min: 6 })
        ));
    }

    #[test]
    fn test_register_password_mismatch() {
        let session = fresh();
        assert!(matches!(
            session.register("new", "a", "b"),
            Err(RealtyError::PasswordMismatch)
        ));
    }

    #[test]
    fn test_register_username_taken() {
        let session = fresh();
        assert!(matches!(
            session.register("mvc", "abcdef", "abcdef"),
            Err(RealtyError::UsernameTaken(ref u)) if u == "mvc"
        ));
    }

    #[test]
    fn test_register_requires_username() {
        let session = fresh();
        assert!(matches!(
            session.register("", "abcdef", "abcdef"),
            Err(RealtyError::MissingRequiredField { field: "username" })
        ));
    }

    #[test]
    fn test_role_parsing_is_exact() {
        assert_eq!("admin".parse::<Role>().unwrap(), Role::Admin);
        assert_eq!("user".parse::<Role>().unwrap(), Role::User);
        assert!("Admin".parse::<Role>().is_err());
        assert!("".parse::<Role>().is_err());
    }
}
