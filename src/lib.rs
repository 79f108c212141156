// Realty Insights - Core Library
// Exposes all modules for use in CLI, API server, and tests

pub mod config;
pub mod credentials;
pub mod db;
pub mod entities;
pub mod error;
pub mod guard;
pub mod logging;
pub mod session;
pub mod storage;
pub mod valuation;

// Re-export commonly used types
pub use config::AppConfig;
pub use credentials::{CredentialRecord, CredentialSource, MockCredentials};
pub use db::{
    SavedValuation, SqliteCredentials, SqliteStore, UserRow,
    setup_database, seed_reference_data, open_database,
    save_valuation, get_user_valuations, export_valuations_csv,
    list_users, delete_user, load_user_directory, add_user,
    list_courses, get_user_courses, load_catalog, save_enrollment,
};
pub use entities::{
    Course, CourseCatalog, CourseLevel, EnrolledCourse, Enrollment, ProgressSummary, DEFAULT_TOTAL_LESSONS,
    ManagedUser, NewUser, UserDirectory, UserStatus,
};
pub use error::{RealtyError, Result};
pub use guard::{Access, NavItem, Requirement, Route, RouteGuard, can_access_user_data, home_route, nav_items};
pub use session::{AuthStatus, Identity, Role, Session, SessionState};
pub use storage::{FileStore, KeyValueStore, MemoryStore};
pub use valuation::{
    Address, Breakdown, CommercialPropertyInput, Condition, PropertyInput, PropertySubtype,
    PropertyType, ResidentialPropertyInput, ValuationResult, Valuator,
    value_commercial, value_residential,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
