// Entity Models
//
// Reference data the screens browse: the course catalog with the learner's
// progress, and the directory of users an admin manages. db.rs loads both
// from SQLite and writes their changes back.

pub mod course;
pub mod user;

pub use course::{DEFAULT_TOTAL_LESSONS, Course, CourseCatalog, CourseLevel, EnrolledCourse, Enrollment, ProgressSummary};
pub use user::{ManagedUser, NewUser, UserDirectory, UserStatus};
