// 📚 Course Entity - catalog + per-user progress
//
// A course is reference data. An enrollment is the mutable part: how many
// lessons the learner has finished. Progress is always derived from the
// lesson counts so the two never disagree.

use serde::{Deserialize, Serialize};

use crate::error::{RealtyError, Result};

// ============================================================================
// COURSE LEVEL
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CourseLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl CourseLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseLevel::Beginner => "Beginner",
            CourseLevel::Intermediate => "Intermediate",
            CourseLevel::Advanced => "Advanced",
        }
    }
}

// ============================================================================
// COURSE
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub title: String,
    pub description: String,
    pub instructor: String,
    pub category: String,
    pub duration_hours: u32,
    pub level: CourseLevel,
    /// List price in dollars
    pub price: f64,
}

impl Course {
    pub fn new(
        id: i64,
        title: &str,
        description: &str,
        instructor: &str,
        category: &str,
        duration_hours: u32,
        level: CourseLevel,
        price: f64,
    ) -> Self {
        Course {
            id,
            title: title.to_string(),
            description: description.to_string(),
            instructor: instructor.to_string(),
            category: category.to_string(),
            duration_hours,
            level,
            price,
        }
    }

    /// Case-insensitive substring match on title, category or instructor
    pub fn matches(&self, query: &str) -> bool {
        let query = query.to_lowercase();
        self.title.to_lowercase().contains(&query)
            || self.category.to_lowercase().contains(&query)
            || self.instructor.to_lowercase().contains(&query)
    }
}

// ============================================================================
// ENROLLMENT
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Enrollment {
    pub course_id: i64,
    pub total_lessons: u32,
    pub completed_lessons: u32,
}

impl Enrollment {
    pub fn new(course_id: i64, total_lessons: u32) -> Self {
        Enrollment {
            course_id,
            total_lessons,
            completed_lessons: 0,
        }
    }

    /// Percentage 0-100, rounded
    pub fn progress(&self) -> u32 {
        if self.total_lessons == 0 {
            return 0;
        }
        let pct = f64::from(self.completed_lessons) * 100.0 / f64::from(self.total_lessons);
        pct.round() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.total_lessons > 0 && self.completed_lessons >= self.total_lessons
    }

    pub fn record_lesson(&mut self) {
        if self.completed_lessons < self.total_lessons {
            self.completed_lessons += 1;
        }
    }
}

/// Enrolled course joined with its progress, as the dashboard shows it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnrolledCourse {
    pub course: Course,
    pub progress: u32,
    pub total_lessons: u32,
    pub completed_lessons: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProgressSummary {
    pub enrolled: usize,
    pub completed: usize,
    pub in_progress: usize,
    pub average_progress: u32,
}

// ============================================================================
// COURSE CATALOG
// ============================================================================

/// Default lesson count for new enrollments
pub const DEFAULT_TOTAL_LESSONS: u32 = 10;

pub struct CourseCatalog {
    courses: Vec<Course>,
    enrollments: Vec<Enrollment>,
}

impl CourseCatalog {
    /// Catalog seeded with the built-in courses and demo enrollments
    pub fn new() -> Self {
        let mut catalog = CourseCatalog::empty();
        catalog.register_default_courses();
        catalog
    }

    pub fn empty() -> Self {
        CourseCatalog {
            courses: Vec::new(),
            enrollments: Vec::new(),
        }
    }

    /// Catalog rebuilt from stored courses and one learner's enrollments
    pub fn from_parts(courses: Vec<Course>, enrollments: Vec<Enrollment>) -> Self {
        CourseCatalog { courses, enrollments }
    }

    fn register_default_courses(&mut self) {
        use CourseLevel::*;

        self.register(Course::new(1, "Real Estate Fundamentals",
            "Learn the basics of real estate valuation and investment.",
            "Sarah Johnson", "Fundamentals", 6, Beginner, 99.99));
        self.register(Course::new(2, "Commercial Property Valuation",
            "Advanced techniques for valuing commercial real estate assets.",
            "Michael Chen", "Valuation", 8, Advanced, 149.99));
        self.register(Course::new(3, "Residential Market Analysis",
            "How to analyze residential real estate markets for investment opportunities.",
            "Jessica Martinez", "Analysis", 5, Intermediate, 129.99));
        self.register(Course::new(4, "Real Estate Investment Strategies",
            "Learn different strategies for investing in various real estate markets.",
            "Robert Williams", "Investment", 7, Intermediate, 149.0));
        self.register(Course::new(5, "Property Development Fundamentals",
            "Understanding the basics of real estate development projects.",
            "David Anderson", "Development", 10, Advanced, 199.0));
        self.register(Course::new(6, "Real Estate Financial Modeling",
            "Creating accurate financial models for real estate investments.",
            "Jennifer Lee", "Finance", 9, Advanced, 179.0));
        self.register(Course::new(7, "Negotiation Skills for Real Estate",
            "Mastering the art of negotiation in real estate transactions.",
            "Thomas Black", "Skills", 4, Intermediate, 99.0));

        self.enrollments = vec![
            Enrollment { course_id: 1, total_lessons: 12, completed_lessons: 9 },
            Enrollment { course_id: 2, total_lessons: 10, completed_lessons: 3 },
            Enrollment { course_id: 3, total_lessons: 8, completed_lessons: 1 },
        ];
    }

    /// Add or replace a course (by id)
    pub fn register(&mut self, course: Course) {
        self.courses.retain(|c| c.id != course.id);
        self.courses.push(course);
    }

    pub fn all_courses(&self) -> &[Course] {
        &self.courses
    }

    pub fn find_by_id(&self, id: i64) -> Option<&Course> {
        self.courses.iter().find(|c| c.id == id)
    }

    pub fn enrollment(&self, course_id: i64) -> Option<&Enrollment> {
        self.enrollments.iter().find(|e| e.course_id == course_id)
    }

    pub fn is_enrolled(&self, course_id: i64) -> bool {
        self.enrollments.iter().any(|e| e.course_id == course_id)
    }

    pub fn enrolled(&self) -> Vec<EnrolledCourse> {
        self.enrollments
            .iter()
            .filter_map(|e| {
                self.find_by_id(e.course_id).map(|course| EnrolledCourse {
                    course: course.clone(),
                    progress: e.progress(),
                    total_lessons: e.total_lessons,
                    completed_lessons: e.completed_lessons,
                })
            })
            .collect()
    }

    /// Catalog courses the learner is not enrolled in
    pub fn available(&self) -> Vec<Course> {
        self.courses
            .iter()
            .filter(|c| !self.is_enrolled(c.id))
            .cloned()
            .collect()
    }

    /// Empty query returns every course
    pub fn search(&self, query: &str) -> Vec<Course> {
        self.courses.iter().filter(|c| c.matches(query)).cloned().collect()
    }

    pub fn search_enrolled(&self, query: &str) -> Vec<EnrolledCourse> {
        self.enrolled().into_iter().filter(|e| e.course.matches(query)).collect()
    }

    pub fn search_available(&self, query: &str) -> Vec<Course> {
        self.available().into_iter().filter(|c| c.matches(query)).collect()
    }

    /// Enroll in a catalog course. Enrolling twice keeps the existing progress.
    pub fn enroll(&mut self, course_id: i64, total_lessons: u32) -> Result<()> {
        if self.find_by_id(course_id).is_none() {
            return Err(RealtyError::CourseNotFound(course_id));
        }
        if !self.is_enrolled(course_id) {
            self.enrollments.push(Enrollment::new(course_id, total_lessons));
            tracing::info!(course_id, "Enrolled");
        }
        Ok(())
    }

    /// Mark one more lesson complete; returns the new progress percentage
    pub fn record_lesson(&mut self, course_id: i64) -> Result<u32> {
        let enrollment = self
            .enrollments
            .iter_mut()
            .find(|e| e.course_id == course_id)
            .ok_or(RealtyError::CourseNotFound(course_id))?;

        enrollment.record_lesson();
        Ok(enrollment.progress())
    }

    pub fn summary(&self) -> ProgressSummary {
        let enrolled = self.enrollments.len();
        let completed = self.enrollments.iter().filter(|e| e.is_complete()).count();
        let total: u32 = self.enrollments.iter().map(Enrollment::progress).sum();
        let average_progress = if enrolled == 0 {
            0
        } else {
            (f64::from(total) / enrolled as f64).round() as u32
        };

        ProgressSummary {
            enrolled,
            completed,
            in_progress: enrolled - completed,
            average_progress,
        }
    }
}

impl Default for CourseCatalog {
    fn default() -> Self {
        Self::new()
    }
}
