use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Course {
    pub id: i64,
    pub fullname: String,
    pub shortname: String,
    pub category: i64,
    pub visible: bool,
    pub enablecompletion: bool,
    pub startdate: i64,
    pub enddate: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: i64,
    pub name: String,
    pub parent: i64,
    /// Slash separated ancestor ids ending with this category, e.g. `/1/4`.
    pub path: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
}

impl User {
    pub fn fullname(&self) -> String {
        format!("{} {}", self.firstname, self.lastname).trim().to_string()
    }
}

/// A gradebook role assignment joined with the participant's completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Association {
    pub assignment_id: i64,
    pub role_id: i64,
    pub user_id: i64,
    pub time_completed: Option<i64>,
}

/// Data needed to load a dataset (no auto-generated fields).
#[derive(Debug, Clone, Default)]
pub struct NewDataset {
    pub categories: Vec<NewCategory>,
    pub courses: Vec<NewCourse>,
    pub users: Vec<NewUser>,
    pub enrolments: Vec<NewEnrolment>,
}

#[derive(Debug, Clone)]
pub struct NewCategory {
    pub id: i64,
    pub name: String,
    pub parent: i64,
    pub path: String,
}

#[derive(Debug, Clone)]
pub struct NewCourse {
    pub id: i64,
    pub fullname: String,
    pub shortname: String,
    pub category: i64,
    pub visible: bool,
    pub enablecompletion: bool,
    pub startdate: i64,
    pub enddate: i64,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub id: i64,
    pub username: String,
    pub firstname: String,
    pub lastname: String,
}

#[derive(Debug, Clone)]
pub struct NewEnrolment {
    pub course_id: i64,
    pub user_id: i64,
    pub role_id: i64,
    pub time_completed: Option<i64>,
}

/// Stats returned by `approval-report info`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DbStats {
    pub courses: i64,
    pub completion_courses: i64,
    pub categories: i64,
    pub users: i64,
    pub role_assignments: i64,
    pub completions: i64,
    pub sessions: i64,
    pub db_size_bytes: u64,
}
