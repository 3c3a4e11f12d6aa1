use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;
use tracing::info;

use crate::db::models::{NewCategory, NewCourse, NewDataset, NewEnrolment, NewUser};
use crate::db::Database;
use crate::filters::date::parse_timestamp;

/// Default student role id.
const STUDENT_ROLE: i64 = 5;

/// JSON dataset accepted by `approval-report import`.
#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct JsonDataset {
    pub categories: Vec<JsonCategory>,
    pub courses: Vec<JsonCourse>,
    pub users: Vec<JsonUser>,
    pub enrolments: Vec<JsonEnrolment>,
}

#[derive(Debug, Deserialize)]
pub struct JsonCategory {
    pub id: i64,
    pub name: String,
    pub parent: Option<i64>,
}

#[derive(Debug, Deserialize)]
pub struct JsonCourse {
    pub id: i64,
    pub fullname: String,
    pub shortname: Option<String>,
    pub category: Option<i64>,
    pub visible: Option<bool>,
    pub enablecompletion: Option<bool>,
    pub startdate: Option<JsonTime>,
    pub enddate: Option<JsonTime>,
}

#[derive(Debug, Deserialize)]
pub struct JsonUser {
    pub id: i64,
    pub username: String,
    pub firstname: Option<String>,
    pub lastname: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct JsonEnrolment {
    pub course: i64,
    pub user: i64,
    pub role: Option<i64>,
    pub timecompleted: Option<JsonTime>,
}

/// Epoch seconds or a date string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
pub enum JsonTime {
    Epoch(i64),
    Text(String),
}

impl JsonTime {
    fn resolve(&self, what: &str) -> Result<i64> {
        match self {
            JsonTime::Epoch(ts) => Ok(*ts),
            JsonTime::Text(s) => {
                parse_timestamp(s).with_context(|| format!("Invalid date for {what}: {s}"))
            }
        }
    }
}

/// Parse a JSON dataset into insertable rows.
pub fn parse_dataset(content: &str) -> Result<NewDataset> {
    let ds: JsonDataset = serde_json::from_str(content).context("Failed to parse JSON dataset")?;

    let parents: HashMap<i64, i64> = ds
        .categories
        .iter()
        .map(|c| (c.id, c.parent.unwrap_or(0)))
        .collect();

    let mut categories = Vec::with_capacity(ds.categories.len());
    for c in &ds.categories {
        categories.push(NewCategory {
            id: c.id,
            name: c.name.clone(),
            parent: c.parent.unwrap_or(0),
            path: category_path(c.id, &parents)?,
        });
    }

    let mut courses = Vec::with_capacity(ds.courses.len());
    for c in ds.courses {
        let what = format!("course {}", c.id);
        courses.push(NewCourse {
            id: c.id,
            shortname: c.shortname.unwrap_or_else(|| c.fullname.clone()),
            fullname: c.fullname,
            category: c.category.unwrap_or(0),
            visible: c.visible.unwrap_or(true),
            enablecompletion: c.enablecompletion.unwrap_or(true),
            startdate: c.startdate.map(|t| t.resolve(&what)).transpose()?.unwrap_or(0),
            enddate: c.enddate.map(|t| t.resolve(&what)).transpose()?.unwrap_or(0),
        });
    }

    let users = ds
        .users
        .into_iter()
        .map(|u| NewUser {
            id: u.id,
            username: u.username,
            firstname: u.firstname.unwrap_or_default(),
            lastname: u.lastname.unwrap_or_default(),
        })
        .collect();

    let mut enrolments = Vec::with_capacity(ds.enrolments.len());
    for e in ds.enrolments {
        let what = format!("enrolment of user {} in course {}", e.user, e.course);
        enrolments.push(NewEnrolment {
            course_id: e.course,
            user_id: e.user,
            role_id: e.role.unwrap_or(STUDENT_ROLE),
            time_completed: e.timecompleted.map(|t| t.resolve(&what)).transpose()?,
        });
    }

    Ok(NewDataset {
        categories,
        courses,
        users,
        enrolments,
    })
}

/// Build `/root/../id` by walking parents. Cycles are rejected.
fn category_path(id: i64, parents: &HashMap<i64, i64>) -> Result<String> {
    let mut chain = vec![id];
    let mut current = id;
    while let Some(&parent) = parents.get(&current) {
        if parent == 0 {
            break;
        }
        if chain.contains(&parent) {
            bail!("Category {id} has a cyclic parent chain");
        }
        chain.push(parent);
        current = parent;
    }
    chain.reverse();
    let parts: Vec<String> = chain.iter().map(|c| c.to_string()).collect();
    Ok(format!("/{}", parts.join("/")))
}

/// Import a dataset file. Returns (courses, users, enrolments) loaded.
pub fn import_file(db: &Database, path: &Path) -> Result<(usize, usize, usize)> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read: {}", path.display()))?;
    let data = parse_dataset(&content)?;
    db.import_dataset(&data)?;
    info!(
        "Imported {} courses, {} users, {} enrolments from {}",
        data.courses.len(),
        data.users.len(),
        data.enrolments.len(),
        path.display()
    );
    Ok((data.courses.len(), data.users.len(), data.enrolments.len()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const DATASET: &str = r#"{
        "categories": [
            {"id": 1, "name": "Science"},
            {"id": 4, "name": "Physics", "parent": 1},
            {"id": 9, "name": "Optics", "parent": 4}
        ],
        "courses": [
            {"id": 2, "fullname": "Light", "category": 9, "startdate": "2024-02-01"},
            {"id": 3, "fullname": "Archive", "enablecompletion": false, "startdate": 1700000000}
        ],
        "users": [{"id": 7, "username": "ana", "firstname": "Ana"}],
        "enrolments": [
            {"course": 2, "user": 7, "timecompleted": "2024-05-01 09:00"},
            {"course": 3, "user": 7, "role": 3}
        ]
    }"#;

    #[test]
    fn parses_paths_dates_and_defaults() {
        let data = parse_dataset(DATASET).unwrap();
        let optics = data.categories.iter().find(|c| c.id == 9).unwrap();
        assert_eq!(optics.path, "/1/4/9");

        assert_eq!(data.courses[0].startdate, 1_706_745_600);
        assert_eq!(data.courses[0].shortname, "Light");
        assert!(!data.courses[1].enablecompletion);
        assert_eq!(data.enrolments[0].role_id, STUDENT_ROLE);
        assert!(data.enrolments[0].time_completed.is_some());
        assert_eq!(data.enrolments[1].time_completed, None);
    }

    #[test]
    fn rejects_bad_dates_and_cycles() {
        let bad_date = r#"{"courses": [{"id": 1, "fullname": "X", "startdate": "soon"}]}"#;
        assert!(parse_dataset(bad_date).is_err());

        let cycle = r#"{"categories": [{"id": 1, "name": "A", "parent": 2}, {"id": 2, "name": "B", "parent": 1}]}"#;
        assert!(parse_dataset(cycle).is_err());
    }

    #[test]
    fn imported_dataset_is_queryable() {
        let db = Database::open_in_memory().unwrap();
        db.import_dataset(&parse_dataset(DATASET).unwrap()).unwrap();
        assert_eq!(db.count_completion_courses().unwrap(), 1);
        assert_eq!(db.get_associations(2, &[5]).unwrap().len(), 1);
        assert_eq!(db.get_categories().unwrap()[&9].path, "/1/4/9");
    }
}
