pub mod rows;

use anyhow::{bail, Result};
use regex::Regex;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::LazyLock;
use tracing::{debug, info, warn};

use crate::db::models::{Category, Course, User};
use crate::db::Database;
use crate::filters::{ActiveFilter, FilterSessionStore, Filtering, SqlParams};
use crate::output::export::ExportFormat;

/// Condition every listed course must satisfy.
pub const BASE_CONDITION: &str = "enablecompletion = 1";

/// Course columns the report may be sorted by.
pub const SORT_COLUMNS: &[&str] = &[
    "id",
    "fullname",
    "shortname",
    "category",
    "startdate",
    "enddate",
    "visible",
];

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new("[^A-Za-z0-9]").unwrap());
static NON_ALPHA: LazyLock<Regex> = LazyLock::new(|| Regex::new("[^A-Za-z]").unwrap());

/// Which participants an export lists.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Who {
    Summary,
    All,
    Completed,
    NotCompleted,
}

impl Who {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "summary" => Some(Who::Summary),
            "all" => Some(Who::All),
            "completed" => Some(Who::Completed),
            "notcompleted" => Some(Who::NotCompleted),
            _ => None,
        }
    }
}

/// Request parameters after cleaning. Invalid values fall back to defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ReportParams {
    pub sort: String,
    pub dir: String,
    pub page: i64,
    /// Courses per page, 0 for all of them.
    pub perpage: i64,
    pub format: Option<ExportFormat>,
    pub who: Who,
}

impl Default for ReportParams {
    fn default() -> Self {
        Self {
            sort: "fullname".to_string(),
            dir: "ASC".to_string(),
            page: 0,
            perpage: 30,
            format: None,
            who: Who::Summary,
        }
    }
}

impl ReportParams {
    pub fn from_request(
        sort: &str,
        dir: &str,
        page: i64,
        perpage: i64,
        format: &str,
        who: &str,
    ) -> Self {
        let sort = NON_ALNUM.replace_all(sort, "").to_lowercase();
        let sort = if SORT_COLUMNS.contains(&sort.as_str()) {
            sort
        } else {
            "fullname".to_string()
        };

        let dir = NON_ALPHA.replace_all(dir, "").to_uppercase();
        let dir = if dir == "DESC" { dir } else { "ASC".to_string() };

        let format = ExportFormat::parse(&NON_ALPHA.replace_all(format, ""));
        let perpage = if format.is_some() { 0 } else { perpage.max(0) };

        Self {
            sort,
            dir,
            page: page.max(0),
            perpage,
            format,
            who: Who::parse(&NON_ALPHA.replace_all(who, "")).unwrap_or(Who::Summary),
        }
    }

    /// Like [`ReportParams::from_request`], but a non-empty `format` that
    /// names no known export format is an error.
    pub fn parse_request(
        sort: &str,
        dir: &str,
        page: i64,
        perpage: i64,
        format: &str,
        who: &str,
    ) -> Result<Self> {
        let params = Self::from_request(sort, dir, page, perpage, format, who);
        if !format.trim().is_empty() && params.format.is_none() {
            bail!("Unknown export format: {format}. Use: csv, ods, xls");
        }
        Ok(params)
    }

    pub fn order_by(&self) -> String {
        format!("{} {}", self.sort, self.dir)
    }

    pub fn offset(&self) -> i64 {
        self.page.saturating_mul(self.perpage)
    }

    /// Query string carrying the listing state, for paging links.
    pub fn base_query(&self) -> String {
        format!("sort={}&dir={}&perpage={}", self.sort, self.dir, self.perpage)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryCrumb {
    pub id: i64,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Participant {
    pub user_id: i64,
    pub username: String,
    pub fullname: String,
    pub time_completed: Option<i64>,
}

/// Completion figures of one course.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CourseSummary {
    pub id: i64,
    pub fullname: String,
    pub visible: bool,
    /// Category path from the top level down; empty for system courses.
    pub categories: Vec<CategoryCrumb>,
    pub enrolled: i64,
    pub completed: i64,
    pub percent: i64,
    /// Listed participants; empty for summary reports.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub participants: Vec<Participant>,
}

impl CourseSummary {
    pub fn category_text(&self) -> String {
        if self.categories.is_empty() {
            return "System".to_string();
        }
        let names: Vec<&str> = self.categories.iter().map(|c| c.name.as_str()).collect();
        names.join(" / ")
    }

    pub fn not_completed(&self) -> i64 {
        self.enrolled - self.completed
    }
}

/// Page navigation over the matched courses.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct PagingBar {
    pub total: i64,
    pub page: i64,
    pub perpage: i64,
}

impl PagingBar {
    pub fn pages(&self) -> i64 {
        if self.perpage > 0 {
            (self.total + self.perpage - 1) / self.perpage
        } else {
            1
        }
    }

    pub fn is_visible(&self) -> bool {
        self.perpage > 0 && self.total > self.perpage
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct Report {
    pub params: ReportParams,
    pub filtered: bool,
    /// Courses matching the active filters.
    pub matched: i64,
    /// Courses with completion enabled, unfiltered.
    pub total: i64,
    pub courses: Vec<CourseSummary>,
    pub active_filters: Vec<ActiveFilter>,
}

impl Report {
    pub fn heading(&self) -> String {
        if self.shows_ratio() {
            format!("{} / {} courses", self.matched, self.total)
        } else {
            format!("{} courses", self.total)
        }
    }

    pub fn paging(&self) -> PagingBar {
        PagingBar {
            total: if self.shows_ratio() { self.matched } else { self.total },
            page: self.params.page,
            perpage: self.params.perpage,
        }
    }

    fn shows_ratio(&self) -> bool {
        self.filtered && self.matched != self.total
    }
}

/// `round(completed * 100 / enrolled)`, 0 when nobody is enrolled.
pub fn completion_percent(completed: i64, enrolled: i64) -> i64 {
    if enrolled <= 0 {
        return 0;
    }
    ((completed * 100) as f64 / enrolled as f64).round() as i64
}

/// Query the filtered courses and aggregate their completion.
pub fn build_report(
    db: &Database,
    filtering: &Filtering,
    store: &FilterSessionStore,
    params: &ReportParams,
    gradebook_roles: &[i64],
) -> Result<Report> {
    let filter = filtering.sql_filter(store, BASE_CONDITION, SqlParams::new());
    debug!("Report filter: {} ({} params)", filter.condition, filter.params.len());

    let courses = db.list_courses(&filter, &params.order_by(), params.offset(), params.perpage)?;
    let matched = db.count_courses(&filter)?;
    let total = db.count_completion_courses()?;

    let categories = if courses.is_empty() {
        HashMap::new()
    } else {
        db.get_categories()?
    };

    let mut users: HashMap<i64, User> = HashMap::new();
    let mut summaries = Vec::with_capacity(courses.len());
    for course in &courses {
        summaries.push(summarize_course(
            db,
            course,
            &categories,
            gradebook_roles,
            params.who,
            &mut users,
        )?);
    }

    info!(
        "Report: {} of {} matched courses on page {}",
        summaries.len(),
        matched,
        params.page
    );

    Ok(Report {
        params: params.clone(),
        filtered: !filtering.sql_filter(store, "", SqlParams::new()).is_empty(),
        matched,
        total,
        courses: summaries,
        active_filters: filtering.active_filters(store),
    })
}

fn summarize_course(
    db: &Database,
    course: &Course,
    categories: &HashMap<i64, Category>,
    gradebook_roles: &[i64],
    who: Who,
    users: &mut HashMap<i64, User>,
) -> Result<CourseSummary> {
    let associations = db.get_associations(course.id, gradebook_roles)?;
    let enrolled = associations.len() as i64;
    let mut completed = 0;
    let mut participants = Vec::new();

    for assoc in &associations {
        let is_complete = assoc.time_completed.is_some();
        if is_complete {
            completed += 1;
        }

        let listed = match who {
            Who::Summary => false,
            Who::All => true,
            Who::Completed => is_complete,
            Who::NotCompleted => !is_complete,
        };
        if !listed {
            continue;
        }

        let user = match users.get(&assoc.user_id) {
            Some(u) => u.clone(),
            None => match db.get_user(assoc.user_id)? {
                Some(u) => {
                    users.insert(u.id, u.clone());
                    u
                }
                None => {
                    warn!("Role assignment {} refers to missing user {}", assoc.assignment_id, assoc.user_id);
                    continue;
                }
            },
        };

        participants.push(Participant {
            user_id: user.id,
            fullname: user.fullname(),
            username: user.username,
            time_completed: assoc.time_completed,
        });
    }

    Ok(CourseSummary {
        id: course.id,
        fullname: course.fullname.clone(),
        visible: course.visible,
        categories: category_path(course.category, categories),
        enrolled,
        completed,
        percent: completion_percent(completed, enrolled),
        participants,
    })
}

fn category_path(category: i64, categories: &HashMap<i64, Category>) -> Vec<CategoryCrumb> {
    if category == 0 {
        return Vec::new();
    }
    let Some(leaf) = categories.get(&category) else {
        return vec![CategoryCrumb {
            id: category,
            name: category.to_string(),
        }];
    };

    leaf.path
        .trim_matches('/')
        .split('/')
        .filter(|s| !s.is_empty())
        .map(|part| {
            let id = part.parse::<i64>().unwrap_or_default();
            let name = categories
                .get(&id)
                .map(|c| c.name.clone())
                .unwrap_or_else(|| part.to_string());
            CategoryCrumb { id, name }
        })
        .collect()
}
