use crate::filters::date::format_datetime;
use crate::output::export::{Column, ExportRow};

use super::{Report, Who};

const SUMMARY_COLUMNS: &[Column] = &[
    Column { key: "id", header: "id" },
    Column { key: "fullname", header: "Course" },
    Column { key: "category", header: "Category" },
    Column { key: "enrolledusers", header: "Enrolled users" },
    Column { key: "notcompleted", header: "Not completed" },
    Column { key: "completedpercent", header: "Completed percent" },
];

const PARTICIPANT_COLUMNS: &[Column] = &[
    Column { key: "id", header: "id" },
    Column { key: "fullname", header: "Course" },
    Column { key: "category", header: "Category" },
    Column { key: "username", header: "Username" },
    Column { key: "student", header: "Student" },
    Column { key: "timecompleted", header: "Completed" },
];

pub fn export_columns(who: Who) -> &'static [Column] {
    match who {
        Who::Summary => SUMMARY_COLUMNS,
        _ => PARTICIPANT_COLUMNS,
    }
}

/// Flatten the report into export rows. Participant exports follow each
/// course row with one row per listed participant.
pub fn export_rows(report: &Report) -> Vec<ExportRow> {
    let mut rows = Vec::new();

    for c in &report.courses {
        let mut row = ExportRow::new();
        row.insert("id", c.id.to_string());
        row.insert("fullname", c.fullname.clone());
        row.insert("category", c.category_text());

        if report.params.who == Who::Summary {
            row.insert("enrolledusers", c.enrolled.to_string());
            row.insert("notcompleted", c.not_completed().to_string());
            let percent = if c.enrolled == 0 {
                String::new()
            } else {
                format!("{}%", c.percent)
            };
            row.insert("completedpercent", percent);
            rows.push(row);
            continue;
        }

        row.insert("username", String::new());
        row.insert("student", c.enrolled.to_string());
        row.insert("timecompleted", c.completed.to_string());
        rows.push(row);

        for p in &c.participants {
            let mut prow = ExportRow::new();
            prow.insert("id", p.user_id.to_string());
            prow.insert("fullname", String::new());
            prow.insert("category", String::new());
            prow.insert("username", p.username.clone());
            prow.insert("student", p.fullname.clone());
            let completed = p
                .time_completed
                .map(format_datetime)
                .unwrap_or_else(|| "Not completed".to_string());
            prow.insert("timecompleted", completed);
            rows.push(prow);
        }
    }

    rows
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{CourseSummary, Participant, ReportParams};

    fn report(who: &str, courses: Vec<CourseSummary>) -> Report {
        Report {
            params: ReportParams::from_request("fullname", "ASC", 0, 30, "csv", who),
            filtered: false,
            matched: courses.len() as i64,
            total: courses.len() as i64,
            courses,
            active_filters: Vec::new(),
        }
    }

    fn course(enrolled: i64, completed: i64, percent: i64, participants: Vec<Participant>) -> CourseSummary {
        CourseSummary {
            id: 5,
            fullname: "Algebra".into(),
            visible: true,
            categories: Vec::new(),
            enrolled,
            completed,
            percent,
            participants,
        }
    }

    #[test]
    fn summary_rows_leave_percent_blank_without_enrolments() {
        let r = report("summary", vec![course(4, 3, 75, Vec::new()), course(0, 0, 0, Vec::new())]);
        let rows = export_rows(&r);
        assert_eq!(export_columns(Who::Summary).len(), 6);
        assert_eq!(rows[0]["completedpercent"], "75%");
        assert_eq!(rows[0]["notcompleted"], "1");
        assert_eq!(rows[0]["category"], "System");
        assert_eq!(rows[1]["completedpercent"], "");
        assert_eq!(rows[1]["enrolledusers"], "0");
    }

    #[test]
    fn participant_rows_follow_their_course() {
        let participants = vec![
            Participant {
                user_id: 1,
                username: "ana".into(),
                fullname: "Ana Lopez".into(),
                time_completed: Some(1_706_783_400),
            },
            Participant {
                user_id: 2,
                username: "ben".into(),
                fullname: "Ben Ito".into(),
                time_completed: None,
            },
        ];
        let r = report("all", vec![course(2, 1, 50, participants)]);
        let rows = export_rows(&r);

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0]["student"], "2");
        assert_eq!(rows[0]["timecompleted"], "1");
        assert_eq!(rows[1]["username"], "ana");
        assert_eq!(rows[1]["timecompleted"], "01/02/2024, 10:30");
        assert_eq!(rows[1]["fullname"], "");
        assert_eq!(rows[2]["timecompleted"], "Not completed");
    }
}
