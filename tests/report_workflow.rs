use std::io::Read;

use approval_report::db::Database;
use approval_report::filters::{session, ActiveFilterForm, Filtering, FormData};
use approval_report::import::parse_dataset;
use approval_report::output::export::{self, ExportFormat};
use approval_report::report::{self, rows, ReportParams};

const DATASET: &str = r#"{
    "categories": [
        {"id": 1, "name": "Science"},
        {"id": 2, "name": "Physics", "parent": 1}
    ],
    "courses": [
        {"id": 10, "fullname": "Optics", "category": 2, "startdate": "2024-03-01"},
        {"id": 11, "fullname": "Mechanics", "category": 2, "startdate": "2023-09-01"},
        {"id": 12, "fullname": "Archive", "enablecompletion": false, "startdate": "2024-03-01"}
    ],
    "users": [
        {"id": 1, "username": "ana", "firstname": "Ana", "lastname": "Lopez"},
        {"id": 2, "username": "ben", "firstname": "Ben", "lastname": "Ito"},
        {"id": 3, "username": "cai", "firstname": "Cai", "lastname": "Wu"}
    ],
    "enrolments": [
        {"course": 10, "user": 1, "timecompleted": "2024-05-01 09:00"},
        {"course": 10, "user": 2},
        {"course": 10, "user": 3, "role": 3},
        {"course": 11, "user": 1}
    ]
}"#;

fn form(pairs: &[(&str, &str)]) -> FormData {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn seeded_db(path: &std::path::Path) -> Database {
    let db = Database::open(path).unwrap();
    db.import_dataset(&parse_dataset(DATASET).unwrap()).unwrap();
    db
}

#[test]
fn filters_survive_reopening_the_database() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("report.db");

    {
        let db = seeded_db(&path);
        let filtering = Filtering::new(&db, &Default::default()).unwrap();
        let mut store = session::ensure_initialized(&db.conn, "alice").unwrap();
        let added = filtering.handle_add(
            &mut store,
            Some(form(&[("startdate", "2024-01-01"), ("startdate_op", "after")])),
        );
        assert_eq!(added, 1);
        session::save_session(&db.conn, "alice", &store).unwrap();
    }

    let db = Database::open(&path).unwrap();
    let filtering = Filtering::new(&db, &Default::default()).unwrap();
    let store = session::ensure_initialized(&db.conn, "alice").unwrap();
    assert_eq!(store.len(), 1);
    assert!(session::ensure_initialized(&db.conn, "bob").unwrap().is_empty());

    let report = report::build_report(&db, &filtering, &store, &ReportParams::default(), &[5]).unwrap();
    assert!(report.filtered);
    assert_eq!(report.matched, 1);
    assert_eq!(report.total, 2);
    assert_eq!(report.heading(), "1 / 2 courses");

    let optics = &report.courses[0];
    assert_eq!(optics.fullname, "Optics");
    assert_eq!(optics.enrolled, 2);
    assert_eq!(optics.completed, 1);
    assert_eq!(optics.percent, 50);
    assert_eq!(optics.category_text(), "Science / Physics");
}

#[test]
fn removing_every_filter_clears_the_session_row() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir.path().join("report.db"));
    let filtering = Filtering::new(&db, &Default::default()).unwrap();

    let mut store = session::ensure_initialized(&db.conn, "s").unwrap();
    filtering.handle_add(&mut store, Some(form(&[("course", "10")])));
    filtering.handle_add(&mut store, Some(form(&[("course", "11")])));
    session::save_session(&db.conn, "s", &store).unwrap();
    assert_eq!(db.stats().unwrap().sessions, 1);

    let report = report::build_report(&db, &filtering, &store, &ReportParams::default(), &[5]).unwrap();
    assert_eq!(report.matched, 0);
    assert!(report.courses.is_empty());

    filtering.handle_active(&mut store, Some(ActiveFilterForm::remove_selected([("course", 0)])));
    assert_eq!(filtering.active_filters(&store).len(), 1);

    filtering.handle_active(&mut store, Some(ActiveFilterForm::remove_all()));
    session::save_session(&db.conn, "s", &store).unwrap();
    assert_eq!(db.stats().unwrap().sessions, 0);

    let report = report::build_report(&db, &filtering, &store, &ReportParams::default(), &[5]).unwrap();
    assert!(!report.filtered);
    assert_eq!(report.heading(), "2 courses");
}

#[test]
fn export_lists_participants_without_paging() {
    let dir = tempfile::tempdir().unwrap();
    let db = seeded_db(&dir.path().join("report.db"));
    let filtering = Filtering::new(&db, &Default::default()).unwrap();
    let store = session::ensure_initialized(&db.conn, "s").unwrap();

    let params = ReportParams::from_request("fullname", "DESC", 0, 1, "csv", "notcompleted");
    assert_eq!(params.perpage, 0);
    let report = report::build_report(&db, &filtering, &store, &params, &[5]).unwrap();
    assert_eq!(report.courses.len(), 2);

    let out = dir.path().join(export::file_name(ExportFormat::Csv));
    let file = std::fs::File::create(&out).unwrap();
    export::write_export(
        ExportFormat::Csv,
        file,
        rows::export_columns(params.who),
        &rows::export_rows(&report),
    )
    .unwrap();

    let mut text = String::new();
    std::fs::File::open(&out).unwrap().read_to_string(&mut text).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "id,Course,Category,Username,Student,Completed");
    assert_eq!(lines[1], "10,Optics,Science / Physics,,2,1");
    assert_eq!(lines[2], "2,,,ben,Ben Ito,Not completed");
    assert_eq!(lines[3], "11,Mechanics,Science / Physics,,1,0");
    assert_eq!(lines[4], "1,,,ana,Ana Lopez,Not completed");
    assert_eq!(lines.len(), 5);
    assert!(out.ends_with("report_approvalindicator.csv"));
}
