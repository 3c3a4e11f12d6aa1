use anyhow::Result;
use indexmap::IndexMap;
use tracing::debug;

use super::date::DateFilter;
use super::select::SimpleSelectFilter;
use super::types::FilterField;
use crate::db::Database;

type FieldBuilder = fn(&Database, bool) -> Result<FilterField>;

/// Every filter the report can offer, by name.
const KNOWN_FIELDS: &[(&str, FieldBuilder)] = &[
    ("course", course_field),
    ("startdate", start_date_field),
    ("enddate", end_date_field),
];

/// Fields shown when no configuration is given: name -> advanced.
pub fn default_field_spec() -> IndexMap<String, bool> {
    IndexMap::from([
        ("course".to_string(), false),
        ("startdate".to_string(), true),
        ("enddate".to_string(), true),
    ])
}

/// Build the configured fields in spec order. Unknown names are skipped.
pub fn build_fields(
    db: &Database,
    spec: &IndexMap<String, bool>,
) -> Result<IndexMap<String, FilterField>> {
    let default_spec;
    let spec = if spec.is_empty() {
        default_spec = default_field_spec();
        &default_spec
    } else {
        spec
    };

    let mut fields = IndexMap::new();
    for (name, advanced) in spec {
        if let Some(field) = get_field(db, name, *advanced)? {
            fields.insert(name.clone(), field);
        }
    }
    Ok(fields)
}

/// Create a known filter field, or `None` for an unknown name.
pub fn get_field(db: &Database, name: &str, advanced: bool) -> Result<Option<FilterField>> {
    match KNOWN_FIELDS.iter().find(|(known, _)| *known == name) {
        Some((_, build)) => build(db, advanced).map(Some),
        None => {
            debug!("Skipping unknown filter field: {name}");
            Ok(None)
        }
    }
}

fn course_field(db: &Database, advanced: bool) -> Result<FilterField> {
    let options: IndexMap<i64, String> = db.course_options()?.into_iter().collect();
    Ok(FilterField::SimpleSelect(SimpleSelectFilter::new(
        "course", "Course", advanced, "id", options,
    )))
}

fn start_date_field(_db: &Database, advanced: bool) -> Result<FilterField> {
    Ok(FilterField::Date(DateFilter::new(
        "startdate",
        "Start",
        advanced,
        "startdate",
    )))
}

fn end_date_field(_db: &Database, advanced: bool) -> Result<FilterField> {
    Ok(FilterField::Date(DateFilter::new(
        "enddate", "End", advanced, "enddate",
    )))
}
