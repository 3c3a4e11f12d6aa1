use indexmap::IndexMap;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::date::{DateFilter, DateValue};
use super::select::{SelectValue, SimpleSelectFilter};

/// Submitted form fields, in submission order.
pub type FormData = IndexMap<String, String>;

/// Named SQL parameters, keyed without the leading `:`.
pub type SqlParams = BTreeMap<String, Value>;

/// A parameterized WHERE condition. An empty condition means "no filter".
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SqlFilter {
    pub condition: String,
    pub params: SqlParams,
}

impl SqlFilter {
    pub fn new(condition: impl Into<String>, params: SqlParams) -> Self {
        Self {
            condition: condition.into(),
            params,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.condition.is_empty()
    }
}

/// Validated filter settings as stored in the session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FilterValue {
    Date(DateValue),
    Select(SelectValue),
}

/// Capabilities every filter field provides.
pub trait FilterType {
    fn name(&self) -> &str;

    fn label(&self) -> &str;

    /// Whether the field belongs to the advanced part of the add form.
    fn advanced(&self) -> bool;

    /// Extract this field's settings from a submitted form. Missing or
    /// malformed input yields `None`.
    fn check_data(&self, form: &FormData) -> Option<FilterValue>;

    /// Build the condition for `value`, binding its parameter as `param`.
    /// Returns `None` for a value produced by a different kind of field.
    fn sql_filter(&self, value: &FilterValue, param: &str) -> Option<SqlFilter>;

    /// Human friendly description used in the active filter list.
    fn label_for(&self, value: &FilterValue) -> String;
}

/// The closed set of filter fields the report knows how to build.
#[derive(Debug, Clone)]
pub enum FilterField {
    Date(DateFilter),
    SimpleSelect(SimpleSelectFilter),
}

impl FilterField {
    fn inner(&self) -> &dyn FilterType {
        match self {
            FilterField::Date(f) => f,
            FilterField::SimpleSelect(f) => f,
        }
    }
}

impl FilterType for FilterField {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn label(&self) -> &str {
        self.inner().label()
    }

    fn advanced(&self) -> bool {
        self.inner().advanced()
    }

    fn check_data(&self, form: &FormData) -> Option<FilterValue> {
        self.inner().check_data(form)
    }

    fn sql_filter(&self, value: &FilterValue, param: &str) -> Option<SqlFilter> {
        self.inner().sql_filter(value, param)
    }

    fn label_for(&self, value: &FilterValue) -> String {
        self.inner().label_for(value)
    }
}
