use indexmap::IndexMap;
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use super::types::{FilterType, FilterValue, FormData, SqlFilter, SqlParams};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectValue {
    pub value: i64,
}

/// Equality match of a column against one of a fixed set of options.
#[derive(Debug, Clone)]
pub struct SimpleSelectFilter {
    name: String,
    label: String,
    advanced: bool,
    column: String,
    options: IndexMap<i64, String>,
}

impl SimpleSelectFilter {
    pub fn new(
        name: &str,
        label: &str,
        advanced: bool,
        column: &str,
        options: IndexMap<i64, String>,
    ) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            advanced,
            column: column.to_string(),
            options,
        }
    }

    pub fn options(&self) -> &IndexMap<i64, String> {
        &self.options
    }
}

impl FilterType for SimpleSelectFilter {
    fn name(&self) -> &str {
        &self.name
    }

    fn label(&self) -> &str {
        &self.label
    }

    fn advanced(&self) -> bool {
        self.advanced
    }

    fn check_data(&self, form: &FormData) -> Option<FilterValue> {
        let value = form.get(&self.name)?.trim().parse::<i64>().ok()?;
        if !self.options.contains_key(&value) {
            return None;
        }
        Some(FilterValue::Select(SelectValue { value }))
    }

    fn sql_filter(&self, value: &FilterValue, param: &str) -> Option<SqlFilter> {
        let FilterValue::Select(value) = value else {
            return None;
        };
        let mut params = SqlParams::new();
        params.insert(param.to_string(), Value::Integer(value.value));
        Some(SqlFilter::new(format!("{} = :{param}", self.column), params))
    }

    fn label_for(&self, value: &FilterValue) -> String {
        match value {
            FilterValue::Select(v) => {
                let shown = self
                    .options
                    .get(&v.value)
                    .cloned()
                    .unwrap_or_else(|| v.value.to_string());
                format!("{} is \"{}\"", self.label, shown)
            }
            _ => self.label.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn course_filter() -> SimpleSelectFilter {
        let options = IndexMap::from([(5, "Algebra".to_string()), (7, "Biology".to_string())]);
        SimpleSelectFilter::new("course", "Course", false, "id", options)
    }

    fn form(value: &str) -> FormData {
        FormData::from([("course".to_string(), value.to_string())])
    }

    #[test]
    fn accepts_only_known_options() {
        let f = course_filter();
        assert_eq!(
            f.check_data(&form("5")),
            Some(FilterValue::Select(SelectValue { value: 5 }))
        );
        assert!(f.check_data(&form("6")).is_none());
        assert!(f.check_data(&form("")).is_none());
        assert!(f.check_data(&form("five")).is_none());
        assert!(f.check_data(&FormData::new()).is_none());
    }

    #[test]
    fn sql_filter_is_equality_on_column() {
        let f = course_filter();
        let sql = f
            .sql_filter(&FilterValue::Select(SelectValue { value: 7 }), "ex_course_1")
            .unwrap();
        assert_eq!(sql.condition, "id = :ex_course_1");
        assert_eq!(sql.params.len(), 1);
        assert_eq!(sql.params.get("ex_course_1"), Some(&Value::Integer(7)));
    }

    #[test]
    fn label_falls_back_to_raw_id() {
        let f = course_filter();
        assert_eq!(
            f.label_for(&FilterValue::Select(SelectValue { value: 5 })),
            "Course is \"Algebra\""
        );
        assert_eq!(
            f.label_for(&FilterValue::Select(SelectValue { value: 99 })),
            "Course is \"99\""
        );
    }
}
