use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rusqlite::types::Value;
use serde::{Deserialize, Serialize};

use super::types::{FilterType, FilterValue, FormData, SqlFilter, SqlParams};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DateOperator {
    #[serde(rename = "<")]
    Before,
    #[serde(rename = ">")]
    After,
}

impl DateOperator {
    /// Accepts `before`/`after` as well as `<`/`>`.
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "before" | "<" => Some(DateOperator::Before),
            "after" | ">" => Some(DateOperator::After),
            _ => None,
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            DateOperator::Before => "<",
            DateOperator::After => ">",
        }
    }

    pub fn as_word(&self) -> &'static str {
        match self {
            DateOperator::Before => "before",
            DateOperator::After => "after",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DateValue {
    pub enabled: bool,
    pub operator: DateOperator,
    pub timestamp: i64,
}

/// Compares a course date column against a submitted date.
#[derive(Debug, Clone)]
pub struct DateFilter {
    name: String,
    label: String,
    advanced: bool,
    column: String,
}

impl DateFilter {
    pub fn new(name: &str, label: &str, advanced: bool, column: &str) -> Self {
        Self {
            name: name.to_string(),
            label: label.to_string(),
            advanced,
            column: column.to_string(),
        }
    }

    /// Form field holding the operator selector.
    pub fn operator_field(&self) -> String {
        format!("{}_op", self.name)
    }
}

impl FilterType for DateFilter {
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
        let raw = form.get(&self.name)?.trim();
        if raw.is_empty() {
            return None;
        }
        let operator = DateOperator::parse(form.get(&self.operator_field())?)?;
        let timestamp = parse_timestamp(raw)?;
        Some(FilterValue::Date(DateValue {
            enabled: true,
            operator,
            timestamp,
        }))
    }

    fn sql_filter(&self, value: &FilterValue, param: &str) -> Option<SqlFilter> {
        let FilterValue::Date(value) = value else {
            return None;
        };
        if !value.enabled {
            return Some(SqlFilter::new("1=1", SqlParams::new()));
        }
        let mut params = SqlParams::new();
        params.insert(param.to_string(), Value::Integer(value.timestamp));
        Some(SqlFilter::new(
            format!("{} {} :{param}", self.column, value.operator.as_sql()),
            params,
        ))
    }

    fn label_for(&self, value: &FilterValue) -> String {
        match value {
            FilterValue::Date(v) if v.enabled => format!(
                "{} is {} {}",
                self.label,
                v.operator.as_word(),
                format_date(v.timestamp)
            ),
            _ => format!("{} is any date", self.label),
        }
    }
}

/// Parse epoch seconds, `YYYY-MM-DD` or `YYYY-MM-DD HH:MM` (UTC).
pub fn parse_timestamp(s: &str) -> Option<i64> {
    let s = s.trim();
    if let Ok(ts) = s.parse::<i64>() {
        return Some(ts);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Some(date.and_hms_opt(0, 0, 0)?.and_utc().timestamp());
    }
    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M")
        .ok()
        .map(|dt| dt.and_utc().timestamp())
}

/// Short day/month/year rendering of an epoch timestamp.
pub fn format_date(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%d/%m/%Y").to_string())
        .unwrap_or_else(|| ts.to_string())
}

/// Short day/month/year with time.
pub fn format_datetime(ts: i64) -> String {
    DateTime::from_timestamp(ts, 0)
        .map(|dt| dt.format("%d/%m/%Y, %H:%M").to_string())
        .unwrap_or_else(|| ts.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn form(pairs: &[(&str, &str)]) -> FormData {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    fn start_filter() -> DateFilter {
        DateFilter::new("startdate", "Start", true, "startdate")
    }

    #[test]
    fn check_data_requires_date_and_operator() {
        let f = start_filter();
        assert!(f.check_data(&form(&[])).is_none());
        assert!(f.check_data(&form(&[("startdate", "  ")])).is_none());
        assert!(f.check_data(&form(&[("startdate", "2024-02-01")])).is_none());
        assert!(f
            .check_data(&form(&[("startdate", "2024-02-01"), ("startdate_op", "sideways")]))
            .is_none());
        assert!(f
            .check_data(&form(&[("startdate", "not a date"), ("startdate_op", "after")]))
            .is_none());

        let value = f
            .check_data(&form(&[("startdate", "2024-02-01"), ("startdate_op", "after")]))
            .unwrap();
        assert_eq!(
            value,
            FilterValue::Date(DateValue {
                enabled: true,
                operator: DateOperator::After,
                timestamp: 1_706_745_600,
            })
        );
    }

    #[test]
    fn sql_filter_binds_timestamp() {
        let f = start_filter();
        let value = FilterValue::Date(DateValue {
            enabled: true,
            operator: DateOperator::Before,
            timestamp: 42,
        });
        let sql = f.sql_filter(&value, "ex_startdate_0").unwrap();
        assert_eq!(sql.condition, "startdate < :ex_startdate_0");
        assert_eq!(sql.params.get("ex_startdate_0"), Some(&Value::Integer(42)));
    }

    #[test]
    fn disabled_value_constrains_nothing() {
        let f = start_filter();
        let value = FilterValue::Date(DateValue {
            enabled: false,
            operator: DateOperator::After,
            timestamp: 42,
        });
        let sql = f.sql_filter(&value, "p").unwrap();
        assert_eq!(sql.condition, "1=1");
        assert!(sql.params.is_empty());
        assert_eq!(f.label_for(&value), "Start is any date");
    }

    #[test]
    fn foreign_values_are_rejected() {
        let f = start_filter();
        let value = FilterValue::Select(crate::filters::select::SelectValue { value: 1 });
        assert!(f.sql_filter(&value, "p").is_none());
    }

    #[test]
    fn label_reads_naturally() {
        let f = start_filter();
        let value = FilterValue::Date(DateValue {
            enabled: true,
            operator: DateOperator::After,
            timestamp: 1_706_745_600,
        });
        assert_eq!(f.label_for(&value), "Start is after 01/02/2024");
    }

    #[test]
    fn parse_timestamp_formats() {
        assert_eq!(parse_timestamp("1700000000"), Some(1_700_000_000));
        assert_eq!(parse_timestamp("2024-02-01"), Some(1_706_745_600));
        assert_eq!(parse_timestamp("2024-02-01 10:30"), Some(1_706_783_400));
        assert_eq!(parse_timestamp("01/02/2024"), None);
    }
}
