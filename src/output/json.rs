use anyhow::Result;
use serde::Serialize;
use serde_json::Value;

use crate::filters::SqlFilter;

/// Pretty-print any serializable value as JSON to stdout.
pub fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}

/// JSON view of a SQL condition and its bound parameters.
pub fn sql_filter_json(filter: &SqlFilter) -> Value {
    let params: serde_json::Map<String, Value> = filter
        .params
        .iter()
        .map(|(name, value)| {
            let v = match value {
                rusqlite::types::Value::Null => Value::Null,
                rusqlite::types::Value::Integer(i) => Value::from(*i),
                rusqlite::types::Value::Real(f) => Value::from(*f),
                rusqlite::types::Value::Text(s) => Value::from(s.clone()),
                rusqlite::types::Value::Blob(b) => Value::from(format!("<{} bytes>", b.len())),
            };
            (name.clone(), v)
        })
        .collect();

    serde_json::json!({
        "condition": filter.condition,
        "params": params,
    })
}
