//! Report filters: field types, the registry that builds them, the
//! per-session store of active filters and the controller tying them together.

pub mod date;
pub mod registry;
pub mod select;
pub mod session;
pub mod types;

use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;
use tracing::{debug, info};

use crate::db::Database;
pub use session::FilterSessionStore;
pub use types::{FilterField, FilterType, FilterValue, FormData, SqlFilter, SqlParams};

/// One choice of a select field.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldOption {
    pub value: i64,
    pub label: String,
}

/// A field of the add form: what `filter add` accepts for it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldInfo {
    pub name: String,
    pub label: String,
    pub advanced: bool,
    pub kind: &'static str,
    /// Form keys read by the field, e.g. `startdate` and `startdate_op`.
    pub form_keys: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<FieldOption>,
}

/// Submitted state of the active filter form.
#[derive(Debug, Clone, Default)]
pub struct ActiveFilterForm {
    pub remove_all: bool,
    pub remove_selected: bool,
    /// Checked entries: field name -> indices into that field's values.
    pub selected: IndexMap<String, Vec<usize>>,
}

impl ActiveFilterForm {
    pub fn remove_all() -> Self {
        Self {
            remove_all: true,
            ..Default::default()
        }
    }

    pub fn remove_selected<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, usize)>,
        S: Into<String>,
    {
        let mut selected: IndexMap<String, Vec<usize>> = IndexMap::new();
        for (field, index) in pairs {
            selected.entry(field.into()).or_default().push(index);
        }
        Self {
            remove_selected: true,
            selected,
            ..Default::default()
        }
    }
}

/// One entry of the active filter list.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ActiveFilter {
    pub field: String,
    pub index: usize,
    pub label: String,
}

/// Applies submitted filter forms to a session store and turns the stored
/// filters into a SQL condition.
pub struct Filtering {
    fields: IndexMap<String, FilterField>,
}

impl Filtering {
    /// Build the configured fields (see [`registry::build_fields`]).
    pub fn new(db: &Database, spec: &IndexMap<String, bool>) -> Result<Self> {
        Ok(Self::from_fields(registry::build_fields(db, spec)?))
    }

    pub fn from_fields(fields: IndexMap<String, FilterField>) -> Self {
        Self { fields }
    }

    pub fn fields(&self) -> &IndexMap<String, FilterField> {
        &self.fields
    }

    /// Add phase: store every field value present in the submitted add form.
    /// The form is consumed so a processed submission cannot be applied twice.
    /// Returns how many values were added.
    pub fn handle_add(&self, store: &mut FilterSessionStore, form: Option<FormData>) -> usize {
        let Some(form) = form else {
            return 0;
        };

        let mut added = 0;
        for (name, field) in &self.fields {
            let Some(value) = field.check_data(&form) else {
                continue;
            };
            debug!("Adding filter {name}: {}", field.label_for(&value));
            store.append(name, value);
            added += 1;
        }
        added
    }

    /// Remove phase: "remove all" wins over "remove selected". Selected indices
    /// refer to the values as they were before this submission.
    pub fn handle_active(&self, store: &mut FilterSessionStore, form: Option<ActiveFilterForm>) {
        let Some(form) = form else {
            return;
        };

        if form.remove_all {
            info!("Removing all active filters");
            store.clear_all();
            return;
        }

        if !form.remove_selected {
            return;
        }

        for (field, mut indices) in form.selected {
            indices.sort_unstable();
            indices.dedup();
            for index in indices.into_iter().rev() {
                if store.remove_at(&field, index) {
                    debug!("Removed filter {field}[{index}]");
                }
            }
        }
    }

    /// Combine `extra` and every stored filter of a registered field with AND.
    ///
    /// Each value binds its parameter as `ex_<field>_<index>`. Parameters are
    /// merged without collision checks: a later name overwrites an earlier one,
    /// so `extra_params` must not use the `ex_` prefix.
    pub fn sql_filter(
        &self,
        store: &FilterSessionStore,
        extra: &str,
        extra_params: SqlParams,
    ) -> SqlFilter {
        let mut conditions = Vec::new();
        if !extra.is_empty() {
            conditions.push(extra.to_string());
        }
        let mut params = extra_params;

        for (name, values) in store.active_entries() {
            let Some(field) = self.fields.get(name) else {
                continue;
            };
            for (i, value) in values.iter().enumerate() {
                let Some(sql) = field.sql_filter(value, &format!("ex_{name}_{i}")) else {
                    continue;
                };
                conditions.push(sql.condition);
                params.extend(sql.params);
            }
        }

        if conditions.is_empty() {
            return SqlFilter::default();
        }
        SqlFilter::new(conditions.join(" AND "), params)
    }

    /// Describe the add form: basic fields first, then advanced ones, each
    /// group in registry order.
    pub fn add_form(&self) -> Vec<FieldInfo> {
        let mut infos: Vec<FieldInfo> = self
            .fields
            .values()
            .map(|field| match field {
                FilterField::Date(f) => FieldInfo {
                    name: f.name().to_string(),
                    label: f.label().to_string(),
                    advanced: f.advanced(),
                    kind: "date",
                    form_keys: vec![f.name().to_string(), f.operator_field()],
                    options: Vec::new(),
                },
                FilterField::SimpleSelect(f) => FieldInfo {
                    name: f.name().to_string(),
                    label: f.label().to_string(),
                    advanced: f.advanced(),
                    kind: "select",
                    form_keys: vec![f.name().to_string()],
                    options: f
                        .options()
                        .iter()
                        .map(|(value, label)| FieldOption {
                            value: *value,
                            label: label.clone(),
                        })
                        .collect(),
                },
            })
            .collect();
        infos.sort_by_key(|info| info.advanced);
        infos
    }

    /// Labels of the stored filters for registered fields, in store order.
    pub fn active_filters(&self, store: &FilterSessionStore) -> Vec<ActiveFilter> {
        let mut active = Vec::new();
        for (name, values) in store.active_entries() {
            let Some(field) = self.fields.get(name) else {
                continue;
            };
            for (index, value) in values.iter().enumerate() {
                active.push(ActiveFilter {
                    field: name.clone(),
                    index,
                    label: field.label_for(value),
                });
            }
        }
        active
    }
}
