use anyhow::{Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::filters::registry::default_field_spec;

/// `[report]` block of config.toml.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ReportSection {
    /// Role ids counted as enrolled participants.
    pub gradebook_roles: Vec<i64>,
    pub per_page: i64,
}

impl Default for ReportSection {
    fn default() -> Self {
        Self {
            gradebook_roles: vec![5],
            per_page: 30,
        }
    }
}

/// `[session]` block of config.toml.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct SessionSection {
    /// Hours of inactivity after which a filter session is discarded.
    pub ttl_hours: i64,
}

impl Default for SessionSection {
    fn default() -> Self {
        Self { ttl_hours: 24 }
    }
}

/// Top-level config file structure.
#[derive(Debug, Deserialize, Serialize, Clone)]
#[serde(default)]
pub struct ReportConfig {
    pub report: ReportSection,
    /// Filter fields to offer, in display order: name -> advanced.
    pub filters: IndexMap<String, bool>,
    pub session: SessionSection,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            report: ReportSection::default(),
            filters: default_field_spec(),
            session: SessionSection::default(),
        }
    }
}

impl ReportConfig {
    /// Load config from `path`, or ~/.approval-report/config.toml. Returns
    /// defaults if the file doesn't exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = resolve_path(path)?;
        if !path.exists() {
            return Ok(ReportConfig::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let config: ReportConfig =
            toml::from_str(content).with_context(|| "Failed to parse config.toml")?;
        Ok(config)
    }

    pub fn display(&self) -> String {
        let roles: Vec<String> = self.report.gradebook_roles.iter().map(|r| r.to_string()).collect();
        let mut lines = vec![
            "[report]".to_string(),
            format!("  gradebook_roles = [{}]", roles.join(", ")),
            format!("  per_page = {}", self.report.per_page),
            "[filters]".to_string(),
        ];
        for (name, advanced) in &self.filters {
            lines.push(format!("  {name} = {advanced}"));
        }
        lines.push("[session]".to_string());
        lines.push(format!("  ttl_hours = {}", self.session.ttl_hours));
        lines.join("\n")
    }
}

/// Path to the config file: ~/.approval-report/config.toml
pub fn config_path() -> Result<PathBuf> {
    let home = dirs::home_dir().context("Could not determine home directory")?;
    Ok(home.join(".approval-report").join("config.toml"))
}

/// The given path, or the default one when none is given.
pub fn resolve_path(path: Option<&Path>) -> Result<PathBuf> {
    match path {
        Some(p) => Ok(p.to_path_buf()),
        None => config_path(),
    }
}

/// Default config template content.
pub fn default_config_template() -> &'static str {
    r#"# ~/.approval-report/config.toml

[report]
# Roles whose members count as enrolled participants.
gradebook_roles = [5]
per_page = 30

# Filters offered by `filter add`, in display order. The value marks the
# filter as advanced.
[filters]
course = false
startdate = true
enddate = true

[session]
ttl_hours = 24
"#
}

/// Create the default config file at `path` if it doesn't already exist.
pub fn init_config(path: &Path) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }
    }
    std::fs::write(path, default_config_template())
        .with_context(|| format!("Failed to write config: {}", path.display()))?;
    Ok(true)
}
