use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::{Path, PathBuf};

use approval_report::config::{self, ReportConfig};
use approval_report::db::Database;
use approval_report::filters::{session, ActiveFilterForm, FilterSessionStore, Filtering, FormData, SqlParams};
use approval_report::import;
use approval_report::output::export::{self, ExportFormat};
use approval_report::output::{html, json as json_out, table};
use approval_report::report::{self, rows, ReportParams};

#[derive(Parser)]
#[command(name = "approval-report", version, about = "Course completion indicator report")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Path to database file (default: ~/.approval-report/report.db)
    #[arg(long, global = true, env = "APPROVAL_REPORT_DB")]
    db: Option<PathBuf>,

    /// Path to config file (default: ~/.approval-report/config.toml)
    #[arg(long, global = true, env = "APPROVAL_REPORT_CONFIG")]
    config: Option<PathBuf>,

    /// Session holding the active filters
    #[arg(long, global = true, env = "APPROVAL_REPORT_SESSION", default_value = "default")]
    session: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Show completion per course, filtered by the session's active filters
    Report {
        /// Sort column (id, fullname, shortname, category, startdate, enddate, visible)
        #[arg(long, default_value = "fullname")]
        sort: String,

        /// Sort direction: ASC or DESC
        #[arg(long, default_value = "ASC")]
        dir: String,

        /// Page number, starting at 0
        #[arg(long, default_value = "0")]
        page: i64,

        /// Courses per page (default from config; ignored when exporting)
        #[arg(long)]
        perpage: Option<i64>,

        /// Export format: csv, ods or xls
        #[arg(long, default_value = "")]
        format: String,

        /// Participants to export: summary, all, completed, notcompleted
        #[arg(long, default_value = "summary")]
        who: String,

        /// Render the report as an HTML page
        #[arg(long)]
        html: bool,

        /// Write HTML or export output to this file ("-" for stdout)
        #[arg(long)]
        output: Option<PathBuf>,

        /// Add a filter before reporting (KEY=VALUE form fields)
        #[arg(long = "add", value_name = "KEY=VALUE")]
        add: Vec<String>,

        /// Remove an active filter before reporting (FIELD:INDEX)
        #[arg(long = "remove", value_name = "FIELD:INDEX")]
        remove: Vec<String>,

        /// Remove all active filters before reporting
        #[arg(long)]
        remove_all: bool,
    },

    /// Manage the session's active filters
    Filter {
        #[command(subcommand)]
        action: FilterCommand,
    },

    /// Load courses, users and enrolments from a JSON dataset
    Import {
        /// Dataset file
        path: PathBuf,
    },

    /// Manage the config file
    Config {
        #[command(subcommand)]
        action: ConfigCommand,
    },

    /// Show database info
    Info,
}

#[derive(Subcommand)]
enum FilterCommand {
    /// Submit the add-filter form, e.g. `course=5` or `startdate=2024-01-01 startdate_op=after`
    Add {
        /// Form fields as KEY=VALUE
        #[arg(required = true)]
        fields: Vec<String>,
    },

    /// List the fields `filter add` accepts, with their course choices
    Fields,

    /// List active filters
    List,

    /// Remove active filters
    Remove {
        /// Entries to remove as FIELD:INDEX (see `filter list`)
        selected: Vec<String>,

        /// Remove every active filter
        #[arg(long)]
        all: bool,
    },

    /// Show the SQL condition built from the active filters
    Sql,
}

#[derive(Subcommand)]
enum ConfigCommand {
    /// Write the default config file if missing
    Init,
    /// Show the effective configuration
    Show,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let json_output = cli.json;
    let cfg = ReportConfig::load(cli.config.as_deref())?;

    if let Commands::Config { action } = &cli.command {
        match action {
            ConfigCommand::Init => {
                let path = config::resolve_path(cli.config.as_deref())?;
                if config::init_config(&path)? {
                    println!("Created {}", path.display());
                } else {
                    println!("Config already exists: {}", path.display());
                }
            }
            ConfigCommand::Show => {
                if json_output {
                    json_out::print_json(&cfg)?;
                } else {
                    println!("{}", cfg.display());
                }
            }
        }
        return Ok(());
    }

    let db_path = match cli.db {
        Some(p) => p,
        None => Database::default_db_path()?,
    };
    let db = Database::open(&db_path)?;
    session::prune_expired_sessions(&db.conn, cfg.session.ttl_hours)?;

    match cli.command {
        Commands::Report {
            sort,
            dir,
            page,
            perpage,
            format,
            who,
            html: as_html,
            output,
            add,
            remove,
            remove_all,
        } => {
            let params = ReportParams::parse_request(
                &sort,
                &dir,
                page,
                perpage.unwrap_or(cfg.report.per_page),
                &format,
                &who,
            )?;
            let add_form = if add.is_empty() { None } else { Some(parse_form(&add)?) };
            let active_form = removal_form(remove_all, &remove)?;

            let filtering = Filtering::new(&db, &cfg.filters)?;
            let mut store = session::ensure_initialized(&db.conn, &cli.session)?;
            filtering.handle_add(&mut store, add_form);
            filtering.handle_active(&mut store, active_form);
            session::save_session(&db.conn, &cli.session, &store)?;

            let report = report::build_report(
                &db,
                &filtering,
                &store,
                &params,
                &cfg.report.gradebook_roles,
            )?;

            if let Some(fmt) = params.format {
                let columns = rows::export_columns(params.who);
                let data = rows::export_rows(&report);
                let path = output.unwrap_or_else(|| PathBuf::from(export::file_name(fmt)));
                write_export(fmt, &path, columns, &data)?;
                return Ok(());
            }

            if as_html {
                let doc = html::render_report(&report);
                match output {
                    Some(path) if path != Path::new("-") => std::fs::write(&path, doc)
                        .with_context(|| format!("Failed to write: {}", path.display()))?,
                    _ => print!("{doc}"),
                }
            } else if json_output {
                json_out::print_json(&report)?;
            } else {
                table::print_report(&report);
            }
        }

        Commands::Filter { action } => {
            let filtering = Filtering::new(&db, &cfg.filters)?;
            let mut store = session::ensure_initialized(&db.conn, &cli.session)?;

            match action {
                FilterCommand::Add { fields } => {
                    let added = filtering.handle_add(&mut store, Some(parse_form(&fields)?));
                    session::save_session(&db.conn, &cli.session, &store)?;
                    if added == 0 {
                        println!("No filter added.");
                    } else {
                        println!("Added {added} filter{}", if added == 1 { "" } else { "s" });
                    }
                    print_filters(&filtering, &store, json_output)?;
                }
                FilterCommand::Fields => {
                    let form = filtering.add_form();
                    if json_output {
                        json_out::print_json(&form)?;
                    } else {
                        table::print_add_form(&form);
                    }
                }
                FilterCommand::List => print_filters(&filtering, &store, json_output)?,
                FilterCommand::Remove { selected, all } => {
                    if !all && selected.is_empty() {
                        bail!("Nothing to remove. Give FIELD:INDEX entries or --all.");
                    }
                    filtering.handle_active(&mut store, removal_form(all, &selected)?);
                    session::save_session(&db.conn, &cli.session, &store)?;
                    print_filters(&filtering, &store, json_output)?;
                }
                FilterCommand::Sql => {
                    let filter = filtering.sql_filter(&store, report::BASE_CONDITION, SqlParams::new());
                    if json_output {
                        json_out::print_json(&json_out::sql_filter_json(&filter))?;
                    } else {
                        table::print_sql_filter(&filter);
                    }
                }
            }
        }

        Commands::Import { path } => {
            let (courses, users, enrolments) = import::import_file(&db, &path)?;
            println!("Imported {courses} courses, {users} users, {enrolments} enrolments");
        }

        Commands::Info => {
            let stats = db.stats()?;
            let schema_ver = db.schema_version()?.unwrap_or_else(|| "unknown".to_string());

            if json_output {
                json_out::print_json(&serde_json::json!({
                    "version": env!("CARGO_PKG_VERSION"),
                    "schema_version": schema_ver,
                    "db_path": db.path.display().to_string(),
                    "session": cli.session,
                    "stats": stats,
                }))?;
            } else {
                println!("approval-report v{}", env!("CARGO_PKG_VERSION"));
                println!("  Schema:   v{schema_ver}");
                println!("  Database: {}", db.path.display());
                println!("  Session:  {}\n", cli.session);
                table::print_stats(&stats);
            }
        }

        Commands::Config { .. } => unreachable!("handled before opening the database"),
    }

    Ok(())
}

/// Parse KEY=VALUE pairs into a submitted form.
fn parse_form(pairs: &[String]) -> Result<FormData> {
    let mut form = FormData::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Expected KEY=VALUE, got: {pair}"))?;
        form.insert(key.trim().to_string(), value.to_string());
    }
    Ok(form)
}

/// Build the active filter form from FIELD:INDEX entries.
fn removal_form(all: bool, selected: &[String]) -> Result<Option<ActiveFilterForm>> {
    if all {
        return Ok(Some(ActiveFilterForm::remove_all()));
    }
    if selected.is_empty() {
        return Ok(None);
    }
    let mut pairs = Vec::with_capacity(selected.len());
    for entry in selected {
        let (field, index) = entry
            .rsplit_once(':')
            .with_context(|| format!("Expected FIELD:INDEX, got: {entry}"))?;
        let index: usize = index
            .parse()
            .with_context(|| format!("Invalid index in: {entry}"))?;
        pairs.push((field.to_string(), index));
    }
    Ok(Some(ActiveFilterForm::remove_selected(pairs)))
}

fn print_filters(filtering: &Filtering, store: &FilterSessionStore, json_output: bool) -> Result<()> {
    let active = filtering.active_filters(store);
    if json_output {
        json_out::print_json(&active)?;
    } else if active.is_empty() {
        println!("No active filters.");
    } else {
        table::print_active_filters(&active);
    }
    Ok(())
}

fn write_export(
    format: ExportFormat,
    path: &Path,
    columns: &[export::Column],
    data: &[export::ExportRow],
) -> Result<()> {
    if path == Path::new("-") {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        export::write_export(format, &mut lock, columns, data)?;
        lock.flush()?;
        return Ok(());
    }

    let file = std::fs::File::create(path)
        .with_context(|| format!("Failed to create: {}", path.display()))?;
    export::write_export(format, std::io::BufWriter::new(file), columns, data)?;
    eprintln!("Exported {} rows to {}", data.len(), path.display());
    Ok(())
}
