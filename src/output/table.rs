use unicode_width::UnicodeWidthStr;

use crate::db::models::DbStats;
use crate::filters::date::format_datetime;
use crate::filters::{ActiveFilter, FieldInfo, SqlFilter};
use crate::report::{CourseSummary, Report};

/// Truncate a string to fit within max_width (respecting unicode width).
fn truncate(s: &str, max_width: usize) -> String {
    if UnicodeWidthStr::width(s) <= max_width {
        return s.to_string();
    }
    let mut result = String::new();
    let mut width = 0;
    for ch in s.chars() {
        let cw = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + cw + 3 > max_width {
            result.push_str("...");
            break;
        }
        result.push(ch);
        width += cw;
    }
    result
}

/// Ten-cell text bar for a percentage.
fn percent_bar(percent: i64) -> String {
    let filled = (percent.clamp(0, 100) / 10) as usize;
    format!("[{}{}]", "#".repeat(filled), ".".repeat(10 - filled))
}

/// Format the course report as a table.
pub fn print_report(report: &Report) {
    println!("{}\n", report.heading());

    print_active_filters(&report.active_filters);

    if report.courses.is_empty() {
        println!("Not courses found");
        return;
    }

    println!(
        "  {:<6} {:<40} {:<24} {:>8} {:>9}  {}",
        "ID", "COURSE", "CATEGORY", "ENROLLED", "COMPLETED", "PERCENT"
    );
    println!("  {}", "-".repeat(108));

    for c in &report.courses {
        print_course(c);
    }

    let paging = report.paging();
    if paging.is_visible() {
        println!(
            "\n  Page {} of {} (--page N to move)",
            paging.page + 1,
            paging.pages()
        );
    }
}

fn print_course(c: &CourseSummary) {
    let name = if c.visible {
        truncate(&c.fullname, 40)
    } else {
        truncate(&format!("{} (hidden)", c.fullname), 40)
    };

    if c.enrolled == 0 {
        println!(
            "  {:<6} {:<40} {:<24} {:>8} {:>9}  Not enrolled users",
            c.id,
            name,
            truncate(&c.category_text(), 24),
            0,
            0
        );
    } else {
        println!(
            "  {:<6} {:<40} {:<24} {:>8} {:>9}  {} {:>3}%",
            c.id,
            name,
            truncate(&c.category_text(), 24),
            c.enrolled,
            c.completed,
            percent_bar(c.percent),
            c.percent
        );
    }

    for p in &c.participants {
        let completed = p
            .time_completed
            .map(format_datetime)
            .unwrap_or_else(|| "Not completed".to_string());
        println!(
            "         └─ {:<20} {:<30} {}",
            truncate(&p.username, 20),
            truncate(&p.fullname, 30),
            completed
        );
    }
}

/// List active filters with the FIELD:INDEX handle used to remove them.
pub fn print_active_filters(active: &[ActiveFilter]) {
    if active.is_empty() {
        return;
    }
    println!("Active filters:");
    for a in active {
        println!("  {:<14} {}", format!("{}:{}", a.field, a.index), a.label);
    }
    println!();
}

/// Print the add form: each field with the keys and choices it accepts.
pub fn print_add_form(fields: &[FieldInfo]) {
    let mut advanced_shown = false;
    for f in fields {
        if f.advanced && !advanced_shown {
            println!("Advanced:");
            advanced_shown = true;
        }
        println!("  {:<12} {:<10} {}", f.name, f.label, f.form_keys.join(", "));
        for o in &f.options {
            println!("      {:>6}  {}", o.value, truncate(&o.label, 60));
        }
    }
}

pub fn print_sql_filter(filter: &SqlFilter) {
    if filter.is_empty() {
        println!("(no filter)");
        return;
    }
    println!("WHERE {}", filter.condition);
    for (name, value) in &filter.params {
        println!("  :{name} = {value:?}");
    }
}

/// Print database stats.
pub fn print_stats(stats: &DbStats) {
    println!("Database Statistics:");
    println!("  Courses:          {}", stats.courses);
    println!("  With completion:  {}", stats.completion_courses);
    println!("  Categories:       {}", stats.categories);
    println!("  Users:            {}", stats.users);
    println!("  Role assignments: {}", stats.role_assignments);
    println!("  Completions:      {}", stats.completions);
    println!("  Filter sessions:  {}", stats.sessions);
    println!("  DB Size:          {}", format_bytes(stats.db_size_bytes));
}

fn format_bytes(bytes: u64) -> String {
    if bytes >= 1_073_741_824 {
        format!("{:.1} GB", bytes as f64 / 1_073_741_824.0)
    } else if bytes >= 1_048_576 {
        format!("{:.1} MB", bytes as f64 / 1_048_576.0)
    } else if bytes >= 1024 {
        format!("{:.1} KB", bytes as f64 / 1024.0)
    } else {
        format!("{bytes} B")
    }
}
