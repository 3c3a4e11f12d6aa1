use std::fmt::Write;

use super::escape_xml;
use crate::filters::ActiveFilter;
use crate::report::{CourseSummary, PagingBar, Report, ReportParams};

const STYLE: &str = "
.approvalindicatorcourse { border: 1px solid #ddd; margin: 0 0 1em; padding: 0.5em 1em; }
.dimmed_text, .dimmed_text a { color: #999; }
.indicatorbox { position: relative; background: #eee; height: 1.6em; margin: 0.5em 0; }
.percentbar { background: #5cb85c; height: 100%; }
.percentlabel { position: absolute; width: 100%; text-align: center; line-height: 1.6em; }
.paging a, .paging strong { margin: 0 0.25em; }
";

/// Render the report as a standalone HTML page.
pub fn render_report(report: &Report) -> String {
    let mut out = String::new();
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n");
    out.push_str("<title>Approval indicator report</title>\n");
    let _ = writeln!(out, "<style>{STYLE}</style>");
    out.push_str("</head>\n<body>\n");

    let _ = writeln!(out, "<h2>{}</h2>", escape_xml(&report.heading()));
    let paging = paging_bar(&report.paging(), &report.params.base_query());
    out.push_str(&paging);
    out.push_str(&active_filters(&report.active_filters));

    if report.courses.is_empty() {
        out.push_str("<h3>Not courses found</h3>\n");
    } else {
        out.push_str("<div class=\"box\">\n");
        for course in &report.courses {
            out.push_str(&course_box(course));
        }
        out.push_str("</div>\n");
        out.push_str(&paging);
        out.push_str(&download_form(&report.params));
    }

    out.push_str("</body>\n</html>\n");
    out
}

fn course_box(c: &CourseSummary) -> String {
    let mut out = String::new();
    let class = if c.visible {
        "approvalindicatorcourse"
    } else {
        "approvalindicatorcourse dimmed_text"
    };
    let _ = writeln!(out, "<div class=\"{class}\">");
    let _ = writeln!(
        out,
        "<h3><a href=\"/course/view.php?id={}\">{}</a></h3>",
        c.id,
        escape_xml(&c.fullname)
    );

    if c.enrolled == 0 {
        out.push_str("<p>Not enrolled users</p>\n");
    } else {
        let _ = writeln!(out, "<p>{} completed of {} enrolled</p>", c.completed, c.enrolled);
        out.push_str("<div class=\"indicatorbox\">");
        let _ = write!(out, "<div class=\"percentlabel\">{}%</div>", c.percent);
        let _ = write!(
            out,
            "<div class=\"percentbar\" style=\"width: {}%;\"></div>",
            c.percent
        );
        out.push_str("</div>\n");
    }

    if c.categories.is_empty() {
        out.push_str("<p>System</p>\n");
    } else {
        let links: Vec<String> = c
            .categories
            .iter()
            .map(|cat| {
                format!(
                    "<a href=\"/course/index.php?categoryid={}\"><span class=\"singleline\">{}</span></a>",
                    cat.id,
                    escape_xml(&cat.name)
                )
            })
            .collect();
        let _ = writeln!(out, "<p>{}</p>", links.join(" / "));
    }

    out.push_str("</div>\n");
    out
}

fn paging_bar(paging: &PagingBar, base_query: &str) -> String {
    if !paging.is_visible() {
        return String::new();
    }
    let mut out = String::from("<div class=\"paging\">Page:");
    for page in 0..paging.pages() {
        if page == paging.page {
            let _ = write!(out, " <strong>{}</strong>", page + 1);
        } else {
            let _ = write!(
                out,
                " <a href=\"?{}&amp;page={page}\">{}</a>",
                escape_xml(base_query),
                page + 1
            );
        }
    }
    out.push_str("</div>\n");
    out
}

fn active_filters(active: &[ActiveFilter]) -> String {
    if active.is_empty() {
        return String::new();
    }
    let mut out = String::from(
        "<form method=\"post\" class=\"activefilters\">\n<fieldset><legend>Active filters</legend>\n<ul>\n",
    );
    for a in active {
        let _ = writeln!(
            out,
            "<li><label><input type=\"checkbox\" name=\"filter[{}][{}]\" value=\"1\"> {}</label></li>",
            escape_xml(&a.field),
            a.index,
            escape_xml(&a.label)
        );
    }
    out.push_str("</ul>\n");
    out.push_str("<input type=\"submit\" name=\"removeselected\" value=\"Remove selected\">\n");
    out.push_str("<input type=\"submit\" name=\"removeall\" value=\"Remove all\">\n");
    out.push_str("</fieldset>\n</form>\n");
    out
}

/// Export form submitting `format` and `who` with the current sort.
fn download_form(params: &ReportParams) -> String {
    let mut out = String::from("<h3>Download</h3>\n<form method=\"get\">\n");
    let _ = writeln!(
        out,
        "<input type=\"hidden\" name=\"sort\" value=\"{}\"><input type=\"hidden\" name=\"dir\" value=\"{}\">",
        escape_xml(&params.sort),
        escape_xml(&params.dir)
    );
    out.push_str(
        "<select name=\"format\">\
         <option value=\"csv\">Comma separated values text file</option>\
         <option value=\"ods\">OpenDocument spreadsheet</option>\
         <option value=\"xls\">Excel spreadsheet</option>\
         </select>\n",
    );
    out.push_str(
        "<select name=\"who\">\
         <option value=\"summary\">Summary</option>\
         <option value=\"all\">All users</option>\
         <option value=\"completed\">Only completed</option>\
         <option value=\"notcompleted\">Only not completed</option>\
         </select>\n",
    );
    out.push_str("<input type=\"submit\" value=\"Export\">\n</form>\n");
    out
}
