use std::borrow::Cow;

use url::Url;

use crate::error::{DigestError, Result};
use crate::models::{format_days, IncidentRecord, ReportSummary};

/// Rows strictly above this many days get the warning style.
pub const DEFAULT_WARNING_THRESHOLD_DAYS: f64 = 14.0;

pub const DEFAULT_TITLE: &str = "Weekly Stale Incidents Report";

const LINK_SCHEMES: [&str; 3] = ["http", "https", "mailto"];

const STYLE: &str = r"
table {
    border-collapse: collapse;
    width: 100%;
    margin-top: 20px;
}
th, td {
    border: 1px solid #ddd;
    padding: 8px;
    text-align: left;
}
th {
    background-color: #f2f2f2;
}
.summary {
    margin-bottom: 20px;
    padding: 10px;
    background-color: #f9f9f9;
}
.warning {
    color: #cc0000;
}
.footer {
    margin-top: 20px;
    color: #666;
}
";

const COLUMNS: [&str; 6] = [
    "Incident ID",
    "Title",
    "Coordinators",
    "Created Date",
    "Last Updated",
    "Days Stale",
];

/// Produces the digest document for one run.
///
/// Implementations must be deterministic and must never let record text
/// reach the output unescaped.
pub trait DocumentRenderer {
    fn render(&self, records: &[IncidentRecord], summary: &ReportSummary) -> Result<String>;
}

#[derive(Debug, Clone)]
pub struct HtmlRenderer {
    title: String,
    warning_threshold_days: f64,
}

impl Default for HtmlRenderer {
    fn default() -> Self {
        Self::new(DEFAULT_TITLE, DEFAULT_WARNING_THRESHOLD_DAYS)
    }
}

impl HtmlRenderer {
    pub fn new(title: impl Into<String>, warning_threshold_days: f64) -> Self {
        Self {
            title: title.into(),
            warning_threshold_days,
        }
    }

    pub fn is_warning(&self, days_since_update: f64) -> bool {
        days_since_update > self.warning_threshold_days
    }

    /// Day count as shown in a row. Falls back to more precision whenever
    /// the rounded form would land on the other side of the threshold.
    fn display_days(&self, days: f64) -> String {
        let warning = self.is_warning(days);
        let two_places = format!("{days:.2}");
        let two_places = two_places.trim_end_matches('0').trim_end_matches('.');

        [format_days(days), two_places.to_string()]
            .into_iter()
            .find(|shown| {
                shown
                    .parse::<f64>()
                    .is_ok_and(|value| self.is_warning(value) == warning)
            })
            .unwrap_or_else(|| days.to_string())
    }

    fn check_consistency(records: &[IncidentRecord], summary: &ReportSummary) -> Result<()> {
        if records.len() != summary.total_incidents {
            return Err(DigestError::Render(format!(
                "summary counts {} incidents but {} records were supplied",
                summary.total_incidents,
                records.len()
            )));
        }

        if summary.is_empty() != records.is_empty() {
            return Err(DigestError::Render(
                "summary statistics do not match the record set".to_string(),
            ));
        }

        if let Some(stats) = &summary.stats {
            if !stats.avg_days_stale.is_finite() || !stats.max_days_stale.is_finite() {
                return Err(DigestError::Render(
                    "summary statistics are not finite".to_string(),
                ));
            }
        }

        Ok(())
    }

    fn write_summary(&self, out: &mut Markup, summary: &ReportSummary) {
        out.raw("<div class=\"summary\">\n<h3>Summary</h3>\n")
            .raw("<p>Total stale incidents: <strong>")
            .text(&summary.total_incidents.to_string())
            .raw("</strong></p>\n");

        match &summary.stats {
            Some(stats) => {
                out.raw("<p>Average days without update: <strong>")
                    .text(&format!("{:.1}", stats.avg_days_stale))
                    .raw("</strong></p>\n")
                    .raw("<p>Most stale incident: <strong>")
                    .text(&format_days(stats.max_days_stale))
                    .raw("</strong> days</p>\n");
            }
            None => {
                out.raw("<p class=\"empty\">No stale incidents found.</p>\n");
            }
        }

        out.raw("</div>\n");
    }

    fn write_table(&self, out: &mut Markup, records: &[IncidentRecord]) {
        out.raw("<h3>Stale Incidents Details</h3>\n<table>\n<thead>\n<tr>");
        for column in COLUMNS {
            out.raw("<th>").raw(column).raw("</th>");
        }
        out.raw("</tr>\n</thead>\n<tbody>\n");

        for record in records {
            self.write_row(out, record);
        }

        out.raw("</tbody>\n</table>\n");
    }

    fn write_row(&self, out: &mut Markup, record: &IncidentRecord) {
        let id = record.incident_id.to_string();

        out.raw("<tr>\n<td>");
        match safe_link(&record.incident_link) {
            Some(href) => {
                out.raw("<a href=\"")
                    .text(&href)
                    .raw("\">")
                    .text(&id)
                    .raw("</a>");
            }
            None => {
                out.text(&id);
            }
        }
        out.raw("</td>\n<td>")
            .text(&record.title)
            .raw("</td>\n<td>")
            .text(&record.coordinators_display())
            .raw("</td>\n<td>")
            .text(&record.created_date.to_string())
            .raw("</td>\n<td>")
            .text(&record.last_updated_date.to_string())
            .raw("</td>\n");

        if self.is_warning(record.days_since_update) {
            out.raw("<td class=\"days warning\" style=\"color: #cc0000;\">");
        } else {
            out.raw("<td class=\"days\">");
        }
        out.text(&self.display_days(record.days_since_update))
            .raw("</td>\n</tr>\n");
    }
}

impl DocumentRenderer for HtmlRenderer {
    fn render(&self, records: &[IncidentRecord], summary: &ReportSummary) -> Result<String> {
        Self::check_consistency(records, summary)?;

        let mut out = Markup::with_capacity(2048 + records.len() * 384);

        out.raw("<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>")
            .text(&self.title)
            .raw("</title>\n<style>")
            .raw(STYLE)
            .raw("</style>\n</head>\n<body>\n<h2>")
            .text(&self.title)
            .raw("</h2>\n");

        self.write_summary(&mut out, summary);
        self.write_table(&mut out, records);

        out.raw("<p class=\"footer\">")
            .raw("This is an automated report. Please do not reply to this email.")
            .raw("</p>\n</body>\n</html>\n");

        Ok(out.finish())
    }
}

/// Output buffer that only accepts dynamic text through [`Markup::text`],
/// which always escapes. Literal markup must be `'static`.
struct Markup {
    buf: String,
}

impl Markup {
    fn with_capacity(capacity: usize) -> Self {
        Self {
            buf: String::with_capacity(capacity),
        }
    }

    fn raw(&mut self, markup: &'static str) -> &mut Self {
        self.buf.push_str(markup);
        self
    }

    fn text(&mut self, value: &str) -> &mut Self {
        self.buf.push_str(&escape_html(value));
        self
    }

    fn finish(self) -> String {
        self.buf
    }
}

/// Escapes text for both element content and double- or single-quoted
/// attribute values.
pub fn escape_html(s: &str) -> Cow<'_, str> {
    if !s.contains(['&', '<', '>', '"', '\'']) {
        return Cow::Borrowed(s);
    }
    let mut out = String::with_capacity(s.len() + 16);
    for ch in s.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(ch),
        }
    }
    Cow::Owned(out)
}

// Links with other schemes (javascript:, data:) are shown as plain ids.
fn safe_link(link: &str) -> Option<String> {
    let url = Url::parse(link.trim()).ok()?;
    LINK_SCHEMES
        .contains(&url.scheme())
        .then(|| url.to_string())
}
