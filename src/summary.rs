use crate::models::{IncidentRecord, ReportSummary, StalenessStats};

/// Reduces a run's incidents into the figures shown in the digest header.
///
/// Values are exact; rounding for display belongs to the renderer.
pub fn summarize(records: &[IncidentRecord]) -> ReportSummary {
    let total_incidents = records.len();

    ReportSummary {
        total_incidents,
        stats: calculate_stats(records),
    }
}

fn calculate_stats(records: &[IncidentRecord]) -> Option<StalenessStats> {
    if records.is_empty() {
        return None;
    }

    let days = records.iter().map(|r| r.days_since_update);

    #[allow(clippy::cast_precision_loss)]
    let avg_days_stale = days.clone().sum::<f64>() / records.len() as f64;
    let max_days_stale = days.fold(f64::NEG_INFINITY, f64::max);

    Some(StalenessStats {
        avg_days_stale,
        max_days_stale,
    })
}
