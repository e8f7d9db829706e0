use crate::error::{DigestError, Result};
use crate::render::{DEFAULT_TITLE, DEFAULT_WARNING_THRESHOLD_DAYS};

/// Settings for one digest run, fixed when the pipeline is built.
#[derive(Debug, Clone, PartialEq)]
pub struct ReportConfig {
    pub recipients: Vec<String>,
    pub warning_threshold_days: f64,
    pub subject_line: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            recipients: vec![],
            warning_threshold_days: DEFAULT_WARNING_THRESHOLD_DAYS,
            subject_line: DEFAULT_TITLE.to_string(),
        }
    }
}

impl ReportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.recipients.is_empty() {
            return Err(DigestError::Config(
                "at least one recipient is required".to_string(),
            ));
        }

        if let Some(bad) = self.recipients.iter().find(|r| !is_plausible_address(r)) {
            return Err(DigestError::Config(format!(
                "'{bad}' is not a valid recipient address"
            )));
        }

        if !self.warning_threshold_days.is_finite() || self.warning_threshold_days < 0.0 {
            return Err(DigestError::Config(format!(
                "warning threshold must be a non-negative number of days, got {}",
                self.warning_threshold_days
            )));
        }

        if self.subject_line.trim().is_empty() {
            return Err(DigestError::Config("subject line is empty".to_string()));
        }

        Ok(())
    }
}

fn is_plausible_address(address: &str) -> bool {
    let mut parts = address.split('@');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(local), Some(domain), None) => {
            !local.is_empty() && !domain.is_empty() && !address.contains(char::is_whitespace)
        }
        _ => false,
    }
}
