use std::path::PathBuf;

use async_trait::async_trait;
use log::info;
use serde::Deserialize;
use serde_json::Value;

use crate::error::{DigestError, Result};
use crate::models::IncidentRecord;
use crate::sources::{decode_rows, IncidentSource};

/// Reads incident rows exported to a local JSON file.
///
/// Accepts either a bare array of rows or a single result page
/// (`{"rows": [...]}`), so saved warehouse responses replay unchanged.
pub struct JsonFileSource {
    path: PathBuf,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RowsDocument {
    Rows(Vec<Value>),
    Page { rows: Vec<Value> },
}

impl JsonFileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl IncidentSource for JsonFileSource {
    async fn fetch_stale(&self) -> Result<Vec<IncidentRecord>> {
        info!("Reading stale incidents from {}", self.path.display());

        let contents = tokio::fs::read_to_string(&self.path).await.map_err(|e| {
            DigestError::Retrieval(format!("cannot read {}: {e}", self.path.display()))
        })?;

        let rows = match serde_json::from_str::<RowsDocument>(&contents) {
            Ok(RowsDocument::Rows(rows) | RowsDocument::Page { rows }) => rows,
            Err(e) => {
                return Err(DigestError::Retrieval(format!(
                    "{} is not a list of incident rows: {e}",
                    self.path.display()
                )))
            }
        };

        decode_rows(rows, 0)
    }
}
