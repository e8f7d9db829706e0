pub mod file;
pub mod warehouse;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{DigestError, Result};
use crate::models::IncidentRecord;

pub use file::JsonFileSource;
pub use warehouse::WarehouseSource;

/// Supplies the stale incidents for one run.
///
/// The source owns the staleness filter and the row order; the pipeline
/// neither filters nor re-sorts what it gets back.
#[async_trait]
pub trait IncidentSource: Send + Sync {
    async fn fetch_stale(&self) -> Result<Vec<IncidentRecord>>;
}

#[async_trait]
impl<T: IncidentSource + ?Sized> IncidentSource for Box<T> {
    async fn fetch_stale(&self) -> Result<Vec<IncidentRecord>> {
        (**self).fetch_stale().await
    }
}

/// Decodes raw result rows, naming the first row that does not fit the
/// incident shape.
pub(crate) fn decode_rows(rows: Vec<Value>, first_index: usize) -> Result<Vec<IncidentRecord>> {
    rows.into_iter()
        .enumerate()
        .map(|(i, row)| {
            serde_json::from_value::<IncidentRecord>(row).map_err(|e| {
                DigestError::Retrieval(format!("row {} is malformed: {e}", first_index + i))
            })
        })
        .collect()
}
