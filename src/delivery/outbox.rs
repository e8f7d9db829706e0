use std::path::PathBuf;

use async_trait::async_trait;
use log::info;

use crate::delivery::{Delivery, DeliverySink};
use crate::error::{DigestError, Result};

/// Writes the digest to a local file for another process to pick up.
pub struct OutboxSink {
    path: PathBuf,
}

impl OutboxSink {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait]
impl DeliverySink for OutboxSink {
    async fn deliver(&self, delivery: &Delivery) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await.map_err(|e| {
                DigestError::Delivery(format!("cannot create {}: {e}", parent.display()))
            })?;
        }

        tokio::fs::write(&self.path, delivery.document.as_bytes())
            .await
            .map_err(|e| {
                DigestError::Delivery(format!("cannot write {}: {e}", self.path.display()))
            })?;

        info!(
            "Wrote '{}' for {} to {}",
            delivery.subject,
            delivery.recipients.join(", "),
            self.path.display()
        );
        Ok(())
    }
}
