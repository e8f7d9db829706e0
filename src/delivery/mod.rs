pub mod outbox;
pub mod webhook;

use async_trait::async_trait;

use crate::error::Result;

pub use outbox::OutboxSink;
pub use webhook::WebhookSink;

/// A fully rendered digest addressed to its recipients.
#[derive(Debug, Clone, PartialEq)]
pub struct Delivery {
    pub subject: String,
    pub recipients: Vec<String>,
    pub document: String,
}

/// Hands a digest to whatever transports it. One attempt per call; any
/// retry policy lives with the caller's scheduler or the transport itself.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    async fn deliver(&self, delivery: &Delivery) -> Result<()>;
}

#[async_trait]
impl<T: DeliverySink + ?Sized> DeliverySink for Box<T> {
    async fn deliver(&self, delivery: &Delivery) -> Result<()> {
        (**self).deliver(delivery).await
    }
}
