mod client;

use async_trait::async_trait;
use log::info;

use crate::auth::Token;
use crate::error::{DigestError, Result};
use crate::models::IncidentRecord;
use crate::sources::{decode_rows, IncidentSource};

pub use client::WarehouseClient;

/// Runs a caller-supplied query against an HTTP query endpoint.
pub struct WarehouseSource {
    client: WarehouseClient,
    query: String,
}

impl WarehouseSource {
    pub fn new(query_url: &str, query: String, token: Option<Token>) -> Result<Self> {
        if query.trim().is_empty() {
            return Err(DigestError::Config("warehouse query is empty".to_string()));
        }

        let client = WarehouseClient::new(query_url, token)?;

        Ok(Self { client, query })
    }
}

#[async_trait]
impl IncidentSource for WarehouseSource {
    async fn fetch_stale(&self) -> Result<Vec<IncidentRecord>> {
        info!("Querying warehouse for stale incidents...");

        let rows = self.client.fetch_all(&self.query).await?;
        let records = decode_rows(rows, 0)?;

        info!("Warehouse returned {} stale incidents", records.len());
        Ok(records)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(id: i64, days: i64) -> serde_json::Value {
        json!({
            "incident_id": id,
            "title": format!("Incident {id}"),
            "coordinators": ["alice"],
            "created_date": "2024-01-01",
            "last_updated_date": "2024-01-02",
            "days_since_update": days,
            "incident_link": format!("https://incidents.example.com/{id}")
        })
    }

    #[tokio::test]
    async fn test_fetch_stale_decodes_rows_in_source_order() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/query")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"rows": [row(2, 20), row(1, 5)]}).to_string())
            .create_async()
            .await;

        let source = WarehouseSource::new(
            &format!("{}/query", server.url()),
            "SELECT * FROM stale_incidents ORDER BY days_since_update DESC".to_string(),
            None,
        )
        .unwrap();
        let records = source.fetch_stale().await.unwrap();

        let ids: Vec<_> = records.iter().map(|r| r.incident_id.to_string()).collect();
        assert_eq!(ids, vec!["2", "1"]);
    }

    #[tokio::test]
    async fn test_row_without_days_since_update_is_retrieval_failure() {
        let mut bad = row(3, 1);
        bad.as_object_mut().unwrap().remove("days_since_update");

        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/query")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({"rows": [row(1, 5), bad]}).to_string())
            .create_async()
            .await;

        let source =
            WarehouseSource::new(&format!("{}/query", server.url()), "SELECT 1".to_string(), None)
                .unwrap();
        let err = source.fetch_stale().await.unwrap_err();

        assert!(matches!(err, DigestError::Retrieval(_)));
        assert!(err.to_string().contains("row 1"));
        assert!(err.to_string().contains("days_since_update"));
    }

    #[test]
    fn test_empty_query_is_config_error() {
        let err = WarehouseSource::new("https://warehouse.example.com/query", " ".to_string(), None)
            .err()
            .unwrap();

        assert!(matches!(err, DigestError::Config(_)));
    }
}
