use chrono::{DateTime, Utc};
use log::{info, warn};
use serde::Serialize;

use crate::config::ReportConfig;
use crate::delivery::{Delivery, DeliverySink};
use crate::error::{DigestError, Result};
use crate::models::ReportSummary;
use crate::render::{DocumentRenderer, HtmlRenderer};
use crate::sources::IncidentSource;
use crate::summary::summarize;

/// Outcome of one successful run.
#[derive(Debug, Serialize)]
pub struct DigestRun {
    pub generated_at: DateTime<Utc>,
    pub subject: String,
    pub recipients: Vec<String>,
    pub summary: ReportSummary,
    pub document_bytes: usize,
}

/// Fetch, summarize, render, deliver. One attempt, one outcome.
pub struct ReportPipeline<S, D, R = HtmlRenderer> {
    config: ReportConfig,
    source: S,
    sink: D,
    renderer: R,
}

impl<S: IncidentSource, D: DeliverySink> ReportPipeline<S, D> {
    pub fn new(config: ReportConfig, source: S, sink: D) -> Result<Self> {
        config.validate()?;

        let renderer = HtmlRenderer::new(&config.subject_line, config.warning_threshold_days);

        Ok(Self {
            config,
            source,
            sink,
            renderer,
        })
    }
}

impl<S, D, R> ReportPipeline<S, D, R>
where
    S: IncidentSource,
    D: DeliverySink,
    R: DocumentRenderer,
{
    pub fn with_renderer<T: DocumentRenderer>(self, renderer: T) -> ReportPipeline<S, D, T> {
        ReportPipeline {
            config: self.config,
            source: self.source,
            sink: self.sink,
            renderer,
        }
    }

    pub async fn run(&self) -> Result<DigestRun> {
        info!("Starting stale incident digest run");

        let records = self
            .source
            .fetch_stale()
            .await
            .map_err(DigestError::into_retrieval)?;
        for record in &records {
            record.validate()?;
        }

        if records.is_empty() {
            warn!("No stale incidents returned; the digest will say so");
        }

        let summary = summarize(&records);
        if let Some(stats) = &summary.stats {
            info!(
                "Summarized {} incidents (avg {:.1} days, max {} days)",
                summary.total_incidents, stats.avg_days_stale, stats.max_days_stale
            );
        }

        let document = self
            .renderer
            .render(&records, &summary)
            .map_err(DigestError::into_render)?;

        let delivery = Delivery {
            subject: self.config.subject_line.clone(),
            recipients: self.config.recipients.clone(),
            document,
        };

        info!(
            "Delivering digest to {} recipients",
            delivery.recipients.len()
        );
        self.sink
            .deliver(&delivery)
            .await
            .map_err(DigestError::into_delivery)?;

        Ok(DigestRun {
            generated_at: Utc::now(),
            subject: delivery.subject,
            recipients: delivery.recipients,
            summary,
            document_bytes: delivery.document.len(),
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::models::IncidentRecord;
    use crate::summary::tests::incident;

    enum FakeSource {
        Records(Vec<IncidentRecord>),
        Unreachable,
        Misconfigured,
    }

    #[async_trait]
    impl IncidentSource for FakeSource {
        async fn fetch_stale(&self) -> Result<Vec<IncidentRecord>> {
            match self {
                Self::Records(records) => Ok(records.clone()),
                Self::Unreachable => Err(DigestError::Retrieval(
                    "connection refused".to_string(),
                )),
                Self::Misconfigured => Err(DigestError::Config("bad dataset".to_string())),
            }
        }
    }

    #[derive(Default)]
    struct RecordingSink {
        fail: bool,
        deliveries: Mutex<Vec<Delivery>>,
    }

    #[async_trait]
    impl DeliverySink for RecordingSink {
        async fn deliver(&self, delivery: &Delivery) -> Result<()> {
            self.deliveries.lock().unwrap().push(delivery.clone());
            if self.fail {
                return Err(DigestError::Delivery("relay rejected message".to_string()));
            }
            Ok(())
        }
    }

    #[derive(Default)]
    struct CountingRenderer {
        inner: HtmlRenderer,
        calls: AtomicUsize,
        fail: bool,
    }

    impl DocumentRenderer for CountingRenderer {
        fn render(&self, records: &[IncidentRecord], summary: &ReportSummary) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.fail {
                return Err(DigestError::Config("template missing".to_string()));
            }
            self.inner.render(records, summary)
        }
    }

    fn config() -> ReportConfig {
        ReportConfig {
            recipients: vec!["sir-team@example.com".to_string()],
            ..ReportConfig::default()
        }
    }

    fn pipeline(
        source: FakeSource,
        sink: RecordingSink,
    ) -> ReportPipeline<FakeSource, RecordingSink, CountingRenderer> {
        ReportPipeline::new(config(), source, sink)
            .unwrap()
            .with_renderer(CountingRenderer::default())
    }

    #[tokio::test]
    async fn test_mixed_staleness_run_delivers_one_warning_row() {
        let records = vec![incident(1, 5.0), incident(2, 20.0), incident(3, 14.0)];
        let pipeline = pipeline(FakeSource::Records(records), RecordingSink::default());

        let run = pipeline.run().await.unwrap();

        let stats = run.summary.stats.unwrap();
        assert_eq!(run.summary.total_incidents, 3);
        assert!((stats.avg_days_stale - 13.0).abs() < 1e-9);
        assert!((stats.max_days_stale - 20.0).abs() < f64::EPSILON);

        let deliveries = pipeline.sink.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        assert_eq!(deliveries[0].subject, "Weekly Stale Incidents Report");
        assert_eq!(deliveries[0].recipients, vec!["sir-team@example.com"]);
        assert_eq!(
            deliveries[0].document.matches("<td class=\"days warning\"").count(),
            1
        );
        assert_eq!(run.document_bytes, deliveries[0].document.len());
    }

    #[tokio::test]
    async fn test_empty_run_delivers_no_incidents_digest() {
        let pipeline = pipeline(FakeSource::Records(vec![]), RecordingSink::default());

        let run = pipeline.run().await.unwrap();

        assert_eq!(run.summary.total_incidents, 0);
        assert!(run.summary.stats.is_none());

        let deliveries = pipeline.sink.deliveries.lock().unwrap();
        assert_eq!(deliveries.len(), 1);
        assert!(deliveries[0].document.contains("No stale incidents found."));
        assert!(!deliveries[0].document.contains("<tr>\n"));
    }

    #[tokio::test]
    async fn test_unreachable_source_never_renders_or_delivers() {
        let pipeline = pipeline(FakeSource::Unreachable, RecordingSink::default());

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, DigestError::Retrieval(_)));
        assert_eq!(pipeline.renderer.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.sink.deliveries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_source_errors_are_reported_as_retrieval() {
        let pipeline = pipeline(FakeSource::Misconfigured, RecordingSink::default());

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, DigestError::Retrieval(_)));
        assert!(err.to_string().contains("bad dataset"));
    }

    #[tokio::test]
    async fn test_malformed_record_aborts_before_rendering() {
        let records = vec![incident(1, 5.0), incident(2, -3.0)];
        let pipeline = pipeline(FakeSource::Records(records), RecordingSink::default());

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, DigestError::Retrieval(_)));
        assert_eq!(pipeline.renderer.calls.load(Ordering::SeqCst), 0);
        assert!(pipeline.sink.deliveries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_delivery_failure_after_single_render() {
        let sink = RecordingSink {
            fail: true,
            ..RecordingSink::default()
        };
        let pipeline = pipeline(FakeSource::Records(vec![incident(1, 30.0)]), sink);

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, DigestError::Delivery(_)));
        assert_eq!(pipeline.renderer.calls.load(Ordering::SeqCst), 1);
        assert_eq!(pipeline.sink.deliveries.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_render_failure_is_internal_and_skips_delivery() {
        let pipeline = ReportPipeline::new(
            config(),
            FakeSource::Records(vec![incident(1, 2.0)]),
            RecordingSink::default(),
        )
        .unwrap()
        .with_renderer(CountingRenderer {
            fail: true,
            ..CountingRenderer::default()
        });

        let err = pipeline.run().await.unwrap_err();

        assert!(matches!(err, DigestError::Render(_)));
        assert!(pipeline.sink.deliveries.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_configured_threshold_reaches_renderer() {
        let config = ReportConfig {
            warning_threshold_days: 3.0,
            subject_line: "Stale incidents (3 day threshold)".to_string(),
            ..config()
        };
        let records = vec![incident(1, 2.0), incident(2, 4.0), incident(3, 5.0)];
        let pipeline =
            ReportPipeline::new(config, FakeSource::Records(records), RecordingSink::default())
                .unwrap();

        pipeline.run().await.unwrap();

        let deliveries = pipeline.sink.deliveries.lock().unwrap();
        assert_eq!(deliveries[0].subject, "Stale incidents (3 day threshold)");
        assert!(deliveries[0]
            .document
            .contains("<h2>Stale incidents (3 day threshold)</h2>"));
        assert_eq!(
            deliveries[0].document.matches("<td class=\"days warning\"").count(),
            2
        );
    }

    #[test]
    fn test_invalid_config_is_rejected_at_construction() {
        let result = ReportPipeline::new(
            ReportConfig::default(),
            FakeSource::Records(vec![]),
            RecordingSink::default(),
        );

        assert!(matches!(result, Err(DigestError::Config(_))));
    }
}
