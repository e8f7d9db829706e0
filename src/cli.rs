use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use log::info;
use std::path::PathBuf;

use crate::auth::Token;
use crate::config::ReportConfig;
use crate::delivery::{DeliverySink, OutboxSink, WebhookSink};
use crate::pipeline::ReportPipeline;
use crate::render::{DEFAULT_TITLE, DEFAULT_WARNING_THRESHOLD_DAYS};
use crate::sources::{IncidentSource, JsonFileSource, WarehouseSource};

#[derive(Parser)]
#[command(name = "stale-digest")]
#[command(author, version, about = "Stale incident digest builder", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Run report output file path (defaults to stdout)
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,

    /// Pretty print JSON output
    #[arg(short, long, global = true, default_value_t = false)]
    pretty: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch stale incidents, render the digest and deliver it once
    Run(RunArgs),
}

// Source and sink are picked in `source()` / `sink()`. Env-supplied
// endpoints must never conflict with an explicit --input or --outbox.
#[derive(Args)]
struct RunArgs {
    /// Warehouse query endpoint that returns incident rows
    #[arg(long, env = "DIGEST_WAREHOUSE_URL")]
    warehouse_url: Option<String>,

    /// Query text sent to the warehouse (selects and orders stale incidents)
    #[arg(long, requires = "warehouse_url", conflicts_with = "query_file")]
    query: Option<String>,

    /// File containing the warehouse query text
    #[arg(long, requires = "warehouse_url")]
    query_file: Option<PathBuf>,

    /// Warehouse API token
    #[arg(short, long, env = "DIGEST_WAREHOUSE_TOKEN", hide_env_values = true)]
    token: Option<String>,

    /// JSON file of incident rows; takes precedence over --warehouse-url
    #[arg(short, long)]
    input: Option<PathBuf>,

    /// Mail relay endpoint that receives the rendered digest
    #[arg(long, env = "DIGEST_WEBHOOK_URL")]
    webhook_url: Option<String>,

    /// Mail relay API token
    #[arg(long, env = "DIGEST_WEBHOOK_TOKEN", hide_env_values = true)]
    webhook_token: Option<String>,

    /// Write the rendered digest to this file; takes precedence over --webhook-url
    #[arg(long)]
    outbox: Option<PathBuf>,

    /// Recipient address (repeatable or comma-separated)
    #[arg(
        short,
        long = "recipient",
        env = "DIGEST_RECIPIENTS",
        value_delimiter = ',',
        required = true
    )]
    recipients: Vec<String>,

    /// Subject line, also used as the document heading
    #[arg(short, long, default_value = DEFAULT_TITLE)]
    subject: String,

    /// Rows strictly above this many days are highlighted
    #[arg(short, long, default_value_t = DEFAULT_WARNING_THRESHOLD_DAYS)]
    warning_threshold_days: f64,
}

impl RunArgs {
    fn config(&self) -> ReportConfig {
        ReportConfig {
            recipients: self
                .recipients
                .iter()
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
            warning_threshold_days: self.warning_threshold_days,
            subject_line: self.subject.clone(),
        }
    }

    fn source(&self) -> Result<Box<dyn IncidentSource>> {
        if let Some(path) = &self.input {
            return Ok(Box::new(JsonFileSource::new(path.clone())));
        }

        let url = self
            .warehouse_url
            .as_deref()
            .context("either --warehouse-url or --input is required")?;

        let query = match (&self.query, &self.query_file) {
            (Some(query), _) => query.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read query file {}", path.display()))?,
            (None, None) => anyhow::bail!("--warehouse-url needs --query or --query-file"),
        };

        let token = Token::non_empty(self.token.clone());
        Ok(Box::new(WarehouseSource::new(url, query, token)?))
    }

    fn sink(&self) -> Result<Box<dyn DeliverySink>> {
        if let Some(path) = &self.outbox {
            return Ok(Box::new(OutboxSink::new(path.clone())));
        }

        let url = self
            .webhook_url
            .as_deref()
            .context("either --webhook-url or --outbox is required")?;

        let token = Token::non_empty(self.webhook_token.clone());
        Ok(Box::new(WebhookSink::new(url, token)?))
    }
}

impl Cli {
    pub async fn execute(&self) -> Result<()> {
        match &self.command {
            Commands::Run(args) => {
                info!("Building stale incident digest");

                let pipeline = ReportPipeline::new(args.config(), args.source()?, args.sink()?)?;
                let run = pipeline.run().await?;

                // Serialize to JSON
                let json_output = if self.pretty {
                    serde_json::to_string_pretty(&run)?
                } else {
                    serde_json::to_string(&run)?
                };

                // Write to output
                if let Some(output_path) = &self.output {
                    std::fs::write(output_path, json_output)?;
                    info!("Run report written to: {}", output_path.display());
                } else {
                    println!("{json_output}");
                }

                Ok(())
            }
        }
    }
}
