use std::path::PathBuf;

use clap::Parser;
use serde_json::Value;
use sluice_ingest_core::{BulkClient, MetricsSnapshot, RefreshInterval};
use snafu::ResultExt;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::{
    config::IngestArgs,
    error::{CliError, IngestSnafu, InvalidDocumentSnafu, ReadFileSnafu, Result},
    remote::RemoteArgs,
};

const ID_FIELD: &str = "_id";

/// Push newline-delimited JSON documents to an index
#[derive(Parser)]
pub struct PushArgs {
    /// Index name
    index: String,

    /// File with one JSON document per line.
    ///
    /// A top-level `_id` string field is used as the document id and removed
    /// from the source. Documents without one get an id from the cluster.
    file: PathBuf,

    /// Document type of the pushed documents
    #[arg(long, default_value = "_doc")]
    doc_type: String,

    /// Disable index refreshes while pushing and restore them at the end
    #[arg(long)]
    bulk: bool,

    /// Refresh the index once all documents are pushed
    #[arg(long)]
    refresh: bool,

    #[clap(flatten)]
    ingest: IngestArgs,

    #[clap(flatten)]
    remote: RemoteArgs,
}

impl PushArgs {
    pub async fn run(self, ct: CancellationToken) -> Result<()> {
        let cluster = self.remote.cluster_client().await?;

        let client = BulkClient::builder(cluster.clone(), cluster)
            .with_options(self.ingest.to_options())
            .start()
            .context(IngestSnafu {
                operation: "start",
            })?;

        if self.bulk {
            client
                .start_bulk(&self.index, RefreshInterval::Disabled)
                .await
                .context(IngestSnafu {
                    operation: "start_bulk",
                })?;
        }

        let pushed = self.push_documents(&client, &ct).await;

        // Shutdown also restores bulk mode, so it runs even if pushing failed.
        let shutdown = client.shutdown().await;

        let count = pushed?;
        shutdown.context(IngestSnafu {
            operation: "shutdown",
        })?;

        if self.refresh {
            client
                .refresh_index(&self.index)
                .await
                .context(IngestSnafu {
                    operation: "refresh_index",
                })?;
        }

        println!("Read {count} documents from {}", self.file.display());
        print_metrics(&client.metrics());

        match client.failure() {
            Some(source) => Err(CliError::Ingest {
                operation: "push",
                source,
            }),
            None => Ok(()),
        }
    }

    /// Submits every document of the file. Returns the number of documents read.
    async fn push_documents(&self, client: &BulkClient, ct: &CancellationToken) -> Result<usize> {
        let file = tokio::fs::File::open(&self.file)
            .await
            .context(ReadFileSnafu { path: &self.file })?;
        let mut lines = BufReader::new(file).lines();

        let mut line_number: usize = 0;
        let mut count = 0;
        while let Some(line) = lines
            .next_line()
            .await
            .context(ReadFileSnafu { path: &self.file })?
        {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }

            if ct.is_cancelled() {
                warn!(line = line_number, "interrupted, stopping push");
                break;
            }

            let (id, source) = parse_document(&line)
                .context(InvalidDocumentSnafu { line: line_number })?;
            count += 1;

            if let Err(err) = client
                .index(&self.index, &self.doc_type, id.as_deref(), source)
                .await
            {
                // The cause is reported from the client once it shut down.
                if err.is_client_closed() {
                    warn!(line = line_number, "client closed, stopping push");
                    break;
                }
                return Err(CliError::Ingest {
                    operation: "index",
                    source: err,
                });
            }
        }

        Ok(count)
    }
}

/// Splits the `_id` field from a document line.
fn parse_document(line: &str) -> std::result::Result<(Option<String>, Vec<u8>), serde_json::Error> {
    let mut document: Value = serde_json::from_str(line)?;

    let id = match document.as_object_mut() {
        Some(object) => match object.remove(ID_FIELD) {
            Some(Value::String(id)) => Some(id),
            Some(other) => {
                object.insert(ID_FIELD.to_string(), other);
                None
            }
            None => None,
        },
        None => None,
    };

    Ok((id, serde_json::to_vec(&document)?))
}

fn print_metrics(metrics: &MetricsSnapshot) {
    println!("Submitted: {}", metrics.submitted);
    println!("Succeeded: {}", metrics.succeeded);
    println!("Failed: {}", metrics.failed);
    println!("Batches: {}", metrics.completed_batches);
    println!("Bytes sent: {}", bytesize::ByteSize::b(metrics.total_bytes));
    println!("Mean batch latency: {:?}", metrics.mean_latency());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_document_extracts_id() {
        let (id, source) = parse_document(r#"{"_id":"a","n":1}"#).expect("parse");
        assert_eq!(id.as_deref(), Some("a"));
        assert_eq!(source, br#"{"n":1}"#.to_vec());
    }

    #[test]
    fn test_parse_document_without_id() {
        let (id, source) = parse_document(r#"{"n":1}"#).expect("parse");
        assert!(id.is_none());
        assert_eq!(source, br#"{"n":1}"#.to_vec());

        // Only string ids are used; anything else stays in the source.
        let (id, source) = parse_document(r#"{"_id":7}"#).expect("parse");
        assert!(id.is_none());
        assert_eq!(source, br#"{"_id":7}"#.to_vec());
    }

    #[test]
    fn test_parse_document_rejects_invalid_json() {
        assert!(parse_document("{not json").is_err());
    }
}
