//! Turns command line flags and files into core configuration.

use std::{
    path::{Path, PathBuf},
    time::Duration,
};

use bytesize::ByteSize;
use clap::Args;
use sluice_ingest_core::{IndexSettings, IngestOptions};
use snafu::ResultExt;

use crate::error::{CliError, InvalidJsonFileSnafu, ReadFileSnafu, Result};

/// Batching limits of the bulk client.
#[derive(Debug, Clone, Args)]
pub struct IngestArgs {
    /// Seal a batch once it holds this many operations
    #[arg(long, default_value_t = IngestOptions::DEFAULT_MAX_ACTIONS_PER_BATCH)]
    pub max_actions: usize,
    /// Seal a batch once it reaches this size, for example `5MiB`
    #[arg(long, default_value = "10MiB")]
    pub max_volume: ByteSize,
    /// Maximum number of batches in flight [default: 2 x available CPUs]
    #[arg(long)]
    pub max_concurrent: Option<usize>,
    /// Send the open batch after this many milliseconds
    #[arg(long, default_value_t = 30_000)]
    pub flush_interval_ms: u64,
}

impl IngestArgs {
    pub fn to_options(&self) -> IngestOptions {
        let options = IngestOptions::new()
            .with_max_actions_per_batch(self.max_actions)
            .with_max_volume_per_batch(self.max_volume)
            .with_flush_interval(Duration::from_millis(self.flush_interval_ms));

        match self.max_concurrent {
            Some(max_concurrent) => options.with_max_concurrent_batches(max_concurrent),
            None => options,
        }
    }
}

/// Settings for a new index.
///
/// Starts from `settings_file` if given, then applies the flags on top.
pub fn load_index_settings(
    settings_file: Option<&Path>,
    shards: Option<u32>,
    replicas: Option<u32>,
    mappings: &[String],
) -> Result<IndexSettings> {
    let mut settings = match settings_file {
        Some(path) => read_json(path)?,
        None => IndexSettings::default(),
    };

    if let Some(shards) = shards {
        settings.number_of_shards = shards;
    }

    if let Some(replicas) = replicas {
        settings.number_of_replicas = replicas;
    }

    for mapping in mappings {
        let (doc_type, path) = parse_mapping_arg(mapping)?;
        let mapping: serde_json::Value = read_json(&path)?;
        settings.mappings.insert(doc_type, mapping);
    }

    Ok(settings)
}

/// Parses a `<doc_type>=<path>` mapping argument.
pub fn parse_mapping_arg(arg: &str) -> Result<(String, PathBuf)> {
    match arg.split_once('=') {
        Some((doc_type, path)) if !doc_type.is_empty() && !path.is_empty() => {
            Ok((doc_type.to_string(), PathBuf::from(path)))
        }
        _ => Err(CliError::InvalidArgument {
            name: "mapping",
            message: format!("expected <doc_type>=<path>, got '{arg}'"),
        }),
    }
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    let content = std::fs::read(path).context(ReadFileSnafu { path })?;
    serde_json::from_slice(&content).context(InvalidJsonFileSnafu { path })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_mapping_arg() {
        let (doc_type, path) = parse_mapping_arg("event=mappings/event.json").expect("parse");
        assert_eq!(doc_type, "event");
        assert_eq!(path, PathBuf::from("mappings/event.json"));

        assert!(parse_mapping_arg("event").is_err());
        assert!(parse_mapping_arg("=file.json").is_err());
        assert!(parse_mapping_arg("event=").is_err());
    }

    #[test]
    fn test_flags_override_defaults() {
        let settings = load_index_settings(None, Some(4), Some(1), &[]).expect("settings");
        assert_eq!(settings.number_of_shards, 4);
        assert_eq!(settings.number_of_replicas, 1);
        assert!(settings.mappings.is_empty());
    }

    #[test]
    fn test_missing_settings_file() {
        let err = load_index_settings(Some(Path::new("/nonexistent/settings.json")), None, None, &[])
            .unwrap_err();
        assert!(matches!(err, CliError::ReadFile { .. }));
    }

    #[test]
    fn test_ingest_args_to_options() {
        let args = IngestArgs {
            max_actions: 10,
            max_volume: ByteSize::kib(64),
            max_concurrent: Some(3),
            flush_interval_ms: 500,
        };

        let options = args.to_options();
        assert_eq!(options.max_actions_per_batch, 10);
        assert_eq!(options.max_volume_per_batch, ByteSize::kib(64));
        assert_eq!(options.max_concurrent_batches, 3);
        assert_eq!(options.flush_interval, Duration::from_millis(500));
        assert!(options.validate().is_ok());
    }
}
