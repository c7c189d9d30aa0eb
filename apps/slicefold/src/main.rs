//! slicefold - fold every object under a Cloud Storage prefix into one object.
//!
//! Lists the slices under a prefix, orders them, composes them into the
//! destination 31 at a time and deletes each slice once it is part of the
//! destination. The composition report is printed to stdout as JSON.
//!
//! # Usage
//!
//! ```text
//! SLICEFOLD_SOURCE_PREFIX=gs://lake/export/part- \
//! SLICEFOLD_DESTINATION=gs://lake/export/final.avro \
//! GCS_ACCESS_TOKEN="$(gcloud auth print-access-token)" \
//! slicefold
//! ```
//!
//! # Environment Variables
//!
//! | Variable | Default | Description |
//! |----------|---------|-------------|
//! | `SLICEFOLD_SOURCE_PREFIX` | *(required)* | `gs://bucket/prefix` to list |
//! | `SLICEFOLD_DESTINATION` | *(required)* | `gs://bucket/object` to create |
//! | `SLICEFOLD_SLICE_ORDER` | `lexicographic` | `listed`, `lexicographic` or `natural` |
//! | `SLICEFOLD_CHUNK_SIZE` | `31` | Slices per compose call |
//! | `SLICEFOLD_MIN_MUTATION_INTERVAL_MS` | `1000` | Spacing of accumulator writes |
//! | `SLICEFOLD_CLEANUP_CONCURRENCY` | `16` | Parallel slice deletions |
//! | `SLICEFOLD_DISPATCH_DELAY_MS` | `5` | Delay between deletion submissions |
//! | `SLICEFOLD_DELETE_SLICES` | `true` | Delete slices after folding |
//! | `GCS_ENDPOINT` | `https://storage.googleapis.com` | JSON API endpoint |
//! | `GCS_ACCESS_TOKEN` | *(unset)* | OAuth2 bearer token |
//! | `GCS_USER_PROJECT` | *(unset)* | Requester-pays billing project |
//! | `LOG_LEVEL` | `info` | Log level filter |
//! | `RUST_LOG` | *(unset)* | Fine-grained tracing filter (overrides `LOG_LEVEL`) |
//!
//! Exits with status 1 if the composition fails and 2 if it succeeds but
//! some slices could not be deleted.

use std::sync::Arc;

use anyhow::{Context, Result};
use slicefold_compose::{ComposeError, Composer, CompositionReport, SliceOrder, prepare_slices};
use slicefold_core::{ComposeConfig, ObjectPath};
use slicefold_storage::{GcsConfig, GcsGateway, StorageGateway};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

/// Tool version reported at startup.
const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Exit status when the destination was built but some slices remain.
const EXIT_CLEANUP_INCOMPLETE: i32 = 2;

/// Initialize the tracing subscriber.
///
/// Uses `RUST_LOG` if set, otherwise falls back to the `LOG_LEVEL` config value.
/// Logs go to stderr so stdout carries only the report.
fn init_tracing(log_level: &str) -> Result<()> {
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::try_new(log_level)
            .with_context(|| format!("invalid log level filter: {log_level}"))?
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .init();

    Ok(())
}

/// What to fold and where.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RunArgs {
    source_prefix: ObjectPath,
    destination: ObjectPath,
    order: SliceOrder,
}

impl RunArgs {
    fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let source_prefix = lookup("SLICEFOLD_SOURCE_PREFIX")
            .context("SLICEFOLD_SOURCE_PREFIX is not set")?
            .parse::<ObjectPath>()
            .context("invalid SLICEFOLD_SOURCE_PREFIX")?;
        let destination = lookup("SLICEFOLD_DESTINATION")
            .context("SLICEFOLD_DESTINATION is not set")?;
        let destination =
            ObjectPath::parse_object(&destination).context("invalid SLICEFOLD_DESTINATION")?;
        let order = match lookup("SLICEFOLD_SLICE_ORDER") {
            Some(raw) => raw
                .parse::<SliceOrder>()
                .map_err(anyhow::Error::msg)
                .context("invalid SLICEFOLD_SLICE_ORDER")?,
            None => SliceOrder::default(),
        };

        if source_prefix.bucket() != destination.bucket() {
            anyhow::bail!(
                "source prefix {source_prefix} and destination {destination} must share a bucket"
            );
        }
        Ok(Self {
            source_prefix,
            destination,
            order,
        })
    }
}

/// List, order and fold the slices under `args.source_prefix`.
async fn execute(
    gateway: Arc<dyn StorageGateway>,
    config: ComposeConfig,
    args: &RunArgs,
    cancel: CancellationToken,
) -> Result<CompositionReport> {
    let listed = gateway
        .list(&args.source_prefix)
        .await
        .with_context(|| format!("failed to list {}", args.source_prefix))?;
    let slices = prepare_slices(listed, &args.destination, args.order);
    info!(
        prefix = %args.source_prefix,
        slices = slices.len(),
        order = %args.order,
        "listed slices"
    );

    let composer = Composer::new(gateway, config)?.with_cancellation(cancel);
    match composer.run(&args.destination, &slices).await {
        Ok(report) => Ok(report),
        Err(e) => {
            report_partial(&e, &slices);
            Err(e.into())
        }
    }
}

/// Log what a failed run left behind.
fn report_partial(error: &ComposeError, slices: &[slicefold_core::ObjectRef]) {
    let Some(accumulator) = error.accumulator() else {
        return;
    };
    let folded = error.slices_folded();
    let first_pending = slices.get(folded).map(|s| s.path.to_string());
    let transient = matches!(
        error,
        ComposeError::ComposeFailed { source, .. } if source.is_transient()
    );
    warn!(
        accumulator = %accumulator,
        slices_folded = folded,
        slices_pending = slices.len() - folded,
        first_pending = first_pending.as_deref().unwrap_or("-"),
        transient,
        "destination holds a partial result"
    );
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = ComposeConfig::from_env();
    init_tracing(&config.log_level)?;
    config.validate().context("invalid composition settings")?;

    let args = RunArgs::from_env()?;
    let gcs_config = GcsConfig::from_env();

    info!(
        source_prefix = %args.source_prefix,
        destination = %args.destination,
        order = %args.order,
        endpoint = %gcs_config.endpoint,
        chunk_size = config.chunk_size,
        cleanup_concurrency = config.cleanup_concurrency,
        version = VERSION,
        "starting slicefold",
    );

    let gateway: Arc<dyn StorageGateway> =
        Arc::new(GcsGateway::new(gcs_config).context("failed to build storage client")?);

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("received shutdown signal, stopping after the current compose call");
            on_signal.cancel();
        }
    });

    let report = match execute(gateway, config, &args, cancel).await {
        Ok(report) => report,
        Err(e) => {
            error!(error = %format!("{e:#}"), "slicefold failed");
            return Err(e);
        }
    };

    println!(
        "{}",
        serde_json::to_string_pretty(&report).context("failed to encode report")?
    );
    if !report.cleanup.is_clean() {
        warn!(
            failed = report.cleanup.failures.len(),
            "some slices could not be deleted"
        );
        std::process::exit(EXIT_CLEANUP_INCOMPLETE);
    }
    Ok(())
}
