//! `cuecast` -- publish and update performance templates.
//!
//! Reads a template directory (see `cuecast_core::store`), syncs it with
//! the backend and records the result back into the directory.
//!
//! # Environment variables
//!
//! | Variable                       | Required | Default                        |
//! |--------------------------------|----------|--------------------------------|
//! | `CUECAST_API_URL`              | no       | `http://localhost:3000/api/v1` |
//! | `CUECAST_API_TOKEN`            | no       | --                             |
//! | `CUECAST_USER_UID`             | publish  | --                             |
//! | `CUECAST_SCRATCH_DIR`          | no       | system temp dir                |
//! | `CUECAST_LIST_CONCURRENCY`     | no       | `4`                            |
//! | `CUECAST_REQUEST_TIMEOUT_SECS` | no       | --                             |

mod cli;

use std::path::Path;

use anyhow::{bail, Context};
use clap::Parser;
use cuecast_core::delta::SyncDelta;
use cuecast_core::store::TemplateStore;
use cuecast_core::template::Template;
use cuecast_core::timeline::TimelineDocument;
use cuecast_package::PackageReader;
use cuecast_sync::{Published, PublishOutcome, SyncConfig, SyncContext, SyncError, TemplateSync};
use cuecast_transport::{progress, TransferProgress};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use cli::{Cli, Commands};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "cuecast=info,cuecast_sync=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    let config = SyncConfig::from_env().context("Invalid configuration")?;
    tracing::info!(
        api_url = %config.api_url,
        authenticated = config.api_token.is_some(),
        "Loaded sync configuration",
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupted, cancelling");
                cancel.cancel();
            }
        }
    });

    match cli.command {
        Commands::Publish { dir, section } => publish(&config, &dir, &section, cancel).await,
        Commands::Update { dir, force } => update(&config, &dir, force, cancel).await,
        Commands::Status { dir } => status(&config, &dir, cancel).await,
        Commands::List { sections } => list(&config, &sections, cancel).await,
        Commands::Inspect { package } => inspect(&package).await,
        Commands::Fetch { url, out } => fetch(&config, &url, &out, cancel).await,
    }
}

// ---- commands ----

async fn publish(
    config: &SyncConfig,
    dir: &Path,
    section: &str,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let store = TemplateStore::new(dir);
    let mut template = load(&store).await?;
    let sync = TemplateSync::from_config(config).map_err(report)?;
    let ctx = context(cancel);

    match sync.publish(&template, section, &ctx).await.map_err(report)? {
        PublishOutcome::Published(published) => record(&store, &mut template, &published).await,
        PublishOutcome::NoChanges => {
            println!("Nothing to publish");
            Ok(())
        }
        PublishOutcome::Conflict(pending) => {
            bail!("[CONFLICT] {}", pending.message())
        }
    }
}

async fn update(
    config: &SyncConfig,
    dir: &Path,
    force: bool,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let store = TemplateStore::new(dir);
    let mut template = load(&store).await?;
    let sync = TemplateSync::from_config(config).map_err(report)?;
    let ctx = context(cancel);

    match sync.update(&template, &ctx).await.map_err(report)? {
        PublishOutcome::Published(published) => record(&store, &mut template, &published).await,
        PublishOutcome::NoChanges => {
            println!("No changes since last sync");
            Ok(())
        }
        PublishOutcome::Conflict(pending) if force => {
            tracing::info!(reason = %pending.message(), "Overriding server copy");
            let published = sync.force_override(pending, &ctx).await.map_err(report)?;
            record(&store, &mut template, &published).await
        }
        PublishOutcome::Conflict(pending) => bail!(
            "[CONFLICT] {}\nRe-run with --force to replace the server copy",
            pending.message()
        ),
    }
}

async fn status(config: &SyncConfig, dir: &Path, cancel: CancellationToken) -> anyhow::Result<()> {
    let template = load(&TemplateStore::new(dir)).await?;

    println!("{} v{}", template.title, template.version);
    println!("  state: {}", template.sync_state());
    if let Ok(delta) = SyncDelta::evaluate(&template) {
        if !delta.is_empty() {
            println!(
                "  pending: metadata={} cover={} scripts={} images={}",
                delta.metadata_changed,
                delta.cover_changed,
                delta.script_changed.len(),
                delta.image_changed.len(),
            );
        }
    }

    if let Some(cloud_uid) = &template.cloud_uid {
        let sync = TemplateSync::from_config(config).map_err(report)?;
        let remote = sync
            .template_status(cloud_uid, &SyncContext::new(cancel))
            .await
            .map_err(report)?;
        println!("  cloud: {} ({})", remote.uid, remote.status);
        if let Some(message) = remote.error_message {
            println!("  server message: {message}");
        }
    }
    Ok(())
}

async fn list(
    config: &SyncConfig,
    sections: &[String],
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let sync = TemplateSync::from_config(config).map_err(report)?;
    let templates = sync
        .list_cloud_templates(sections, &SyncContext::new(cancel))
        .await
        .map_err(report)?;

    for t in &templates {
        println!(
            "{}\t{}\tv{}\t{}\t{}",
            t.created_at.format("%Y-%m-%d %H:%M"),
            t.language_section_uid,
            t.version,
            t.uid,
            t.title
        );
    }
    tracing::info!(count = templates.len(), "Listed templates");
    Ok(())
}

async fn inspect(path: &Path) -> anyhow::Result<()> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let mut reader = PackageReader::new(&bytes)?;

    for name in reader.entry_names() {
        let entry = reader.read(&name)?.unwrap_or_default();
        println!("{name}\t{} bytes", entry.len());
        if name.ends_with(".json") {
            let doc: TimelineDocument = serde_json::from_slice(&entry)
                .with_context(|| format!("{name} is not a timeline document"))?;
            println!(
                "  duration {}s, {} events, {} images",
                doc.duration,
                doc.events.len(),
                doc.images.len()
            );
        }
    }
    Ok(())
}

async fn fetch(
    config: &SyncConfig,
    url: &str,
    out: &Path,
    cancel: CancellationToken,
) -> anyhow::Result<()> {
    let transport = config.transport()?;
    let (tx, rx) = progress::channel();
    let reporter = tokio::spawn(log_progress(rx));

    let bytes = transport.download(url, Some(&tx), &cancel).await?;
    drop(tx);
    let _ = reporter.await;

    tokio::fs::write(out, &bytes)
        .await
        .with_context(|| format!("Failed to write {}", out.display()))?;
    println!("Saved {} bytes to {}", bytes.len(), out.display());
    Ok(())
}

// ---- helpers ----

async fn load(store: &TemplateStore) -> anyhow::Result<Template> {
    store
        .load()
        .await
        .with_context(|| format!("Failed to load template from {}", store.root().display()))
}

/// Persist a successful sync into the template directory.
async fn record(
    store: &TemplateStore,
    template: &mut Template,
    published: &Published,
) -> anyhow::Result<()> {
    published.apply_to(template);
    store
        .save(template)
        .await
        .context("Upload succeeded but the sync could not be recorded locally")?;
    println!(
        "Synced {} v{} as {} ({})",
        template.title,
        published.version,
        published.cloud_uid(),
        published.response.status
    );
    Ok(())
}

fn context(cancel: CancellationToken) -> SyncContext {
    let (tx, rx) = progress::channel();
    tokio::spawn(log_progress(rx));
    SyncContext::new(cancel).with_progress(tx)
}

/// Log transfer progress until the sender goes away.
async fn log_progress(mut rx: watch::Receiver<TransferProgress>) {
    let mut last_decile = 0;
    while rx.changed().await.is_ok() {
        let p = *rx.borrow_and_update();
        let decile = p.fraction().map_or(0, |f| (f * 10.0) as u32);
        if decile > last_decile {
            last_decile = decile;
            tracing::debug!(sent = p.sent, total = ?p.total, "Transfer progress");
        }
    }
}

/// Attach the result code to a sync error.
fn report(e: SyncError) -> anyhow::Error {
    anyhow::anyhow!("[{}] {e}", e.code())
}
