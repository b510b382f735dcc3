use anyhow::{anyhow, bail, Context, Result};
use signage::core::{CampaignId, MediaId, MediaKind};
use signage::library::{Library, LibraryError, Mp4Probe, Operation};
use signage::playback::{launch_target, play_campaign, play_target, CancelSignal, HeadlessSurface, SessionOutcome};
use signage::storage::{shared, JsonDirStore};
use std::path::Path;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

const USAGE: &str = "usage: signage [play [<campaign>] | list | new | add <campaign> <file> | remove <campaign> <item> | settings]";

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging, RUST_LOG overrides the default level
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let root = JsonDirStore::default_root();
    let store = JsonDirStore::open(&root)
        .with_context(|| format!("Failed to open data directory {}", root.display()))?;
    info!("Using data directory {}", root.display());
    let mut library = Library::open(shared(store), Box::new(Mp4Probe))
        .map_err(|e| notice(Operation::Load, e))?;

    let args: Vec<String> = std::env::args().skip(1).collect();
    let args: Vec<&str> = args.iter().map(String::as_str).collect();

    match args.as_slice() {
        [] => {
            let target = launch_target(library.settings.get(), library.campaigns.list()).map(|c| c.id.clone());
            match target {
                Some(id) => play(&mut library, &id).await,
                None => {
                    println!("Auto-start is off or no campaign to resume.");
                    println!("{}", USAGE);
                    Ok(())
                }
            }
        }
        ["play"] => {
            let target = play_target(library.settings.get(), library.campaigns.list()).map(|c| c.id.clone());
            match target {
                Some(id) => play(&mut library, &id).await,
                None => bail!("No campaigns to play. Create one with `signage new`."),
            }
        }
        ["play", id] => play(&mut library, &CampaignId::from(*id)).await,
        ["list"] => {
            list(&library);
            Ok(())
        }
        ["new"] => {
            let campaign = library.campaigns.create().map_err(|e| notice(Operation::Create, e))?;
            println!("{}\t{}", campaign.id, campaign.name);
            Ok(())
        }
        ["add", id, file] => add(&mut library, &CampaignId::from(*id), Path::new(file)),
        ["remove", id, item] => {
            let removed = library
                .campaigns
                .remove_media(&CampaignId::from(*id), &MediaId::from(*item))
                .map_err(|e| notice(Operation::Delete, e))?;
            println!("Removed {} {}", removed.kind, removed.id);
            Ok(())
        }
        ["settings"] => {
            let json = serde_json::to_string_pretty(library.settings.get())?;
            println!("{}", json);
            Ok(())
        }
        _ => bail!(USAGE),
    }
}

/// Log a library error the way the editing surface would toast it
fn notice(op: Operation, e: LibraryError) -> anyhow::Error {
    let notice = e.notice(op);
    error!("{} ({})", notice, e);
    anyhow!("{}", notice)
}

fn list(library: &Library) {
    if library.campaigns.list().is_empty() {
        println!("No campaigns yet.");
    }
    for campaign in library.campaigns.list() {
        println!(
            "{}\t{}\t{} items\tcreated {}",
            campaign.id,
            campaign.name,
            campaign.len(),
            campaign.created_at.format("%Y-%m-%d %H:%M")
        );
        for item in &campaign.media {
            println!("  {}\t{}\t{:.1}s", item.id, item.kind, item.duration);
        }
    }
}

fn add(library: &mut Library, id: &CampaignId, file: &Path) -> Result<()> {
    let ext = file
        .extension()
        .and_then(|e| e.to_str())
        .ok_or_else(|| anyhow!("{} has no file extension", file.display()))?;
    let kind = MediaKind::from_extension(ext)
        .ok_or_else(|| anyhow!("Unsupported file type: .{}", ext))?;
    let data = std::fs::read(file).with_context(|| format!("Failed to read {}", file.display()))?;
    let mime = format!("{}/{}", kind, ext.to_ascii_lowercase());

    let item = library
        .add_media(id, kind, &data, Some(mime))
        .map_err(|e| notice(Operation::AddMedia, e))?;
    println!("{}\t{}\t{:.1}s", item.id, item.kind, item.duration);
    Ok(())
}

async fn play(library: &mut Library, id: &CampaignId) -> Result<()> {
    let (signal, cancel) = CancelSignal::new();
    // Ctrl-C is the exit key
    let exit_key = {
        let signal = signal.clone();
        tokio::spawn(async move {
            match tokio::signal::ctrl_c().await {
                Ok(()) => signal.cancel(),
                Err(e) => warn!("Cannot listen for Ctrl-C: {}", e),
            }
        })
    };

    let mut surface = HeadlessSurface::new("display");
    let outcome = play_campaign(library, id, &mut surface, cancel).await;
    exit_key.abort();
    drop(signal);

    match outcome.map_err(|e| notice(Operation::Load, e))? {
        SessionOutcome::NotFound => {
            warn!("Campaign {} not found", id);
            println!("Campaign {} not found.", id);
            list(library);
        }
        SessionOutcome::Finished(report) => {
            info!(
                "Playback finished: {} advances, {} stale events ignored",
                report.advances, report.stale_events
            );
        }
    }
    Ok(())
}
