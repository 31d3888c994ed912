use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use tokio::sync::mpsc;

use lumina::audio::wav::write_wav;
use lumina::audio::{decode_pcm, CpalBackend, DecodedAudioBuffer, PlaybackEngine, PlaybackState, PlaybackStatus};
use lumina::config::Settings;
use lumina::guide::{Guide, ScanStage};
use lumina::history::HistoryStore;
use lumina::services::{Coordinates, GeminiClient, GroundingChunk, SuggestionResult};

#[derive(Parser)]
#[command(name = "lumina", version, about = "Photograph a landmark, hear its story")]
struct Cli {
    /// More detailed logs (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Identify the landmark in a photo and narrate it
    Scan {
        image: PathBuf,
        #[command(flatten)]
        location: LocationArgs,
        #[command(flatten)]
        output: OutputArgs,
    },
    /// Suggest places around a location
    Nearby {
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lng: f64,
    },
    /// Inspect or replay past scans
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Play a file of base64 raw PCM narration ("-" reads stdin)
    Play {
        file: PathBuf,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    List,
    Clear,
    /// Regenerate and play the narration of a saved place
    Replay {
        name: String,
        #[command(flatten)]
        output: OutputArgs,
    },
}

#[derive(Args)]
struct LocationArgs {
    #[arg(long, requires = "lng", allow_hyphen_values = true)]
    lat: Option<f64>,
    #[arg(long, requires = "lat", allow_hyphen_values = true)]
    lng: Option<f64>,
}

impl LocationArgs {
    fn coordinates(&self) -> Option<Coordinates> {
        match (self.lat, self.lng) {
            (Some(lat), Some(lng)) => Some(Coordinates::new(lat, lng)),
            _ => None,
        }
    }
}

#[derive(Args)]
struct OutputArgs {
    /// Also write the narration to a wav file
    #[arg(long)]
    wav: Option<PathBuf>,
    /// Do not play through the speakers
    #[arg(long)]
    no_play: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    lumina::logging::init(cli.verbose);

    let settings = Settings::from_env()?;
    tracing::debug!(history = %settings.history_path.display(), "Settings loaded");

    match cli.command {
        Command::Scan { image, location, output } => scan(&settings, &image, location.coordinates(), &output).await,
        Command::Nearby { lat, lng } => nearby(&settings, Coordinates::new(lat, lng)).await,
        Command::History { action } => history(&settings, action).await,
        Command::Play { file, output } => {
            let encoded = read_encoded(&file)?;
            let buffer = decode_pcm(&encoded, settings.pcm).context("Narration could not be decoded")?;
            deliver(&settings, buffer, &output).await
        }
    }
}

fn build_guide(settings: &Settings) -> Result<Guide> {
    let client = GeminiClient::new(
        settings.require_api_key()?,
        settings.base_url.clone(),
        settings.models.clone(),
        settings.http_timeout,
    )?;
    let history = HistoryStore::open(&settings.history_path);
    Ok(Guide::new(Arc::new(client), settings.pcm, history))
}

async fn scan(settings: &Settings, image: &Path, location: Option<Coordinates>, output: &OutputArgs) -> Result<()> {
    let (tx, mut rx) = mpsc::channel(8);
    let mut guide = build_guide(settings)?.with_stage_events(tx);

    let progress = tokio::spawn(async move {
        while let Some(stage) = rx.recv().await {
            let label = match stage {
                ScanStage::AnalyzingImage => "Analyzing image...",
                ScanStage::FetchingInfo => "Searching for details...",
                ScanStage::GeneratingAudio => "Generating narration...",
                ScanStage::Complete => continue,
            };
            println!("{}", label);
        }
    });

    let result = guide.scan_file(image, location).await;
    drop(guide);
    let _ = progress.await;
    let landmark = result?;

    println!();
    println!("{}", landmark.name);
    println!("{}", "=".repeat(landmark.name.chars().count()));
    println!("{}", landmark.details.description);
    if let Some(uri) = landmark.details.map_info.as_ref().and_then(|m| m.uri.as_deref()) {
        println!("\nMap: {}", uri);
    }
    print_chunks("Sources", &landmark.details.sources);
    print_chunks("Nearby", &landmark.details.nearby_places);
    println!();

    deliver(settings, landmark.audio, output).await
}

async fn nearby(settings: &Settings, location: Coordinates) -> Result<()> {
    let guide = build_guide(settings)?;
    let SuggestionResult {
        title,
        introduction,
        recommendations,
        places,
    } = guide.nearby(location).await?;

    println!("{}\n{}\n", title, introduction);
    for item in &recommendations {
        println!("- {} ({})\n  {}", item.name, item.kind, item.description);
    }
    print_chunks("On the map", &places);
    Ok(())
}

async fn history(settings: &Settings, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::List => {
            let store = HistoryStore::open(&settings.history_path);
            if store.is_empty() {
                println!("No saved places yet.");
            }
            for (i, item) in store.items().iter().enumerate() {
                println!("{:>2}. {}", i + 1, item.name);
            }
            Ok(())
        }
        HistoryAction::Clear => {
            HistoryStore::open(&settings.history_path).clear()?;
            println!("History cleared.");
            Ok(())
        }
        HistoryAction::Replay { name, output } => {
            let guide = build_guide(settings)?;
            let Some(item) = guide.history().find(&name).cloned() else {
                bail!("No saved place named {:?}", name);
            };
            println!("{}\n\n{}\n", item.name, item.description);
            let buffer = guide.narrate(&item.description).await?;
            deliver(settings, buffer, &output).await
        }
    }
}

async fn deliver(settings: &Settings, buffer: DecodedAudioBuffer, output: &OutputArgs) -> Result<()> {
    if let Some(path) = &output.wav {
        write_wav(&buffer, path).with_context(|| format!("Failed to write {}", path.display()))?;
        println!("Saved narration to {}", path.display());
    }
    if output.no_play {
        return Ok(());
    }
    play_to_end(settings, buffer).await
}

async fn play_to_end(settings: &Settings, buffer: DecodedAudioBuffer) -> Result<()> {
    let mut player = PlaybackEngine::new(CpalBackend::new(settings.pcm), settings.player);
    let mut updates = player.subscribe();
    player.play(buffer).context("Playback did not start")?;

    let ctrl_c = tokio::signal::ctrl_c();
    tokio::pin!(ctrl_c);

    loop {
        tokio::select! {
            changed = updates.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = *updates.borrow_and_update();
                print!("\r{}", progress_line(&status));
                let _ = std::io::stdout().flush();
                if status.state == PlaybackState::Stopped {
                    break;
                }
            }
            _ = &mut ctrl_c => {
                player.stop();
                break;
            }
        }
    }
    println!();

    player.shutdown();
    Ok(())
}

fn progress_line(status: &PlaybackStatus) -> String {
    const WIDTH: usize = 30;
    let ratio = if status.duration > 0.0 {
        (status.position / status.duration).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let filled = (ratio * WIDTH as f64).round() as usize;
    format!(
        "[{}{}] {} / {}",
        "#".repeat(filled),
        "-".repeat(WIDTH - filled),
        clock(status.position),
        clock(status.duration)
    )
}

fn clock(seconds: f64) -> String {
    let total = seconds.max(0.0).floor() as u64;
    format!("{}:{:02}", total / 60, total % 60)
}

fn print_chunks(heading: &str, chunks: &[GroundingChunk]) {
    if chunks.is_empty() {
        return;
    }
    println!("\n{}:", heading);
    for chunk in chunks {
        let uri = chunk
            .web
            .as_ref()
            .map(|w| w.uri.as_str())
            .or_else(|| chunk.maps.as_ref().map(|m| m.uri.as_str()))
            .unwrap_or_default();
        println!("- {} {}", chunk.title().unwrap_or("(untitled)"), uri);
    }
}

fn read_encoded(file: &Path) -> Result<String> {
    if file == Path::new("-") {
        let mut text = String::new();
        std::io::stdin()
            .read_to_string(&mut text)
            .context("Failed to read stdin")?;
        return Ok(text);
    }
    std::fs::read_to_string(file).with_context(|| format!("Failed to read {}", file.display()))
}
