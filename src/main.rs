//! CLI driver: start a translation session, print records, tear down on
//! Ctrl-C. The UI proper is out of scope — this is the thinnest shell
//! that exercises the whole pipeline.

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use vocalink::audio::{CpalInput, CpalOutput};
use vocalink::history::HistoryStore;
use vocalink::lang::Language;
use vocalink::live::GeminiConnector;
use vocalink::session::{SessionController, SessionEvent};
use vocalink::AppConfig;

#[derive(Debug, Parser)]
#[command(name = "vocalink", about = "Real-time voice/text translation client")]
struct Cli {
    /// Source language code (e.g. "ko", "ja")
    #[arg(long)]
    source: Option<String>,

    /// Target language code (e.g. "en", "fr")
    #[arg(long)]
    target: Option<String>,

    /// Disable playback of translated audio
    #[arg(long)]
    mute: bool,

    /// Send one text translation request after the session opens
    #[arg(long)]
    text: Option<String>,

    /// Print the stored translation history and exit
    #[arg(long)]
    show_history: bool,
}

fn parse_language(code: &str) -> Result<Language> {
    Language::from_code(code)
        .with_context(|| format!("Unknown language code '{code}'"))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let mut config = AppConfig::load()?;

    if let Some(code) = &cli.source {
        config.source_language = parse_language(code)?;
    }
    if let Some(code) = &cli.target {
        config.target_language = parse_language(code)?;
    }
    if cli.mute {
        config.playback_enabled = false;
    }
    config.validate()?;

    let store = HistoryStore::default_path()
        .map(HistoryStore::new)
        .context("No data directory available for history")?;
    let mut history = store.load(config.history_cap)?;

    if cli.show_history {
        for record in history.iter() {
            println!(
                "[{}] ({}) {} → {}",
                record.timestamp.format("%Y-%m-%d %H:%M"),
                record.detected_language,
                record.source_text,
                record.translated_text,
            );
        }
        return Ok(());
    }

    let Some(api_key) = config.api_key.clone() else {
        bail!("No API key configured. Set GEMINI_API_KEY or add api_key to the config file.");
    };

    let input = CpalInput::new(config.audio.frame_size, config.audio.input_sample_rate);
    let output = CpalOutput::open(config.audio.output_sample_rate)
        .map_err(|e| anyhow::anyhow!("Failed to open speaker output: {e}"))?;
    let connector = Arc::new(GeminiConnector::new(api_key));

    let (mut session, mut events) =
        SessionController::new(config.clone(), Box::new(input), Box::new(output), connector);

    session
        .start()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to start session: {e}"))?;
    println!(
        "Translating {} → {}. Speak into the microphone; Ctrl-C to stop.",
        config.source_language.display_name(),
        config.target_language.display_name(),
    );

    if let Some(text) = &cli.text {
        session
            .translate_text(text)
            .await
            .map_err(|e| anyhow::anyhow!("Text request failed: {e}"))?;
    }

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                println!("\nStopping...");
                break;
            }
            event = events.recv() => {
                match event {
                    Some(SessionEvent::Record(record)) => {
                        println!(
                            "({}) {} → {}",
                            record.detected_language, record.source_text, record.translated_text
                        );
                        history.push(record);
                        store.save(&history)?;
                    }
                    Some(SessionEvent::PlaybackInterrupted) => {
                        tracing::debug!("Playback interrupted by new speech");
                    }
                    Some(SessionEvent::Failed(error)) => {
                        eprintln!("Session error: {error}");
                        break;
                    }
                    Some(SessionEvent::Stopped) | None => break,
                    Some(_) => {}
                }
            }
        }
    }

    session.stop().await;
    store.save(&history)?;
    Ok(())
}
