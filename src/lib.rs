pub mod capture;
pub mod cli;
pub mod doctor;
pub mod error;
pub mod feedback;
pub mod knowledge;
pub mod ocr;
pub mod pipeline;
pub mod service;
pub mod settings;
pub mod shortcut;
pub mod utils;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Local;
use clap::Parser;
use log::{info, warn};

use capture::SystemCapturer;
use cli::{Cli, Command, RunConfig};
use feedback::FeedbackHandle;
use knowledge::KnowledgeWriter;
use ocr::TesseractOcr;
use pipeline::{Pipeline, TriggerEvent};
use service::HotkeyService;
use settings::SettingsStore;

/// Parses the command line and runs the selected command to completion.
pub fn run() -> Result<()> {
    let env_file = cli::load_env_file();
    let cli = Cli::parse();

    // Initialize logging (reads RUST_LOG env var)
    utils::logging::init(cli.verbose);
    if let Some(path) = env_file {
        info!("loaded environment from {}", path.display());
    }

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(dispatch(cli))
}

async fn dispatch(cli: Cli) -> Result<()> {
    let settings_path = cli
        .settings
        .clone()
        .or_else(SettingsStore::default_path)
        .unwrap_or_else(|| PathBuf::from("avr-settings.json"));
    let settings = SettingsStore::new(settings_path)?;
    let config = cli.resolve(&settings.snapshot())?;

    match cli.selected_command() {
        Command::Listen => listen(config).await,
        Command::Capture => capture_once(config).await,
        Command::Doctor => run_doctor(&config),
        Command::Show { date } => show(&config, date.unwrap_or_else(|| Local::now().date_naive())),
        Command::Settings {
            set_shortcut,
            sound,
            set_lang,
            set_region,
            clear_region,
            set_knowledge_dir,
        } => {
            let updated = if set_shortcut.is_none()
                && sound.is_none()
                && set_lang.is_none()
                && set_region.is_none()
                && !clear_region
                && set_knowledge_dir.is_none()
            {
                settings.snapshot()
            } else {
                settings.update(|s| {
                    if let Some(binding) = set_shortcut {
                        s.shortcut = Some(binding);
                    }
                    if let Some(enabled) = sound {
                        s.sound.enabled = enabled;
                    }
                    if let Some(lang) = set_lang {
                        s.ocr.language = lang;
                    }
                    if let Some(region) = set_region {
                        s.capture.region = Some(region);
                    }
                    if clear_region {
                        s.capture.region = None;
                    }
                    if let Some(dir) = set_knowledge_dir {
                        s.knowledge_dir = Some(dir);
                    }
                })?
            };
            println!("# {}", settings.path().display());
            println!("{}", serde_json::to_string_pretty(&updated)?);
            Ok(())
        }
    }
}

fn build_pipeline(config: &RunConfig) -> Pipeline {
    if let Err(err) = std::fs::create_dir_all(&config.knowledge_dir) {
        // Reported again, per capture, as a write error.
        warn!(
            "knowledge directory {} is not usable yet: {err}",
            config.knowledge_dir.display()
        );
    }

    Pipeline::new(
        Arc::new(SystemCapturer::new(config.region)),
        Arc::new(TesseractOcr::new(config.language.clone())),
        Arc::new(KnowledgeWriter::new(config.knowledge_dir.clone())),
    )
    .with_feedback(FeedbackHandle::new(config.sound))
    .with_echo(true)
}

async fn listen(config: RunConfig) -> Result<()> {
    let pipeline = Arc::new(build_pipeline(&config));
    let mut listener = shortcut::listener::default_listener()?;

    let service = HotkeyService::start(
        config.binding.clone(),
        listener.as_mut(),
        Arc::clone(&pipeline),
    )?;

    println!("🚀 AVR is running... Listening for '{}'", service.binding());
    println!("📂 Knowledge files go to {}", pipeline.writer().dir().display());
    println!("Press Ctrl+C to exit");

    tokio::signal::ctrl_c()
        .await
        .context("failed to wait for Ctrl+C")?;

    println!("\n👋 Shutting down AVR...");
    let handled = service.stop().await?;
    listener.stop();
    info!("handled {handled} captures this session");
    Ok(())
}

async fn capture_once(config: RunConfig) -> Result<()> {
    let pipeline = build_pipeline(&config);
    pipeline.run(TriggerEvent { seq: 1 }).await?;
    Ok(())
}

fn run_doctor(config: &RunConfig) -> Result<()> {
    let listener_available = shortcut::listener::default_listener().is_ok();
    let ocr = TesseractOcr::new(config.language.clone());
    let report = doctor::run_checks(&config.knowledge_dir, ocr.program(), listener_available);

    println!("{}", report.render());
    if !report.all_ok() {
        bail!("some checks failed");
    }
    Ok(())
}

fn show(config: &RunConfig, date: chrono::NaiveDate) -> Result<()> {
    let writer = KnowledgeWriter::new(config.knowledge_dir.clone());
    let entries = writer
        .read_day(date)
        .with_context(|| format!("failed to read {}", writer.path_for(date).display()))?;

    if entries.is_empty() {
        println!("No captures for {date}.");
        return Ok(());
    }

    for entry in entries {
        println!("## {}\n\n{}\n", entry.captured_at.format("%H:%M:%S"), entry.text);
    }
    Ok(())
}
