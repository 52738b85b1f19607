use anyhow::Result;
use clap::Parser;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use reelhook::compositor::{download_video, CompositionProps, Compositor, ExportQuality, PropsBundleExporter};
use reelhook::hooks::{find_hook, hook_ids, HookSelection, HOOK_TEMPLATES};
use reelhook::output::{self, RunReport};
use reelhook::pipeline::{poll_until_terminal, ProcessingStatus};
use reelhook::providers::{ReplicateVideoGenerator, VideoGenerator};
use reelhook::state::{StateView, VideoAction};
use reelhook::upload::{mime_type_for_path, validate_upload, LocalMediaStore, MediaStore, UploadPolicy};
use reelhook::utils::format_file_size;
use reelhook::{Cli, Commands, Config, Orchestrator, OutputFormat, StateStore, UploadedAsset};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "reelhook=debug" } else { "reelhook=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Generate {
            file,
            hook,
            topic,
            demo,
            mime,
            model,
            output,
            format,
            export,
            quality,
            download_intro,
        } => {
            let config = Config::load(cli.config.as_deref())?;
            let request = GenerateRequest {
                file,
                hook,
                topic,
                demo,
                mime,
                model,
                output,
                format,
                export,
                quality,
                download_intro,
            };
            generate(config, request, cli.quiet).await?;
        }
        Commands::Validate { file, mime } => {
            let config = Config::load(cli.config.as_deref())?;
            let metadata = fs_err::metadata(&file)?;
            let mime_type = mime.unwrap_or_else(|| mime_type_for_path(&file));

            validate_upload(&mime_type, metadata.len(), &UploadPolicy::from(&config.upload))?;
            println!(
                "{} {} ({}, {}) is a valid upload",
                style("✓").green(),
                file.display(),
                format_file_size(metadata.len()),
                mime_type
            );
        }
        Commands::Hooks => {
            println!("Available hooks:");
            for hook in HOOK_TEMPLATES {
                println!(
                    "  {:<18} {} - {}",
                    style(hook.id).cyan(),
                    hook.title,
                    hook.description
                );
            }
            println!("\nOr pass --topic \"<your topic>\" for a custom intro.");
        }
        Commands::Status { job_id, wait } => {
            let config = Config::load(cli.config.as_deref())?;
            let generator = ReplicateVideoGenerator::new(&config.replicate)?;
            let mut job = generator.job_status(&job_id).await?;

            if wait && !job.is_terminal() {
                let progress = spinner(cli.quiet);
                progress.set_message(format!("Job {} is {}", job.id, job.status));
                job = poll_until_terminal(&generator, job, config.poll_interval(), |job, check| {
                    progress.set_message(format!("Job {} is {} (check #{})", job.id, job.status, check));
                })
                .await?;
                progress.finish_and_clear();
            }

            println!("Job {}: {}", job.id, job.status);
            if let Some(url) = &job.output_url {
                println!("  Output: {}", url);
            }
            if let Some(error) = &job.error {
                println!("  Error: {}", style(error).red());
            }
        }
        Commands::Config { show, init } => {
            if init {
                let path = match &cli.config {
                    Some(path) => path.clone(),
                    None => Config::config_path()?,
                };
                if path.exists() {
                    anyhow::bail!("Configuration file already exists: {}", path.display());
                }
                let path = Config::default().save(Some(&path))?;
                println!("Configuration written to: {}", path.display());
            } else {
                let config = Config::load(cli.config.as_deref())?;
                if !show {
                    println!("(use --init to write a default configuration file)");
                }
                config.display();
            }
        }
    }

    Ok(())
}

struct GenerateRequest {
    file: PathBuf,
    hook: String,
    topic: Option<String>,
    demo: bool,
    mime: Option<String>,
    model: Option<String>,
    output: Option<PathBuf>,
    format: OutputFormat,
    export: Option<PathBuf>,
    quality: ExportQuality,
    download_intro: bool,
}

async fn generate(config: Config, request: GenerateRequest, quiet: bool) -> Result<()> {
    let policy = UploadPolicy::from(&config.upload);
    let asset = UploadedAsset::from_path(&request.file, request.mime.as_deref(), &policy).await?;

    let hook = match &request.topic {
        Some(topic) => HookSelection::topic(topic),
        None => find_hook(&request.hook)
            .map(HookSelection::from)
            .ok_or_else(|| anyhow::anyhow!("Unknown hook '{}'. Available hooks: {}", request.hook, hook_ids()))?,
    };

    // Keep exported uploads next to the composition that references them
    let storage_dir = config
        .upload
        .storage_dir
        .clone()
        .or_else(|| request.export.as_ref().map(|dir| dir.join("uploads")));
    let media = Arc::new(LocalMediaStore::new(storage_dir.as_deref())?);

    let mut orchestrator = Orchestrator::from_config(&config, media.clone())?;
    orchestrator.settings_mut().force_demo |= request.demo;
    if request.model.is_some() {
        orchestrator.settings_mut().model = request.model.clone();
    }

    let mut store = StateStore::new();
    store.dispatch(VideoAction::SelectFile(Some(asset)))?;
    store.dispatch(VideoAction::SelectHook(Some(hook)))?;

    let watcher = (!quiet).then(|| watch_progress(store.view()));
    let outcome = orchestrator.run(&mut store).await?;
    if let Some(watcher) = watcher {
        watcher.await?;
    }

    if outcome.processing.status == ProcessingStatus::Error {
        anyhow::bail!("{}", outcome.processing.message);
    }
    if let Some(reason) = outcome.demo {
        tracing::info!("Run used demo mode ({})", reason);
    }

    for notice in &store.state().notices {
        eprintln!("{} {}", style("!").yellow(), notice);
    }

    let report = RunReport::from(store.state());
    match &request.output {
        Some(path) => {
            output::save_to_file(&report, path, &request.format).await?;
            eprintln!("Captions saved to: {}", path.display());
        }
        None => output::print_to_console(&report, &request.format)?,
    }

    match &request.export {
        Some(dir) => export(&config, &mut store, dir, &request, quiet).await?,
        None if config.upload.storage_dir.is_none() => {
            let released = media.release_all().await?;
            tracing::debug!("Released {} stored upload(s)", released);
        }
        None => {}
    }

    Ok(())
}

async fn export(
    config: &Config,
    store: &mut StateStore,
    dir: &Path,
    request: &GenerateRequest,
    quiet: bool,
) -> Result<()> {
    let props = CompositionProps::from_state(store.state(), config.pipeline.duration_secs as f64, request.quality);
    let path = PropsBundleExporter.render(&props, dir).await?;

    let absolute = path.canonicalize().unwrap_or_else(|_| path.clone());
    let montage_url = url::Url::from_file_path(&absolute).ok().map(|url| url.to_string());
    store.dispatch(VideoAction::SetRenderedMontageUrl(montage_url))?;
    eprintln!(
        "Composition ({} quality, {} frames) written to: {}",
        request.quality,
        props.duration_in_frames,
        path.display()
    );

    if request.download_intro {
        match store.state().ai_video_url.clone() {
            Some(url) => {
                let progress = if quiet { ProgressBar::hidden() } else { download_bar() };
                let clip = download_video(&url, dir, &progress).await?;
                eprintln!("Intro clip saved to: {}", clip.display());
            }
            None => eprintln!("{} No intro clip to download", style("!").yellow()),
        }
    }

    Ok(())
}

/// Mirror published state onto a progress bar until the run settles
fn watch_progress(mut view: StateView) -> JoinHandle<()> {
    tokio::spawn(async move {
        let progress = ProgressBar::new(100);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{bar:30.cyan/blue}] {pos:>3}% {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar()),
        );
        progress.enable_steady_tick(Duration::from_millis(120));

        while let Ok(state) = view.changed().await {
            let processing = state.processing;
            progress.set_position(processing.status.progress_percent() as u64);
            progress.set_message(processing.message.clone());

            match processing.status {
                ProcessingStatus::Completed => {
                    progress.finish_with_message(style(processing.message).green().to_string());
                    return;
                }
                ProcessingStatus::Error => {
                    progress.abandon_with_message(style(processing.message).red().to_string());
                    return;
                }
                _ => {}
            }
        }
        progress.finish_and_clear();
    })
}

fn spinner(quiet: bool) -> ProgressBar {
    if quiet {
        return ProgressBar::hidden();
    }
    let progress = ProgressBar::new_spinner();
    progress.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    progress.enable_steady_tick(Duration::from_millis(120));
    progress
}

fn download_bar() -> ProgressBar {
    let progress = ProgressBar::new(0);
    progress.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {bytes}/{total_bytes} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );
    progress
}
