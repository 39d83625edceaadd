use anyhow::Result;
use clap::Parser;
use console::style;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use vidscribe::cli::{Cli, Commands};
use vidscribe::config::Config;
use vidscribe::pipeline::{JobQueue, TranscriptPipeline};
use vidscribe::{output, utils};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let default_filter = if cli.verbose { "vidscribe=debug" } else { "vidscribe=info" };
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = Config::load().await?;

    match cli.command {
        Commands::Resolve { urls, output, format } => {
            // Check for required external dependencies (non-fatal)
            let missing_deps =
                utils::check_dependencies(&config.media.yt_dlp_path, &config.media.ffmpeg_path).await;
            if !missing_deps.is_empty() {
                eprintln!("{}", style("Dependency check warnings:").yellow());
                for dep in missing_deps {
                    eprintln!("   • {}", dep);
                }
                eprintln!("   (Continuing anyway - cached records and subtitles may still work)");
            }

            let pipeline = TranscriptPipeline::from_config(&config, !cli.quiet).await?;
            let queue = JobQueue::new(Arc::new(pipeline), config.queue.job_timeout());

            let handles: Vec<_> = urls.iter().map(|url| queue.enqueue(url.as_str())).collect();

            let mut records = Vec::new();
            let mut failures = 0usize;
            for handle in handles {
                let url = handle.url().to_string();
                match handle.wait().await {
                    Ok(record) => records.push(record),
                    Err(e) => {
                        failures += 1;
                        eprintln!("{} {}: {:#}", style("failed").red().bold(), url, e);
                    }
                }
            }

            if !records.is_empty() {
                match output {
                    Some(path) => {
                        output::save_to_file(&records, &path, &format).await?;
                        println!("Transcripts saved to: {}", path.display());
                    }
                    None => output::print_to_console(&records, &format)?,
                }
            }

            if failures > 0 {
                anyhow::bail!("{} of {} URLs failed", failures, urls.len());
            }
        }
        Commands::Config { show } => {
            if show {
                config.display();
            } else {
                println!("Configuration file: {}", Config::config_path()?.display());
                println!("Edit it to change paths, cache namespace, job timeout or AWS settings.");
            }
        }
    }

    Ok(())
}
