use std::{sync::Arc, time::Duration};

use anyhow::Result;
use clap::Parser;
use engine::{EngineEvent, EngineOptions, LifecycleEngine, RandomizedDurations};
use shared::domain::{FileStatus, RawFileInput};
use tracing::info;
use view::{format_size, Projection, ViewState};

mod config;

#[derive(Parser, Debug)]
#[command(about = "Runs a simulated knowledgebase ingestion and prints the file table")]
struct Args {
    /// Simulated file as name:size_bytes[:mime_type] (repeatable)
    #[arg(long = "file", value_parser = parse_raw_file)]
    files: Vec<RawFileInput>,
    /// Filter the final table by a name substring
    #[arg(long)]
    search: Option<String>,
}

fn parse_raw_file(raw: &str) -> Result<RawFileInput, String> {
    let mut parts = raw.splitn(3, ':');
    let name = parts
        .next()
        .filter(|part| !part.is_empty())
        .ok_or_else(|| "missing file name".to_string())?;
    let size_bytes = parts
        .next()
        .ok_or_else(|| "missing size in bytes".to_string())?
        .parse::<u64>()
        .map_err(|err| format!("bad size: {err}"))?;
    let mime_type = parts.next().unwrap_or("application/octet-stream");
    Ok(RawFileInput {
        name: name.to_string(),
        size_bytes,
        mime_type: mime_type.to_string(),
    })
}

fn sample_files() -> Vec<RawFileInput> {
    vec![
        RawFileInput {
            name: "invoice.pdf".into(),
            size_bytes: 48_211,
            mime_type: "application/pdf".into(),
        },
        RawFileInput {
            name: "report.docx".into(),
            size_bytes: 1_310_720,
            mime_type: "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
                .into(),
        },
        RawFileInput {
            name: "notes.txt".into(),
            size_bytes: 902,
            mime_type: "text/plain".into(),
        },
    ]
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt().init();
    let args = Args::parse();
    let settings = config::load_settings();

    let durations = RandomizedDurations::new(
        Duration::from_millis(settings.phase_min_ms),
        Duration::from_millis(settings.phase_span_ms),
    );
    let options = EngineOptions {
        tick_period: Duration::from_millis(settings.tick_period_ms),
        progress_step: settings.progress_step,
    };
    let engine = LifecycleEngine::with_options(Arc::new(durations), options);
    let mut events = engine.subscribe();

    let inputs = if args.files.is_empty() {
        sample_files()
    } else {
        args.files
    };
    let expected = inputs.len();
    let ids = engine.intake(inputs).await;
    info!(count = ids.len(), "intake accepted");

    // Drive every file through its process phase as soon as its upload lands.
    let mut processed = 0usize;
    while processed < expected {
        match events.recv().await? {
            EngineEvent::StatusChanged {
                id,
                status: FileStatus::Uploaded,
            } => {
                engine.begin_processing(id).await?;
            }
            EngineEvent::StatusChanged {
                status: FileStatus::Processed,
                ..
            } => {
                processed += 1;
            }
            _ => {}
        }
    }

    if engine.is_ready_to_exit().await {
        info!("at least one file processed, return action unlocked");
    }

    let mut state = ViewState::with_page_size(settings.page_size);
    if let Some(term) = args.search {
        state.set_search(term);
    }

    let snapshot = engine.snapshot().await;
    loop {
        let projection = state.project(&snapshot);
        print_page(&projection);
        if projection.page >= projection.total_pages {
            break;
        }
        state.next_page(projection.total_pages);
    }

    engine.shutdown().await;
    Ok(())
}

fn print_page(projection: &Projection) {
    println!(
        "-- page {} of {} ({} match(es))",
        projection.page, projection.total_pages, projection.total_matches
    );
    for record in &projection.items {
        println!(
            "{:<28} {:>10}  {:<12} {}",
            record.name,
            format_size(record.size_bytes),
            record.status,
            record.uploaded_at.format("%Y-%m-%d %H:%M:%S"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_file_argument() {
        let input = parse_raw_file("report.pdf:4096:application/pdf").unwrap();
        assert_eq!(input.name, "report.pdf");
        assert_eq!(input.size_bytes, 4096);
        assert_eq!(input.mime_type, "application/pdf");
    }

    #[test]
    fn mime_type_defaults_when_omitted() {
        let input = parse_raw_file("blob.bin:12").unwrap();
        assert_eq!(input.mime_type, "application/octet-stream");
    }

    #[test]
    fn rejects_malformed_file_arguments() {
        assert!(parse_raw_file("").is_err());
        assert!(parse_raw_file("name-only").is_err());
        assert!(parse_raw_file("bad:size").is_err());
    }
}
