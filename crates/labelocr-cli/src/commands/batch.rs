//! Batch processing command for multiple label images.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use clap::Args;
use console::style;
use glob::glob;
use indicatif::{ProgressBar, ProgressStyle};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

use labelocr_core::{Pipeline, PipelineResponse, ProductLabel, StructuredRecord, Upload};

use super::process::{OutputFormat, format_response};
use super::{EngineArgs, load_config};

/// Arguments for the batch command.
#[derive(Args)]
pub struct BatchArgs {
    /// Glob pattern for input images
    #[arg(required = true)]
    input: String,

    /// Output directory for one result file per image
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Output format for each file
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    /// Also write summary.csv
    #[arg(long)]
    summary: bool,

    /// Number of images processed concurrently
    #[arg(short = 'j', long, default_value = "4")]
    jobs: usize,

    /// Continue on error
    #[arg(long)]
    continue_on_error: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

/// Result of processing a single file.
struct ProcessResult {
    path: PathBuf,
    response: Option<PipelineResponse>,
    error: Option<String>,
    processing_time_ms: u64,
}

pub async fn run(args: BatchArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.engine.apply(&mut config);

    let allowed = &config.upload.allowed_extensions;
    let files: Vec<PathBuf> = glob(&args.input)?
        .filter_map(|r| r.ok())
        .filter(|p| {
            let ext = p.extension().and_then(|e| e.to_str()).unwrap_or("");
            allowed.iter().any(|a| a.eq_ignore_ascii_case(ext))
        })
        .collect();

    if files.is_empty() {
        anyhow::bail!("No matching files found for pattern: {}", args.input);
    }

    println!(
        "{} Found {} files to process",
        style("ℹ").blue(),
        files.len()
    );

    if let Some(ref output_dir) = args.output_dir {
        fs::create_dir_all(output_dir)?;
    }

    let pipeline = Arc::new(args.engine.build_pipeline(&config)?);

    let overall_pb = ProgressBar::new(files.len() as u64);
    overall_pb.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} files")?
            .progress_chars("=>-"),
    );

    let permits = Arc::new(Semaphore::new(args.jobs.max(1)));
    let mut tasks = JoinSet::new();

    for path in files {
        let pipeline = Arc::clone(&pipeline);
        let permits = Arc::clone(&permits);
        tasks.spawn(async move {
            let _permit = permits.acquire_owned().await;
            process_single_file(&pipeline, path).await
        });
    }

    let mut results = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        let result = joined?;
        overall_pb.inc(1);

        if let Some(err) = &result.error {
            if args.continue_on_error {
                warn!("Failed to process {}: {}", result.path.display(), err);
            } else {
                error!("Failed to process {}: {}", result.path.display(), err);
                tasks.abort_all();
                overall_pb.abandon();
                anyhow::bail!("Processing failed for {}: {}", result.path.display(), err);
            }
        }
        results.push(result);
    }

    overall_pb.finish_with_message("Complete");
    results.sort_by(|a, b| a.path.cmp(&b.path));

    if let Some(output_dir) = &args.output_dir {
        for result in &results {
            if let Some(response) = &result.response {
                let output_path = output_path_for(output_dir, &result.path, args.format);
                fs::write(&output_path, format_response(response, args.format)?)?;
                debug!("Wrote output to {}", output_path.display());
            }
        }
    }

    if args.summary {
        let summary_path = args
            .output_dir
            .as_ref()
            .map(|d| d.join("summary.csv"))
            .unwrap_or_else(|| PathBuf::from("summary.csv"));

        write_summary(&summary_path, &results)?;
        println!(
            "{} Summary written to {}",
            style("✓").green(),
            summary_path.display()
        );
    }

    let failed: Vec<_> = results.iter().filter(|r| r.error.is_some()).collect();

    println!();
    println!(
        "{} Processed {} files in {:?}",
        style("✓").green(),
        results.len(),
        start.elapsed()
    );
    println!(
        "   {} successful, {} failed",
        style(results.len() - failed.len()).green(),
        style(failed.len()).red()
    );

    if !failed.is_empty() {
        println!();
        println!("{}", style("Failed files:").red());
        for result in &failed {
            println!(
                "  - {}: {}",
                result.path.display(),
                result.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    Ok(())
}

async fn process_single_file(pipeline: &Pipeline, path: PathBuf) -> ProcessResult {
    let file_start = Instant::now();

    let outcome = match Upload::from_path(&path) {
        Ok(upload) => pipeline.process(upload).await.map_err(|e| e.to_string()),
        Err(e) => Err(e.to_string()),
    };

    let (response, error) = match outcome {
        Ok(response) => (Some(response), None),
        Err(e) => (None, Some(e)),
    };

    ProcessResult {
        path,
        response,
        error,
        processing_time_ms: file_start.elapsed().as_millis() as u64,
    }
}

fn output_path_for(output_dir: &Path, input: &Path, format: OutputFormat) -> PathBuf {
    let stem = input
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("label");
    output_dir.join(format!("{}.{}", stem, format.extension()))
}

fn write_summary(path: &Path, results: &[ProcessResult]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_path(path)?;

    wtr.write_record([
        "filename",
        "status",
        "product_name",
        "manufacturer_name",
        "manufacture_date",
        "expiry_date",
        "shelf_life",
        "batch_number",
        "processing_time_ms",
        "error",
    ])?;

    for result in results {
        let filename = result.path.file_name().and_then(|s| s.to_str()).unwrap_or("");
        let time = result.processing_time_ms.to_string();

        match &result.response {
            Some(response) => {
                let label = ProductLabel::from_record(&response.llm_output).unwrap_or_default();
                let mut row = vec![filename];
                let status = if response.llm_output.is_error() {
                    "partial"
                } else {
                    "success"
                };
                row.push(status);
                row.extend(label.values().iter().map(|v| v.unwrap_or("")));
                row.push(&time);
                row.push(match &response.llm_output {
                    StructuredRecord::Error { error } => error.as_str(),
                    _ => "",
                });
                wtr.write_record(&row)?;
            }
            None => {
                let mut row = vec![filename, "error"];
                row.extend([""; 6]);
                row.push(&time);
                row.push(result.error.as_deref().unwrap_or(""));
                wtr.write_record(&row)?;
            }
        }
    }

    wtr.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelocr_core::normalize;
    use pretty_assertions::assert_eq;

    fn ok_result(name: &str, llm_output: StructuredRecord) -> ProcessResult {
        ProcessResult {
            path: PathBuf::from(name),
            response: Some(PipelineResponse {
                success: true,
                extracted_text: String::new(),
                llm_output,
                filename: name.to_string(),
            }),
            error: None,
            processing_time_ms: 12,
        }
    }

    #[test]
    fn test_output_path_for() {
        assert_eq!(
            output_path_for(Path::new("out"), Path::new("in/amul.jpg"), OutputFormat::Text),
            PathBuf::from("out/amul.txt")
        );
    }

    #[test]
    fn test_summary_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("summary.csv");

        let results = vec![
            ok_result("a.png", normalize(r#"{"batch_number": "A23M08"}"#)),
            ok_result("b.png", StructuredRecord::error("not configured")),
            ProcessResult {
                path: PathBuf::from("c.png"),
                response: None,
                error: Some("Processing failed: bad image".into()),
                processing_time_ms: 3,
            },
        ];
        write_summary(&path, &results).unwrap();

        let content = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[1], "a.png,success,,,,,,A23M08,12,");
        assert_eq!(lines[2], "b.png,partial,,,,,,,12,not configured");
        assert_eq!(lines[3], "c.png,error,,,,,,,3,Processing failed: bad image");
    }
}
