//! Process command - read one label image and extract its fields.

use std::fs;
use std::path::PathBuf;
use std::time::{Duration, Instant};

use clap::Args;
use console::style;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{debug, info};

use labelocr_core::{ExtractionSchema, PipelineResponse, ProductLabel, StructuredRecord, Upload};

use super::{EngineArgs, load_config};

/// Arguments for the process command.
#[derive(Args)]
pub struct ProcessArgs {
    /// Input image
    #[arg(required = true)]
    input: PathBuf,

    /// Output file (default: stdout)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output format
    #[arg(short, long, value_enum, default_value = "json")]
    format: OutputFormat,

    #[command(flatten)]
    engine: EngineArgs,
}

#[derive(Clone, Copy, Debug, clap::ValueEnum)]
pub enum OutputFormat {
    /// JSON response
    Json,
    /// CSV row of the extracted fields
    Csv,
    /// Plain text summary
    Text,
}

impl OutputFormat {
    pub fn extension(self) -> &'static str {
        match self {
            OutputFormat::Json => "json",
            OutputFormat::Csv => "csv",
            OutputFormat::Text => "txt",
        }
    }
}

pub async fn run(args: ProcessArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let start = Instant::now();

    let mut config = load_config(config_path)?;
    args.engine.apply(&mut config);

    if !args.input.exists() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    // Reject bad uploads before any model is loaded.
    let upload = Upload::from_path(&args.input)?;
    upload.validate(&config.upload.allowed_extensions)?;

    info!("Processing file: {}", args.input.display());

    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
    );
    pb.enable_steady_tick(Duration::from_millis(100));

    pb.set_message(format!("Loading {} backend...", config.ocr.backend));
    let pipeline = args.engine.build_pipeline(&config)?;

    pb.set_message("Reading label...");
    let result = pipeline.process(upload).await;
    pb.finish_and_clear();

    let response = result.map_err(|e| anyhow::anyhow!("{} (status {})", e, e.status_code()))?;

    let output = format_response(&response, args.format)?;

    if let Some(output_path) = &args.output {
        fs::write(output_path, &output)?;
        println!(
            "{} Output written to {}",
            style("✓").green(),
            output_path.display()
        );
    } else {
        println!("{}", output);
    }

    debug!("Total processing time: {:?}", start.elapsed());

    Ok(())
}

pub fn format_response(response: &PipelineResponse, format: OutputFormat) -> anyhow::Result<String> {
    match format {
        OutputFormat::Json => Ok(serde_json::to_string_pretty(response)?),
        OutputFormat::Csv => format_csv(response),
        OutputFormat::Text => Ok(format_text(response)),
    }
}

fn format_csv(response: &PipelineResponse) -> anyhow::Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);

    let mut header = vec!["filename"];
    header.extend(ExtractionSchema::FIELDS);
    wtr.write_record(&header)?;

    let label = ProductLabel::from_record(&response.llm_output).unwrap_or_default();
    let mut row = vec![response.filename.as_str()];
    row.extend(label.values().iter().map(|v| v.unwrap_or("")));
    wtr.write_record(&row)?;

    let data = String::from_utf8(wtr.into_inner()?)?;
    Ok(data)
}

fn format_text(response: &PipelineResponse) -> String {
    let mut output = String::new();

    output.push_str(&format!("File: {}\n\n", response.filename));

    match &response.llm_output {
        StructuredRecord::Fields(_) => {
            let label = ProductLabel::from_record(&response.llm_output).unwrap_or_default();
            let show = |v: &Option<String>| v.clone().unwrap_or_else(|| "-".to_string());

            output.push_str(&format!("Product:      {}\n", show(&label.product_name)));
            output.push_str(&format!("Manufacturer: {}\n", show(&label.manufacturer_name)));
            output.push_str(&format!("Batch:        {}\n", show(&label.batch_number)));
            output.push_str(&format!("Manufactured: {}\n", show(&label.manufacture_date)));
            output.push_str(&format!("Expires:      {}\n", show(&label.expiry_date)));
            output.push_str(&format!("Shelf life:   {}\n", show(&label.shelf_life)));

            if let (Some(made), Some(expires)) = (label.manufactured_on(), label.expires_on()) {
                let days = (expires - made).num_days();
                output.push_str(&format!("\nValid for {} days after manufacture\n", days));
            }
        }
        StructuredRecord::Fallback { raw_output } => {
            output.push_str("Model reply (unstructured):\n");
            output.push_str(raw_output);
            output.push('\n');
        }
        StructuredRecord::Error { error } => {
            output.push_str(&format!("Field extraction unavailable: {}\n", error));
        }
    }

    output.push_str("\nExtracted text:\n");
    output.push_str(&response.extracted_text);
    output.push('\n');

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use labelocr_core::normalize;
    use pretty_assertions::assert_eq;

    fn response(reply: &str) -> PipelineResponse {
        PipelineResponse {
            success: true,
            extracted_text: "Amul Taaza\nBatch No: A23M08".to_string(),
            llm_output: normalize(reply),
            filename: "amul.jpg".to_string(),
        }
    }

    #[test]
    fn test_csv_has_schema_columns() {
        let csv = format_csv(&response(
            r#"{"product_name": "Amul Taaza", "batch_number": "A23M08", "expiry_date": null}"#,
        ))
        .unwrap();

        let mut lines = csv.lines();
        assert_eq!(
            lines.next(),
            Some("filename,product_name,manufacturer_name,manufacture_date,expiry_date,shelf_life,batch_number")
        );
        assert_eq!(lines.next(), Some("amul.jpg,Amul Taaza,,,,,A23M08"));
    }

    #[test]
    fn test_text_shows_validity_window() {
        let text = format_text(&response(
            r#"{"manufacture_date": "12-09-2025", "expiry_date": "19-09-2025"}"#,
        ));
        assert!(text.contains("Valid for 7 days"));
        assert!(text.contains("Product:      -"));
    }

    #[test]
    fn test_text_for_error_record() {
        let mut resp = response("{}");
        resp.llm_output = StructuredRecord::error("not configured");
        assert!(format_text(&resp).contains("Field extraction unavailable: not configured"));
    }

    #[test]
    fn test_json_is_boundary_shape() {
        let json: serde_json::Value =
            serde_json::from_str(&format_response(&response("oops"), OutputFormat::Json).unwrap())
                .unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["llm_output"]["raw_output"], "oops");
        assert_eq!(json["filename"], "amul.jpg");
    }
}
