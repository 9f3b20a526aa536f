//! Health command - report the OCR backend and language model in use.

use clap::Args;
use console::style;

use labelocr_core::HealthReport;

use super::{EngineArgs, load_config};

#[derive(Args)]
pub struct HealthArgs {
    /// Print the report as JSON
    #[arg(long)]
    json: bool,

    /// Load the backend and extraction client instead of only reading the
    /// configuration
    #[arg(long)]
    check: bool,

    #[command(flatten)]
    engine: EngineArgs,
}

pub async fn run(args: HealthArgs, config_path: Option<&str>) -> anyhow::Result<()> {
    let mut config = load_config(config_path)?;
    args.engine.apply(&mut config);

    let report = if args.check {
        args.engine.build_pipeline(&config)?.health()
    } else {
        HealthReport::configured(&config)
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("Status:    {}", style(&report.status).green());
    println!("OCR model: {}", report.ocr_model);
    println!("LLM model: {}", report.llm_model);

    if args.engine.api_key(&config).is_none() {
        println!(
            "{} No credential in {}; field extraction is disabled.",
            style("ℹ").blue(),
            config.extraction.api_key_env
        );
    }

    Ok(())
}
