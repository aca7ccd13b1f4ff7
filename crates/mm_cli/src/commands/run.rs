//! Run command - Run the research pipeline for one product.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tracing::info;

use mm_core::{ArtifactName, ComparisonInputs, ProductConfig, Settings};
use mm_pipeline::{Orchestrator, PipelineError, RunOptions, RunReport};
use mm_store::ArtifactStore;

#[derive(Args)]
pub struct RunArgs {
    /// Product to research
    #[arg(short, long)]
    pub product: String,

    /// Industry the product competes in
    #[arg(short, long)]
    pub industry: String,

    /// Target market
    #[arg(short, long, default_value = "US")]
    pub geography: String,

    /// Business scale of the target customers
    #[arg(short, long, default_value = "SME")]
    pub scale: String,

    /// Comma- or newline-separated competitor names
    #[arg(short, long, default_value = "")]
    pub competitors: String,

    /// Comma- or newline-separated features to score
    #[arg(short, long, default_value = "")]
    pub features: String,

    /// Directory the artifacts are written to
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// Repair re-prompts allowed per task after a schema failure
    #[arg(long)]
    pub max_repairs: Option<u32>,

    /// Keep artifacts from a previous run instead of clearing them first
    #[arg(long)]
    pub keep_existing: bool,
}

impl RunArgs {
    fn config(&self) -> ProductConfig {
        ProductConfig::new(self.product.trim(), self.industry.trim())
            .with_geography(self.geography.trim())
            .with_scale(self.scale.trim())
    }

    fn inputs(&self) -> ComparisonInputs {
        ComparisonInputs::from_text(&self.competitors, &self.features)
    }

    fn settings(&self, workspace_root: &std::path::Path) -> Result<Settings> {
        let mut settings = super::load_settings(workspace_root, self.output_dir.as_ref())?;
        if let Some(n) = self.max_repairs {
            settings = settings.with_max_repairs(n);
        }
        Ok(settings)
    }
}

pub async fn execute(args: RunArgs) -> Result<()> {
    let config = args.config();
    let inputs = args.inputs().without_product(&config);

    // Reject bad input before asking for credentials
    config.validate().map_err(PipelineError::from)?;
    inputs.validate().map_err(PipelineError::from)?;

    let current_dir = std::env::current_dir()?;
    let settings = args.settings(&current_dir)?;
    let orchestrator = Orchestrator::from_settings(&settings)?;
    let store = ArtifactStore::open(&settings.output_dir).map_err(PipelineError::from)?;

    info!("Researching {} in {}", config.name, config.industry);
    println!("🔎 Researching {} ({}, {}, {})", config.name, config.industry, config.geography, config.scale);
    println!("   Competitors: {}", inputs.competitors.join(", "));
    println!("   Features: {}", inputs.features.join(", "));
    if args.keep_existing {
        println!("   Keeping existing artifacts in {}", settings.output_dir.display());
    }
    println!();

    let options = RunOptions {
        clear_output: !args.keep_existing,
    };
    let report = orchestrator.run_analysis(config, inputs, &store, options).await?;

    print_report(&report, &settings);
    Ok(())
}

fn print_report(report: &RunReport, settings: &Settings) {
    println!("✅ Run {} finished ({})", report.run_id, report.state);
    println!();
    println!("📄 Artifacts in {}:", settings.output_dir.display());
    for name in ArtifactName::all() {
        if report.artifacts.contains_key(name.file_name()) {
            println!("   - {}", name.file_name());
        }
    }

    if !report.warnings.is_empty() {
        println!();
        for warning in &report.warnings {
            println!("   ⚠️  {}", warning);
        }
    }
}
