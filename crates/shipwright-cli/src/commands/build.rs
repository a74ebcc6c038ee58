//! `shipwright build`: run the full packaging pipeline.

use std::path::Path;

use anyhow::{Context, Result};
use clap::Args;
use console::style;
use shipwright_core::models::infer_content_type;
use shipwright_core::pipeline;

use super::ProjectFlags;

#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Build variant (debug or release)
    #[arg(default_value = "release")]
    pub variant: String,

    /// Print the artifact record as JSON
    #[arg(long)]
    pub json: bool,

    #[command(flatten)]
    pub project: ProjectFlags,
}

pub async fn handle_build_command(project_root: &Path, args: BuildArgs) -> Result<()> {
    let resolved = args.project.resolve(project_root)?;
    let request = resolved.package_request(&args.variant)?;
    let builder = resolved.package_builder();

    let artifact = pipeline::run(&request, &builder)
        .await
        .with_context(|| format!("Failed to build {} variant", args.variant))?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&artifact)?);
        return Ok(());
    }

    println!(
        "{} Built {} ({})",
        style("✓").green().bold(),
        request.application_id,
        artifact.variant
    );
    println!("  Artifact: {}", artifact.path.display());
    println!(
        "  Type:     {}",
        infer_content_type(&artifact.path).unwrap_or("application/octet-stream")
    );
    println!("  Size:     {} bytes", artifact.size_bytes);
    println!("  SHA-256:  {}", artifact.sha256);
    println!(
        "  Signed:   {}",
        if artifact.signed { "yes" } else { "no" }
    );

    Ok(())
}
