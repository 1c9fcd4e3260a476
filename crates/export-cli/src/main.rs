// crates/export-cli/src/main.rs
//
// Thin binary wiring an `ExportPlan` JSON file to an `Exporter`, the same
// "load config, init ffmpeg, run the pipeline" shape as the GUI app's
// `main.rs`, minus the `egui`/`eframe` window — this crate has no UI
// surface to drive.

use std::path::PathBuf;

use clap::Parser;
use export_core::model::ExportPlan;
use export_media::Exporter;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "export", about = "Render an ExportPlan to a video file")]
struct Cli {
    /// Path to a JSON file describing the ExportPlan.
    #[arg(long)]
    plan: PathBuf,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    ffmpeg_the_third::init().expect("FFmpeg init failed");

    let cli = Cli::parse();
    let plan_json = std::fs::read_to_string(&cli.plan)?;
    let plan: ExportPlan = serde_json::from_str(&plan_json)?;

    let mut exporter = Exporter::new(plan);
    tracing::info!(job_id = %exporter.job_id(), plan = %cli.plan.display(), "loaded export plan");

    let result = exporter.run(|event| {
        tracing::info!(
            phase = ?event.phase,
            frame = event.current_frame,
            total = event.total_frames,
            mode = ?event.mode,
            "export progress"
        );
        if let Some(err) = &event.error {
            tracing::error!(kind = %err.kind, detail = %err.detail, "export failed");
        }
    });

    match result {
        Ok(()) => {
            tracing::info!("export complete");
            Ok(())
        }
        Err(e) => {
            tracing::error!("export aborted: {e}");
            std::process::exit(1);
        }
    }
}
