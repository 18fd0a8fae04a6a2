//! Command-line entry point.

use std::path::PathBuf;

use clap::Parser;
use tracing::{error, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use animo_models::{
    AnimationRequest, ClipDuration, GenerationModel, MotionIntensity, OutputFormat, SubjectType,
    TargetSize, TransparencyMethod,
};
use animo_pipeline::{Pipeline, PipelineConfig};
use animo_providers::ReplicateClient;

/// Animate a still image into a short video, with optional alpha
/// transparency for overlay use.
#[derive(Parser, Debug)]
#[command(name = "animo", version, about)]
struct Cli {
    /// Source image (PNG/JPG/WEBP).
    image: PathBuf,

    /// What the subject should do.
    #[arg(short, long)]
    prompt: String,

    /// What the image represents: character or background.
    #[arg(long = "type", value_name = "TYPE", default_value = "character")]
    subject_type: SubjectType,

    /// Transparency method: auto, chromakey, segmentation, mask, none.
    #[arg(long, default_value = "auto")]
    method: TransparencyMethod,

    /// Generation model: kling or minimax.
    #[arg(long, default_value = "kling")]
    model: GenerationModel,

    /// Subject description for segmentation (what to keep).
    #[arg(long)]
    subject: Option<String>,

    /// Motion intensity: auto, subtle, normal, expressive, dynamic.
    #[arg(long, default_value = "auto")]
    motion: MotionIntensity,

    /// Clip duration in seconds (5 or 10).
    #[arg(long, default_value_t = 5)]
    duration: u32,

    /// Request a seamless loop (end frame pinned to the start frame).
    #[arg(long = "loop", overrides_with = "no_loop")]
    seamless_loop: bool,

    /// Explicitly disable looping (overrides --loop).
    #[arg(long = "no-loop")]
    no_loop: bool,

    /// Explicit output size, WxH. Defaults to the source size capped
    /// at 720 per axis.
    #[arg(long)]
    size: Option<TargetSize>,

    /// Static alpha mask image; forces the mask method.
    #[arg(long)]
    mask: Option<PathBuf>,

    /// Output format: webm, mp4, both.
    #[arg(long, default_value = "webm")]
    format: OutputFormat,

    /// Output path. Defaults to <input stem>-animated.<ext> next to
    /// the input; with --format both the second file is a sibling.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Keep the scratch directory with intermediate artifacts.
    #[arg(long)]
    keep_intermediates: bool,
}

impl Cli {
    fn into_request(self) -> Result<(AnimationRequest, bool), String> {
        let duration = ClipDuration::from_seconds(self.duration).map_err(|e| e.to_string())?;
        let request = AnimationRequest {
            image: self.image,
            prompt: self.prompt,
            subject_type: self.subject_type,
            method: self.method,
            model: self.model,
            subject: self.subject,
            motion: self.motion,
            duration,
            seamless_loop: self.seamless_loop && !self.no_loop,
            size: self.size,
            mask: self.mask,
            format: self.format,
            output: self.output,
        };
        Ok((request, self.keep_intermediates))
    }
}

fn init_tracing() {
    let use_json = std::env::var("LOG_FORMAT")
        .map(|v| v.to_lowercase() == "json")
        .unwrap_or(false);

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("animo=info,warn"));

    // Logs go to stderr; stdout carries only the produced output paths.
    if use_json {
        tracing_subscriber::registry()
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .with(env_filter)
            .init();
    } else {
        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_ansi(true)
                    .with_target(false)
                    .with_file(false)
                    .with_line_number(false),
            )
            .with(env_filter)
            .init();
    }
}

fn render_error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(&format!("\n  caused by: {cause}"));
        source = cause.source();
    }
    out
}

fn fail(err: &dyn std::error::Error) -> ! {
    error!("{}", render_error_chain(err));
    std::process::exit(1);
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    init_tracing();

    let cli = Cli::parse();
    let (request, keep_intermediates) = match cli.into_request() {
        Ok(parts) => parts,
        Err(message) => {
            error!("{message}");
            std::process::exit(2);
        }
    };

    // Fail before any work when the environment is not usable.
    if let Err(e) = animo_media::check_ffmpeg() {
        fail(&e);
    }
    let replicate = match ReplicateClient::from_env() {
        Ok(c) => c,
        Err(e) => fail(&e),
    };

    let config = PipelineConfig {
        keep_intermediates,
        ..PipelineConfig::default()
    };
    let pipeline = Pipeline::with_config(replicate, config);

    match pipeline.run(&request).await {
        Ok(report) => {
            for warning in &report.warnings {
                eprintln!("warning: {warning}");
            }
            for out in &report.outputs {
                info!(
                    path = %out.path.display(),
                    bytes = out.bytes,
                    "wrote {}", out.container.extension()
                );
                println!("{}", out.path.display());
            }
        }
        Err(e) => fail(&e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_chain_includes_causes() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "access denied");
        let err = animo_media::MediaError::from(io);
        let rendered = render_error_chain(&err);
        assert!(rendered.starts_with("IO error"));
        assert!(rendered.contains("caused by: access denied"));
    }

    #[test]
    fn test_flat_error_has_no_cause_lines() {
        let err = animo_media::MediaError::FfmpegNotFound;
        assert!(!render_error_chain(&err).contains("caused by"));
    }
}
