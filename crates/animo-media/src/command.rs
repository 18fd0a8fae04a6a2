//! FFmpeg command builder and runner.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::AsyncReadExt;
use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::fs_utils::move_file;

/// Stderr tail length surfaced on encoder failure.
const STDERR_TAIL: usize = 2000;

/// One input stream with its pre-`-i` arguments.
#[derive(Debug, Clone)]
struct InputSpec {
    args: Vec<String>,
    path: PathBuf,
}

/// Builder for FFmpeg commands.
///
/// Supports multiple inputs because the alpha-merge stages feed a color
/// stream and an alpha stream into one filter graph.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    inputs: Vec<InputSpec>,
    output: PathBuf,
    output_args: Vec<String>,
    overwrite: bool,
    log_level: String,
}

impl FfmpegCommand {
    /// Create a new FFmpeg command writing to `output`.
    pub fn new(output: impl AsRef<Path>) -> Self {
        Self {
            inputs: Vec::new(),
            output: output.as_ref().to_path_buf(),
            output_args: Vec::new(),
            overwrite: true,
            log_level: "error".to_string(),
        }
    }

    /// Add an input file.
    pub fn input(self, path: impl AsRef<Path>) -> Self {
        self.input_with_args(std::iter::empty::<String>(), path)
    }

    /// Add an input file with arguments placed before its `-i`
    /// (e.g. `-loop 1` for a looping still image).
    pub fn input_with_args<I, S>(mut self, args: I, path: impl AsRef<Path>) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.inputs.push(InputSpec {
            args: args.into_iter().map(Into::into).collect(),
            path: path.as_ref().to_path_buf(),
        });
        self
    }

    /// Add an output argument (after all inputs).
    pub fn output_arg(mut self, arg: impl Into<String>) -> Self {
        self.output_args.push(arg.into());
        self
    }

    /// Add multiple output arguments.
    pub fn output_args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.output_args.extend(args.into_iter().map(Into::into));
        self
    }

    /// Set a simple video filter (`-vf`).
    pub fn video_filter(self, filter: impl Into<String>) -> Self {
        self.output_arg("-vf").output_arg(filter)
    }

    /// Set a filter graph (`-filter_complex`).
    pub fn filter_complex(self, filter: impl Into<String>) -> Self {
        self.output_arg("-filter_complex").output_arg(filter)
    }

    /// Map a labeled filter-graph output stream.
    pub fn map(self, label: impl Into<String>) -> Self {
        self.output_arg("-map").output_arg(label)
    }

    /// Limit output duration.
    pub fn duration(self, seconds: f64) -> Self {
        self.output_arg("-t").output_arg(format!("{seconds:.3}"))
    }

    /// Set output frame rate.
    pub fn frame_rate(self, fps: u32) -> Self {
        self.output_arg("-r").output_arg(fps.to_string())
    }

    /// Stop at the shortest input stream.
    pub fn shortest(self) -> Self {
        self.output_arg("-shortest")
    }

    /// Final output path.
    pub fn output_path(&self) -> &Path {
        &self.output
    }

    /// Build the argument list, directing the encode at `actual_output`
    /// (the runner substitutes a scratch path for atomicity).
    fn build_args_to(&self, actual_output: &Path) -> Vec<String> {
        let mut args = Vec::new();

        if self.overwrite {
            args.push("-y".to_string());
        }

        args.push("-v".to_string());
        args.push(self.log_level.clone());

        for input in &self.inputs {
            args.extend(input.args.clone());
            args.push("-i".to_string());
            args.push(input.path.to_string_lossy().to_string());
        }

        args.extend(self.output_args.clone());
        args.push(actual_output.to_string_lossy().to_string());

        args
    }

    /// Build the command arguments against the declared output path.
    pub fn build_args(&self) -> Vec<String> {
        self.build_args_to(&self.output)
    }
}

/// Runner for FFmpeg commands.
///
/// Writes to a scratch path next to the final output and renames on
/// success, so a failed or killed encode never leaves a partial file at
/// the destination.
#[derive(Debug, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a wall-clock timeout; on expiry the process is killed.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Run an FFmpeg command to completion.
    pub async fn run(&self, cmd: &FfmpegCommand) -> MediaResult<()> {
        which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;

        let final_path = cmd.output_path().to_path_buf();
        let scratch = scratch_path(&final_path);
        let args = cmd.build_args_to(&scratch);
        debug!("running FFmpeg: ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()?;

        let mut stderr = child.stderr.take().expect("stderr not captured");
        let stderr_task = tokio::spawn(async move {
            let mut buf = String::new();
            let _ = stderr.read_to_string(&mut buf).await;
            buf
        });

        let status = match self.wait_for(&mut child).await {
            Ok(status) => status,
            Err(e) => {
                let _ = tokio::fs::remove_file(&scratch).await;
                return Err(e);
            }
        };

        let stderr_text = stderr_task.await.unwrap_or_default();

        if !status.success() {
            let _ = tokio::fs::remove_file(&scratch).await;
            let tail = stderr_tail(&stderr_text);
            return Err(MediaError::ffmpeg_failed(
                "FFmpeg exited with non-zero status",
                Some(tail),
                status.code(),
            ));
        }

        move_file(&scratch, &final_path).await
    }

    async fn wait_for(&self, child: &mut Child) -> MediaResult<std::process::ExitStatus> {
        match self.timeout {
            Some(timeout) => match tokio::time::timeout(timeout, child.wait()).await {
                Ok(result) => Ok(result?),
                Err(_) => {
                    warn!(
                        "FFmpeg timed out after {} seconds, killing process",
                        timeout.as_secs()
                    );
                    let _ = child.kill().await;
                    Err(MediaError::Timeout(timeout.as_secs()))
                }
            },
            None => Ok(child.wait().await?),
        }
    }
}

/// Scratch path in the same directory as `path` (same filesystem, same
/// extension so FFmpeg still infers the container).
fn scratch_path(path: &Path) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "output".to_string());
    let ext = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_default();
    let name = if ext.is_empty() {
        format!(".{stem}.part")
    } else {
        format!(".{stem}.part.{ext}")
    };
    path.with_file_name(name)
}

fn stderr_tail(text: &str) -> String {
    if text.len() <= STDERR_TAIL {
        text.to_string()
    } else {
        let cut = text.len() - STDERR_TAIL;
        // Stay on a char boundary.
        let cut = (cut..text.len()).find(|i| text.is_char_boundary(*i)).unwrap_or(cut);
        text[cut..].to_string()
    }
}

/// Check if FFmpeg is available.
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}
