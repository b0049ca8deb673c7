//! FFmpeg capture backend
//!
//! Produces fixed-length MPEG-TS segments from a device or a looped file,
//! and joins segments with the concat demuxer without re-encoding.

use super::traits::{CaptureBackend, CaptureError, CaptureSource};
use super::manifest::ConcatManifest;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::process::{Output, Stdio};
use std::time::Duration;
use tokio::process::Command;

/// Maximum number of stderr bytes kept in an error
const STDERR_TAIL: usize = 2048;

/// Encoder settings passed to FFmpeg
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FfmpegOptions {
    /// FFmpeg executable, resolved through PATH when not absolute
    pub binary: String,
    /// Video codec used for segment encoding
    pub video_codec: String,
    /// Encoder preset
    pub preset: String,
}

impl Default for FfmpegOptions {
    fn default() -> Self {
        Self {
            binary: "ffmpeg".to_string(),
            video_codec: "libx264".to_string(),
            preset: "ultrafast".to_string(),
        }
    }
}

/// Capture backend that shells out to FFmpeg
#[derive(Debug, Clone, Default)]
pub struct FfmpegBackend {
    options: FfmpegOptions,
}

impl FfmpegBackend {
    pub fn new(options: FfmpegOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &FfmpegOptions {
        &self.options
    }

    fn command(&self, args: &[String]) -> Command {
        let mut command = Command::new(&self.options.binary);
        command
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped());
        command
    }
}

#[async_trait]
impl CaptureBackend for FfmpegBackend {
    async fn capture_segment(
        &self,
        source: &CaptureSource,
        duration: Duration,
        destination: &Path,
    ) -> Result<(), CaptureError> {
        let args = capture_args(&self.options, source, duration, destination);
        tracing::trace!("Starting FFmpeg capture: {:?}", args);

        // Runs to completion; stopping the recorder never kills an in-flight segment.
        let output = self
            .command(&args)
            .output()
            .await
            .map_err(CaptureError::Spawn)?;

        check_status(&output)
    }

    async fn concatenate(
        &self,
        manifest: &ConcatManifest,
        destination: &Path,
        timeout: Duration,
    ) -> Result<(), CaptureError> {
        let args = concat_args(manifest.path(), destination);
        tracing::info!("Starting FFmpeg concat: {:?}", args);

        let child = self
            .command(&args)
            .kill_on_drop(true)
            .spawn()
            .map_err(CaptureError::Spawn)?;

        // Dropping the timed-out future drops the child, which kills it.
        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(result) => result?,
            Err(_) => return Err(CaptureError::Timeout(timeout)),
        };

        check_status(&output)
    }
}

/// Build FFmpeg arguments for one segment capture
pub fn capture_args(
    options: &FfmpegOptions,
    source: &CaptureSource,
    duration: Duration,
    destination: &Path,
) -> Vec<String> {
    let mut args = vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
    ];

    match source {
        CaptureSource::File { path } => {
            args.extend([
                "-stream_loop".to_string(),
                "-1".to_string(),
                "-i".to_string(),
                path.to_string_lossy().to_string(),
            ]);
        }
        CaptureSource::Device { format, name } => {
            let input = if format == "dshow" {
                format!("video={}", name)
            } else {
                name.clone()
            };
            args.extend(["-f".to_string(), format.clone(), "-i".to_string(), input]);
        }
    }

    args.extend([
        "-c:v".to_string(),
        options.video_codec.clone(),
        "-preset".to_string(),
        options.preset.clone(),
        "-pix_fmt".to_string(),
        "yuv420p".to_string(),
        "-t".to_string(),
        format!("{:.3}", duration.as_secs_f64()),
        "-f".to_string(),
        "mpegts".to_string(),
        "-y".to_string(),
        destination.to_string_lossy().to_string(),
    ]);

    args
}

/// Build FFmpeg arguments for a lossless concat of a manifest
pub fn concat_args(manifest: &Path, destination: &Path) -> Vec<String> {
    vec![
        "-hide_banner".to_string(),
        "-loglevel".to_string(),
        "error".to_string(),
        "-f".to_string(),
        "concat".to_string(),
        "-safe".to_string(),
        "0".to_string(),
        "-i".to_string(),
        manifest.to_string_lossy().to_string(),
        "-c".to_string(),
        "copy".to_string(),
        "-y".to_string(),
        destination.to_string_lossy().to_string(),
    ]
}

fn check_status(output: &Output) -> Result<(), CaptureError> {
    if output.status.success() {
        return Ok(());
    }

    let stderr = String::from_utf8_lossy(&output.stderr);
    let stderr = stderr.trim();
    let start = stderr
        .char_indices()
        .rev()
        .nth(STDERR_TAIL.saturating_sub(1))
        .map(|(i, _)| i)
        .unwrap_or(0);

    Err(CaptureError::Failed {
        code: output.status.code(),
        stderr: stderr[start..].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    #[cfg(unix)]
    use tempfile::{tempdir, TempDir};

    /// Backend whose binary is a shell script with the given body
    #[cfg(unix)]
    fn scripted_backend(dir: &TempDir, body: &str) -> FfmpegBackend {
        use std::os::unix::fs::PermissionsExt;

        let script = dir.path().join("fake-ffmpeg.sh");
        std::fs::write(&script, format!("#!/bin/sh\n{}\n", body)).unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        FfmpegBackend::new(FfmpegOptions {
            binary: script.to_string_lossy().to_string(),
            ..FfmpegOptions::default()
        })
    }

    #[test]
    fn test_file_source_loops_forever() {
        let source = CaptureSource::File {
            path: PathBuf::from("clip.mp4"),
        };
        let args = capture_args(
            &FfmpegOptions::default(),
            &source,
            Duration::from_secs(10),
            Path::new("/buf/segment_000000.ts"),
        );

        let loop_at = args.iter().position(|a| a == "-stream_loop").unwrap();
        assert_eq!(args[loop_at + 1], "-1");
        assert_eq!(args[loop_at + 2], "-i");
        assert_eq!(args[loop_at + 3], "clip.mp4");
        assert_eq!(args.last().unwrap(), "/buf/segment_000000.ts");
    }

    #[test]
    fn test_dshow_device_input() {
        let source = CaptureSource::Device {
            format: "dshow".to_string(),
            name: "USB CAMERA".to_string(),
        };
        let args = capture_args(
            &FfmpegOptions::default(),
            &source,
            Duration::from_secs(5),
            Path::new("out.ts"),
        );

        assert!(!args.contains(&"-stream_loop".to_string()));
        let input_at = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input_at - 1], "dshow");
        assert_eq!(args[input_at + 1], "video=USB CAMERA");
    }

    #[test]
    fn test_v4l2_device_input_is_passed_through() {
        let source = CaptureSource::Device {
            format: "v4l2".to_string(),
            name: "/dev/video0".to_string(),
        };
        let args = capture_args(
            &FfmpegOptions::default(),
            &source,
            Duration::from_secs(5),
            Path::new("out.ts"),
        );

        let input_at = args.iter().position(|a| a == "-i").unwrap();
        assert_eq!(args[input_at + 1], "/dev/video0");
    }

    #[test]
    fn test_capture_duration_and_overwrite() {
        let options = FfmpegOptions {
            video_codec: "h264_nvenc".to_string(),
            ..FfmpegOptions::default()
        };
        let source = CaptureSource::Device {
            format: "v4l2".to_string(),
            name: "/dev/video0".to_string(),
        };
        let args = capture_args(&options, &source, Duration::from_secs(10), Path::new("out.ts"));

        let t_at = args.iter().position(|a| a == "-t").unwrap();
        assert_eq!(args[t_at + 1], "10.000");
        let codec_at = args.iter().position(|a| a == "-c:v").unwrap();
        assert_eq!(args[codec_at + 1], "h264_nvenc");
        assert!(args.contains(&"-y".to_string()));
        assert!(args.contains(&"mpegts".to_string()));
    }

    #[test]
    fn test_concat_is_stream_copy() {
        let args = concat_args(Path::new("/buf/concat_x.txt"), Path::new("/replays/r.mp4"));

        let c_at = args.iter().position(|a| a == "-c").unwrap();
        assert_eq!(args[c_at + 1], "copy");
        let safe_at = args.iter().position(|a| a == "-safe").unwrap();
        assert_eq!(args[safe_at + 1], "0");
        assert_eq!(args.last().unwrap(), "/replays/r.mp4");
    }

    #[tokio::test]
    async fn test_missing_binary_is_spawn_error() {
        let backend = FfmpegBackend::new(FfmpegOptions {
            binary: "/nonexistent/ffmpeg-binary".to_string(),
            ..FfmpegOptions::default()
        });
        let source = CaptureSource::Device {
            format: "v4l2".to_string(),
            name: "/dev/video0".to_string(),
        };

        let result = backend
            .capture_segment(&source, Duration::from_secs(1), Path::new("out.ts"))
            .await;
        assert!(matches!(result, Err(CaptureError::Spawn(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_concat_overrun_is_killed() {
        let dir = tempdir().unwrap();
        let backend = scripted_backend(&dir, "exec sleep 30");
        let manifest = ConcatManifest::write_in(dir.path(), Vec::new()).unwrap();

        let started = std::time::Instant::now();
        let result = backend
            .concatenate(&manifest, &dir.path().join("out.mp4"), Duration::from_secs(1))
            .await;

        assert!(matches!(result, Err(CaptureError::Timeout(t)) if t == Duration::from_secs(1)));
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr_tail() {
        let dir = tempdir().unwrap();
        let backend = scripted_backend(
            &dir,
            "head -c 5000 /dev/zero | tr '\\000' 'e' >&2\necho 'Invalid data found' >&2\nexit 3",
        );
        let manifest = ConcatManifest::write_in(dir.path(), Vec::new()).unwrap();

        let result = backend
            .concatenate(&manifest, &dir.path().join("out.mp4"), Duration::from_secs(10))
            .await;

        match result {
            Err(CaptureError::Failed { code, stderr }) => {
                assert_eq!(code, Some(3));
                assert_eq!(stderr.chars().count(), STDERR_TAIL);
                assert!(stderr.ends_with("Invalid data found"));
                assert!(stderr.starts_with('e'));
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_failed_capture_is_reported() {
        let dir = tempdir().unwrap();
        let backend = scripted_backend(&dir, "echo 'No such device' >&2\nexit 1");
        let source = CaptureSource::Device {
            format: "v4l2".to_string(),
            name: "/dev/video0".to_string(),
        };

        let result = backend
            .capture_segment(&source, Duration::from_secs(1), &dir.path().join("out.ts"))
            .await;

        assert!(matches!(
            result,
            Err(CaptureError::Failed { code: Some(1), ref stderr }) if stderr == "No such device"
        ));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_clean_exit_is_success() {
        let dir = tempdir().unwrap();
        let backend = scripted_backend(&dir, "exit 0");
        let manifest = ConcatManifest::write_in(dir.path(), Vec::new()).unwrap();

        let result = backend
            .concatenate(&manifest, &dir.path().join("out.mp4"), Duration::from_secs(10))
            .await;
        assert!(result.is_ok());
    }
}
