//! Media augmentation — overlays the configured logo on downloaded media.
//!
//! The public entry point never fails: every error path degrades to a
//! best-effort passthrough so a post always carries usable files. The
//! original ephemeral download is either consumed or relocated into scratch;
//! callers must not rely on the original path afterwards.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::{fs, io};

use image::imageops::FilterType;
use tracing::{debug, warn};

use crate::config::BrandingConfig;
use crate::error::BrandError;
use crate::pipeline::types::MediaKind;

/// Logo width as a fraction of the branded image width.
const LOGO_WIDTH_RATIO: f32 = 0.15;

/// Fixed overlay margin for video branding (bottom-right corner).
const VIDEO_MARGIN: u32 = 24;

// ── Transcoder capability ───────────────────────────────────────────

/// External video overlay capability. Absence is a normal, non-fatal
/// condition: the brander falls back to relocating the file unmodified.
pub trait Transcoder: Send + Sync {
    fn available(&self) -> bool;

    /// Overlay `logo` onto `input` at the bottom-right corner with a fixed
    /// 24px margin, passing the audio stream through untouched.
    fn overlay(&self, input: &Path, logo: &Path, output: &Path) -> Result<(), BrandError>;
}

/// ffmpeg-backed transcoder, invoked synchronously.
#[derive(Debug, Default)]
pub struct FfmpegTranscoder;

impl Transcoder for FfmpegTranscoder {
    fn available(&self) -> bool {
        find_in_path("ffmpeg").is_some()
    }

    fn overlay(&self, input: &Path, logo: &Path, output: &Path) -> Result<(), BrandError> {
        let status = Command::new("ffmpeg")
            .arg("-y")
            .arg("-i")
            .arg(input)
            .arg("-i")
            .arg(logo)
            .arg("-filter_complex")
            .arg(format!("overlay=W-w-{m}:H-h-{m}", m = VIDEO_MARGIN))
            .arg("-codec:a")
            .arg("copy")
            .arg(output)
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        if status.success() {
            Ok(())
        } else {
            Err(BrandError::ToolFailed { status })
        }
    }
}

/// Passthrough stand-in for environments without an overlay tool.
#[derive(Debug, Default)]
pub struct NoopTranscoder;

impl Transcoder for NoopTranscoder {
    fn available(&self) -> bool {
        false
    }

    fn overlay(&self, _input: &Path, _logo: &Path, _output: &Path) -> Result<(), BrandError> {
        Err(BrandError::ToolUnavailable)
    }
}

fn find_in_path(binary: &str) -> Option<PathBuf> {
    let paths = std::env::var_os("PATH")?;
    std::env::split_paths(&paths)
        .map(|dir| dir.join(binary))
        .find(|candidate| candidate.is_file())
}

// ── Brander ─────────────────────────────────────────────────────────

/// Stateless per-call media brander writing into a shared scratch directory.
pub struct MediaBrander {
    branding: BrandingConfig,
    scratch: PathBuf,
    transcoder: Box<dyn Transcoder>,
}

impl MediaBrander {
    /// Create a brander, ensuring the scratch directory exists.
    pub fn new(
        branding: BrandingConfig,
        scratch: PathBuf,
        transcoder: Box<dyn Transcoder>,
    ) -> io::Result<Self> {
        fs::create_dir_all(&scratch)?;
        Ok(Self {
            branding,
            scratch,
            transcoder,
        })
    }

    /// Brand one media file. Always returns a usable path.
    pub fn brand(&self, path: &Path) -> PathBuf {
        match MediaKind::from_path(path) {
            MediaKind::Image => match self.brand_image(path) {
                Ok(out) => out,
                Err(e) => {
                    warn!(
                        path = %path.display(),
                        error = %e,
                        "Image branding failed, passing through"
                    );
                    self.move_through(path)
                }
            },
            MediaKind::Video => self.brand_video(path),
            MediaKind::Animation | MediaKind::Other => self.move_through(path),
        }
    }

    /// Brand every attachment of a message, preserving order.
    pub fn brand_all(&self, media: &[PathBuf]) -> Vec<PathBuf> {
        media.iter().map(|p| self.brand(p)).collect()
    }

    fn brand_image(&self, path: &Path) -> Result<PathBuf, BrandError> {
        if !self.branding.logo_path.is_file() {
            // No logo asset: byte-identical copy at a new path.
            debug!(path = %path.display(), "Logo missing, copying image unmodified");
            return Ok(self.move_through(path));
        }

        let mut img = image::open(path)?.into_rgba8();
        let logo = image::open(&self.branding.logo_path)?.into_rgba8();

        let target_w = ((img.width() as f32 * LOGO_WIDTH_RATIO) as u32).max(1);
        let target_h = ((logo.height() as f32 * target_w as f32 / logo.width().max(1) as f32)
            as u32)
            .max(1);
        let logo = image::imageops::resize(&logo, target_w, target_h, FilterType::Lanczos3);

        let margin = self.branding.margin_pixels;
        let x = if self.branding.position.is_left() {
            margin
        } else {
            img.width().saturating_sub(logo.width() + margin)
        };
        let y = if self.branding.position.is_top() {
            margin
        } else {
            img.height().saturating_sub(logo.height() + margin)
        };
        image::imageops::overlay(&mut img, &logo, i64::from(x), i64::from(y));

        let out = self.scratch.join(branded_name(path, "png"));
        img.save(&out)?;
        let _ = fs::remove_file(path);
        Ok(out)
    }

    fn brand_video(&self, path: &Path) -> PathBuf {
        if !self.transcoder.available() || !self.branding.logo_path.is_file() {
            return self.move_through(path);
        }
        let out = self.scratch.join(branded_name(path, "mp4"));
        match self.transcoder.overlay(path, &self.branding.logo_path, &out) {
            Ok(()) => {
                let _ = fs::remove_file(path);
                out
            }
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Video branding failed, passing through"
                );
                self.move_through(path)
            }
        }
    }

    /// Relocate a file into scratch unmodified, keeping its name.
    /// Returns the original path when even that fails.
    fn move_through(&self, path: &Path) -> PathBuf {
        let name = path.file_name().map(PathBuf::from).unwrap_or_else(|| {
            PathBuf::from("media.bin")
        });
        let dst = self.scratch.join(name);
        if dst == path {
            return dst;
        }
        // rename fails across filesystems; fall back to copy + remove.
        let moved = fs::rename(path, &dst).or_else(|_| {
            fs::copy(path, &dst)?;
            fs::remove_file(path)
        });
        match moved {
            Ok(()) => dst,
            Err(e) => {
                warn!(
                    path = %path.display(),
                    error = %e,
                    "Failed to relocate media into scratch"
                );
                path.to_path_buf()
            }
        }
    }
}

fn branded_name(path: &Path, ext: &str) -> String {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("media");
    format!("{stem}_branded.{ext}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbaImage;
    use tempfile::TempDir;

    fn brander_without_logo(scratch: &TempDir) -> MediaBrander {
        MediaBrander::new(
            BrandingConfig {
                logo_path: scratch.path().join("no-such-logo.png"),
                ..BrandingConfig::default()
            },
            scratch.path().join("out"),
            Box::new(NoopTranscoder),
        )
        .unwrap()
    }

    fn write_file(dir: &TempDir, name: &str, bytes: &[u8]) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, bytes).unwrap();
        path
    }

    #[test]
    fn missing_logo_copies_image_byte_identical() {
        let dir = TempDir::new().unwrap();
        let brander = brander_without_logo(&dir);
        let src = write_file(&dir, "photo.jpg", b"definitely-an-image");
        let original = fs::read(&src).unwrap();

        let out = brander.brand(&src);

        assert_ne!(out, src);
        assert!(out.starts_with(dir.path().join("out")));
        assert_eq!(fs::read(&out).unwrap(), original);
        // Original download is consumed.
        assert!(!src.exists());
    }

    #[test]
    fn corrupt_image_with_logo_present_falls_back_to_copy() {
        let dir = TempDir::new().unwrap();
        let logo_path = dir.path().join("logo.png");
        let logo = RgbaImage::from_pixel(10, 10, image::Rgba([0, 0, 255, 255]));
        logo.save(&logo_path).unwrap();

        let brander = MediaBrander::new(
            BrandingConfig {
                logo_path,
                ..BrandingConfig::default()
            },
            dir.path().join("out"),
            Box::new(NoopTranscoder),
        )
        .unwrap();

        let src = write_file(&dir, "broken.png", b"not a png");
        let out = brander.brand(&src);
        assert_eq!(fs::read(&out).unwrap(), b"not a png");
        assert!(out.starts_with(dir.path().join("out")));
    }

    #[test]
    fn image_branding_composites_logo_at_configured_corner() {
        let dir = TempDir::new().unwrap();
        let logo_path = dir.path().join("logo.png");
        RgbaImage::from_pixel(40, 20, image::Rgba([0, 0, 255, 255]))
            .save(&logo_path)
            .unwrap();

        let brander = MediaBrander::new(
            BrandingConfig {
                logo_path,
                position: crate::config::LogoPosition::BottomRight,
                margin_pixels: 5,
            },
            dir.path().join("out"),
            Box::new(NoopTranscoder),
        )
        .unwrap();

        let src = dir.path().join("base.png");
        RgbaImage::from_pixel(100, 80, image::Rgba([255, 0, 0, 255]))
            .save(&src)
            .unwrap();

        let out = brander.brand(&src);
        assert!(out.ends_with("base_branded.png"));
        assert!(!src.exists());

        let branded = image::open(&out).unwrap().into_rgba8();
        assert_eq!(branded.dimensions(), (100, 80));
        // Logo scales to 15% of 100px = 15px wide, anchored bottom-right
        // with a 5px margin: it covers x in [80, 95).
        assert_eq!(branded.get_pixel(85, 71).0, [0, 0, 255, 255]);
        // Far corner outside the logo stays untouched.
        assert_eq!(branded.get_pixel(2, 2).0, [255, 0, 0, 255]);
    }

    #[test]
    fn video_without_tool_relocates_unmodified() {
        let dir = TempDir::new().unwrap();
        let brander = brander_without_logo(&dir);
        let src = write_file(&dir, "clip.mp4", b"video-bytes");

        let out = brander.brand(&src);

        assert_eq!(out, dir.path().join("out").join("clip.mp4"));
        assert_eq!(fs::read(&out).unwrap(), b"video-bytes");
        assert!(!src.exists());
    }

    #[test]
    fn other_kind_relocates_unmodified() {
        let dir = TempDir::new().unwrap();
        let brander = brander_without_logo(&dir);
        let src = write_file(&dir, "notes.pdf", b"pdf-bytes");

        let out = brander.brand(&src);

        assert_eq!(out, dir.path().join("out").join("notes.pdf"));
        assert_eq!(fs::read(&out).unwrap(), b"pdf-bytes");
    }

    #[test]
    fn failing_transcoder_falls_back_to_relocation() {
        struct BrokenTranscoder;
        impl Transcoder for BrokenTranscoder {
            fn available(&self) -> bool {
                true
            }
            fn overlay(&self, _: &Path, _: &Path, _: &Path) -> Result<(), BrandError> {
                Err(BrandError::ToolUnavailable)
            }
        }

        let dir = TempDir::new().unwrap();
        let logo_path = dir.path().join("logo.png");
        RgbaImage::from_pixel(4, 4, image::Rgba([0, 0, 255, 255]))
            .save(&logo_path)
            .unwrap();
        let brander = MediaBrander::new(
            BrandingConfig {
                logo_path,
                ..BrandingConfig::default()
            },
            dir.path().join("out"),
            Box::new(BrokenTranscoder),
        )
        .unwrap();

        let src = write_file(&dir, "clip.mp4", b"video-bytes");
        let out = brander.brand(&src);
        assert_eq!(out, dir.path().join("out").join("clip.mp4"));
        assert_eq!(fs::read(&out).unwrap(), b"video-bytes");
    }
}
