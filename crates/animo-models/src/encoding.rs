//! Encoder configuration for the output containers.
//!
//! Defaults mirror the values tuned for mobile playable-ad delivery.
//! The three alpha-webm flags (4-channel pixel format, disabled alt-ref
//! frames, the `alpha_mode` stream metadata) must travel together:
//! dropping any one silently produces an opaque file.

use serde::{Deserialize, Serialize};

/// VP9 WebM with an embedded alpha channel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlphaWebmConfig {
    pub bitrate: String,
    pub crf: u8,
    pub speed: u8,
}

impl Default for AlphaWebmConfig {
    fn default() -> Self {
        Self {
            bitrate: "800k".to_string(),
            crf: 35,
            speed: 4,
        }
    }
}

impl AlphaWebmConfig {
    /// FFmpeg output arguments for an alpha-carrying VP9 encode.
    pub fn to_output_args(&self) -> Vec<String> {
        vec![
            "-c:v".into(),
            "libvpx-vp9".into(),
            "-pix_fmt".into(),
            "yuva420p".into(),
            // Alt-ref frames have no alpha plane; leaving them on drops
            // transparency without an error.
            "-auto-alt-ref".into(),
            "0".into(),
            "-b:v".into(),
            self.bitrate.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-speed".into(),
            self.speed.to_string(),
            "-row-mt".into(),
            "1".into(),
            "-metadata:s:v:0".into(),
            "alpha_mode=1".into(),
            "-an".into(),
        ]
    }
}

/// Opaque VP9 WebM for background (full-frame) subjects.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpaqueWebmConfig {
    pub bitrate: String,
    pub crf: u8,
    pub speed: u8,
}

impl Default for OpaqueWebmConfig {
    fn default() -> Self {
        Self {
            bitrate: "600k".to_string(),
            crf: 36,
            speed: 4,
        }
    }
}

impl OpaqueWebmConfig {
    pub fn to_output_args(&self) -> Vec<String> {
        vec![
            "-c:v".into(),
            "libvpx-vp9".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-b:v".into(),
            self.bitrate.clone(),
            "-crf".into(),
            self.crf.to_string(),
            "-speed".into(),
            self.speed.to_string(),
            "-row-mt".into(),
            "1".into(),
            "-an".into(),
        ]
    }
}

/// H.264 MP4 carrying stacked alpha: one opaque frame at 2x the logical
/// height, color on top, grayscale alpha below. A shader recombines the
/// halves at playback.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StackedMp4Config {
    pub crf: u8,
    pub preset: String,
}

impl Default for StackedMp4Config {
    fn default() -> Self {
        Self {
            crf: 23,
            preset: "fast".to_string(),
        }
    }
}

impl StackedMp4Config {
    pub fn to_output_args(&self) -> Vec<String> {
        vec![
            "-c:v".into(),
            "libx264".into(),
            "-pix_fmt".into(),
            "yuv420p".into(),
            "-preset".into(),
            self.preset.clone(),
            "-crf".into(),
            self.crf.to_string(),
            // Web-friendly playback start.
            "-movflags".into(),
            "+faststart".into(),
            "-an".into(),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alpha_webm_flags_travel_together() {
        let args = AlphaWebmConfig::default().to_output_args();
        assert!(args.contains(&"yuva420p".to_string()));
        assert!(args.contains(&"-auto-alt-ref".to_string()));
        assert!(args.contains(&"alpha_mode=1".to_string()));
    }

    #[test]
    fn test_stacked_mp4_is_opaque() {
        let args = StackedMp4Config::default().to_output_args();
        assert!(args.contains(&"libx264".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
        assert!(!args.iter().any(|a| a.contains("yuva")));
    }

    #[test]
    fn test_opaque_webm_has_no_alpha_metadata() {
        let args = OpaqueWebmConfig::default().to_output_args();
        assert!(!args.contains(&"alpha_mode=1".to_string()));
        assert!(args.contains(&"yuv420p".to_string()));
    }
}
