//! Encoder selection and the per-encoder quality table.
//!
//! Both the FFmpeg command and the human-readable codec summary returned by
//! the upload endpoint are derived from [`QualityParams`], so the two cannot
//! drift apart.

use serde::{Deserialize, Serialize};

use crate::compression::CompressionMode;

/// Audio codec applied to every output.
pub const AUDIO_CODEC: &str = "aac";
/// Audio bitrate applied to every output.
pub const AUDIO_BITRATE: &str = "128k";
/// Video tag so HEVC output plays on Apple devices and Nextcloud.
pub const VIDEO_TAG: &str = "hvc1";
/// Moves the moov atom to the front for progressive download.
pub const MOVFLAGS: &str = "+faststart";
/// Codec family reported in the upload summary.
pub const CODEC_FAMILY: &str = "HEVC (H.265)";

/// HEVC encoder implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Encoder {
    /// Apple VideoToolbox (hardware)
    VideoToolbox,
    /// Intel Quick Sync Video (hardware)
    QuickSync,
    /// libx265 (CPU)
    Software,
}

impl Encoder {
    /// FFmpeg encoder name passed to `-c:v`.
    pub fn ffmpeg_name(&self) -> &'static str {
        match self {
            Encoder::VideoToolbox => "hevc_videotoolbox",
            Encoder::QuickSync => "hevc_qsv",
            Encoder::Software => "libx265",
        }
    }

    /// Platform label shown to clients.
    pub fn label(&self) -> &'static str {
        match self {
            Encoder::VideoToolbox => "Apple VideoToolbox (M4)",
            Encoder::QuickSync => "Intel Quick Sync (N100)",
            Encoder::Software => "Software (CPU)",
        }
    }

    pub fn acceleration(&self) -> &'static str {
        match self {
            Encoder::VideoToolbox => "Hardware (VideoToolbox)",
            Encoder::QuickSync => "Hardware (Quick Sync)",
            Encoder::Software => "Software (CPU)",
        }
    }
}

impl std::fmt::Display for Encoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.ffmpeg_name())
    }
}

/// Hardware acceleration method passed to `-hwaccel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HwAccel {
    VideoToolbox,
    Qsv,
}

impl HwAccel {
    pub fn as_str(&self) -> &'static str {
        match self {
            HwAccel::VideoToolbox => "videotoolbox",
            HwAccel::Qsv => "qsv",
        }
    }
}

/// Encoder plus optional hardware acceleration for the current host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncoderChoice {
    pub encoder: Encoder,
    pub hwaccel: Option<HwAccel>,
}

impl EncoderChoice {
    pub const VIDEOTOOLBOX: Self = Self {
        encoder: Encoder::VideoToolbox,
        hwaccel: Some(HwAccel::VideoToolbox),
    };

    pub const QUICK_SYNC: Self = Self {
        encoder: Encoder::QuickSync,
        hwaccel: Some(HwAccel::Qsv),
    };

    pub const SOFTWARE: Self = Self {
        encoder: Encoder::Software,
        hwaccel: None,
    };

    /// Pick an encoder for a platform/architecture pair.
    ///
    /// Accepts both Rust (`macos`, `aarch64`) and uname-style
    /// (`Darwin`, `arm64`) spellings. Never fails; unknown platforms get
    /// software encoding.
    pub fn for_platform(os: &str, arch: &str) -> Self {
        let os = os.to_ascii_lowercase();
        let is_arm64 = matches!(arch.to_ascii_lowercase().as_str(), "aarch64" | "arm64");

        match os.as_str() {
            "macos" | "darwin" if is_arm64 => Self::VIDEOTOOLBOX,
            // ARM64 Linux is usually Docker on a Mac: no Quick Sync there
            "linux" if is_arm64 => Self::SOFTWARE,
            "linux" => Self::QUICK_SYNC,
            "windows" => Self::QUICK_SYNC,
            _ => Self::SOFTWARE,
        }
    }

    /// Detect the encoder for the host this binary runs on.
    pub fn detect() -> Self {
        Self::for_platform(std::env::consts::OS, std::env::consts::ARCH)
    }

    /// Parse an explicit override (`videotoolbox`, `qsv`, `software`).
    pub fn from_override(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "videotoolbox" | "hevc_videotoolbox" => Some(Self::VIDEOTOOLBOX),
            "qsv" | "quicksync" | "hevc_qsv" => Some(Self::QUICK_SYNC),
            "software" | "cpu" | "libx265" | "x265" => Some(Self::SOFTWARE),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        self.encoder.label()
    }
}

/// Encoder speed preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Preset {
    Medium,
    Slow,
    VerySlow,
}

impl Preset {
    /// Value passed to `-preset`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Preset::Medium => "medium",
            Preset::Slow => "slow",
            Preset::VerySlow => "veryslow",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            Preset::Medium => "Medium",
            Preset::Slow => "Slow",
            Preset::VerySlow => "Very Slow",
        }
    }
}

/// Quality parameters for one (encoder, mode) pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QualityParams {
    /// VideoToolbox: target bitrate plus quality (0-100, higher is better)
    VideoToolbox { bitrate_mbps: u8, quality: u8 },
    /// Quick Sync: global quality (1-51, lower is better)
    QuickSync { global_quality: u8, preset: Preset },
    /// libx265: constant rate factor (lower is better)
    Software { crf: u8, preset: Preset },
}

impl QualityParams {
    /// Look up the quality table.
    pub fn lookup(encoder: Encoder, mode: CompressionMode) -> Self {
        match (encoder, mode) {
            (Encoder::VideoToolbox, CompressionMode::Standard) => QualityParams::VideoToolbox {
                bitrate_mbps: 2,
                quality: 65,
            },
            (Encoder::VideoToolbox, CompressionMode::Deep) => QualityParams::VideoToolbox {
                bitrate_mbps: 1,
                quality: 50,
            },
            (Encoder::QuickSync, CompressionMode::Standard) => QualityParams::QuickSync {
                global_quality: 25,
                preset: Preset::Slow,
            },
            (Encoder::QuickSync, CompressionMode::Deep) => QualityParams::QuickSync {
                global_quality: 30,
                preset: Preset::VerySlow,
            },
            (Encoder::Software, CompressionMode::Standard) => QualityParams::Software {
                crf: 26,
                preset: Preset::Medium,
            },
            (Encoder::Software, CompressionMode::Deep) => QualityParams::Software {
                crf: 30,
                preset: Preset::VerySlow,
            },
        }
    }

    /// Encoder-specific output arguments (after `-c:v <encoder>`).
    pub fn to_ffmpeg_args(&self) -> Vec<String> {
        match *self {
            QualityParams::VideoToolbox {
                bitrate_mbps,
                quality,
            } => vec![
                "-b:v".to_string(),
                format!("{}M", bitrate_mbps),
                "-q:v".to_string(),
                quality.to_string(),
            ],
            QualityParams::QuickSync {
                global_quality,
                preset,
            } => vec![
                "-global_quality".to_string(),
                global_quality.to_string(),
                "-preset".to_string(),
                preset.as_str().to_string(),
            ],
            QualityParams::Software { crf, preset } => vec![
                "-crf".to_string(),
                crf.to_string(),
                "-preset".to_string(),
                preset.as_str().to_string(),
            ],
        }
    }

    /// Human-readable summary for the upload response.
    pub fn codec_details(&self, encoder: Encoder, mode: CompressionMode) -> CodecDetails {
        let tag = |value: String| {
            if mode.is_deep() {
                format!("{} (Deep)", value)
            } else {
                value
            }
        };

        let (quality, bitrate, preset) = match *self {
            QualityParams::VideoToolbox {
                bitrate_mbps,
                quality,
            } => (
                format!("{}/100", quality),
                Some(tag(format!("{} Mbps", bitrate_mbps))),
                None,
            ),
            QualityParams::QuickSync {
                global_quality,
                preset,
            } => (
                format!("CQ {}", global_quality),
                None,
                Some(tag(preset.display_name().to_string())),
            ),
            QualityParams::Software { crf, preset } => (
                format!("CRF {}", crf),
                None,
                Some(tag(preset.display_name().to_string())),
            ),
        };

        CodecDetails {
            codec: CODEC_FAMILY.to_string(),
            quality: tag(quality),
            bitrate,
            preset,
            acceleration: encoder.acceleration().to_string(),
        }
    }
}

/// Encoding characteristics reported to the client on upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodecDetails {
    pub codec: String,
    pub quality: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bitrate: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preset: Option<String>,
    pub acceleration: String,
}

impl CodecDetails {
    /// Summary for an encoder choice and mode.
    pub fn describe(choice: &EncoderChoice, mode: CompressionMode) -> Self {
        QualityParams::lookup(choice.encoder, mode).codec_details(choice.encoder, mode)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_table() {
        assert_eq!(EncoderChoice::for_platform("macos", "aarch64"), EncoderChoice::VIDEOTOOLBOX);
        assert_eq!(EncoderChoice::for_platform("Darwin", "arm64"), EncoderChoice::VIDEOTOOLBOX);
        assert_eq!(EncoderChoice::for_platform("linux", "aarch64"), EncoderChoice::SOFTWARE);
        assert_eq!(EncoderChoice::for_platform("Linux", "x86_64"), EncoderChoice::QUICK_SYNC);
        assert_eq!(EncoderChoice::for_platform("windows", "x86_64"), EncoderChoice::QUICK_SYNC);
        assert_eq!(EncoderChoice::for_platform("windows", "aarch64"), EncoderChoice::QUICK_SYNC);
        assert_eq!(EncoderChoice::for_platform("freebsd", "x86_64"), EncoderChoice::SOFTWARE);
        // Intel Macs have no VideoToolbox HEVC path configured
        assert_eq!(EncoderChoice::for_platform("macos", "x86_64"), EncoderChoice::SOFTWARE);
    }

    #[test]
    fn test_detect_is_one_of_known_choices() {
        let choice = EncoderChoice::detect();
        assert!([
            EncoderChoice::VIDEOTOOLBOX,
            EncoderChoice::QUICK_SYNC,
            EncoderChoice::SOFTWARE
        ]
        .contains(&choice));
    }

    #[test]
    fn test_hwaccel_pairs() {
        assert_eq!(EncoderChoice::VIDEOTOOLBOX.hwaccel.map(|h| h.as_str()), Some("videotoolbox"));
        assert_eq!(EncoderChoice::QUICK_SYNC.hwaccel.map(|h| h.as_str()), Some("qsv"));
        assert_eq!(EncoderChoice::SOFTWARE.hwaccel, None);
    }

    #[test]
    fn test_override_parsing() {
        assert_eq!(EncoderChoice::from_override("qsv"), Some(EncoderChoice::QUICK_SYNC));
        assert_eq!(EncoderChoice::from_override("Software"), Some(EncoderChoice::SOFTWARE));
        assert_eq!(
            EncoderChoice::from_override("videotoolbox"),
            Some(EncoderChoice::VIDEOTOOLBOX)
        );
        assert_eq!(EncoderChoice::from_override("nvenc"), None);
    }

    #[test]
    fn test_deep_is_stricter_than_standard() {
        for encoder in [Encoder::VideoToolbox, Encoder::QuickSync, Encoder::Software] {
            let standard = QualityParams::lookup(encoder, CompressionMode::Standard);
            let deep = QualityParams::lookup(encoder, CompressionMode::Deep);
            match (standard, deep) {
                (
                    QualityParams::VideoToolbox { bitrate_mbps: sb, quality: sq },
                    QualityParams::VideoToolbox { bitrate_mbps: db, quality: dq },
                ) => {
                    assert!(db <= sb);
                    assert!(dq <= sq);
                }
                (
                    QualityParams::QuickSync { global_quality: s, .. },
                    QualityParams::QuickSync { global_quality: d, .. },
                ) => assert!(d >= s),
                (QualityParams::Software { crf: s, .. }, QualityParams::Software { crf: d, .. }) => {
                    assert!(d >= s)
                }
                other => panic!("mismatched table entries: {:?}", other),
            }
        }
    }

    #[test]
    fn test_ffmpeg_args() {
        let args = QualityParams::lookup(Encoder::VideoToolbox, CompressionMode::Standard)
            .to_ffmpeg_args();
        assert_eq!(args, vec!["-b:v", "2M", "-q:v", "65"]);

        let args = QualityParams::lookup(Encoder::QuickSync, CompressionMode::Deep).to_ffmpeg_args();
        assert_eq!(args, vec!["-global_quality", "30", "-preset", "veryslow"]);

        let args = QualityParams::lookup(Encoder::Software, CompressionMode::Standard)
            .to_ffmpeg_args();
        assert_eq!(args, vec!["-crf", "26", "-preset", "medium"]);
    }

    #[test]
    fn test_codec_details_quick_sync() {
        let details = CodecDetails::describe(&EncoderChoice::QUICK_SYNC, CompressionMode::Standard);
        assert_eq!(details.codec, "HEVC (H.265)");
        assert_eq!(details.quality, "CQ 25");
        assert_eq!(details.preset.as_deref(), Some("Slow"));
        assert_eq!(details.bitrate, None);
        assert_eq!(details.acceleration, "Hardware (Quick Sync)");

        let deep = CodecDetails::describe(&EncoderChoice::QUICK_SYNC, CompressionMode::Deep);
        assert_eq!(deep.quality, "CQ 30 (Deep)");
        assert_eq!(deep.preset.as_deref(), Some("Very Slow (Deep)"));
    }

    #[test]
    fn test_codec_details_videotoolbox_and_software() {
        let vt = CodecDetails::describe(&EncoderChoice::VIDEOTOOLBOX, CompressionMode::Deep);
        assert_eq!(vt.quality, "50/100 (Deep)");
        assert_eq!(vt.bitrate.as_deref(), Some("1 Mbps (Deep)"));
        assert_eq!(vt.preset, None);

        let sw = CodecDetails::describe(&EncoderChoice::SOFTWARE, CompressionMode::Standard);
        assert_eq!(sw.quality, "CRF 26");
        assert_eq!(sw.preset.as_deref(), Some("Medium"));
        assert_eq!(sw.acceleration, "Software (CPU)");
    }

    #[test]
    fn test_linux_x86_scenario() {
        let choice = EncoderChoice::for_platform("linux", "x86_64");
        assert_eq!(choice.label(), "Intel Quick Sync (N100)");
        let details = CodecDetails::describe(&choice, CompressionMode::Standard);
        assert_eq!(details.quality, "CQ 25");

        let json = serde_json::to_value(&details).unwrap();
        assert!(json.get("bitrate").is_none());
        assert_eq!(json["preset"], "Slow");
    }
}
