//! Compression modes and output file naming.

use serde::{Deserialize, Serialize};

/// Output prefix for standard-mode files.
pub const STANDARD_PREFIX: &str = "compressed_";
/// Output prefix for deep-mode files.
pub const DEEP_PREFIX: &str = "deepcompressed_";

/// Coarse quality/size tradeoff requested by the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CompressionMode {
    #[default]
    Standard,
    /// Lower target quality, higher compression effort.
    Deep,
}

impl CompressionMode {
    /// Parse a form value. Anything other than `deep` is treated as standard.
    pub fn parse_lenient(value: &str) -> Self {
        if value.trim().eq_ignore_ascii_case("deep") {
            CompressionMode::Deep
        } else {
            CompressionMode::Standard
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            CompressionMode::Standard => "standard",
            CompressionMode::Deep => "deep",
        }
    }

    pub fn is_deep(&self) -> bool {
        matches!(self, CompressionMode::Deep)
    }

    /// Prefix prepended to the source filename to form the output filename.
    pub fn output_prefix(&self) -> &'static str {
        match self {
            CompressionMode::Standard => STANDARD_PREFIX,
            CompressionMode::Deep => DEEP_PREFIX,
        }
    }

    /// Output filename for a given source filename.
    pub fn output_filename(&self, source: &str) -> String {
        format!("{}{}", self.output_prefix(), source)
    }

    /// Recover the source filename from an output filename.
    ///
    /// The deep prefix is checked first since it ends with the standard one.
    pub fn source_filename(output: &str) -> Option<&str> {
        output
            .strip_prefix(DEEP_PREFIX)
            .or_else(|| output.strip_prefix(STANDARD_PREFIX))
            .filter(|s| !s.is_empty())
    }
}

impl std::fmt::Display for CompressionMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_lenient() {
        assert_eq!(CompressionMode::parse_lenient("deep"), CompressionMode::Deep);
        assert_eq!(CompressionMode::parse_lenient(" DEEP "), CompressionMode::Deep);
        assert_eq!(CompressionMode::parse_lenient("standard"), CompressionMode::Standard);
        assert_eq!(CompressionMode::parse_lenient("ultra"), CompressionMode::Standard);
        assert_eq!(CompressionMode::parse_lenient(""), CompressionMode::Standard);
    }

    #[test]
    fn test_output_filename() {
        assert_eq!(
            CompressionMode::Standard.output_filename("clip.mp4"),
            "compressed_clip.mp4"
        );
        assert_eq!(
            CompressionMode::Deep.output_filename("clip.mp4"),
            "deepcompressed_clip.mp4"
        );
    }

    #[test]
    fn test_source_filename() {
        assert_eq!(
            CompressionMode::source_filename("compressed_clip.mp4"),
            Some("clip.mp4")
        );
        assert_eq!(
            CompressionMode::source_filename("deepcompressed_clip.mp4"),
            Some("clip.mp4")
        );
        // Only the leading prefix is removed
        assert_eq!(
            CompressionMode::source_filename("compressed_compressed_clip.mp4"),
            Some("compressed_clip.mp4")
        );
        assert_eq!(CompressionMode::source_filename("clip.mp4"), None);
        assert_eq!(CompressionMode::source_filename("compressed_"), None);
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&CompressionMode::Deep).unwrap(), "\"deep\"");
        let mode: CompressionMode = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(mode, CompressionMode::Standard);
    }
}
