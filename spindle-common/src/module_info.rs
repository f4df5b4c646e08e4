//! Module metadata snapshot and format classification
//!
//! `ModuleInfo` is produced once per successful load from the synthesis
//! library's metadata and is never mutated afterwards, so it can be shared
//! read-only with any front end.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};

/// Raw metadata as reported by a synthesis backend
///
/// All counts are taken verbatim from the loaded module. `duration_ms` is the
/// duration of the first sequence.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleMetadata {
    pub name: String,
    /// Backend format description, e.g. `"Fast Tracker II (XM)"` or `"M.K."`
    pub format: String,
    pub comment: String,
    pub volume_base: u32,
    pub sequence_count: u32,
    pub pattern_count: u32,
    pub track_count: u32,
    pub channel_count: u32,
    pub instrument_count: u32,
    pub sample_count: u32,
    pub initial_speed: u32,
    pub initial_bpm: u32,
    pub length_in_patterns: u32,
    pub restart_position: u32,
    pub global_volume: u32,
    pub instruments: Vec<String>,
    pub samples: Vec<String>,
    pub duration_ms: u64,
}

/// Immutable snapshot of a loaded module
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleInfo {
    /// File the module was loaded from
    pub path: PathBuf,
    /// SHA-256 of the file bytes, lowercase hex
    pub hash: String,
    /// Module title, or the file name when the module has none
    pub name: String,
    /// Backend format description
    pub format: String,
    /// Simplified format tag derived from `format`
    pub simple_format: FormatTag,
    pub comment: String,
    pub volume_base: u32,
    pub sequence_count: u32,
    pub pattern_count: u32,
    pub track_count: u32,
    pub channel_count: u32,
    pub instrument_count: u32,
    pub sample_count: u32,
    pub initial_speed: u32,
    pub initial_bpm: u32,
    pub length_in_patterns: u32,
    pub restart_position: u32,
    pub global_volume: u32,
    pub instruments: Vec<String>,
    pub samples: Vec<String>,
    /// Duration of the first sequence in milliseconds
    pub duration_ms: u64,
}

impl ModuleInfo {
    /// Build the snapshot for a module loaded from `path`
    pub fn new(path: &Path, hash: String, metadata: ModuleMetadata) -> Self {
        let name = if metadata.name.trim().is_empty() {
            path.file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default()
        } else {
            metadata.name
        };

        Self {
            path: path.to_path_buf(),
            hash,
            name,
            simple_format: classify_format(&metadata.format),
            format: metadata.format,
            comment: metadata.comment,
            volume_base: metadata.volume_base,
            sequence_count: metadata.sequence_count,
            pattern_count: metadata.pattern_count,
            track_count: metadata.track_count,
            channel_count: metadata.channel_count,
            instrument_count: metadata.instrument_count,
            sample_count: metadata.sample_count,
            initial_speed: metadata.initial_speed,
            initial_bpm: metadata.initial_bpm,
            length_in_patterns: metadata.length_in_patterns,
            restart_position: metadata.restart_position,
            global_volume: metadata.global_volume,
            instruments: metadata.instruments,
            samples: metadata.samples,
            duration_ms: metadata.duration_ms,
        }
    }

    /// Duration in whole seconds
    pub fn duration_seconds(&self) -> u64 {
        self.duration_ms / 1000
    }

    /// Short type description, e.g. `4-Chan MOD`
    pub fn type_label(&self) -> String {
        format!("{}-Chan {}", self.channel_count, self.simple_format)
    }
}

/// Content hash of module file bytes (SHA-256, lowercase hex)
///
/// Identical bytes always hash identically, which is what the playlist
/// de-duplicates on.
pub fn content_hash(bytes: &[u8]) -> String {
    Sha256::digest(bytes)
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Simplified module format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum FormatTag {
    Mod,
    Med,
    Composer669,
    Mtm,
    Dtm,
    Ult,
    Ptm,
    Stm,
    S3m,
    Liq,
    Digi,
    Dbm,
    Emod,
    Okt,
    Pt36,
    Xm,
    It,
    #[default]
    Unknown,
}

impl FormatTag {
    pub fn as_str(self) -> &'static str {
        match self {
            FormatTag::Mod => "MOD",
            FormatTag::Med => "MED",
            FormatTag::Composer669 => "669",
            FormatTag::Mtm => "MTM",
            FormatTag::Dtm => "DTM",
            FormatTag::Ult => "ULT",
            FormatTag::Ptm => "PTM",
            FormatTag::Stm => "STM",
            FormatTag::S3m => "S3M",
            FormatTag::Liq => "LIQ",
            FormatTag::Digi => "DIGI",
            FormatTag::Dbm => "DBM",
            FormatTag::Emod => "EMOD",
            FormatTag::Okt => "OKT",
            FormatTag::Pt36 => "PT36",
            FormatTag::Xm => "XM",
            FormatTag::It => "IT",
            FormatTag::Unknown => "Unknown",
        }
    }
}

impl std::fmt::Display for FormatTag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How a table entry matches a backend format description
#[derive(Debug, Clone, Copy)]
enum FormatPattern {
    Suffix(&'static str),
    Prefix(&'static str),
    Exact(&'static str),
    Contains(&'static str),
}

impl FormatPattern {
    fn matches(self, format: &str) -> bool {
        match self {
            FormatPattern::Suffix(s) => format.ends_with(s),
            FormatPattern::Prefix(s) => format.starts_with(s),
            FormatPattern::Exact(s) => format == s,
            FormatPattern::Contains(s) => format.contains(s),
        }
    }
}

use FormatPattern::{Contains, Exact, Prefix, Suffix};

/// Ordered classification table; the first matching entry wins.
///
/// Bracketed file extensions come first, then tracker signatures. The broad
/// `Contains` entries for XM and IT sit at the end so that more specific
/// tracker names are matched first.
const FORMAT_TABLE: &[(FormatPattern, FormatTag)] = &[
    // Long name with extension, e.g. "FastTracker 2 (XM)"
    (Suffix("(MOD)"), FormatTag::Mod),
    (Suffix("(M15)"), FormatTag::Mod),
    (Suffix("(STK)"), FormatTag::Mod),
    (Suffix("(MED)"), FormatTag::Med),
    (Suffix("(669)"), FormatTag::Composer669),
    (Suffix("(MTM)"), FormatTag::Mtm),
    (Suffix("(DTM)"), FormatTag::Dtm),
    (Suffix("(ULT)"), FormatTag::Ult),
    (Suffix("(PTM)"), FormatTag::Ptm),
    (Suffix("(STM)"), FormatTag::Stm),
    (Suffix("(S3M)"), FormatTag::S3m),
    (Suffix("(DIGI)"), FormatTag::Digi),
    (Suffix("(DBM)"), FormatTag::Dbm),
    (Suffix("(OKT)"), FormatTag::Okt),
    (Suffix("(PT36)"), FormatTag::Pt36),
    (Suffix("(XM)"), FormatTag::Xm),
    (Suffix("(IT)"), FormatTag::It),
    (Suffix("(MPTM)"), FormatTag::It),
    // Protracker and clones
    (Suffix("M.K."), FormatTag::Mod),
    (Suffix("M!K!"), FormatTag::Mod),
    (Suffix("M&K!"), FormatTag::Mod),
    (Suffix("N.T."), FormatTag::Mod),
    (Suffix("2CHN"), FormatTag::Mod),
    (Suffix("6CHN"), FormatTag::Mod),
    (Suffix("8CHN"), FormatTag::Mod),
    (Suffix("12CH"), FormatTag::Mod),
    (Exact("Mod's Grave"), FormatTag::Mod),
    (Suffix("FLT4"), FormatTag::Mod), // Startrekker
    (Suffix("FLT8"), FormatTag::Mod),
    (Suffix("FA04"), FormatTag::Mod), // Digital Tracker
    (Suffix("FA06"), FormatTag::Mod),
    (Suffix("FA08"), FormatTag::Mod),
    (Suffix("CD81"), FormatTag::Mod),
    (Exact("Soundtracker IX"), FormatTag::Mod),
    (Exact("Ultimate Soundtracker"), FormatTag::Mod),
    (Prefix("D.O.C Soundtracker"), FormatTag::Mod),
    // MED / OctaMED
    (Prefix("MED"), FormatTag::Med),
    (Prefix("OctaMED"), FormatTag::Med),
    (Suffix("669"), FormatTag::Composer669),
    (Suffix("MTM"), FormatTag::Mtm),
    (Suffix("DTM"), FormatTag::Dtm),
    (Prefix("Ultra Tracker"), FormatTag::Ult),
    (Prefix("Poly Tracker"), FormatTag::Ptm),
    (Suffix("STM"), FormatTag::Stm),
    (Suffix("S3M"), FormatTag::S3m),
    (Exact("Scream Tracker 3"), FormatTag::S3m),
    (Prefix("Liquid Tracker"), FormatTag::Liq),
    (Prefix("LiquidTrack"), FormatTag::Liq),
    (Prefix("DIGI Booster"), FormatTag::Digi),
    (Prefix("DigiBooster Pro"), FormatTag::Dbm),
    (Prefix("Quadra Composer"), FormatTag::Emod),
    (Exact("Oktalyzer"), FormatTag::Okt),
    (Contains("IFFMODL"), FormatTag::Pt36), // Protracker 3.6
    (Contains("XM"), FormatTag::Xm),
    (Exact("Impulse Tracker"), FormatTag::It),
    (Contains("IT"), FormatTag::It),
];

/// Map a backend format description onto a simplified tag.
///
/// Pure and total: unmatched input yields `FormatTag::Unknown`.
///
/// # Examples
///
/// ```
/// use spindle_common::module_info::{classify_format, FormatTag};
///
/// assert_eq!(classify_format("Protracker M.K."), FormatTag::Mod);
/// assert_eq!(classify_format("Fast Tracker II (XM)"), FormatTag::Xm);
/// assert_eq!(classify_format("something else"), FormatTag::Unknown);
/// ```
pub fn classify_format(format: &str) -> FormatTag {
    FORMAT_TABLE
        .iter()
        .find(|(pattern, _)| pattern.matches(format))
        .map(|(_, tag)| *tag)
        .unwrap_or(FormatTag::Unknown)
}
