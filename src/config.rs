use clap::ValueEnum;
use serde::Deserialize;
use std::path::PathBuf;

pub const DEFAULT_REVSET: &str = "..@";
pub const DEFAULT_UNTAGGED_DIR: &str = "untagged";

/// How a note's display path is derived in the visualization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum PathStrategy {
    /// `<tag>/<filename>` for every tag of the note.
    #[default]
    Tags,
    /// One `<tag>.md` node per tag, so all notes of a tag collapse into it.
    TagFiles,
    /// The real path inside the vault; tags are ignored.
    File,
}

/// Where tags are looked for inside a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TagSource {
    /// `#tag` tokens in the note body.
    Inline,
    /// The `tags:` key of the YAML frontmatter.
    Frontmatter,
    #[default]
    Both,
}

impl TagSource {
    pub fn reads_inline(self) -> bool {
        matches!(self, TagSource::Inline | TagSource::Both)
    }

    pub fn reads_frontmatter(self) -> bool {
        matches!(self, TagSource::Frontmatter | TagSource::Both)
    }
}

/// Configuration required to run a conversion.
/// This decouples the logic from how the arguments were parsed (CLI/Config file).
#[derive(Debug, Clone)]
pub struct VisConfig {
    pub vault: PathBuf,
    pub jj_bin: PathBuf,
    pub revset: String,
    pub ignore_working_copy: bool,
    pub path_strategy: PathStrategy,
    pub tag_source: TagSource,
    pub track_retags: bool,
    pub untagged_dir: String,
    pub note_extensions: Vec<String>,
    pub exclude_prefixes: Vec<String>,
}

impl VisConfig {
    /// Defaults for everything except the vault location.
    pub fn new(vault: impl Into<PathBuf>) -> Self {
        Self {
            vault: vault.into(),
            jj_bin: PathBuf::from("jj"),
            revset: DEFAULT_REVSET.to_string(),
            ignore_working_copy: false,
            path_strategy: PathStrategy::default(),
            tag_source: TagSource::default(),
            track_retags: false,
            untagged_dir: DEFAULT_UNTAGGED_DIR.to_string(),
            note_extensions: default_note_extensions(),
            exclude_prefixes: default_exclude_prefixes(),
        }
    }

    /// Whether tags should be read from `path` at all.
    pub fn is_note(&self, path: &str) -> bool {
        let Some((_, ext)) = path.rsplit_once('.') else {
            return false;
        };
        if ext.contains('/') {
            return false;
        }
        self.note_extensions
            .iter()
            .any(|e| e.trim_start_matches('.').eq_ignore_ascii_case(ext))
    }

    pub fn is_excluded(&self, path: &str) -> bool {
        self.exclude_prefixes
            .iter()
            .any(|prefix| !prefix.is_empty() && path.starts_with(prefix.as_str()))
    }
}

pub fn default_note_extensions() -> Vec<String> {
    vec!["md".to_string()]
}

pub fn default_exclude_prefixes() -> Vec<String> {
    vec![".obsidian/".to_string(), ".trash/".to_string()]
}
