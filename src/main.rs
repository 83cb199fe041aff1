use clap::Parser;
use eyre::{Context, Result, eyre};
use log::LevelFilter;
use obsidian_gource_vis_jj::config::{PathStrategy, TagSource, VisConfig};
use obsidian_gource_vis_jj::pipeline;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// Generate a Gource custom log from the jj history of an Obsidian vault,
/// placing every note under its tags instead of its folder.
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Obsidian vault inside a jj repository.
    #[arg(value_name = "PATH_TO_VAULT")]
    vault: PathBuf,

    /// jj revset to process.
    /// Defaults to "..@" (the whole history) if not set in config.
    #[arg(short, long, value_name = "REVSET")]
    revset: Option<String>,

    /// Pass --ignore-working-copy to jj (do not snapshot the working copy).
    #[arg(long)]
    ignore_working_copy: bool,

    /// How display paths are derived from a note.
    #[arg(short = 's', long, value_enum, value_name = "STRATEGY")]
    path_strategy: Option<PathStrategy>,

    /// Where tags are read from.
    #[arg(long, value_enum, value_name = "SOURCE")]
    tag_source: Option<TagSource>,

    /// When a note's tags change, delete it from the old tag directories and
    /// add it to the new ones instead of reporting a plain modification.
    #[arg(long)]
    track_retags: bool,

    /// Path to the jj executable.
    #[arg(long = "jj", value_name = "PATH")]
    jj_bin: Option<PathBuf>,

    /// Path to a specific configuration file.
    /// Defaults to $XDG_CONFIG_HOME/obsidian-gource-vis-jj/config.toml
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Log every jj call and skipped line to stderr.
    #[arg(short, long)]
    verbose: bool,

    /// Only report errors on stderr.
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,
}

#[derive(Deserialize, Default)]
#[serde(deny_unknown_fields)]
struct FileConfig {
    revset: Option<String>,
    ignore_working_copy: Option<bool>,
    path_strategy: Option<PathStrategy>,
    tag_source: Option<TagSource>,
    track_retags: Option<bool>,
    untagged_dir: Option<String>,
    note_extensions: Option<Vec<String>>,
    exclude_prefixes: Option<Vec<String>>,
    jj: Option<PathBuf>,
}

fn load_file_config(explicit_path: Option<&Path>) -> Result<FileConfig> {
    let path = if let Some(p) = explicit_path {
        if !p.exists() {
            return Err(eyre!("Config file not found: {}", p.display()));
        }
        Some(p.to_path_buf())
    } else {
        dirs::config_dir()
            .map(|d| d.join("obsidian-gource-vis-jj/config.toml"))
            .filter(|p| p.exists())
    };

    match path {
        None => Ok(FileConfig::default()),
        Some(p) => {
            log::debug!("Loading config from {}", p.display());
            let content = fs::read_to_string(&p)
                .wrap_err_with(|| format!("Failed to read config: {}", p.display()))?;
            toml::from_str(&content)
                .wrap_err_with(|| format!("Failed to parse config: {}", p.display()))
        }
    }
}

fn init_logging(verbose: bool, quiet: bool) {
    let level = if quiet {
        LevelFilter::Error
    } else if verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .format_timestamp(None)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);

    // 1. Load config file (CLI path > default path)
    let file_cfg = load_file_config(cli.config.as_deref())?;

    // 2. Start from the defaults, then layer config file and CLI on top
    let mut config = VisConfig::new(cli.vault);

    if let Some(revset) = cli.revset.or(file_cfg.revset) {
        config.revset = revset;
    }
    if let Some(jj_bin) = cli.jj_bin.or(file_cfg.jj) {
        config.jj_bin = jj_bin;
    }
    if let Some(strategy) = cli.path_strategy.or(file_cfg.path_strategy) {
        config.path_strategy = strategy;
    }
    if let Some(source) = cli.tag_source.or(file_cfg.tag_source) {
        config.tag_source = source;
    }
    config.ignore_working_copy =
        cli.ignore_working_copy || file_cfg.ignore_working_copy.unwrap_or(false);
    config.track_retags = cli.track_retags || file_cfg.track_retags.unwrap_or(false);

    // 3. Config-file-only settings
    if let Some(dir) = file_cfg.untagged_dir {
        let dir = dir.trim_matches('/').to_string();
        if dir.is_empty() {
            return Err(eyre!("untagged_dir must not be empty"));
        }
        config.untagged_dir = dir;
    }
    if let Some(extensions) = file_cfg.note_extensions {
        config.note_extensions = extensions;
    }
    if let Some(prefixes) = file_cfg.exclude_prefixes {
        config.exclude_prefixes = prefixes;
    }

    // 4. Run the pipeline
    pipeline::execute(config)
}
