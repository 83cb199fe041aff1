//! Reading the change history of a vault out of `jj`.
//!
//! `jj log` is run once with a custom template that prints a machine-readable
//! header per revision, followed by jj's own `--summary` lines:
//!
//! ```text
//! @@ <commit id>\t<parent ids, comma separated>\t<RFC 3339 author time>\t<name>\t<email>
//! A notes/new.md
//! M idea.md
//! R notes/{old.md => new.md}
//! ```
use chrono::DateTime;
use eyre::{Context, Result, eyre};
use regex::Regex;
use std::ffi::OsStr;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::process::Command;
use std::sync::LazyLock;

use crate::config::VisConfig;

const HEADER_MARKER: &str = "@@ ";

pub const LOG_TEMPLATE: &str = concat!(
    r#""@@ " ++ commit_id ++ "\t""#,
    r#" ++ parents.map(|p| p.commit_id()).join(",") ++ "\t""#,
    r#" ++ author.timestamp().format("%Y-%m-%dT%H:%M:%S%:z") ++ "\t""#,
    r#" ++ author.name() ++ "\t" ++ author.email() ++ "\n""#,
);

static BRACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.*)\{(.*) => (.*)\}(.*)$").expect("valid regex"));

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ChangeKind {
    Added,
    Modified,
    Deleted,
}

impl ChangeKind {
    /// Single-letter code used by Gource's custom log format.
    pub fn code(self) -> char {
        match self {
            ChangeKind::Added => 'A',
            ChangeKind::Modified => 'M',
            ChangeKind::Deleted => 'D',
        }
    }
}

/// One file touched by one revision.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChangeEvent {
    pub timestamp: i64,
    pub author: String,
    pub file_path: String,
    pub change_kind: ChangeKind,
    pub revision: String,
    /// Parent commit ids, first parent first. A file's previous state lives here.
    pub parents: Vec<String>,
}

/// A revision header plus its summary lines, as printed by `jj log`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Revision {
    pub commit_id: String,
    pub parents: Vec<String>,
    pub timestamp: i64,
    pub author: String,
    pub changes: Vec<(ChangeKind, String)>,
}

/// Read access to file contents at a given revision.
pub trait FileSource {
    fn file_at(&self, revision: &str, path: &str) -> Result<Vec<u8>>;
}

/// Thin wrapper around the `jj` executable, run from inside the vault.
pub struct Jj {
    bin: PathBuf,
    workdir: PathBuf,
    ignore_working_copy: bool,
}

impl Jj {
    pub fn new(bin: impl Into<PathBuf>, workdir: impl Into<PathBuf>, ignore_working_copy: bool) -> Self {
        Self {
            bin: bin.into(),
            workdir: workdir.into(),
            ignore_working_copy,
        }
    }

    pub fn from_config(config: &VisConfig) -> Self {
        Self::new(&config.jj_bin, &config.vault, config.ignore_working_copy)
    }

    /// Runs jj to completion and returns its stdout. `Command::output` waits for
    /// the child, so no process outlives this call.
    fn run<I, S>(&self, args: I) -> Result<Vec<u8>>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut cmd = Command::new(&self.bin);
        cmd.current_dir(&self.workdir).args(args);
        if self.ignore_working_copy {
            cmd.arg("--ignore-working-copy");
        }
        log::debug!("Running {:?}", cmd);

        let output = cmd.output().map_err(|e| {
            if e.kind() == ErrorKind::NotFound {
                eyre!(
                    "Could not run `{}`: executable not found.\nInstall jj or point to it with --jj.",
                    self.bin.display()
                )
            } else {
                eyre!("Could not run `{}`: {}", self.bin.display(), e)
            }
        })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(eyre!(
                "`{}` exited with {}:\n{}",
                self.bin.display(),
                output.status,
                stderr.trim()
            ));
        }
        Ok(output.stdout)
    }

    /// Raw `jj log` output for `revset`, oldest revision first.
    pub fn log(&self, revset: &str) -> Result<String> {
        let stdout = self.run([
            "log",
            "--no-graph",
            "--reversed",
            "--summary",
            "-r",
            revset,
            "-T",
            LOG_TEMPLATE,
            ".",
        ])?;
        String::from_utf8(stdout).wrap_err("jj log printed non UTF-8 output")
    }
}

impl FileSource for Jj {
    fn file_at(&self, revision: &str, path: &str) -> Result<Vec<u8>> {
        let fileset = format!("file:{}", quote_fileset(path));
        self.run(["file", "show", "-r", revision, fileset.as_str()])
            .wrap_err_with(|| format!("Failed to read {} at {}", path, short_id(revision)))
    }
}

/// Read every change event of the vault, oldest first.
pub fn read_history(jj: &Jj, config: &VisConfig) -> Result<Vec<ChangeEvent>> {
    let vault = &config.vault;
    if !vault.is_dir() {
        return Err(eyre!("Vault directory not found: {}", vault.display()));
    }

    let raw = jj
        .log(&config.revset)
        .wrap_err_with(|| format!("Failed to read jj history of {}", vault.display()))?;
    let revisions = parse_log(&raw)?;
    log::info!("Found {} revisions", revisions.len());

    Ok(into_events(revisions, |path| config.is_excluded(path)))
}

/// Flatten revisions into per-file events, stably ordered by timestamp.
pub fn into_events(revisions: Vec<Revision>, excluded: impl Fn(&str) -> bool) -> Vec<ChangeEvent> {
    let mut events: Vec<ChangeEvent> = revisions
        .into_iter()
        .flat_map(|rev| {
            let Revision {
                commit_id,
                parents,
                timestamp,
                author,
                changes,
            } = rev;
            changes
                .into_iter()
                .map(move |(change_kind, file_path)| ChangeEvent {
                    timestamp,
                    author: author.clone(),
                    file_path,
                    change_kind,
                    revision: commit_id.clone(),
                    parents: parents.clone(),
                })
        })
        .filter(|event| !excluded(&event.file_path))
        .collect();
    events.sort_by_key(|e| e.timestamp);
    events
}

/// Parse the output of `jj log` run with [`LOG_TEMPLATE`] and `--summary`.
pub fn parse_log(raw: &str) -> Result<Vec<Revision>> {
    let mut revisions: Vec<Revision> = Vec::new();

    for line in raw.lines() {
        if line.trim().is_empty() {
            continue;
        }
        if let Some(header) = line.strip_prefix(HEADER_MARKER) {
            revisions.push(parse_header(header)?);
            continue;
        }
        let Some(current) = revisions.last_mut() else {
            log::debug!("Skipping summary line before any revision: {:?}", line);
            continue;
        };
        match parse_summary_line(line) {
            Some(changes) => current.changes.extend(changes),
            None => log::debug!("Skipping unrecognized summary line: {:?}", line),
        }
    }

    Ok(revisions)
}

fn parse_header(header: &str) -> Result<Revision> {
    let fields: Vec<&str> = header.splitn(5, '\t').collect();
    let &[commit_id, parents, timestamp, name, email] = fields.as_slice() else {
        return Err(eyre!("Unexpected revision header from jj: {:?}", header));
    };
    if commit_id.is_empty() {
        return Err(eyre!("Revision header without commit id: {:?}", header));
    }

    let timestamp = DateTime::parse_from_rfc3339(timestamp)
        .wrap_err_with(|| format!("Invalid timestamp {:?} for {}", timestamp, short_id(commit_id)))?
        .timestamp();

    Ok(Revision {
        commit_id: commit_id.to_string(),
        parents: parents
            .split(',')
            .filter(|p| !p.is_empty())
            .map(str::to_string)
            .collect(),
        timestamp,
        author: author_label(name, email),
        changes: Vec::new(),
    })
}

/// `A path`, `M path`, `D path`, `R a/{x => y}`, `C a/{x => y}`.
fn parse_summary_line(line: &str) -> Option<Vec<(ChangeKind, String)>> {
    let (code, path) = line.split_once(' ')?;
    match code {
        "A" => Some(vec![(ChangeKind::Added, path.to_string())]),
        "M" => Some(vec![(ChangeKind::Modified, path.to_string())]),
        "D" => Some(vec![(ChangeKind::Deleted, path.to_string())]),
        "R" => {
            let (old, new) = split_rename(path)?;
            Some(vec![(ChangeKind::Deleted, old), (ChangeKind::Added, new)])
        }
        "C" => {
            let (_, new) = split_rename(path)?;
            Some(vec![(ChangeKind::Added, new)])
        }
        _ => None,
    }
}

/// Expand jj's `prefix{old => new}suffix` notation into the two full paths.
pub fn split_rename(path: &str) -> Option<(String, String)> {
    let caps = BRACE_RE.captures(path)?;
    let (prefix, old, new, suffix) = (&caps[1], &caps[2], &caps[3], &caps[4]);
    Some((
        normalize_path(&format!("{prefix}{old}{suffix}")),
        normalize_path(&format!("{prefix}{new}{suffix}")),
    ))
}

fn normalize_path(path: &str) -> String {
    path.split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/")
}

// Gource splits on `|`, so it must not appear inside a field.
fn author_label(name: &str, email: &str) -> String {
    let label = if !name.trim().is_empty() {
        name.trim()
    } else {
        email.split('@').next().unwrap_or("").trim()
    };
    if label.is_empty() {
        return "unknown".to_string();
    }
    label.replace(['|', '\r', '\n'], " ")
}

fn quote_fileset(path: &str) -> String {
    let mut quoted = String::with_capacity(path.len() + 2);
    quoted.push('"');
    for c in path.chars() {
        if c == '"' || c == '\\' {
            quoted.push('\\');
        }
        quoted.push(c);
    }
    quoted.push('"');
    quoted
}

pub fn short_id(id: &str) -> &str {
    &id[..12.min(id.len())]
}
