use eyre::{Context, Result};
use std::collections::BTreeSet;
use std::io::{self, BufWriter};

use crate::config::{PathStrategy, VisConfig};
use crate::gource::{self, SyntheticRecord};
use crate::history::{ChangeEvent, ChangeKind, FileSource, Jj, read_history, short_id};
use crate::paths;
use crate::tags;

pub fn execute(config: VisConfig) -> Result<()> {
    log::info!(
        "Processing revset '{}' of vault at {}",
        config.revset,
        config.vault.display()
    );
    log::info!("Using path strategy {:?}", config.path_strategy);

    let jj = Jj::from_config(&config);
    let events = read_history(&jj, &config)?;
    log::info!("Found {} file changes", events.len());

    let records = build_records(&events, &jj, &config);

    let stdout = io::stdout();
    let mut writer = BufWriter::new(stdout.lock());
    let written = gource::write_log(&mut writer, records).wrap_err("Failed to write Gource log")?;
    log::info!("Wrote {} log lines", written);

    Ok(())
}

/// Expand every change event into its synthetic records.
pub fn build_records(
    events: &[ChangeEvent],
    source: &impl FileSource,
    config: &VisConfig,
) -> Vec<SyntheticRecord> {
    events
        .iter()
        .flat_map(|event| expand_event(event, source, config))
        .collect()
}

fn expand_event(
    event: &ChangeEvent,
    source: &impl FileSource,
    config: &VisConfig,
) -> Vec<SyntheticRecord> {
    let synthesize = |tags: &BTreeSet<String>| {
        paths::synthesize(
            &event.file_path,
            tags,
            config.path_strategy,
            &config.untagged_dir,
        )
    };
    let record = |change_kind: ChangeKind, synthetic_path: String| SyntheticRecord {
        timestamp: event.timestamp,
        author: event.author.clone(),
        change_kind,
        synthetic_path,
    };
    let current = || tags_at(source, config, &event.file_path, std::slice::from_ref(&event.revision));
    let previous = || tags_at(source, config, &event.file_path, &event.parents);

    match event.change_kind {
        ChangeKind::Added => synthesize(&current())
            .into_iter()
            .map(|p| record(ChangeKind::Added, p))
            .collect(),
        // The file is gone at this revision; its tags live in a parent.
        ChangeKind::Deleted => synthesize(&previous())
            .into_iter()
            .map(|p| record(ChangeKind::Deleted, p))
            .collect(),
        ChangeKind::Modified if config.track_retags => {
            let old = synthesize(&previous());
            let new = synthesize(&current());
            let deleted = old.difference(&new).map(|p| record(ChangeKind::Deleted, p.clone()));
            let added = new.difference(&old).map(|p| record(ChangeKind::Added, p.clone()));
            let modified = new.intersection(&old).map(|p| record(ChangeKind::Modified, p.clone()));
            deleted.chain(added).chain(modified).collect()
        }
        ChangeKind::Modified => synthesize(&current())
            .into_iter()
            .map(|p| record(ChangeKind::Modified, p))
            .collect(),
    }
}

// Tags of the first of `revisions` the note can be read at. A note that cannot
// be read anywhere is untagged; it never aborts the run.
fn tags_at(
    source: &impl FileSource,
    config: &VisConfig,
    path: &str,
    revisions: &[String],
) -> BTreeSet<String> {
    if config.path_strategy == PathStrategy::File || !config.is_note(path) {
        return BTreeSet::new();
    }

    let mut last_error = None;
    for revision in revisions {
        match source.file_at(revision, path) {
            Ok(content) => return tags::extract_tags(&content, config.tag_source),
            Err(e) => {
                log::debug!("{} not readable at {}: {:#}", path, short_id(revision), e);
                last_error = Some((revision, e));
            }
        }
    }

    if let Some((revision, e)) = last_error {
        log::warn!(
            "{} at {}: could not read tags, treating as untagged ({:#})",
            path,
            short_id(revision),
            e
        );
    }
    BTreeSet::new()
}
