use std::collections::BTreeSet;

use crate::config::PathStrategy;

/// Synthetic display paths of a note. Never empty: untagged notes land in
/// `<untagged_dir>/<filename>`.
pub fn synthesize(
    file_path: &str,
    tags: &BTreeSet<String>,
    strategy: PathStrategy,
    untagged_dir: &str,
) -> BTreeSet<String> {
    let filename = file_name(file_path);

    if strategy == PathStrategy::File {
        return BTreeSet::from([file_path.to_string()]);
    }
    if tags.is_empty() {
        return BTreeSet::from([format!("{untagged_dir}/{filename}")]);
    }

    tags.iter()
        .map(|tag| match strategy {
            PathStrategy::TagFiles => format!("{tag}.md"),
            _ => format!("{tag}/{filename}"),
        })
        .collect()
}

pub fn file_name(file_path: &str) -> &str {
    file_path.rsplit('/').next().unwrap_or(file_path)
}
