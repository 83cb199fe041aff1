use regex::Regex;
use serde::Deserialize;
use std::collections::BTreeSet;
use std::sync::LazyLock;

use crate::config::TagSource;

// `#` followed by word characters, `/` or `-`, at line start or after whitespace / `(`.
static INLINE_TAG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|[\s(])#([\w/-]+)").expect("valid regex"));

// Every tag, wherever it was declared, must be a plain token like this.
static TAG_TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[\w/-]+$").expect("valid regex"));

// `[text](#heading)` links to a heading; the `#heading` is not a tag.
static LINK_TARGET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\]\([^)]*\)").expect("valid regex"));

#[derive(Deserialize)]
struct NoteFrontmatter {
    #[serde(default, alias = "tag")]
    tags: Option<TagList>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum TagList {
    Many(Vec<serde_yaml::Value>),
    One(String),
}

/// Extract the tag set of a note. Binary or non UTF-8 content has no tags.
pub fn extract_tags(content: &[u8], source: TagSource) -> BTreeSet<String> {
    if content.contains(&0) {
        return BTreeSet::new();
    }
    match std::str::from_utf8(content) {
        Ok(text) => parse_tags(text, source),
        Err(_) => BTreeSet::new(),
    }
}

pub fn parse_tags(text: &str, source: TagSource) -> BTreeSet<String> {
    let (frontmatter, body) = split_frontmatter(text);
    let mut tags = BTreeSet::new();

    if source.reads_frontmatter()
        && let Some(yaml) = frontmatter
    {
        tags.extend(frontmatter_tags(yaml));
    }
    if source.reads_inline() {
        tags.extend(inline_tags(body));
    }
    tags
}

/// Split a leading `---` YAML block off the note. Returns `(None, text)` if the
/// note has no complete frontmatter block.
pub fn split_frontmatter(text: &str) -> (Option<&str>, &str) {
    let Some(rest) = text
        .strip_prefix("---\n")
        .or_else(|| text.strip_prefix("---\r\n"))
    else {
        return (None, text);
    };

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        let trimmed = line.trim_end_matches(['\r', '\n']);
        if trimmed == "---" || trimmed == "..." {
            return (Some(&rest[..offset]), &rest[offset + line.len()..]);
        }
        offset += line.len();
    }
    (None, text)
}

fn frontmatter_tags(yaml: &str) -> Vec<String> {
    let Ok(fm) = serde_yaml::from_str::<NoteFrontmatter>(yaml) else {
        return Vec::new();
    };
    let raw: Vec<String> = match fm.tags {
        None => Vec::new(),
        Some(TagList::One(s)) => s
            .split(|c: char| c == ',' || c.is_whitespace())
            .map(str::to_string)
            .collect(),
        Some(TagList::Many(values)) => values
            .into_iter()
            .filter_map(|v| match v {
                serde_yaml::Value::String(s) => Some(s),
                serde_yaml::Value::Number(n) => Some(n.to_string()),
                _ => None,
            })
            .collect(),
    };
    raw.iter()
        .filter_map(|t| normalize_tag(t.trim().trim_start_matches('#')))
        .collect()
}

fn inline_tags(body: &str) -> Vec<String> {
    let mut tags = Vec::new();
    let mut in_fence = false;

    for line in body.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("```") || trimmed.starts_with("~~~") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            continue;
        }
        let visible = strip_inline_code(line);
        let visible = LINK_TARGET_RE.replace_all(&visible, "] ");
        for caps in INLINE_TAG_RE.captures_iter(&visible) {
            if let Some(tag) = normalize_tag(&caps[1]) {
                tags.push(tag);
            }
        }
    }
    tags
}

// Text between a pair of backticks is code, not prose. A backtick without a
// partner (`it`s`) is plain text.
fn strip_inline_code(line: &str) -> String {
    let pieces: Vec<&str> = line.split('`').collect();
    if pieces.len() == 1 {
        return line.to_string();
    }
    let unpaired = pieces.len() % 2 == 0;
    pieces
        .iter()
        .enumerate()
        .filter(|(i, _)| i % 2 == 0 || (unpaired && *i == pieces.len() - 1))
        .map(|(_, piece)| *piece)
        .collect::<Vec<_>>()
        .join(" ")
}

// Tags become directories, so only plain tokens are accepted. Empty segments
// (leading, trailing or doubled `/`) are dropped. Purely numeric tokens such
// as `#2024` are not tags.
fn normalize_tag(raw: &str) -> Option<String> {
    if !TAG_TOKEN_RE.is_match(raw) {
        return None;
    }
    let tag = raw
        .split('/')
        .filter(|segment| !segment.is_empty())
        .collect::<Vec<_>>()
        .join("/");
    if tag.is_empty() || tag.chars().all(|c| c.is_ascii_digit() || c == '/') {
        return None;
    }
    Some(tag)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tags(text: &str) -> Vec<String> {
        parse_tags(text, TagSource::Both).into_iter().collect()
    }

    #[test]
    fn finds_inline_tags() {
        assert_eq!(tags("An idea #project-x for later"), vec!["project-x"]);
        assert_eq!(tags("#start of line"), vec!["start"]);
        assert_eq!(tags("(see #area/sub)"), vec!["area/sub"]);
    }

    #[test]
    fn headings_numbers_and_anchors_are_not_tags() {
        assert!(tags("# Heading\n## Sub heading").is_empty());
        assert!(tags("Issue #2024 was fixed").is_empty());
        assert!(tags("see https://example.com/page#anchor").is_empty());
        assert!(tags("a#b").is_empty());
    }

    #[test]
    fn duplicates_collapse_and_order_is_sorted() {
        assert_eq!(tags("#b #a #b\n#a"), vec!["a", "b"]);
    }

    #[test]
    fn tags_are_case_sensitive() {
        assert_eq!(tags("#Work #work"), vec!["Work", "work"]);
    }

    #[test]
    fn trailing_slash_is_stripped() {
        assert_eq!(tags("#area/ and #x/y/"), vec!["area", "x/y"]);
    }

    #[test]
    fn code_is_ignored() {
        let text = "before #real\n```sh\necho #not-a-tag\n```\n`#inline-code` after #also-real";
        assert_eq!(tags(text), vec!["also-real", "real"]);
    }

    #[test]
    fn frontmatter_list_and_string_forms() {
        let list = "---\ntitle: t\ntags:\n  - alpha\n  - \"#beta\"\n  - nested/x/\n---\nbody";
        assert_eq!(tags(list), vec!["alpha", "beta", "nested/x"]);

        let flat = "---\ntags: one, two three\n---\n";
        assert_eq!(tags(flat), vec!["one", "three", "two"]);

        let singular = "---\ntag: solo\n---\n";
        assert_eq!(tags(singular), vec!["solo"]);
    }

    #[test]
    fn frontmatter_and_body_are_merged() {
        let text = "---\ntags: [fm]\n---\nbody #inline";
        assert_eq!(tags(text), vec!["fm", "inline"]);
        assert_eq!(
            parse_tags(text, TagSource::Inline).into_iter().collect::<Vec<_>>(),
            vec!["inline"]
        );
        assert_eq!(
            parse_tags(text, TagSource::Frontmatter).into_iter().collect::<Vec<_>>(),
            vec!["fm"]
        );
    }

    #[test]
    fn frontmatter_is_not_scanned_for_inline_tags() {
        assert!(tags("---\ncolor: \"#ffffff\"\n---\n").is_empty());
    }

    #[test]
    fn malformed_frontmatter_keeps_inline_tags() {
        let text = "---\ntags: [unclosed\n---\nstill #here";
        assert_eq!(tags(text), vec!["here"]);
    }

    #[test]
    fn unterminated_frontmatter_is_body() {
        let (fm, body) = split_frontmatter("---\nnot closed #x");
        assert!(fm.is_none());
        assert_eq!(body, "---\nnot closed #x");
    }

    #[test]
    fn crlf_frontmatter() {
        let (fm, body) = split_frontmatter("---\r\ntags: [a]\r\n---\r\nbody");
        assert_eq!(fm, Some("tags: [a]\r\n"));
        assert_eq!(body, "body");
    }

    #[test]
    fn frontmatter_entries_outside_the_token_grammar_are_dropped() {
        let text = "---\ntags: [\"a|b\", \"x\\ny\", \"../up\", \"two words\", \"/abs\", \"a//b\", ok]\n---\n";
        assert_eq!(tags(text), vec!["a/b", "abs", "ok"]);
    }

    #[test]
    fn leading_slash_of_inline_tag_is_dropped() {
        assert_eq!(tags("body #/lead and #//"), vec!["lead"]);
    }

    #[test]
    fn heading_links_are_not_tags() {
        assert_eq!(tags("[see](#section) but #real (#also)"), vec!["also", "real"]);
    }

    #[test]
    fn unpaired_backtick_does_not_hide_tags() {
        assert_eq!(tags("it`s #tag"), vec!["tag"]);
        assert_eq!(tags("`code #no` then ` #yes"), vec!["yes"]);
    }

    #[test]
    fn binary_and_invalid_utf8_have_no_tags() {
        assert!(extract_tags(b"\x00\x01#tag", TagSource::Both).is_empty());
        assert!(extract_tags(&[0xff, 0xfe, b'#', b'x'], TagSource::Both).is_empty());
        assert_eq!(extract_tags(b"#ok", TagSource::Both).len(), 1);
    }
}
