use std::io::{self, Write};

use crate::history::ChangeKind;

/// One line of Gource's custom log: `timestamp|author|A/M/D|path`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntheticRecord {
    pub timestamp: i64,
    pub author: String,
    pub change_kind: ChangeKind,
    pub synthetic_path: String,
}

impl SyntheticRecord {
    /// One physical line; `|` and line breaks inside a field would split the record.
    pub fn to_line(&self) -> String {
        format!(
            "{}|{}|{}|{}",
            self.timestamp,
            clean_field(&self.author),
            self.change_kind.code(),
            clean_field(&self.synthetic_path)
        )
    }
}

fn clean_field(field: &str) -> String {
    field.replace(['|', '\r', '\n'], " ")
}

/// Sort records by timestamp (stable, ties keep their order) and write them
/// out. Returns the number of lines written.
pub fn write_log<W: Write>(writer: &mut W, mut records: Vec<SyntheticRecord>) -> io::Result<usize> {
    records.sort_by_key(|r| r.timestamp);
    for record in &records {
        writeln!(writer, "{}", record.to_line())?;
    }
    writer.flush()?;
    Ok(records.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(timestamp: i64, kind: ChangeKind, path: &str) -> SyntheticRecord {
        SyntheticRecord {
            timestamp,
            author: "alice".to_string(),
            change_kind: kind,
            synthetic_path: path.to_string(),
        }
    }

    #[test]
    fn formats_pipe_delimited_line() {
        let line = record(1000, ChangeKind::Added, "project-x/idea.md").to_line();
        assert_eq!(line, "1000|alice|A|project-x/idea.md");
    }

    #[test]
    fn delimiters_inside_fields_cannot_split_a_record() {
        let mut odd = record(5, ChangeKind::Modified, "untagged/a|b\nc.md");
        odd.author = "x|y".to_string();

        let mut out = Vec::new();
        write_log(&mut out, vec![odd]).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert_eq!(text, "5|x y|M|untagged/a b c.md\n");
        assert_eq!(text.lines().count(), 1);
        assert_eq!(text.trim_end().split('|').count(), 4);
    }

    #[test]
    fn output_is_time_ordered_and_stable() {
        let records = vec![
            record(2000, ChangeKind::Modified, "b/x.md"),
            record(1000, ChangeKind::Added, "a/x.md"),
            record(2000, ChangeKind::Deleted, "a/x.md"),
        ];
        let mut out = Vec::new();
        let written = write_log(&mut out, records).unwrap();

        assert_eq!(written, 3);
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "1000|alice|A|a/x.md\n2000|alice|M|b/x.md\n2000|alice|D|a/x.md\n"
        );
    }

    #[test]
    fn empty_input_writes_nothing() {
        let mut out = Vec::new();
        assert_eq!(write_log(&mut out, Vec::new()).unwrap(), 0);
        assert!(out.is_empty());
    }

    struct BrokenSink;

    impl Write for BrokenSink {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn write_errors_are_reported() {
        let err = write_log(&mut BrokenSink, vec![record(1, ChangeKind::Added, "a/x.md")]).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
