use difference::{Changeset, Difference};

/// Golden comparison: exact equality after trimming both sides.
///
/// Internal whitespace and line endings are significant.
pub fn compare(observed: &str, expected: &str) -> bool {
    observed.trim() == expected.trim()
}

/// One line of a rendered diff between expected and observed text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DiffLine {
    Same(String),
    /// Present in the expected text only.
    Missing(String),
    /// Present in the observed text only.
    Extra(String),
}

/// Line diff of the trimmed texts, expected on the left.
pub fn line_diff(observed: &str, expected: &str) -> Vec<DiffLine> {
    let changeset = Changeset::new(expected.trim(), observed.trim(), "\n");
    let mut lines = Vec::new();
    for diff in changeset.diffs {
        let (chunk, wrap): (String, fn(String) -> DiffLine) = match diff {
            Difference::Same(x) => (x, DiffLine::Same),
            Difference::Rem(x) => (x, DiffLine::Missing),
            Difference::Add(x) => (x, DiffLine::Extra),
        };
        lines.extend(chunk.split('\n').map(|l| wrap(l.to_string())));
    }
    lines
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace_only() {
        assert!(compare("42\n", "  42"));
        assert!(compare("\n\n1\n2\n", "1\n2"));
        assert!(!compare("1  2", "1 2"));
        assert!(!compare("1\r\n2", "1\n2"));
    }

    #[test]
    fn empty_matches_whitespace() {
        assert!(compare("", " \n\t"));
    }

    #[test]
    fn diff_marks_changed_line() {
        let diff = line_diff("a\n14\nc", "a\n10\nc");
        assert_eq!(diff.len(), 4);
        assert_eq!(diff[0], DiffLine::Same("a".into()));
        assert_eq!(diff[3], DiffLine::Same("c".into()));
        assert!(diff.contains(&DiffLine::Missing("10".into())));
        assert!(diff.contains(&DiffLine::Extra("14".into())));
    }

    #[test]
    fn diff_of_equal_text_has_no_changes() {
        assert!(line_diff("x\ny\n", "x\ny")
            .iter()
            .all(|l| matches!(l, DiffLine::Same(_))));
    }
}
