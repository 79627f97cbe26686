// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The recognizer: pure data plus a pure function, per the design note that
//! "polling + string matching on pane tails... is contained behind the
//! recognizer... so it is trivially testable and hot-swappable."
//!
//! Patterns are literal substrings rather than regexes: the spec forbids a
//! regex that could cross newlines into an ambiguous capture, and a literal
//! marker can't do that by construction. When more than one marker matches,
//! the longest (most specific) one wins.

/// One recognizable agent dialog shape.
#[derive(Debug, Clone, Copy)]
pub struct RecognizerRule {
    pub marker: &'static str,
    pub operation_class: &'static str,
    pub confirm_key: &'static str,
}

/// Default recognizer table, matching the default safe/unsafe partition in
/// [`crate::model::Policy::default`].
pub const DEFAULT_RULES: &[RecognizerRule] = &[
    RecognizerRule { marker: "Do you want to make this edit", operation_class: "edit", confirm_key: "2" },
    RecognizerRule { marker: "Do you want to create", operation_class: "write", confirm_key: "2" },
    RecognizerRule { marker: "Bash command", operation_class: "bash", confirm_key: "2" },
    RecognizerRule { marker: "Do you want to delete", operation_class: "delete", confirm_key: "2" },
    RecognizerRule { marker: "Accept edits", operation_class: "accept_edits", confirm_key: "2" },
    RecognizerRule { marker: "Search files matching", operation_class: "grep", confirm_key: "2" },
    RecognizerRule { marker: "Find files matching", operation_class: "glob", confirm_key: "2" },
    RecognizerRule { marker: "Read file", operation_class: "read", confirm_key: "2" },
];

/// A recognized dialog: the classified operation, the marker text that
/// matched (used downstream as the dedup fingerprint basis), and the
/// keystroke that accepts it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recognition {
    pub operation_class: String,
    pub operation_detail: String,
    pub confirm_key: String,
}

/// Scan `text` against `rules`, returning the longest-marker match if any.
pub fn recognize(text: &str, rules: &[RecognizerRule]) -> Option<Recognition> {
    rules
        .iter()
        .filter(|rule| text.contains(rule.marker))
        .max_by_key(|rule| rule.marker.len())
        .map(|rule| Recognition {
            operation_class: rule.operation_class.to_string(),
            operation_detail: rule.marker.to_string(),
            confirm_key: rule.confirm_key.to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn no_match_returns_none() {
        assert!(recognize("nothing interesting here", DEFAULT_RULES).is_none());
    }

    #[test]
    fn matches_bash_prompt() {
        let r = recognize("Bash command\nrm -rf /tmp/x\n1. No  2. Yes", DEFAULT_RULES).unwrap();
        assert_eq!(r.operation_class, "bash");
        assert_eq!(r.confirm_key, "2");
    }

    #[test]
    fn most_specific_marker_wins_when_multiple_match() {
        let rules = &[
            RecognizerRule { marker: "Do you want to", operation_class: "generic", confirm_key: "2" },
            RecognizerRule { marker: "Do you want to delete", operation_class: "delete", confirm_key: "2" },
        ];
        let r = recognize("Do you want to delete this file?", rules).unwrap();
        assert_eq!(r.operation_class, "delete");
    }
}
