//! Leak auditing: scan rendered markup for residual sensitive patterns.
//!
//! The auditor deliberately shares no code with [`crate::pipeline::mask`].
//! It reads the final artifact back as plain text and applies its own,
//! narrower pattern set, so a bug in masking (or text that never went
//! through the masker, like a sheet name in the page title) still shows up.
//!
//! Two patterns count as leaks:
//!
//! - any email-shaped substring whose local part starts with a letter or digit
//! - any word-bounded run of 7+ digits not directly preceded by `*`, unless
//!   the run occurs inside the file's own identifier (sequential file names
//!   are printed in every title)

use crate::model::LeakReport;
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::Path;
use tracing::warn;

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-zA-Z0-9][a-zA-Z0-9._%+-]*@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b").unwrap()
});

static RE_LONG_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b\d{7,}\b").unwrap());

/// Scan `content` for leaks.
pub fn audit_text(content: &str, file_identifier: &str) -> LeakReport {
    let mut report = LeakReport::clean();

    for m in RE_EMAIL.find_iter(content) {
        report.push(m.as_str());
    }

    for m in RE_LONG_DIGITS.find_iter(content) {
        if content[..m.start()].ends_with('*') {
            continue;
        }
        if file_identifier.contains(m.as_str()) {
            continue;
        }
        report.push(m.as_str());
    }

    report
}

/// Scan the artifact at `path`. Never fails: an unreadable artifact is
/// reported as a single synthetic leak so the gate errs toward quarantine.
pub fn audit_file(path: &Path, file_identifier: &str) -> LeakReport {
    match std::fs::read_to_string(path) {
        Ok(content) => audit_text(&content, file_identifier),
        Err(e) => {
            warn!("Audit could not read {}: {}", path.display(), e);
            let mut report = LeakReport::clean();
            report.push(format!("Error reading file: {e}"));
            report
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_masked_text() {
        let r = audit_text("********@example.com or *****54321 ****************", "book");
        assert_eq!(r, LeakReport::clean());
    }

    #[test]
    fn test_email_leak() {
        let r = audit_text("<td>sales@acme.vn</td>", "book");
        assert_eq!(r.count, 1);
        assert_eq!(r.details, vec!["sales@acme.vn"]);
    }

    #[test]
    fn test_long_digit_leak() {
        let r = audit_text("call 0987654321 now, ref 123456", "book");
        assert_eq!(r.count, 1);
        assert_eq!(r.details, vec!["0987654321"]);
    }

    #[test]
    fn test_star_prefixed_run_ignored() {
        // Half-masked 14-digit run leaves 7 visible digits after a star.
        let r = audit_text("*******1234567", "book");
        assert_eq!(r.count, 0);
    }

    #[test]
    fn test_file_identifier_excluded() {
        let r = audit_text("<title>export_20240115 - S - P1</title> 20240115", "export_20240115");
        assert_eq!(r.count, 0);
    }

    #[test]
    fn test_digits_inside_word_ignored() {
        let r = audit_text("id abc12345678", "book");
        assert_eq!(r.count, 0);
    }

    #[test]
    fn test_unreadable_file_is_a_leak() {
        let dir = tempfile::tempdir().unwrap();
        let r = audit_file(&dir.path().join("missing.html"), "book");
        assert_eq!(r.count, 1);
        assert!(r.details[0].starts_with("Error reading file"));
    }

    #[test]
    fn test_audit_file_reads_content() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("p.html");
        std::fs::write(&path, "<td>a@b.io</td><td>1234567</td>").unwrap();
        let r = audit_file(&path, "book");
        assert_eq!(r.count, 2);
    }
}
