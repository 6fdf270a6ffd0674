//! Pattern masking: deterministic redaction of one cell value.
//!
//! The masker is an ordered list of passes, each a regex plus a
//! replacement. Every pass runs on the output of the previous one and only
//! ever writes `*`, so a span destroyed by an early pass can no longer match
//! a later pattern.
//!
//! ## Pass Order
//!
//! 1. URLs (whole match starred)
//! 2. Configured keywords (case-insensitive literal, whole match starred)
//! 3. Emails (local part starred, `@domain` kept)
//! 4. Digit runs (leading `ceil(n/2)` digits starred)
//!
//! URLs go first so that digits and keywords inside a link are destroyed
//! together with it rather than partially revealed by the digit pass.

use crate::error::SheetError;
use once_cell::sync::Lazy;
use regex::{Captures, Regex, RegexBuilder};

static RE_URL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?:https?://|www\.)\S+\b").unwrap());

static RE_EMAIL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}\b").unwrap()
});

static RE_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Redacts sensitive substrings from cell text.
///
/// Construction compiles the keyword list once; [`Masker::mask`] is then a
/// pure function safe to share across threads.
#[derive(Debug, Clone)]
pub struct Masker {
    keywords: Vec<Regex>,
}

impl Masker {
    /// Compile a masker for the given keyword list. Blank keywords are ignored.
    pub fn new<S: AsRef<str>>(keywords: &[S]) -> Result<Self, SheetError> {
        let keywords = keywords
            .iter()
            .map(|k| k.as_ref().trim())
            .filter(|k| !k.is_empty())
            .map(|k| {
                RegexBuilder::new(&regex::escape(k))
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| SheetError::InvalidConfig(format!("mask keyword '{k}': {e}")))
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { keywords })
    }

    /// Mask one value. Blank input and the `nan` marker map to `""`.
    pub fn mask(&self, text: &str) -> String {
        if is_blank_marker(text) {
            return String::new();
        }
        let s = mask_urls(text);
        let s = self.mask_keywords(s);
        let s = mask_emails(&s);
        mask_digits(&s)
    }

    fn mask_keywords(&self, mut text: String) -> String {
        for re in &self.keywords {
            text = star_all(re, &text);
        }
        text
    }
}

/// True for empty text and the spreadsheet `nan` marker.
pub fn is_blank_marker(text: &str) -> bool {
    let t = text.trim();
    t.is_empty() || t.eq_ignore_ascii_case("nan")
}

fn stars(n: usize) -> String {
    "*".repeat(n)
}

fn star_all(re: &Regex, text: &str) -> String {
    re.replace_all(text, |caps: &Captures<'_>| stars(caps[0].chars().count()))
        .into_owned()
}

// ── Pass 1: URLs ─────────────────────────────────────────────────────────

fn mask_urls(text: &str) -> String {
    star_all(&RE_URL, text)
}

// ── Pass 3: Emails ───────────────────────────────────────────────────────

fn mask_emails(text: &str) -> String {
    RE_EMAIL
        .replace_all(text, |caps: &Captures<'_>| {
            let email = &caps[0];
            match email.split_once('@') {
                Some((user, domain)) => format!("{}@{}", stars(user.chars().count()), domain),
                None => email.to_string(),
            }
        })
        .into_owned()
}

// ── Pass 4: Digit runs ───────────────────────────────────────────────────

fn mask_digits(text: &str) -> String {
    RE_DIGITS
        .replace_all(text, |caps: &Captures<'_>| {
            let run = &caps[0];
            let len = run.chars().count();
            let hidden = len.div_ceil(2);
            let kept: String = run.chars().skip(hidden).collect();
            format!("{}{}", stars(hidden), kept)
        })
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn masker() -> Masker {
        Masker::new(&["trangvang", "thuế", "masothue"]).unwrap()
    }

    #[test]
    fn test_contact_line() {
        let input = "Contact: john.doe@example.com or 0987654321, see https://trangvang.vn/x";
        let expected = format!(
            "Contact: ********@example.com or *****54321, see {}",
            "*".repeat("https://trangvang.vn/x".len())
        );
        assert_eq!(masker().mask(input), expected);
    }

    #[test]
    fn test_blank_and_nan() {
        let m = masker();
        assert_eq!(m.mask(""), "");
        assert_eq!(m.mask("   "), "");
        assert_eq!(m.mask("NaN"), "");
        assert_eq!(m.mask(" nan "), "");
    }

    #[test]
    fn test_deterministic() {
        let m = masker();
        let s = "Call 0901234567 or mail a.b@c.io at www.x.com/42";
        assert_eq!(m.mask(s), m.mask(s));
    }

    #[test]
    fn test_digit_runs_half_masked() {
        let m = masker();
        assert_eq!(m.mask("7"), "*");
        assert_eq!(m.mask("12"), "*2");
        assert_eq!(m.mask("123"), "**3");
        assert_eq!(m.mask("phone 0987654321"), "phone *****54321");
        assert_eq!(m.mask("a1b22c333"), "a*b*2c**3");
    }

    #[test]
    fn test_digit_length_invariant() {
        let m = masker();
        for n in 1..=20 {
            let run: String = (0..n).map(|i| char::from(b'0' + (i % 10) as u8)).collect();
            let out = m.mask(&run);
            assert_eq!(out.chars().count(), n);
            let lead = out.chars().take_while(|&c| c == '*').count();
            assert_eq!(lead, n.div_ceil(2), "run of {n}");
        }
    }

    #[test]
    fn test_email_keeps_domain() {
        let m = Masker::new::<&str>(&[]).unwrap();
        assert_eq!(m.mask("sales@acme.co"), "*****@acme.co");
        assert_eq!(m.mask("x_y+z@mail.example.org"), "*****@mail.example.org");
    }

    #[test]
    fn test_email_domain_digits_still_masked() {
        let m = Masker::new::<&str>(&[]).unwrap();
        assert_eq!(m.mask("bob@abc123.com"), "***@abc**3.com");
    }

    #[test]
    fn test_url_destroys_digits() {
        let m = Masker::new::<&str>(&[]).unwrap();
        let out = m.mask("www.site.vn/id/123456789");
        assert!(out.chars().all(|c| c == '*'), "got {out}");
        assert_eq!(out.len(), "www.site.vn/id/123456789".len());
    }

    #[test]
    fn test_url_trailing_punctuation_kept() {
        let m = Masker::new::<&str>(&[]).unwrap();
        // The trailing `\b` backs off the final dot.
        assert_eq!(m.mask("see http://a.io/b."), format!("see {}.", "*".repeat(13)));
    }

    #[test]
    fn test_keyword_case_insensitive_substring() {
        let m = masker();
        assert_eq!(m.mask("Nguồn TrangVangVN"), "Nguồn *********VN");
    }

    #[test]
    fn test_keyword_unicode_length() {
        let m = masker();
        // "Thuế" is four chars; the mask is four stars, not its byte length.
        assert_eq!(m.mask("Mã Thuế"), "Mã ****");
    }

    #[test]
    fn test_keyword_inside_email_blocks_email_pass() {
        let m = masker();
        // The domain is starred first, so the email shape no longer matches.
        assert_eq!(m.mask("info@trangvang.vn"), "info@*********.vn");
    }

    #[test]
    fn test_blank_keywords_ignored() {
        let m = Masker::new(&["", "  "]).unwrap();
        assert_eq!(m.mask("plain"), "plain");
    }
}
