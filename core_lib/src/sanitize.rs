//! Outbound file name sanitization for `Content-Disposition` headers.

use lazy_static::lazy_static;
use regex::Regex;

pub const REPLACEMENT: &str = "_";
pub const MAX_NAME_LEN: usize = 255;

lazy_static! {
    static ref ILLEGAL_RE: Regex = Regex::new(r#"[/?<>\\:*|"]"#).unwrap();
    static ref CONTROL_RE: Regex = Regex::new(r"[\x00-\x1F\x80-\x9F]").unwrap();
    static ref RESERVED_RE: Regex = Regex::new(r"^\.+$").unwrap();
    static ref WINDOWS_RESERVED_RE: Regex =
        Regex::new(r"^(?i:con|prn|aux|nul|com[0-9]|lpt[0-9])(\..*)?$").unwrap();
    static ref WINDOWS_TRAILING_RE: Regex = Regex::new(r"[. ]+$").unwrap();
    static ref ASCII_FALLBACK_RE: Regex = Regex::new(r"[^A-Za-z0-9_.\-]").unwrap();
}

/// Makes `raw` safe to use as a file name on any common filesystem.
pub fn sanitize_name(raw: &str, replacement: &str) -> String {
    let name = ILLEGAL_RE.replace_all(raw, replacement);
    let name = CONTROL_RE.replace_all(&name, replacement);
    let name = RESERVED_RE.replace_all(&name, replacement);
    let name = WINDOWS_TRAILING_RE.replace_all(&name, "");

    let mut name = name.into_owned();
    if name.is_empty() {
        name = replacement.to_string();
    }
    if WINDOWS_RESERVED_RE.is_match(&name) {
        name = format!("{}{}", replacement, name);
    }

    if name.chars().count() > MAX_NAME_LEN {
        name = name.chars().take(MAX_NAME_LEN).collect();
    }
    name
}

/// Stricter ASCII-only variant used for the quoted `filename=` parameter.
pub fn ascii_fallback(raw: &str) -> String {
    ASCII_FALLBACK_RE.replace_all(raw, REPLACEMENT).into_owned()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispositionKind {
    Inline,
    Attachment,
}

impl DispositionKind {
    fn as_str(self) -> &'static str {
        match self {
            DispositionKind::Inline => "inline",
            DispositionKind::Attachment => "attachment",
        }
    }
}

/// Builds a `Content-Disposition` value carrying both an ASCII fallback and
/// the RFC 5987 `filename*` form of `name`.
pub fn content_disposition(kind: DispositionKind, name: &str) -> String {
    let encoded = urlencoding::encode(&sanitize_name(name, REPLACEMENT)).into_owned();
    format!(
        "{}; filename=\"{}\"; filename*=UTF-8''{}",
        kind.as_str(),
        ascii_fallback(name),
        encoded
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reserved_device_names_are_prefixed() {
        assert_eq!(sanitize_name("CON.txt", REPLACEMENT), "_CON.txt");
        assert_eq!(sanitize_name("lpt1", REPLACEMENT), "_lpt1");
        assert_eq!(sanitize_name("console.txt", REPLACEMENT), "console.txt");
    }

    #[test]
    fn test_control_characters_are_removed() {
        let cleaned = sanitize_name("bad\u{0007}name\u{0085}.txt", REPLACEMENT);
        assert!(!cleaned.chars().any(|c| c.is_control()));
        assert_eq!(cleaned, "bad_name_.txt");
    }

    #[test]
    fn test_illegal_characters_and_dots() {
        assert_eq!(sanitize_name("a/b\\c:d*e?f\"g<h>i|j", REPLACEMENT), "a_b_c_d_e_f_g_h_i_j");
        assert_eq!(sanitize_name("..", REPLACEMENT), "_");
        assert_eq!(sanitize_name("report. . ", REPLACEMENT), "report");
        assert_eq!(sanitize_name("   ", REPLACEMENT), "_");
    }

    #[test]
    fn test_long_names_are_truncated() {
        let long = "a".repeat(300);
        assert_eq!(sanitize_name(&long, REPLACEMENT).chars().count(), 255);

        let wide = "文".repeat(300);
        assert_eq!(sanitize_name(&wide, REPLACEMENT).chars().count(), 255);
    }

    #[test]
    fn test_unicode_is_preserved() {
        assert_eq!(sanitize_name("报告 2024.pdf", REPLACEMENT), "报告 2024.pdf");
    }

    #[test]
    fn test_content_disposition_dual_encoding() {
        let header = content_disposition(DispositionKind::Attachment, "报告 final.pdf");
        assert_eq!(
            header,
            "attachment; filename=\"___final.pdf\"; filename*=UTF-8''%E6%8A%A5%E5%91%8A%20final.pdf"
        );

        let inline = content_disposition(DispositionKind::Inline, "photo.jpg");
        assert_eq!(inline, "inline; filename=\"photo.jpg\"; filename*=UTF-8''photo.jpg");
    }
}
