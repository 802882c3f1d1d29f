use chrono::NaiveDate;
use lazy_static::lazy_static;
use rand::{thread_rng, Rng};
use regex::Regex;

pub const MAX_FIELD_CHARS: usize = 100;
pub const CODE_SUFFIX_LEN: usize = 6;
const CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";

lazy_static! {
    static ref ISO_DATE: Regex = Regex::new(r"^\d{4}-\d{2}-\d{2}$").expect("valid date regex");
}

/// Keeps only digits and `+`.
pub fn strip_phone(raw: &str) -> String {
    raw.chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect()
}

/// Canonical domestic form: `+359888123456` becomes `0888123456`.
pub fn normalize_phone(raw: &str, country_code: &str) -> String {
    let stripped = strip_phone(raw);
    let international = format!("+{}", country_code);

    match stripped.strip_prefix(&international) {
        Some(rest) if !country_code.is_empty() => format!("0{}", rest),
        _ => stripped,
    }
}

pub fn sanitize_name(raw: &str) -> String {
    let cleaned: String = raw.chars().filter(|c| *c != '<' && *c != '>').collect();
    cleaned.trim().chars().take(MAX_FIELD_CHARS).collect()
}

/// Blank input means "no email".
pub fn sanitize_email(raw: Option<&str>) -> Option<String> {
    raw.map(str::trim)
        .filter(|e| !e.is_empty())
        .map(|e| e.to_lowercase().chars().take(MAX_FIELD_CHARS).collect())
}

pub fn parse_iso_date(raw: &str) -> Option<NaiveDate> {
    if !ISO_DATE.is_match(raw) {
        return None;
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").ok()
}

pub fn generate_confirmation_code(prefix: &str) -> String {
    let mut rng = thread_rng();
    let suffix: String = (0..CODE_SUFFIX_LEN)
        .map(|_| CODE_ALPHABET[rng.gen_range(0..CODE_ALPHABET.len())] as char)
        .collect();

    format!("{}-{}", prefix, suffix)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_international_phone() {
        assert_eq!(normalize_phone("+359888123456", "359"), "0888123456");
        assert_eq!(normalize_phone("+359 888 123 456", "359"), "0888123456");
        assert_eq!(normalize_phone("0888-123-456", "359"), "0888123456");
    }

    #[test]
    fn test_normalize_keeps_foreign_numbers() {
        assert_eq!(normalize_phone("+44 7700 900123", "359"), "+447700900123");
    }

    #[test]
    fn test_sanitize_name_strips_angle_brackets_and_truncates() {
        assert_eq!(sanitize_name("  <b>Georgi</b> "), "bGeorgi/b");

        let long = "я".repeat(150);
        assert_eq!(sanitize_name(&long).chars().count(), MAX_FIELD_CHARS);
    }

    #[test]
    fn test_sanitize_email() {
        assert_eq!(
            sanitize_email(Some("  Georgi@Mail.BG ")),
            Some("georgi@mail.bg".to_string())
        );
        assert_eq!(sanitize_email(Some("   ")), None);
        assert_eq!(sanitize_email(None), None);
    }

    #[test]
    fn test_parse_iso_date() {
        assert_eq!(
            parse_iso_date("2024-06-01"),
            NaiveDate::from_ymd_opt(2024, 6, 1)
        );
        assert_eq!(parse_iso_date("2024-6-1"), None);
        assert_eq!(parse_iso_date("2024-02-30"), None);
        assert_eq!(parse_iso_date("01.06.2024"), None);
    }

    #[test]
    fn test_confirmation_code_shape() {
        let code = generate_confirmation_code("EB");
        assert_eq!(code.len(), 9);
        assert!(code.starts_with("EB-"));
        assert!(code[3..]
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }
}
