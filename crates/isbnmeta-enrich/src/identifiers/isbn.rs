use rand::Rng;
use rand::seq::{IndexedRandom, SliceRandom};
use serde::{Deserialize, Serialize};

use crate::error::{EnrichError, Result};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Isbn {
    pub raw: String,
    pub isbn13: String,
    pub isbn10: Option<String>,
    pub formatted: String,
}

fn strip_isbn(input: &str) -> String {
    input.chars().filter(|c| c.is_ascii_alphanumeric()).collect::<String>().to_uppercase()
}

fn check_isbn10(digits: &[u8]) -> bool {
    // digits[9] may be 10 (X)
    let sum: u32 = digits.iter().enumerate().map(|(i, &d)| (10 - i as u32) * d as u32).sum();
    sum % 11 == 0
}

fn isbn13_weighted_sum(digits: &[u8]) -> u32 {
    digits
        .iter()
        .enumerate()
        .map(|(i, &d)| if i % 2 == 0 { d as u32 } else { d as u32 * 3 })
        .sum()
}

fn check_isbn13(digits: &[u8]) -> bool {
    isbn13_weighted_sum(digits) % 10 == 0
}

/// ISBN-13 check digit for the first twelve digits of `partial`.
///
/// Returns `None` unless `partial` is exactly twelve ASCII digits.
pub fn isbn13_check_digit(partial: &str) -> Option<char> {
    if partial.len() != 12 || !partial.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits = partial.bytes().map(|b| b - b'0').collect::<Vec<_>>();
    let check = (10 - isbn13_weighted_sum(&digits) % 10) % 10;
    char::from_digit(check, 10)
}

fn isbn10_to_isbn13(digits10: &[u8]) -> String {
    let mut d13: Vec<u8> = vec![9, 7, 8];
    d13.extend_from_slice(&digits10[..9]);
    let check = (10 - isbn13_weighted_sum(&d13) % 10) % 10;
    d13.push(check as u8);
    d13.iter().map(|d| d.to_string()).collect()
}

fn format_isbn13(s: &str) -> String {
    // 978-X-XXXX-XXXX-X grouping; real group boundaries need the range table
    if s.len() == 13 {
        format!("{}-{}-{}-{}-{}", &s[0..3], &s[3..4], &s[4..8], &s[8..12], &s[12..13])
    } else {
        s.to_string()
    }
}

/// Lookup key form of an ISBN cell: hyphens and whitespace removed.
pub fn normalize_key(input: &str) -> String {
    input.chars().filter(|c| !c.is_whitespace() && *c != '-').collect()
}

/// Thirteen ASCII digits starting with `978` or `979`. The check digit is not verified.
pub fn is_isbn13_shaped(key: &str) -> bool {
    key.len() == 13
        && key.bytes().all(|b| b.is_ascii_digit())
        && (key.starts_with("978") || key.starts_with("979"))
}

impl Isbn {
    pub fn parse(input: &str) -> Result<Self> {
        let stripped = strip_isbn(input);

        if stripped.len() == 13 {
            if !stripped.bytes().all(|b| b.is_ascii_digit()) {
                return Err(EnrichError::InvalidIsbn(input.to_string()));
            }
            let digits: Vec<u8> = stripped.bytes().map(|b| b - b'0').collect();
            if !check_isbn13(&digits) {
                return Err(EnrichError::InvalidIsbn(input.to_string()));
            }
            let isbn13 = stripped.clone();
            // isbn10 only for 978 prefix
            let isbn10 = if stripped.starts_with("978") {
                let d9 = &digits[3..12];
                let sum: u32 = d9.iter().enumerate().map(|(i, &d)| (10 - i as u32) * d as u32).sum();
                let check = (11 - sum % 11) % 11;
                let check_char = if check == 10 { 'X' } else { (b'0' + check as u8) as char };
                let mut s: String = d9.iter().map(|d| d.to_string()).collect();
                s.push(check_char);
                Some(s)
            } else {
                None
            };
            let formatted = format_isbn13(&isbn13);
            return Ok(Self { raw: input.to_string(), isbn13, isbn10, formatted });
        }

        if stripped.len() == 10 {
            // Parse as ISBN-10; last char may be X
            let mut digits: Vec<u8> = Vec::with_capacity(10);
            for (i, c) in stripped.chars().enumerate() {
                if i == 9 && c == 'X' {
                    digits.push(10);
                } else if c.is_ascii_digit() {
                    digits.push(c as u8 - b'0');
                } else {
                    return Err(EnrichError::InvalidIsbn(input.to_string()));
                }
            }
            if !check_isbn10(&digits) {
                return Err(EnrichError::InvalidIsbn(input.to_string()));
            }
            let isbn10: String = stripped.clone();
            let isbn13 = isbn10_to_isbn13(&digits);
            let formatted = format_isbn13(&isbn13);
            return Ok(Self { raw: input.to_string(), isbn13, isbn10: Some(isbn10), formatted });
        }

        Err(EnrichError::InvalidIsbn(input.to_string()))
    }
}

// ─── Test-value generation ────────────────────────────────────────────────────

const GROUPS_979: [&str; 4] = ["8", "10", "11", "12"];

fn groups_978() -> Vec<String> {
    (0..6)
        .chain(600..626)
        .chain([65, 7])
        .chain(80..95)
        .chain(950..990)
        .chain(9917..9990)
        .chain(99901..99984)
        .map(|g| g.to_string())
        .collect()
}

fn random_digits<R: Rng + ?Sized>(rng: &mut R, len: usize) -> String {
    (0..len).map(|_| char::from(b'0' + rng.random_range(0..10u8))).collect()
}

/// A random, checksum-valid ISBN-13 within an assigned registration group.
///
/// Valid by construction, but not necessarily assigned to a title.
pub fn generate_isbn13<R: Rng + ?Sized>(rng: &mut R) -> String {
    let prefix = if rng.random_bool(0.5) { "978" } else { "979" };
    let group = if prefix == "978" {
        let groups = groups_978();
        groups.choose(rng).cloned().unwrap_or_else(|| "0".to_string())
    } else {
        GROUPS_979.choose(rng).copied().unwrap_or("10").to_string()
    };

    let publisher_len = rng.random_range(2..9 - group.len());
    let title_len = 9 - (group.len() + publisher_len);
    let partial = format!(
        "{prefix}{group}{}{}",
        random_digits(rng, publisher_len),
        random_digits(rng, title_len)
    );

    match isbn13_check_digit(&partial) {
        Some(check) => format!("{partial}{check}"),
        None => partial,
    }
}

/// A thirteen-character key that looks like an ISBN but contains a letter `O`.
pub fn generate_bogus<R: Rng + ?Sized>(rng: &mut R) -> String {
    let prefix = if rng.random_bool(0.5) { "978" } else { "979" };
    let mut infix = ['4', '3', '7', '7', '6', '1', '5', '6', 'O'];
    infix.shuffle(rng);
    let suffix = char::from(b'0' + rng.random_range(0..10u8));
    format!("{prefix}{}{suffix}", infix.iter().collect::<String>())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn valid_isbn13() {
        let isbn = Isbn::parse("9780306406157").unwrap();
        assert_eq!(isbn.isbn13, "9780306406157");
        assert_eq!(isbn.isbn10.as_deref(), Some("0306406152"));
    }

    #[test]
    fn isbn13_with_hyphens() {
        let isbn = Isbn::parse("978-0-306-40615-7").unwrap();
        assert_eq!(isbn.isbn13, "9780306406157");
        assert_eq!(isbn.formatted, "978-0-3064-0615-7");
    }

    #[test]
    fn valid_isbn10() {
        let isbn = Isbn::parse("0306406152").unwrap();
        assert_eq!(isbn.isbn10, Some("0306406152".to_string()));
        assert_eq!(isbn.isbn13, "9780306406157");
    }

    #[test]
    fn isbn10_with_x_check() {
        let isbn = Isbn::parse("007462542X").unwrap();
        assert_eq!(isbn.isbn10, Some("007462542X".to_string()));
    }

    #[test]
    fn invalid_check_digit() {
        assert!(Isbn::parse("9780306406158").is_err());
    }

    #[test]
    fn isbn13_979_no_isbn10() {
        let isbn = Isbn::parse("9791032305690").unwrap();
        assert_eq!(isbn.isbn10, None);
    }

    #[test]
    fn check_digit_matches_known_isbns() {
        assert_eq!(isbn13_check_digit("978030640615"), Some('7'));
        assert_eq!(isbn13_check_digit("978071124681"), Some('2'));
        assert_eq!(isbn13_check_digit("97803064061"), None);
        assert_eq!(isbn13_check_digit("97803064061O"), None);
    }

    #[test]
    fn shape_check_ignores_checksum() {
        assert!(is_isbn13_shaped("9780306406158"));
        assert!(!is_isbn13_shaped("9770306406157"));
        assert!(!is_isbn13_shaped("978030640615"));
        assert!(!is_isbn13_shaped("97843776156O1"));
        assert_eq!(normalize_key(" 978-0-306-40615-7 "), "9780306406157");
    }

    #[test]
    fn generated_isbns_are_valid() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..200 {
            let isbn = generate_isbn13(&mut rng);
            assert_eq!(isbn.len(), 13, "{isbn}");
            assert!(is_isbn13_shaped(&isbn), "{isbn}");
            assert!(Isbn::parse(&isbn).is_ok(), "{isbn}");
        }
    }

    #[test]
    fn bogus_isbns_look_real_but_fail() {
        let mut rng = StdRng::seed_from_u64(11);
        for _ in 0..50 {
            let bogus = generate_bogus(&mut rng);
            assert_eq!(bogus.len(), 13);
            assert!(bogus.starts_with("978") || bogus.starts_with("979"));
            assert!(bogus.contains('O'));
            assert!(!is_isbn13_shaped(&bogus));
            assert!(Isbn::parse(&bogus).is_err());
        }
    }
}
