//! Pure parsers that turn one line of donor text into structured values.
//!
//! Nothing here holds state. Every flow step runs [`is_cancel`] first and only
//! then one of the value parsers below.

use std::str::FromStr;

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

const CANCEL_WORDS: &[&str] =
    &["batal", "batalkan", "cancel", "stop", "berhenti", "keluar", "exit", "quit", "reset"];

const NEGATIVE_WORDS: &[&str] = &[
    "gak jadi",
    "ga jadi",
    "nggak jadi",
    "tidak jadi",
    "ndak jadi",
    "tidak",
    "tdk",
    "gak",
    "ga",
    "gk",
    "nggak",
    "ngga",
    "enggak",
    "engga",
    "ndak",
    "no",
    "nope",
    "jangan",
    "bukan",
    "belum",
    "nanti saja",
    "nanti aja",
    "skip",
];

/// "No problem" forms that start with a negative word but mean yes.
const AFFIRMATIVE_IDIOMS: &[&str] = &[
    "ga apa",
    "gak apa",
    "nggak apa",
    "ngga apa",
    "tidak apa",
    "tdk apa",
    "ndak apa",
    "gapapa",
    "gpp",
    "ga masalah",
    "gak masalah",
    "nggak masalah",
    "tidak masalah",
    "no problem",
];

const AFFIRMATIVE_WORDS: &[&str] = &[
    "ya",
    "iya",
    "iyaa",
    "iyaaa",
    "yaa",
    "y",
    "yes",
    "yup",
    "yoi",
    "ok",
    "oke",
    "okay",
    "okey",
    "okeh",
    "sip",
    "siap",
    "mantap",
    "gas",
    "gass",
    "lanjut",
    "lanjutkan",
    "setuju",
    "boleh",
    "betul",
    "benar",
    "bener",
    "baik",
    "jadi",
    "yakin",
    "tentu",
    "konfirmasi",
    "confirm",
    "bismillah",
];

const NUMBER_WORDS: &[(&str, u32)] = &[
    ("satu", 1),
    ("dua", 2),
    ("tiga", 3),
    ("empat", 4),
    ("lima", 5),
    ("enam", 6),
    ("tujuh", 7),
    ("delapan", 8),
    ("sembilan", 9),
    ("sepuluh", 10),
];

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Confirmation {
    Yes,
    No,
    Unrecognized,
}

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum AmountParseError {
    #[error("amount is empty")]
    Empty,
    #[error("amount `{0}` is not numeric")]
    NotNumeric(String),
    #[error("amount must be greater than zero")]
    NotPositive,
    #[error("amount is out of range")]
    OutOfRange,
}

/// Parses a rupiah amount written the way donors type it.
///
/// Accepts an optional `Rp` prefix, spaces, Indonesian thousands dots, a comma
/// decimal separator and the `jt`/`juta`/`j`/`m` and `rb`/`ribu`/`r`
/// multipliers. A single dot followed by exactly three digits is a thousands
/// separator; any other single dot is a decimal point.
pub fn parse_amount(input: &str) -> Result<i64, AmountParseError> {
    let mut text: String =
        input.trim().to_lowercase().chars().filter(|ch| !ch.is_whitespace()).collect();
    if let Some(rest) = text.strip_prefix("rp") {
        text = rest.trim_start_matches('.').to_string();
    }
    if text.is_empty() {
        return Err(AmountParseError::Empty);
    }

    let (number, multiplier) = split_multiplier(&text);
    let normalized = normalize_separators(number)
        .ok_or_else(|| AmountParseError::NotNumeric(input.trim().to_string()))?;
    let value = Decimal::from_str(&normalized)
        .map_err(|_| AmountParseError::NotNumeric(input.trim().to_string()))?;

    let scaled = value.checked_mul(Decimal::from(multiplier)).ok_or(AmountParseError::OutOfRange)?;
    let rounded = scaled.round_dp_with_strategy(0, RoundingStrategy::MidpointAwayFromZero);
    let amount = rounded.to_i64().ok_or(AmountParseError::OutOfRange)?;
    if amount <= 0 {
        return Err(AmountParseError::NotPositive);
    }
    Ok(amount)
}

fn split_multiplier(text: &str) -> (&str, i64) {
    const SUFFIXES: &[(&str, i64)] = &[
        ("juta", 1_000_000),
        ("ribu", 1_000),
        ("jt", 1_000_000),
        ("rb", 1_000),
        ("j", 1_000_000),
        ("m", 1_000_000),
        ("r", 1_000),
    ];

    for (suffix, multiplier) in SUFFIXES {
        if let Some(number) = text.strip_suffix(suffix) {
            return (number, *multiplier);
        }
    }
    (text, 1)
}

fn normalize_separators(number: &str) -> Option<String> {
    if number.is_empty() || !number.chars().all(|ch| ch.is_ascii_digit() || ch == '.' || ch == ',')
    {
        return None;
    }

    let commas = number.matches(',').count();
    let dots = number.matches('.').count();

    let normalized = if commas == 1 {
        number.replace('.', "").replace(',', ".")
    } else if commas > 1 {
        if dots > 0 {
            return None;
        }
        number.replace(',', "")
    } else if dots == 1 {
        let (_, fraction) = number.split_once('.')?;
        if fraction.len() == 3 {
            number.replace('.', "")
        } else {
            number.to_string()
        }
    } else {
        number.replace('.', "")
    };

    let valid = !normalized.is_empty()
        && !normalized.starts_with('.')
        && !normalized.ends_with('.')
        && normalized.chars().any(|ch| ch.is_ascii_digit());
    valid.then_some(normalized)
}

pub fn classify_confirmation(input: &str) -> Confirmation {
    let text = input.trim().to_lowercase();
    if matches_any(&text, AFFIRMATIVE_IDIOMS) {
        return Confirmation::Yes;
    }
    if matches_any(&text, NEGATIVE_WORDS) {
        return Confirmation::No;
    }
    if matches_any(&text, AFFIRMATIVE_WORDS) {
        return Confirmation::Yes;
    }
    Confirmation::Unrecognized
}

pub fn is_cancel(input: &str) -> bool {
    let text = input.trim().to_lowercase();
    matches_any(&text, CANCEL_WORDS)
}

/// Control words cannot double as data values such as an on-behalf-of name.
pub fn is_reserved_word(input: &str) -> bool {
    is_cancel(input) || classify_confirmation(input) != Confirmation::Unrecognized
}

/// Maps a 1-based menu number onto a 0-based index into a list of `len` items.
pub fn select_index(input: &str, len: usize) -> Option<usize> {
    let text = input.trim().to_lowercase();
    let text = ["nomor", "no.", "no", "pilih", "#"]
        .iter()
        .find_map(|prefix| text.strip_prefix(prefix))
        .unwrap_or(&text)
        .trim()
        .trim_end_matches(['.', ')'])
        .to_string();

    let number = text.parse::<usize>().ok()?;
    (1..=len).contains(&number).then(|| number - 1)
}

/// Parses a small positive count ("3", "3 orang", "tiga") within `min..=max`.
pub fn parse_count(input: &str, min: u32, max: u32) -> Option<u32> {
    let text = input.trim().to_lowercase();
    let first = text.split_whitespace().next()?;

    let value = match first.parse::<u32>() {
        Ok(value) => value,
        Err(_) => NUMBER_WORDS.iter().find(|(word, _)| *word == first).map(|(_, value)| *value)?,
    };
    (min..=max).contains(&value).then_some(value)
}

/// Normalizes chat ids and local phone formats to `62…` digits.
pub fn normalize_phone(raw: &str) -> Option<String> {
    let local = raw.split('@').next().unwrap_or(raw);
    let digits: String = local.chars().filter(char::is_ascii_digit).collect();

    let normalized = if let Some(rest) = digits.strip_prefix('0') {
        format!("62{rest}")
    } else if digits.starts_with('8') {
        format!("62{digits}")
    } else {
        digits
    };

    (8..=15).contains(&normalized.len()).then_some(normalized)
}

fn matches_any(text: &str, words: &[&str]) -> bool {
    words.iter().any(|word| matches_token(text, word))
}

fn matches_token(text: &str, word: &str) -> bool {
    match text.strip_prefix(word) {
        Some("") => true,
        Some(rest) => rest.chars().next().is_some_and(|ch| !ch.is_alphanumeric()),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::{
        classify_confirmation, is_cancel, is_reserved_word, normalize_phone, parse_amount,
        parse_count, select_index, AmountParseError, Confirmation,
    };

    #[test]
    fn amount_parser_understands_multiplier_suffixes() {
        assert_eq!(parse_amount("1jt"), Ok(1_000_000));
        assert_eq!(parse_amount("500rb"), Ok(500_000));
        assert_eq!(parse_amount("2,5 juta"), Ok(2_500_000));
        assert_eq!(parse_amount("1.5jt"), Ok(1_500_000));
        assert_eq!(parse_amount("50 ribu"), Ok(50_000));
        assert_eq!(parse_amount("3m"), Ok(3_000_000));
        assert_eq!(parse_amount("25r"), Ok(25_000));
    }

    #[test]
    fn amount_parser_treats_dots_as_thousands_separators() {
        assert_eq!(parse_amount("1.500.000"), Ok(1_500_000));
        assert_eq!(parse_amount("Rp 150.000"), Ok(150_000));
        assert_eq!(parse_amount("Rp. 45.000"), Ok(45_000));
        assert_eq!(parse_amount("rp10000"), Ok(10_000));
    }

    #[test]
    fn single_dot_without_three_digits_is_a_decimal_point() {
        assert_eq!(parse_amount("1.5"), Ok(2));
        assert_eq!(parse_amount("10.25"), Ok(10));
        assert_eq!(parse_amount("12.500,50"), Ok(12_501));
    }

    #[test]
    fn amount_parser_rejects_garbage_zero_and_negative_values() {
        assert!(matches!(parse_amount("abc"), Err(AmountParseError::NotNumeric(_))));
        assert_eq!(parse_amount("0"), Err(AmountParseError::NotPositive));
        assert!(parse_amount("-5000").is_err());
        assert_eq!(parse_amount("   "), Err(AmountParseError::Empty));
        assert!(parse_amount("inf").is_err());
        assert!(parse_amount("NaN").is_err());
        assert!(parse_amount("jt").is_err());
        assert!(parse_amount("99999999999999999999999jt").is_err());
    }

    #[test]
    fn confirmation_matcher_covers_casual_forms() {
        assert_eq!(classify_confirmation("iya"), Confirmation::Yes);
        assert_eq!(classify_confirmation("  Oke deh "), Confirmation::Yes);
        assert_eq!(classify_confirmation("ya, lanjut"), Confirmation::Yes);
        assert_eq!(classify_confirmation("gak jadi"), Confirmation::No);
        assert_eq!(classify_confirmation("Tidak"), Confirmation::No);
        assert_eq!(classify_confirmation("terserah"), Confirmation::Unrecognized);
    }

    #[test]
    fn no_problem_idioms_read_as_yes() {
        assert_eq!(classify_confirmation("ga apa apa, lanjut"), Confirmation::Yes);
        assert_eq!(classify_confirmation("Gak apa-apa"), Confirmation::Yes);
        assert_eq!(classify_confirmation("tidak masalah"), Confirmation::Yes);
        assert_eq!(classify_confirmation("gpp"), Confirmation::Yes);
        assert_eq!(classify_confirmation("ga"), Confirmation::No);
        assert_eq!(classify_confirmation("ga mau"), Confirmation::No);
        assert_eq!(classify_confirmation("gapura"), Confirmation::Unrecognized);
    }

    #[test]
    fn confirmation_tokens_respect_word_boundaries() {
        assert_eq!(classify_confirmation("yaitu"), Confirmation::Unrecognized);
        assert_eq!(classify_confirmation("gajah"), Confirmation::Unrecognized);
        assert_eq!(classify_confirmation("nomor 2"), Confirmation::Unrecognized);
    }

    #[test]
    fn cancel_words_are_recognized_with_trailing_text() {
        assert!(is_cancel("batal"));
        assert!(is_cancel("BATAL aja"));
        assert!(is_cancel("cancel"));
        assert!(!is_cancel("batalyon"));
        assert!(!is_cancel("ya"));
    }

    #[test]
    fn reserved_words_cover_cancel_and_confirmation() {
        assert!(is_reserved_word("batal"));
        assert!(is_reserved_word("ya"));
        assert!(is_reserved_word("tidak"));
        assert!(!is_reserved_word("Ahmad"));
    }

    #[test]
    fn list_selection_maps_one_based_numbers() {
        assert_eq!(select_index("1", 3), Some(0));
        assert_eq!(select_index(" 3. ", 3), Some(2));
        assert_eq!(select_index("nomor 2", 3), Some(1));
        assert_eq!(select_index("0", 3), None);
        assert_eq!(select_index("4", 3), None);
        assert_eq!(select_index("dua", 3), None);
    }

    #[test]
    fn counts_accept_digits_and_number_words() {
        assert_eq!(parse_count("3", 1, 10), Some(3));
        assert_eq!(parse_count("3 orang", 1, 10), Some(3));
        assert_eq!(parse_count("tiga", 1, 10), Some(3));
        assert_eq!(parse_count("Sepuluh", 1, 10), Some(10));
        assert_eq!(parse_count("11", 1, 10), None);
        assert_eq!(parse_count("0", 1, 10), None);
        assert_eq!(parse_count("banyak", 1, 10), None);
    }

    #[test]
    fn phone_numbers_normalize_to_country_prefix() {
        assert_eq!(normalize_phone("6281234567890@c.us").as_deref(), Some("6281234567890"));
        assert_eq!(normalize_phone("+62 812-3456-7890").as_deref(), Some("6281234567890"));
        assert_eq!(normalize_phone("081234567890").as_deref(), Some("6281234567890"));
        assert_eq!(normalize_phone("81234567890").as_deref(), Some("6281234567890"));
        assert_eq!(normalize_phone("123"), None);
    }
}
