//! Input validation
//!
//! Field length limits, email/phone format checks, WhatsApp normalization
//! and enum parsing. Every function rejects with `AppError::Validation`.

use lazy_static::lazy_static;
use regex_lite::Regex;

use crate::data::{CandidateStatus, QuranLevel};
use crate::error::AppError;

/// Maximum character count per wire field name
pub const MAX_LENGTHS: &[(&str, usize)] = &[
    ("fullName", 120),
    ("city", 60),
    ("country", 60),
    ("email", 120),
    ("phone", 30),
    ("whatsapp", 20),
    ("quranLevel", 20),
    ("motivation", 800),
    ("status", 20),
    ("judgeName", 80),
    ("notes", 800),
    ("contactName", 120),
    ("contactEmail", 120),
    ("contactSubject", 140),
    ("contactMessage", 1200),
    ("voterName", 120),
    ("voterContact", 120),
];

const MAX_EMAIL_LENGTH: usize = 120;
const PHONE_DIGITS_MIN: usize = 8;
const PHONE_DIGITS_MAX: usize = 20;

lazy_static! {
    static ref EMAIL_RE: Regex =
        Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").expect("valid regex");
    static ref WHATSAPP_RE: Regex = Regex::new(r"^\+?[1-9]\d{6,14}$").expect("valid regex");
}

pub fn max_length(field: &str) -> Option<usize> {
    MAX_LENGTHS
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, max)| *max)
}

/// Reject `value` if it exceeds the limit registered for `field`
pub fn check_length(field: &str, value: &str) -> Result<(), AppError> {
    match max_length(field) {
        Some(max) if value.chars().count() > max => Err(AppError::validation(format!(
            "{} exceeds {} characters",
            field, max
        ))),
        _ => Ok(()),
    }
}

/// Check several `(field, value)` pairs; absent values are skipped
pub fn check_lengths<'a>(
    fields: impl IntoIterator<Item = (&'a str, Option<&'a str>)>,
) -> Result<(), AppError> {
    for (field, value) in fields {
        if let Some(value) = value {
            check_length(field, value)?;
        }
    }
    Ok(())
}

pub fn is_valid_email(email: &str) -> bool {
    email.chars().count() <= MAX_EMAIL_LENGTH && EMAIL_RE.is_match(email)
}

pub fn validate_email(email: &str) -> Result<(), AppError> {
    if is_valid_email(email) {
        Ok(())
    } else {
        Err(AppError::validation("Invalid email address"))
    }
}

pub fn is_valid_phone(phone: &str) -> bool {
    let digits = phone.chars().filter(char::is_ascii_digit).count();
    (PHONE_DIGITS_MIN..=PHONE_DIGITS_MAX).contains(&digits)
}

pub fn validate_phone(phone: &str) -> Result<(), AppError> {
    if is_valid_phone(phone) {
        Ok(())
    } else {
        Err(AppError::validation("Invalid phone number"))
    }
}

/// Normalize a WhatsApp number to `+<digits>`.
///
/// Keeps digits and `+`, turns a leading `00` into `+`, then requires
/// an optional `+` followed by 7 to 15 digits not starting with 0.
/// Returns `None` when the input cannot be normalized.
pub fn normalize_whatsapp(value: &str) -> Option<String> {
    let kept: String = value
        .trim()
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '+')
        .collect();

    let raw = match kept.strip_prefix("00") {
        Some(rest) => format!("+{}", rest),
        None => kept,
    };

    if !WHATSAPP_RE.is_match(&raw) {
        return None;
    }

    if raw.starts_with('+') {
        Some(raw)
    } else {
        Some(format!("+{}", raw))
    }
}

pub fn require_whatsapp(value: &str) -> Result<String, AppError> {
    normalize_whatsapp(value).ok_or_else(|| AppError::validation("Invalid WhatsApp number"))
}

pub fn parse_quran_level(value: &str) -> Result<QuranLevel, AppError> {
    QuranLevel::parse(value).ok_or_else(|| AppError::validation("Invalid Quran level"))
}

pub fn parse_status(value: &str) -> Result<CandidateStatus, AppError> {
    CandidateStatus::parse(value).ok_or_else(|| AppError::validation("Invalid status"))
}

/// Trim and drop empty strings
pub fn clean(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
