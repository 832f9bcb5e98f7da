use std::sync::LazyLock;

use regex::Regex;

use crate::config::TargetPhoneRule;

/// Extensions accepted for the contact list upload (compared lowercase).
pub const CONTACT_FILE_EXTENSIONS: [&str; 2] = ["vcf", "csv"];

const TARGET_PHONE_DIGITS: usize = 11;

static INTERNATIONAL_PHONE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\+?[0-9][0-9\s\-().]{8,20}$").expect("phone pattern is valid")
});

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactFileCheck {
    Accepted { extension: String },
    Rejected { extension: Option<String> },
}

/// Extension after the last dot, lowercased. `None` without a dot.
pub fn file_extension(file_name: &str) -> Option<String> {
    let (_, ext) = file_name.rsplit_once('.')?;
    (!ext.is_empty()).then(|| ext.to_lowercase())
}

pub fn check_contact_file(file_name: Option<&str>) -> ContactFileCheck {
    let extension = file_name.and_then(file_extension);
    match extension {
        Some(ext) if CONTACT_FILE_EXTENSIONS.contains(&ext.as_str()) => {
            ContactFileCheck::Accepted { extension: ext }
        }
        other => ContactFileCheck::Rejected { extension: other },
    }
}

pub fn digits_only(text: &str) -> String {
    text.chars().filter(|c| c.is_ascii_digit()).collect()
}

/// Normalize a target phone number.
///
/// `Ok` carries the stored form, `Err` the number of digits observed.
pub fn normalize_target_phone(text: &str, rule: TargetPhoneRule) -> Result<String, usize> {
    let digits = digits_only(text);
    match rule {
        TargetPhoneRule::ElevenDigits => {
            if digits.len() == TARGET_PHONE_DIGITS {
                Ok(digits)
            } else {
                Err(digits.len())
            }
        }
        TargetPhoneRule::International => {
            let trimmed = text.trim();
            if INTERNATIONAL_PHONE.is_match(trimmed) && (10..=15).contains(&digits.len()) {
                if trimmed.starts_with('+') {
                    Ok(format!("+{}", digits))
                } else {
                    Ok(digits)
                }
            } else {
                Err(digits.len())
            }
        }
    }
}

/// Trimmed free-text request, `None` when blank.
pub fn normalize_request(text: &str) -> Option<&str> {
    let trimmed = text.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}
