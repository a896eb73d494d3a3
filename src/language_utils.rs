//! Language utilities for site locale handling
//!
//! Site languages are configured with CMS locale codes such as `de`, `de-DE`
//! or `pt_BR`. Translation providers expect their own upper-case codes, with
//! a region only where the provider distinguishes variants.

use anyhow::{Result, anyhow};
use isolang::Language;

/// Split a locale into its lower-case base code and optional upper-case region
pub fn split_locale(code: &str) -> (String, Option<String>) {
    let normalized = code.trim().replace('_', "-");
    let mut parts = normalized.splitn(2, '-');
    let base = parts.next().unwrap_or_default().to_lowercase();
    let region = parts
        .next()
        .filter(|r| !r.is_empty())
        .map(|r| r.to_uppercase());
    (base, region)
}

/// Validate that the base of a locale is an ISO 639-1 code
pub fn validate_language_code(code: &str) -> Result<()> {
    let (base, _) = split_locale(code);

    if base.len() == 2 && Language::from_639_1(&base).is_some() {
        return Ok(());
    }

    Err(anyhow!("Invalid language code: {}", code))
}

/// Provider code for a source language (base language only, e.g. `DE`)
pub fn to_source_code(code: &str) -> Result<String> {
    validate_language_code(code)?;
    let (base, _) = split_locale(code);
    Ok(base.to_uppercase())
}

/// Provider code for a target language
///
/// English and Portuguese have no plain target variant, so a locale without
/// region falls back to `EN-GB` and `PT-PT`. Chinese only accepts the base.
pub fn to_target_code(code: &str) -> Result<String> {
    validate_language_code(code)?;
    let (base, region) = split_locale(code);

    let target = match (base.as_str(), region) {
        ("en", Some(region)) if region == "US" || region == "GB" => format!("EN-{}", region),
        ("en", _) => "EN-GB".to_string(),
        ("pt", Some(region)) if region == "BR" => "PT-BR".to_string(),
        ("pt", _) => "PT-PT".to_string(),
        (base, _) => base.to_uppercase(),
    };

    Ok(target)
}

/// Get the English language name for a locale
pub fn get_language_name(code: &str) -> Result<String> {
    let (base, _) = split_locale(code);
    Language::from_639_1(&base)
        .map(|lang| lang.to_name().to_string())
        .ok_or_else(|| anyhow!("Invalid language code: {}", code))
}

/// Check whether two locales share the same base language
pub fn language_codes_match(code1: &str, code2: &str) -> bool {
    let (base1, _) = split_locale(code1);
    let (base2, _) = split_locale(code2);
    !base1.is_empty() && base1 == base2
}
