use crate::models::CanonicalListing;
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

pub const MIN_DESCRIPTION_LEN: usize = 30;

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern compiles"));
static MOBILE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{10,15}$").expect("mobile pattern compiles"));

/// Outcome of checking a listing against portal requirements
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
}

/// Runs every check and reports all failures, never just the first.
pub fn validate(listing: &CanonicalListing) -> ValidationReport {
    let mut errors = Vec::new();
    let mut warnings = Vec::new();

    let required = [
        ("propertyType", &listing.property_type),
        ("availableFrom", &listing.available_from),
        ("city", &listing.city),
        ("locality", &listing.locality),
        ("description", &listing.description),
        ("bathrooms", &listing.bathrooms),
        ("contactName", &listing.contact_name),
        ("contactEmail", &listing.contact_email),
        ("contactMobile", &listing.contact_mobile),
    ];
    for (field, value) in required {
        if value.trim().is_empty() {
            errors.push(format!("{field} is required"));
        }
    }

    let description_len = listing.description.chars().count();
    if !listing.description.trim().is_empty() && description_len < MIN_DESCRIPTION_LEN {
        errors.push(format!(
            "description length must be at least {MIN_DESCRIPTION_LEN} characters (got {description_len})"
        ));
    }

    if !listing.contact_email.trim().is_empty() && !EMAIL_RE.is_match(&listing.contact_email) {
        errors.push(format!(
            "contactEmail '{}' is not a valid email address",
            listing.contact_email
        ));
    }

    if !listing.contact_mobile.trim().is_empty() && !MOBILE_RE.is_match(&listing.contact_mobile) {
        errors.push(format!(
            "contactMobile '{}' must be 10-15 digits",
            listing.contact_mobile
        ));
    }

    if listing.price == 0 {
        errors.push("price must be greater than 0".to_string());
    }

    // Normalization already substitutes a placeholder, so this stays a warning.
    if listing.images.is_empty() {
        warnings.push("no images provided; the placeholder image will be used".to_string());
    }

    ValidationReport {
        is_valid: errors.is_empty(),
        errors,
        warnings,
    }
}
