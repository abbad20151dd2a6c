//! Maps loosely shaped listing records onto [`CanonicalListing`].
//!
//! Upstream producers (web forms, spreadsheet imports, hand-written JSON)
//! disagree on field names. Every canonical field has an ordered list of
//! aliases; the first alias holding a usable value wins, otherwise the
//! field's default applies.

use crate::images::PLACEHOLDER_REF;
use crate::models::{CanonicalListing, PublicationStatus, SyncState};
use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use std::str::FromStr;

pub type RawRecord = Map<String, Value>;

/// Alias names per canonical field, in priority order.
pub const FIELD_ALIASES: &[(&str, &[&str])] = &[
    ("id", &["id", "listingId", "_id"]),
    ("category", &["category", "propertyCategory"]),
    ("transactionType", &["transactionType", "listingType", "purpose", "adType"]),
    ("propertyType", &["propertyType", "type", "subType"]),
    ("availableFrom", &["availableFrom", "availableDate", "possessionDate"]),
    ("city", &["city", "cityName"]),
    ("locality", &["locality", "area", "neighbourhood", "address"]),
    ("images", &["images", "photos", "imageUrls", "image", "photo"]),
    ("price", &["propertyPrice", "price", "rent", "expectedPrice"]),
    ("negotiable", &["negotiable", "isNegotiable", "priceNegotiable"]),
    ("description", &["description", "details", "about"]),
    ("furnishing", &["furnishing", "furnishingStatus", "furnished"]),
    ("bathrooms", &["bathrooms", "baths", "bathroomCount"]),
    ("contactName", &["contactName", "ownerName", "name"]),
    ("contactEmail", &["contactEmail", "email", "ownerEmail"]),
    ("contactMobile", &["contactMobile", "mobile", "phone", "contactNumber"]),
];

pub const DEFAULT_PROPERTY_TYPE: &str = "Apartment";
pub const DEFAULT_AVAILABLE_FROM: &str = "Immediately";
pub const DEFAULT_CITY: &str = "Mumbai";
pub const DEFAULT_LOCALITY: &str = "City Centre";
pub const DEFAULT_PRICE: u64 = 1000;
pub const DEFAULT_DESCRIPTION: &str =
    "Well maintained property in a prime location. Contact the owner for more details.";
pub const DEFAULT_BATHROOMS: &str = "1";
pub const DEFAULT_CONTACT_NAME: &str = "Property Owner";
pub const DEFAULT_CONTACT_EMAIL: &str = "owner@example.com";
pub const DEFAULT_CONTACT_MOBILE: &str = "9999999999";

/// Aliases registered for a canonical field. Unknown fields have none.
pub fn aliases(field: &str) -> &'static [&'static str] {
    FIELD_ALIASES
        .iter()
        .find(|(name, _)| *name == field)
        .map(|(_, aliases)| *aliases)
        .unwrap_or(&[])
}

/// Non-empty values for `field`, in alias priority order.
pub fn candidates<'a>(raw: &'a RawRecord, field: &str) -> impl Iterator<Item = &'a Value> + 'a {
    aliases(field)
        .iter()
        .filter_map(move |alias| raw.get(*alias))
        .filter(|value| !is_empty(value))
}

/// First candidate for `field` that `convert` accepts.
fn resolve<T>(raw: &RawRecord, field: &str, convert: impl Fn(&Value) -> Option<T>) -> Option<T> {
    candidates(raw, field).find_map(convert)
}

fn is_empty(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.trim().is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_parsed<T: FromStr>(value: &Value) -> Option<T> {
    as_text(value).and_then(|s| s.parse().ok())
}

fn as_price(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => {
            // "50,00,000" and "Rs 5000000.00" both mean 5000000
            let whole = match s.rsplit_once('.') {
                Some((int, frac)) if !frac.is_empty() && frac.chars().all(|c| c.is_ascii_digit()) => int,
                _ => s.as_str(),
            };
            let digits: String = whole.chars().filter(|c| c.is_ascii_digit()).collect();
            digits.parse().ok()
        }
        _ => None,
    }
}

fn as_flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::Number(n) => n.as_i64().map(|n| n != 0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn as_image_list(value: &Value) -> Option<Vec<String>> {
    let images: Vec<String> = match value {
        Value::String(_) => vec![value],
        Value::Array(items) => items.iter().collect(),
        _ => return None,
    }
    .into_iter()
    .filter_map(as_text)
    .filter(|s| !s.is_empty())
    .collect();
    (!images.is_empty()).then_some(images)
}

fn as_status(value: &Value) -> Option<PublicationStatus> {
    match value {
        Value::String(s) => s.parse().ok().map(|state| PublicationStatus::from_parts(state, None, None)),
        Value::Object(map) => {
            let state: SyncState = map.get("state").and_then(as_parsed)?;
            let last_error = map.get("lastError").and_then(as_text).filter(|s| !s.is_empty());
            let published_at = map
                .get("publishedAt")
                .and_then(Value::as_str)
                .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
                .map(|dt| dt.with_timezone(&Utc));
            Some(PublicationStatus::from_parts(state, last_error, published_at))
        }
        _ => None,
    }
}

fn text_or(raw: &RawRecord, field: &str, default: &str) -> String {
    resolve(raw, field, as_text).unwrap_or_else(|| default.to_string())
}

/// Builds a canonical listing from an arbitrary record.
///
/// Pure and idempotent: `normalize(&normalize(x).to_raw()) == normalize(x)`.
pub fn normalize(raw: &RawRecord) -> CanonicalListing {
    CanonicalListing {
        id: text_or(raw, "id", ""),
        category: resolve(raw, "category", as_parsed).unwrap_or_default(),
        transaction_type: resolve(raw, "transactionType", as_parsed).unwrap_or_default(),
        property_type: text_or(raw, "propertyType", DEFAULT_PROPERTY_TYPE),
        available_from: text_or(raw, "availableFrom", DEFAULT_AVAILABLE_FROM),
        city: text_or(raw, "city", DEFAULT_CITY),
        locality: text_or(raw, "locality", DEFAULT_LOCALITY),
        images: resolve(raw, "images", as_image_list)
            .unwrap_or_else(|| vec![PLACEHOLDER_REF.to_string()]),
        price: resolve(raw, "price", as_price).unwrap_or(DEFAULT_PRICE),
        negotiable: resolve(raw, "negotiable", as_flag).unwrap_or(false),
        description: text_or(raw, "description", DEFAULT_DESCRIPTION),
        furnishing: resolve(raw, "furnishing", as_parsed).unwrap_or_default(),
        bathrooms: text_or(raw, "bathrooms", DEFAULT_BATHROOMS),
        contact_name: text_or(raw, "contactName", DEFAULT_CONTACT_NAME),
        contact_email: text_or(raw, "contactEmail", DEFAULT_CONTACT_EMAIL),
        contact_mobile: text_or(raw, "contactMobile", DEFAULT_CONTACT_MOBILE),
        status: raw.get("status").and_then(as_status).unwrap_or_default(),
    }
}
