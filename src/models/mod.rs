pub mod status;

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use strum::{Display, EnumString};

pub use status::{PublicationStatus, SyncState, TransitionError};

/// Broad category of the property
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Category {
    #[default]
    Residential,
    Commercial,
    #[strum(to_string = "Agricultural", serialize = "agriculture", serialize = "farm")]
    Agricultural,
}

/// Whether the property is offered for sale or for rent
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum TransactionType {
    #[default]
    #[strum(to_string = "Sell", serialize = "sale", serialize = "buy")]
    Sell,
    #[strum(to_string = "Rent", serialize = "lease", serialize = "rental")]
    Rent,
}

/// Furnishing status as offered by most portals
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Display, EnumString)]
#[strum(ascii_case_insensitive)]
pub enum Furnishing {
    #[strum(to_string = "Furnished", serialize = "fully furnished", serialize = "full")]
    Furnished,
    #[serde(rename = "Semi-Furnished")]
    #[strum(
        to_string = "Semi-Furnished",
        serialize = "semi furnished",
        serialize = "semifurnished",
        serialize = "semi"
    )]
    SemiFurnished,
    #[default]
    #[strum(to_string = "Unfurnished", serialize = "un-furnished", serialize = "none")]
    Unfurnished,
}

/// Normalized, portal-ready property listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CanonicalListing {
    pub id: String,
    pub category: Category,
    pub transaction_type: TransactionType,
    pub property_type: String,
    pub available_from: String,
    pub city: String,
    pub locality: String,
    pub images: Vec<String>,
    pub price: u64,
    pub negotiable: bool,
    pub description: String,
    pub furnishing: Furnishing,
    pub bathrooms: String,
    pub contact_name: String,
    pub contact_email: String,
    pub contact_mobile: String,
    pub status: PublicationStatus,
}

impl CanonicalListing {
    /// Canonical serialized form, which is also valid normalizer input
    pub fn to_raw(&self) -> serde_json::Map<String, serde_json::Value> {
        match serde_json::to_value(self) {
            Ok(serde_json::Value::Object(map)) => map,
            _ => serde_json::Map::new(),
        }
    }
}

/// An image reference after resolution to a local file
#[derive(Debug, Clone, PartialEq)]
pub struct ImageReference {
    pub original: String,
    pub resolved_local_path: Option<PathBuf>,
    pub is_temporary: bool,
}

impl ImageReference {
    pub fn local(original: impl Into<String>, path: PathBuf) -> Self {
        Self {
            original: original.into(),
            resolved_local_path: Some(path),
            is_temporary: false,
        }
    }

    pub fn downloaded(original: impl Into<String>, path: PathBuf) -> Self {
        Self {
            original: original.into(),
            resolved_local_path: Some(path),
            is_temporary: true,
        }
    }
}
