//! # Payload Normalization
//!
//! Maps the lead payloads of each supported platform onto one canonical
//! [`LeadDraft`]. Everything in this module is pure: no I/O, no clocks, and the
//! same payload always yields the same result.
//!
//! # Payload shapes
//!
//! | Platform     | Field list                                   | Flat fallbacks                               |
//! |--------------|----------------------------------------------|----------------------------------------------|
//! | `google_ads` | `form_data: [{key, value}]`                  | `name`/`full_name`, `email`, `phone`/`phone_number` |
//! | `facebook`   | `field_data: [{name, values: [..]}]`         | `name`/`full_name`, `email`, `phone`/`phone_number` |
//! | `custom`     | none                                         | `name`/`full_name`/`fullname`, `email`, `phone`/`phone_number`/`mobile` |
//!
//! Field-list identifiers are lower-cased and classified by substring:
//! anything containing `email` is the email, then `phone`, then `name`.
//! When several entries classify to the same field the last one wins. Flat
//! fallbacks only fill fields the list left empty, and each chain stops at
//! the first key that is present and not null. Values are never trimmed.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::ParseError;

// ============================================================================
// Platform
// ============================================================================

/// Lead source platform an integration was registered for
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Platform {
    /// Google Ads lead form extensions
    GoogleAds,
    /// Facebook Lead Ads
    Facebook,
    /// Any other system posting flat JSON
    Custom,
}

impl Platform {
    /// All supported platforms
    pub const ALL: [Platform; 3] = [Self::GoogleAds, Self::Facebook, Self::Custom];

    /// Wire tag stored against integrations and copied into `lead.source`
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::GoogleAds => "google_ads",
            Self::Facebook => "facebook",
            Self::Custom => "custom",
        }
    }

    fn field_list(&self) -> Option<FieldList> {
        match self {
            Self::GoogleAds => Some(FieldList {
                array_key: "form_data",
                identifier_key: "key",
                value: ValueShape::Scalar("value"),
            }),
            Self::Facebook => Some(FieldList {
                array_key: "field_data",
                identifier_key: "name",
                value: ValueShape::FirstOf("values"),
            }),
            Self::Custom => None,
        }
    }

    fn fallbacks(&self) -> &'static Fallbacks {
        match self {
            Self::GoogleAds | Self::Facebook => &FORM_FALLBACKS,
            Self::Custom => &CUSTOM_FALLBACKS,
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Platform {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "google_ads" => Ok(Self::GoogleAds),
            "facebook" => Ok(Self::Facebook),
            "custom" => Ok(Self::Custom),
            _ => Err(ParseError::InvalidFormat {
                expected: "google_ads, facebook, or custom".to_string(),
                actual: s.to_string(),
            }),
        }
    }
}

// ============================================================================
// LeadDraft
// ============================================================================

/// Canonical lead extracted from a platform payload
///
/// A draft always has a non-empty name and phone; email may be empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LeadDraft {
    name: String,
    email: String,
    phone: String,
}

impl LeadDraft {
    /// Build a draft, rejecting an empty name or phone
    pub fn new(
        name: impl Into<String>,
        email: impl Into<String>,
        phone: impl Into<String>,
    ) -> Result<Self, NormalizationError> {
        let name = name.into();
        let phone = phone.into();

        if name.is_empty() {
            return Err(NormalizationError::MissingName);
        }
        if phone.is_empty() {
            return Err(NormalizationError::MissingPhone);
        }

        Ok(Self {
            name,
            email: email.into(),
            phone,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn phone(&self) -> &str {
        &self.phone
    }

    /// Split into `(name, email, phone)`
    pub fn into_parts(self) -> (String, String, String) {
        (self.name, self.email, self.phone)
    }
}

// ============================================================================
// Errors
// ============================================================================

/// Reasons a payload cannot become a lead
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NormalizationError {
    #[error("lead name is missing")]
    MissingName,

    #[error("lead phone is missing")]
    MissingPhone,

    #[error("unsupported platform '{platform}'")]
    UnsupportedPlatform { platform: String },
}

// ============================================================================
// Normalization
// ============================================================================

/// Normalize a payload for a known platform
pub fn normalize(platform: Platform, payload: &Value) -> Result<LeadDraft, NormalizationError> {
    let mut fields = CandidateFields::default();

    if let Some(list) = platform.field_list() {
        fields.scan(payload, &list);
    }

    let fallbacks = platform.fallbacks();
    fill_if_empty(&mut fields.name, payload, fallbacks.name);
    fill_if_empty(&mut fields.email, payload, fallbacks.email);
    fill_if_empty(&mut fields.phone, payload, fallbacks.phone);

    let result = LeadDraft::new(fields.name, fields.email, fields.phone);
    if let Err(ref e) = result {
        debug!(platform = %platform, reason = %e, "Payload rejected during normalization");
    }
    result
}

/// Normalize a payload for a platform identified by its stored tag
///
/// Unknown tags are rejected outright; there is no fallback to `custom`.
pub fn normalize_tagged(tag: &str, payload: &Value) -> Result<LeadDraft, NormalizationError> {
    let platform = tag
        .parse::<Platform>()
        .map_err(|_| NormalizationError::UnsupportedPlatform {
            platform: tag.to_string(),
        })?;
    normalize(platform, payload)
}

// ============================================================================
// Private helpers
// ============================================================================

/// Flat property chains consulted when the field list left a field empty
struct Fallbacks {
    name: &'static [&'static str],
    email: &'static [&'static str],
    phone: &'static [&'static str],
}

static FORM_FALLBACKS: Fallbacks = Fallbacks {
    name: &["name", "full_name"],
    email: &["email"],
    phone: &["phone", "phone_number"],
};

static CUSTOM_FALLBACKS: Fallbacks = Fallbacks {
    name: &["name", "full_name", "fullname"],
    email: &["email"],
    phone: &["phone", "phone_number", "mobile"],
};

/// Native field-list layout of a platform
struct FieldList {
    array_key: &'static str,
    identifier_key: &'static str,
    value: ValueShape,
}

enum ValueShape {
    /// The value is a single scalar under this key
    Scalar(&'static str),
    /// The value is an array under this key; only the first element counts
    FirstOf(&'static str),
}

impl ValueShape {
    fn extract(&self, entry: &Value) -> String {
        match self {
            Self::Scalar(key) => entry.get(*key).map(scalar_text).unwrap_or_default(),
            Self::FirstOf(key) => entry
                .get(*key)
                .and_then(Value::as_array)
                .and_then(|values| values.first())
                .map(scalar_text)
                .unwrap_or_default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LeadField {
    Name,
    Email,
    Phone,
}

/// Classify a field-list identifier. `full_name` is covered by the `name` rule.
fn classify(identifier: &str) -> Option<LeadField> {
    let identifier = identifier.to_lowercase();
    if identifier.contains("email") {
        Some(LeadField::Email)
    } else if identifier.contains("phone") {
        Some(LeadField::Phone)
    } else if identifier.contains("name") {
        Some(LeadField::Name)
    } else {
        None
    }
}

#[derive(Debug, Default)]
struct CandidateFields {
    name: String,
    email: String,
    phone: String,
}

impl CandidateFields {
    fn scan(&mut self, payload: &Value, list: &FieldList) {
        let Some(entries) = payload.get(list.array_key).and_then(Value::as_array) else {
            return;
        };

        for entry in entries.iter().filter(|e| e.is_object()) {
            let identifier = entry
                .get(list.identifier_key)
                .and_then(Value::as_str)
                .unwrap_or_default();

            let Some(field) = classify(identifier) else {
                continue;
            };

            // Later entries overwrite earlier ones, even with an empty value.
            let value = list.value.extract(entry);
            match field {
                LeadField::Name => self.name = value,
                LeadField::Email => self.email = value,
                LeadField::Phone => self.phone = value,
            }
        }
    }
}

/// Fill an empty field from the first flat key that is present and not null
///
/// The chain stops at that key even when its text is empty.
fn fill_if_empty(target: &mut String, payload: &Value, chain: &[&str]) {
    if !target.is_empty() {
        return;
    }
    if let Some(value) = chain
        .iter()
        .filter_map(|key| payload.get(*key))
        .find(|value| !value.is_null())
    {
        *target = scalar_text(value);
    }
}

/// Text of a JSON scalar, taken verbatim
///
/// Numbers render in decimal and `true` as `"1"`. `false`, `null` and
/// containers are empty.
fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Number(n) => n.to_string(),
        Value::Bool(true) => "1".to_string(),
        _ => String::new(),
    }
}

#[cfg(test)]
#[path = "normalize_tests.rs"]
mod tests;
