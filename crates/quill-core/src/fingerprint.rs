//! Deterministic request identity used as the cache and in-flight key.

use serde::{Deserialize, Serialize};
use serde_json::{Value, to_string};
use sha2::{Digest as _, Sha256};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter, Result as FmtResult};

use crate::GenerationRequest;

/// SHA-256 of the canonical serialization of a request.
///
/// Two requests with the same meaning (same fields after defaults are
/// applied, same highlight set in any order) hash to the same fingerprint.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Computes the fingerprint of a request.
    pub fn of(request: &GenerationRequest) -> Self {
        let digest = Sha256::digest(canonical_form(request).as_bytes());
        let hex = digest
            .iter()
            .map(|byte| format!("{byte:02x}"))
            .collect::<String>();
        Self(hex)
    }

    /// Hex representation.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// First 64 bits of the digest, for deterministic phrase selection.
    pub fn seed(&self) -> u64 {
        self.0
            .get(..16)
            .and_then(|prefix| u64::from_str_radix(prefix, 16).ok())
            .unwrap_or_default()
    }
}

impl Display for Fingerprint {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.0)
    }
}

impl From<Fingerprint> for String {
    fn from(fingerprint: Fingerprint) -> Self {
        fingerprint.0
    }
}

/// Key-sorted JSON over the semantically relevant fields.
///
/// A `BTreeMap` keeps the key order stable independently of serde_json features.
pub fn canonical_form(request: &GenerationRequest) -> String {
    let highlights: Vec<Value> = request
        .normalized_highlights()
        .into_iter()
        .map(Value::String)
        .collect();

    let mut fields: BTreeMap<&str, Value> = BTreeMap::new();
    fields.insert("guests", Value::from(request.effective_guests()));
    fields.insert("highlights", Value::Array(highlights));
    fields.insert("hotel_name", Value::from(request.hotel_name.trim()));
    fields.insert("language", Value::from(request.effective_language()));
    fields.insert("nights", Value::from(request.effective_nights()));
    fields.insert("rating", Value::from(request.rating));
    fields.insert(
        "trip_type",
        Value::from(request.effective_trip_type().as_str()),
    );
    fields.insert("voice", Value::from(request.effective_voice().as_str()));

    // Serializing a map of plain JSON values cannot fail.
    to_string(&fields).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{TripType, Voice};

    #[test]
    fn test_fingerprint_ignores_highlight_order() {
        let first = GenerationRequest::new("Grand Plaza", 5).with_highlights(["location", "service"]);
        let second =
            GenerationRequest::new("Grand Plaza", 5).with_highlights(["service", "Location "]);
        assert_eq!(Fingerprint::of(&first), Fingerprint::of(&second));
    }

    #[test]
    fn test_fingerprint_applies_defaults() {
        let implicit = GenerationRequest::new("Grand Plaza", 5);
        let explicit = GenerationRequest::new("Grand Plaza", 5)
            .with_trip_type(TripType::Leisure)
            .with_voice(Voice::Friendly)
            .with_language("EN")
            .with_nights(1)
            .with_guests(1);
        assert_eq!(Fingerprint::of(&implicit), Fingerprint::of(&explicit));
    }

    #[test]
    fn test_fingerprint_distinguishes_meaning() {
        let base = GenerationRequest::new("Grand Plaza", 5);
        let other_rating = GenerationRequest::new("Grand Plaza", 4);
        let other_voice = GenerationRequest::new("Grand Plaza", 5).with_voice(Voice::Concise);
        assert_ne!(Fingerprint::of(&base), Fingerprint::of(&other_rating));
        assert_ne!(Fingerprint::of(&base), Fingerprint::of(&other_voice));
    }

    #[test]
    fn test_canonical_form_is_key_sorted() {
        let canonical = canonical_form(&GenerationRequest::new("Grand Plaza", 5));
        let guests = canonical.find("\"guests\"").unwrap_or(usize::MAX);
        let voice = canonical.find("\"voice\"").unwrap_or(0);
        assert!(guests < voice);
        assert_eq!(Fingerprint::of(&GenerationRequest::new("Grand Plaza", 5)).as_str().len(), 64);
    }
}
