use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;
use uuid::Uuid;

use crate::{Error, Result};

/// Model id reported for reviews produced by the local template engine.
pub const TEMPLATE_MODEL_ID: &str = "template-v1";

/// Purpose of the stay being reviewed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TripType {
    /// Holiday or weekend away
    Leisure,
    /// Work travel
    Business,
    /// Travelling with children
    Family,
    /// Romantic getaway
    Couple,
    /// Travelling alone
    Solo,
}

impl TripType {
    /// Lowercase identifier used in prompts and fingerprints.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Leisure => "leisure",
            Self::Business => "business",
            Self::Family => "family",
            Self::Couple => "couple",
            Self::Solo => "solo",
        }
    }
}

impl FromStr for TripType {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "leisure" => Ok(Self::Leisure),
            "business" => Ok(Self::Business),
            "family" => Ok(Self::Family),
            "couple" => Ok(Self::Couple),
            "solo" => Ok(Self::Solo),
            other => Err(Error::InvalidRequest(format!("unknown trip type: {other}"))),
        }
    }
}

/// Tone the review is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Voice {
    /// Warm, conversational
    Friendly,
    /// Measured and factual
    Professional,
    /// Upbeat and energetic
    Enthusiastic,
    /// Short and to the point
    Concise,
}

impl Voice {
    /// Lowercase identifier used in prompts and fingerprints.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Friendly => "friendly",
            Self::Professional => "professional",
            Self::Enthusiastic => "enthusiastic",
            Self::Concise => "concise",
        }
    }
}

impl FromStr for Voice {
    type Err = Error;

    fn from_str(value: &str) -> Result<Self> {
        match value.trim().to_lowercase().as_str() {
            "friendly" => Ok(Self::Friendly),
            "professional" => Ok(Self::Professional),
            "enthusiastic" => Ok(Self::Enthusiastic),
            "concise" => Ok(Self::Concise),
            other => Err(Error::InvalidRequest(format!("unknown voice: {other}"))),
        }
    }
}

/// Structured parameters for one hotel review.
///
/// Only `hotel_name` and `rating` are required; every other field falls back
/// to an engine default through the `effective_*` accessors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    /// Name of the hotel being reviewed
    pub hotel_name: String,
    /// Star rating, 1 to 5
    pub rating: u8,
    /// Purpose of the stay
    #[serde(default)]
    pub trip_type: Option<TripType>,
    /// Aspects worth mentioning; order is not significant
    #[serde(default)]
    pub highlights: BTreeSet<String>,
    /// Length of the stay
    #[serde(default)]
    pub nights: Option<u32>,
    /// Party size
    #[serde(default)]
    pub guests: Option<u32>,
    /// ISO 639-1 language code
    #[serde(default)]
    pub language: Option<String>,
    /// Tone of the review
    #[serde(default)]
    pub voice: Option<Voice>,
}

impl GenerationRequest {
    /// Lowest accepted rating.
    pub const MIN_RATING: u8 = 1;
    /// Highest accepted rating.
    pub const MAX_RATING: u8 = 5;

    /// Creates a request with only the required fields set.
    pub fn new(hotel_name: impl Into<String>, rating: u8) -> Self {
        Self {
            hotel_name: hotel_name.into(),
            rating,
            trip_type: None,
            highlights: BTreeSet::new(),
            nights: None,
            guests: None,
            language: None,
            voice: None,
        }
    }

    /// Sets the trip type.
    #[must_use]
    pub fn with_trip_type(mut self, trip_type: TripType) -> Self {
        self.trip_type = Some(trip_type);
        self
    }

    /// Adds a highlight, normalized to trimmed lowercase. Blank values are ignored.
    #[must_use]
    pub fn with_highlight(mut self, highlight: impl AsRef<str>) -> Self {
        let normalized = normalize_highlight(highlight.as_ref());
        if !normalized.is_empty() {
            self.highlights.insert(normalized);
        }
        self
    }

    /// Adds several highlights.
    #[must_use]
    pub fn with_highlights<I, S>(self, highlights: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        highlights
            .into_iter()
            .fold(self, |request, highlight| request.with_highlight(highlight))
    }

    /// Sets the number of nights.
    #[must_use]
    pub fn with_nights(mut self, nights: u32) -> Self {
        self.nights = Some(nights);
        self
    }

    /// Sets the number of guests.
    #[must_use]
    pub fn with_guests(mut self, guests: u32) -> Self {
        self.guests = Some(guests);
        self
    }

    /// Sets the output language.
    #[must_use]
    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    /// Sets the voice.
    #[must_use]
    pub fn with_voice(mut self, voice: Voice) -> Self {
        self.voice = Some(voice);
        self
    }

    /// Checks the request invariants.
    ///
    /// # Errors
    /// Returns `Error::InvalidRequest` if the hotel name is blank, the rating
    /// is outside 1..=5, or nights/guests is zero.
    pub fn validate(&self) -> Result<()> {
        if self.hotel_name.trim().is_empty() {
            return Err(Error::InvalidRequest("hotel name is empty".to_owned()));
        }
        if !(Self::MIN_RATING..=Self::MAX_RATING).contains(&self.rating) {
            return Err(Error::InvalidRequest(format!(
                "rating {} is outside {}..={}",
                self.rating,
                Self::MIN_RATING,
                Self::MAX_RATING
            )));
        }
        if self.nights == Some(0) {
            return Err(Error::InvalidRequest("nights must be positive".to_owned()));
        }
        if self.guests == Some(0) {
            return Err(Error::InvalidRequest("guests must be positive".to_owned()));
        }
        Ok(())
    }

    /// Trip type with the engine default applied.
    pub fn effective_trip_type(&self) -> TripType {
        self.trip_type.unwrap_or(TripType::Leisure)
    }

    /// Voice with the engine default applied.
    pub fn effective_voice(&self) -> Voice {
        self.voice.unwrap_or(Voice::Friendly)
    }

    /// Language with the engine default applied, lowercased.
    pub fn effective_language(&self) -> String {
        self.language
            .as_deref()
            .map(str::trim)
            .filter(|language| !language.is_empty())
            .map_or_else(|| "en".to_owned(), str::to_lowercase)
    }

    /// Nights with the engine default applied.
    pub fn effective_nights(&self) -> u32 {
        self.nights.unwrap_or(1).max(1)
    }

    /// Guests with the engine default applied.
    pub fn effective_guests(&self) -> u32 {
        self.guests.unwrap_or(1).max(1)
    }

    /// Highlights normalized and deduplicated, in sorted order.
    pub fn normalized_highlights(&self) -> BTreeSet<String> {
        self.highlights
            .iter()
            .map(|highlight| normalize_highlight(highlight))
            .filter(|highlight| !highlight.is_empty())
            .collect()
    }
}

/// Trims and lowercases a highlight.
fn normalize_highlight(highlight: &str) -> String {
    highlight.trim().to_lowercase()
}

/// Stage of the fallback chain that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "String", try_from = "String")]
pub enum Source {
    /// A remote provider, by position in the priority order
    Remote {
        /// Zero-based position in the provider chain
        rank: usize,
    },
    /// The local template engine
    Template,
    /// The response cache
    Cache,
}

impl Source {
    /// First provider in the chain.
    pub const PRIMARY: Self = Self::Remote { rank: 0 };
    /// Second provider in the chain.
    pub const SECONDARY: Self = Self::Remote { rank: 1 };

    /// Human readable label (`primary`, `secondary`, `template`, ...).
    pub fn label(self) -> String {
        match self {
            Self::Remote { rank: 0 } => "primary".to_owned(),
            Self::Remote { rank: 1 } => "secondary".to_owned(),
            Self::Remote { rank: 2 } => "tertiary".to_owned(),
            Self::Remote { rank } => format!("provider-{}", rank + 1),
            Self::Template => "template".to_owned(),
            Self::Cache => "cache".to_owned(),
        }
    }

    /// Whether this source is a remote provider.
    pub fn is_remote(self) -> bool {
        matches!(self, Self::Remote { .. })
    }
}

impl Display for Source {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        f.write_str(&self.label())
    }
}

impl From<Source> for String {
    fn from(source: Source) -> Self {
        source.label()
    }
}

impl TryFrom<String> for Source {
    type Error = Error;

    fn try_from(label: String) -> Result<Self> {
        match label.as_str() {
            "primary" => Ok(Self::PRIMARY),
            "secondary" => Ok(Self::SECONDARY),
            "tertiary" => Ok(Self::Remote { rank: 2 }),
            "template" => Ok(Self::Template),
            "cache" => Ok(Self::Cache),
            other => other
                .strip_prefix("provider-")
                .and_then(|position| position.parse::<usize>().ok())
                .filter(|position| *position > 0)
                .map(|position| Self::Remote { rank: position - 1 })
                .ok_or_else(|| Error::Other(format!("unknown source label: {other}"))),
        }
    }
}

/// Token accounting for one provider call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Prompt tokens, zero when not reported
    pub input: u64,
    /// Completion tokens
    pub output: u64,
    /// Total billed tokens
    pub total: u64,
    /// Whether the numbers come from the `chars / 4` heuristic
    pub estimated: bool,
}

impl TokenUsage {
    /// Usage as reported by the provider.
    pub fn reported(input: u64, output: u64, total: u64) -> Self {
        let total = if total == 0 { input + output } else { total };
        Self {
            input,
            output,
            total,
            estimated: false,
        }
    }

    /// Approximates usage as one token per four characters of generated text.
    ///
    /// This is a rough heuristic, only used when the provider reports nothing.
    pub fn estimate_from_text(text: &str) -> Self {
        let total = (text.chars().count() / 4) as u64;
        Self {
            input: 0,
            output: total,
            total,
            estimated: true,
        }
    }

    /// Cost in USD at the given price per thousand tokens.
    pub fn cost_usd(&self, cost_per_1k_tokens: f64) -> f64 {
        (self.total as f64 / 1000.0) * cost_per_1k_tokens
    }
}

/// Raw outcome of a successful provider call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProviderResponse {
    /// Generated review text
    pub text: String,
    /// Model that produced the text
    pub model_id: String,
    /// Token usage, reported or estimated
    pub tokens: TokenUsage,
    /// Cost of the call in USD
    pub cost_usd: f64,
    /// Wall-clock latency including retries
    pub latency_ms: u64,
    /// Attempts made, 1 when the first attempt succeeded
    pub attempts: u32,
}

/// Review returned to callers, with provenance metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationResult {
    /// Generated review, never empty
    pub text: String,
    /// Stage that answered this call
    pub source: Source,
    /// Stage that originally produced the text
    pub origin: Source,
    /// Provider id when a remote provider produced the text
    pub provider_id: Option<String>,
    /// Model that produced the text
    pub model_id: String,
    /// Unique id of the call that produced this result
    pub request_id: Uuid,
    /// Latency of this call
    pub latency_ms: u64,
    /// Cost of this call in USD
    pub cost_usd: f64,
    /// Whether the result came from the cache
    pub cached: bool,
    /// Tokens billed for this call
    pub tokens_used: u64,
    /// Fingerprint of the request
    pub fingerprint: String,
}

impl GenerationResult {
    /// Wraps a provider response produced by the provider at `rank`.
    pub fn from_provider(
        response: ProviderResponse,
        rank: usize,
        provider_id: impl Into<String>,
        fingerprint: impl Into<String>,
    ) -> Self {
        let source = Source::Remote { rank };
        Self {
            text: response.text,
            source,
            origin: source,
            provider_id: Some(provider_id.into()),
            model_id: response.model_id,
            request_id: Uuid::new_v4(),
            latency_ms: response.latency_ms,
            cost_usd: response.cost_usd,
            cached: false,
            tokens_used: response.tokens.total,
            fingerprint: fingerprint.into(),
        }
    }

    /// Wraps text produced by the template engine.
    pub fn from_template(
        text: String,
        latency_ms: u64,
        fingerprint: impl Into<String>,
    ) -> Self {
        Self {
            text,
            source: Source::Template,
            origin: Source::Template,
            provider_id: None,
            model_id: TEMPLATE_MODEL_ID.to_owned(),
            request_id: Uuid::new_v4(),
            latency_ms,
            cost_usd: 0.0,
            cached: false,
            tokens_used: 0,
            fingerprint: fingerprint.into(),
        }
    }

    /// Copy of a cached result as served to a new caller.
    ///
    /// The origin is kept; the call itself costs nothing and gets a fresh id.
    #[must_use]
    pub fn as_cache_hit(&self, latency_ms: u64) -> Self {
        Self {
            source: Source::Cache,
            request_id: Uuid::new_v4(),
            latency_ms,
            cost_usd: 0.0,
            cached: true,
            tokens_used: 0,
            ..self.clone()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let request = GenerationRequest::new("Grand Plaza", 5);
        assert_eq!(request.effective_trip_type(), TripType::Leisure);
        assert_eq!(request.effective_voice(), Voice::Friendly);
        assert_eq!(request.effective_language(), "en");
        assert_eq!(request.effective_nights(), 1);
        assert_eq!(request.effective_guests(), 1);
    }

    #[test]
    fn test_request_validation() {
        assert!(GenerationRequest::new("Grand Plaza", 5).validate().is_ok());
        assert!(GenerationRequest::new("Grand Plaza", 0).validate().is_err());
        assert!(GenerationRequest::new("Grand Plaza", 6).validate().is_err());
        assert!(GenerationRequest::new("   ", 3).validate().is_err());
        assert!(
            GenerationRequest::new("Grand Plaza", 3)
                .with_nights(0)
                .validate()
                .is_err()
        );
        assert!(
            GenerationRequest::new("Grand Plaza", 3)
                .with_guests(0)
                .validate()
                .is_err()
        );
    }

    #[test]
    fn test_highlights_normalized() {
        let request = GenerationRequest::new("Grand Plaza", 4)
            .with_highlights(["  Location ", "service", "LOCATION", ""]);
        let highlights: Vec<_> = request.highlights.iter().cloned().collect();
        assert_eq!(highlights, vec!["location".to_owned(), "service".to_owned()]);
    }

    #[test]
    fn test_enum_parsing() {
        assert_eq!("Business".parse::<TripType>().ok(), Some(TripType::Business));
        assert_eq!("concise".parse::<Voice>().ok(), Some(Voice::Concise));
        assert!("spaceship".parse::<TripType>().is_err());
    }

    #[test]
    fn test_source_labels_round_trip() {
        for source in [
            Source::PRIMARY,
            Source::SECONDARY,
            Source::Remote { rank: 2 },
            Source::Remote { rank: 6 },
            Source::Template,
            Source::Cache,
        ] {
            assert_eq!(Source::try_from(source.label()).ok(), Some(source));
        }
        assert_eq!(Source::Remote { rank: 6 }.label(), "provider-7");
        assert!(Source::try_from("provider-0".to_owned()).is_err());
    }

    #[test]
    fn test_token_estimate_heuristic() {
        let usage = TokenUsage::estimate_from_text("abcdefghij");
        assert_eq!(usage.total, 2);
        assert!(usage.estimated);
        assert!((usage.cost_usd(1.0) - 0.002).abs() < f64::EPSILON);
    }

    #[test]
    fn test_reported_usage_fills_total() {
        let usage = TokenUsage::reported(40, 60, 0);
        assert_eq!(usage.total, 100);
        assert!(!usage.estimated);
    }

    #[test]
    fn test_cache_hit_copy_keeps_origin() {
        let original = GenerationResult::from_template("A fine stay.".to_owned(), 3, "abc");
        let hit = original.as_cache_hit(0);
        assert_eq!(hit.source, Source::Cache);
        assert_eq!(hit.origin, Source::Template);
        assert!(hit.cached);
        assert_eq!(hit.text, original.text);
        assert_ne!(hit.request_id, original.request_id);
    }
}
