//! Deterministic local review templates.
//!
//! The template engine is the last stage of the fallback chain. It needs no
//! network, never fails and always produces the same review for the same
//! request: every phrase choice is keyed off the request fingerprint.

use quill_core::{Fingerprint, GenerationRequest, TripType, Voice};

/// Name used when the request carries a blank hotel name.
pub const FALLBACK_HOTEL_NAME: &str = "this hotel";

/// Opening lines by rating, best first. `{hotel}` is replaced with the name.
const OPENINGS: [[&str; 3]; 5] = [
    [
        "Our stay at {hotel} was outstanding from start to finish.",
        "{hotel} exceeded every expectation we had.",
        "It is hard to imagine a better stay than ours at {hotel}.",
    ],
    [
        "We had a very good stay at {hotel}.",
        "{hotel} was a pleasant surprise and a comfortable base.",
        "Our time at {hotel} was enjoyable with only minor quibbles.",
    ],
    [
        "{hotel} was a decent, if unremarkable, place to stay.",
        "Our stay at {hotel} was fine overall.",
        "{hotel} did the job, though a few things could be better.",
    ],
    [
        "Our stay at {hotel} was disappointing in several ways.",
        "{hotel} fell short of what we had hoped for.",
        "We expected more from {hotel}.",
    ],
    [
        "Unfortunately our stay at {hotel} was a poor experience.",
        "{hotel} let us down on almost every front.",
        "We would not choose {hotel} again.",
    ],
];

/// Trip context lines by trip type.
const TRIPS: [(TripType, [&str; 2]); 5] = [
    (
        TripType::Leisure,
        [
            "We came to unwind for a few days",
            "This was a relaxing break for us",
        ],
    ),
    (
        TripType::Business,
        [
            "I was in town for work",
            "This was a business trip with a busy schedule",
        ],
    ),
    (
        TripType::Family,
        [
            "We travelled as a family with the kids",
            "This was a family holiday",
        ],
    ),
    (
        TripType::Couple,
        [
            "This was a getaway for the two of us",
            "We booked it as a romantic escape",
        ],
    ),
    (
        TripType::Solo,
        ["I travelled on my own", "This was a solo trip"],
    ),
];

/// Closing lines by voice, positive then negative.
const CLOSINGS: [(Voice, [&str; 2]); 4] = [
    (
        Voice::Friendly,
        [
            "We'd happily come back!",
            "Hopefully things improve for the next guests.",
        ],
    ),
    (
        Voice::Professional,
        [
            "I would recommend it without reservation.",
            "I cannot recommend it in its current state.",
        ],
    ),
    (
        Voice::Enthusiastic,
        [
            "Absolutely can't wait to return!",
            "Sadly, this one just wasn't for us!",
        ],
    ),
    (Voice::Concise, ["Recommended.", "Not recommended."]),
];

/// Generates template reviews. Stateless; cheap to construct.
#[derive(Debug, Clone, Copy, Default)]
pub struct TemplateEngine;

impl TemplateEngine {
    /// Creates a template engine.
    pub fn new() -> Self {
        Self
    }

    /// Writes a review for the request.
    ///
    /// The output is never empty, always names the hotel (or
    /// [`FALLBACK_HOTEL_NAME`] when the name is blank) and is identical for
    /// requests with the same fingerprint.
    pub fn generate(&self, request: &GenerationRequest) -> String {
        let mut picker = Picker::new(Fingerprint::of(request).seed());
        let hotel = match request.hotel_name.trim() {
            "" => FALLBACK_HOTEL_NAME,
            name => name,
        };
        let rating = request
            .rating
            .clamp(GenerationRequest::MIN_RATING, GenerationRequest::MAX_RATING);
        let positive = rating >= 3;
        let voice = request.effective_voice();

        let tone = usize::from(GenerationRequest::MAX_RATING - rating);
        let opening = picker.pick(&OPENINGS[tone]).replace("{hotel}", hotel);
        let mut sentences = vec![capitalize(&opening)];

        if voice != Voice::Concise {
            sentences.push(trip_sentence(request, &mut picker));
        }
        if let Some(highlights) = highlight_sentence(request, positive) {
            sentences.push(highlights);
        }
        sentences.push(closing(voice, positive).to_owned());

        sentences.join(" ")
    }
}

/// Trip type plus stay length and party size.
fn trip_sentence(request: &GenerationRequest, picker: &mut Picker) -> String {
    let trip_type = request.effective_trip_type();
    let options = TRIPS
        .iter()
        .find(|(kind, _)| *kind == trip_type)
        .map_or(&TRIPS[0].1, |(_, lines)| lines);
    let nights = request.effective_nights();
    let guests = request.effective_guests();
    format!(
        "{}, staying {nights} night{} with {guests} guest{}.",
        picker.pick(options),
        plural(nights),
        plural(guests),
    )
}

/// Mentions every highlight, praised or criticized according to the rating.
fn highlight_sentence(request: &GenerationRequest, positive: bool) -> Option<String> {
    let highlights: Vec<String> = request.normalized_highlights().into_iter().collect();
    let listed = match highlights.as_slice() {
        [] => return None,
        [only] => only.clone(),
        [init @ .., last] => format!("{} and {last}", init.join(", ")),
    };
    Some(if positive {
        format!("The {listed} stood out.")
    } else {
        format!("The {listed} did not live up to the description.")
    })
}

/// Final line for the voice.
fn closing(voice: Voice, positive: bool) -> &'static str {
    let lines = CLOSINGS
        .iter()
        .find(|(kind, _)| *kind == voice)
        .map_or(&CLOSINGS[0].1, |(_, lines)| lines);
    if positive { lines[0] } else { lines[1] }
}

/// Uppercases the first character.
fn capitalize(sentence: &str) -> String {
    let mut chars = sentence.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}

/// Plural suffix for a count.
fn plural(count: u32) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// Deterministic phrase picker seeded from the fingerprint (splitmix64).
struct Picker {
    /// Generator state
    state: u64,
}

impl Picker {
    /// Creates a picker from a seed.
    fn new(seed: u64) -> Self {
        Self { state: seed }
    }

    /// Next pseudo-random value.
    fn next_u64(&mut self) -> u64 {
        self.state = self.state.wrapping_add(0x9E37_79B9_7F4A_7C15);
        let mut mixed = self.state;
        mixed = (mixed ^ (mixed >> 30)).wrapping_mul(0xBF58_476D_1CE4_E5B9);
        mixed = (mixed ^ (mixed >> 27)).wrapping_mul(0x94D0_49BB_1331_11EB);
        mixed ^ (mixed >> 31)
    }

    /// Picks one option.
    fn pick<'options>(&mut self, options: &[&'options str]) -> &'options str {
        if options.is_empty() {
            return "";
        }
        let index = (self.next_u64() % options.len() as u64) as usize;
        options[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deterministic_for_same_request() {
        let engine = TemplateEngine::new();
        let request = GenerationRequest::new("Grand Plaza", 4).with_highlights(["pool", "staff"]);
        let reordered = GenerationRequest::new("Grand Plaza", 4).with_highlights(["staff", "pool"]);
        assert_eq!(engine.generate(&request), engine.generate(&reordered));
    }

    #[test]
    fn test_contains_hotel_name_and_highlights() {
        let review = TemplateEngine::new().generate(
            &GenerationRequest::new("Seaside Inn", 5)
                .with_trip_type(TripType::Family)
                .with_nights(4)
                .with_guests(3)
                .with_highlights(["breakfast", "pool", "location"]),
        );
        assert!(review.contains("Seaside Inn"));
        assert!(review.contains("breakfast, location and pool"));
        assert!(review.contains("4 nights with 3 guests"));
    }

    #[test]
    fn test_blank_name_uses_fallback() {
        let review = TemplateEngine::new().generate(&GenerationRequest::new("   ", 3));
        assert!(review.to_lowercase().contains(FALLBACK_HOTEL_NAME));
        assert!(!review.is_empty());
    }

    #[test]
    fn test_never_empty_for_any_rating_or_voice() {
        let engine = TemplateEngine::new();
        for rating in 0..=7 {
            for voice in [
                Voice::Friendly,
                Voice::Professional,
                Voice::Enthusiastic,
                Voice::Concise,
            ] {
                let review = engine.generate(&GenerationRequest::new("Grand Plaza", rating).with_voice(voice));
                assert!(!review.trim().is_empty());
                assert!(review.contains("Grand Plaza"));
            }
        }
    }

    #[test]
    fn test_low_rating_is_negative() {
        let review = TemplateEngine::new().generate(
            &GenerationRequest::new("Grand Plaza", 1)
                .with_voice(Voice::Professional)
                .with_highlight("wifi"),
        );
        assert!(review.contains("did not live up"));
        assert!(review.ends_with("I cannot recommend it in its current state."));
    }

    #[test]
    fn test_concise_voice_is_shorter() {
        let engine = TemplateEngine::new();
        let friendly = engine.generate(&GenerationRequest::new("Grand Plaza", 4));
        let concise = engine.generate(&GenerationRequest::new("Grand Plaza", 4).with_voice(Voice::Concise));
        assert!(concise.len() < friendly.len());
        assert!(concise.ends_with("Recommended."));
    }
}
