use quill_core::{GenerationRequest, TripType, Voice};
use serde::{Deserialize, Serialize};
use std::fmt::Write as _;

/// One chat message in an OpenAI-style conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Role of the message author (`system` or `user`)
    pub role: String,
    /// Textual content of the message
    pub content: String,
}

impl ChatMessage {
    /// Creates a system message.
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: "system".to_owned(),
            content: content.into(),
        }
    }

    /// Creates a user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_owned(),
            content: content.into(),
        }
    }
}

/// Builds the system and user messages for a review request.
pub fn build_messages(request: &GenerationRequest) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(system_prompt(request)),
        ChatMessage::user(user_prompt(request)),
    ]
}

/// Instructions covering tone and output language.
pub fn system_prompt(request: &GenerationRequest) -> String {
    let tone = match request.effective_voice() {
        Voice::Friendly => "warm and conversational",
        Voice::Professional => "measured, factual and professional",
        Voice::Enthusiastic => "upbeat and enthusiastic",
        Voice::Concise => "brief and to the point",
    };
    format!(
        "You write authentic hotel reviews from a guest's perspective. \
         Keep the tone {tone}. Write in the language with ISO code '{}'. \
         Respond with the review text only: no title, no rating line, no quotes.",
        request.effective_language()
    )
}

/// Facts about the stay the review should reflect.
pub fn user_prompt(request: &GenerationRequest) -> String {
    let nights = request.effective_nights();
    let guests = request.effective_guests();
    let trip = match request.effective_trip_type() {
        TripType::Leisure => "a leisure trip",
        TripType::Business => "a business trip",
        TripType::Family => "a family trip",
        TripType::Couple => "a couple's getaway",
        TripType::Solo => "a solo trip",
    };

    let mut prompt = format!(
        "Write a review of {} rated {} out of 5 stars.\n\
         Trip: {trip}, {nights} night{}, {guests} guest{}.",
        request.hotel_name.trim(),
        request.rating,
        plural(nights),
        plural(guests),
    );

    let highlights = request.normalized_highlights();
    if !highlights.is_empty() {
        let joined = highlights.into_iter().collect::<Vec<_>>().join(", ");
        // Writing to a String cannot fail.
        let _ignored = write!(prompt, "\nMention: {joined}.");
    }
    prompt.push_str("\nKeep it under 120 words.");
    prompt
}

/// Plural suffix for a count.
fn plural(count: u32) -> &'static str {
    if count == 1 { "" } else { "s" }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_have_system_then_user() {
        let request = GenerationRequest::new("Grand Plaza", 4);
        let messages = build_messages(&request);
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, "system");
        assert_eq!(messages[1].role, "user");
    }

    #[test]
    fn test_system_prompt_carries_voice_and_language() {
        let request = GenerationRequest::new("Grand Plaza", 4)
            .with_voice(Voice::Concise)
            .with_language("FR");
        let prompt = system_prompt(&request);
        assert!(prompt.contains("brief"));
        assert!(prompt.contains("'fr'"));
    }

    #[test]
    fn test_user_prompt_carries_facts() {
        let request = GenerationRequest::new("  Grand Plaza ", 5)
            .with_trip_type(TripType::Family)
            .with_nights(3)
            .with_guests(1)
            .with_highlights(["pool", "breakfast"]);
        let prompt = user_prompt(&request);
        assert!(prompt.contains("Grand Plaza rated 5 out of 5"));
        assert!(prompt.contains("a family trip, 3 nights, 1 guest."));
        assert!(prompt.contains("Mention: breakfast, pool."));
    }
}
