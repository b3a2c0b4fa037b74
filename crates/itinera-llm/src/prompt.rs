// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Itinera contributors

use serde::{Deserialize, Serialize};

pub const DEFAULT_MODEL: &str = "text-davinci-003";

/// Conversational markers the completion is cut at.
pub const STOP_SEQUENCES: [&str; 2] = [" Human:", " AI:"];

/// The user's trip parameters, rendered into a natural-language instruction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItineraryPrompt {
    pub country: String,
    pub first_city: String,
    pub last_city: String,
    /// Forwarded verbatim; no upper bound is applied.
    pub num_days: u32,
}

impl ItineraryPrompt {
    pub fn new(
        country: impl Into<String>,
        first_city: impl Into<String>,
        last_city: impl Into<String>,
        num_days: u32,
    ) -> Self {
        Self {
            country: country.into(),
            first_city: first_city.into(),
            last_city: last_city.into(),
            num_days,
        }
    }

    pub fn text(&self) -> String {
        format!(
            "Do a {} day travel itinerary through {}, starting in {} and ending in {}. Return with this format: [day 1 city, day 2 city, ...]",
            self.num_days, self.country, self.first_city, self.last_city
        )
    }
}

/// Body of a text-completion request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletionRequest {
    pub model: String,
    pub prompt: String,
    pub temperature: f32,
    pub max_tokens: u32,
    pub top_p: f32,
    pub frequency_penalty: f32,
    pub presence_penalty: f32,
    pub stop: Vec<String>,
}

impl CompletionRequest {
    /// Fixed sampling parameters used for every itinerary request.
    pub fn for_itinerary(model: &str, prompt: &ItineraryPrompt) -> Self {
        Self {
            model: model.to_string(),
            prompt: prompt.text(),
            temperature: 0.9,
            max_tokens: 150,
            top_p: 1.0,
            frequency_penalty: 0.0,
            presence_penalty: 0.6,
            stop: STOP_SEQUENCES.iter().map(|s| s.to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prompt_text() {
        let prompt = ItineraryPrompt::new("Portugal", "Lisbon", "Porto", 3);
        assert_eq!(
            prompt.text(),
            "Do a 3 day travel itinerary through Portugal, starting in Lisbon and ending in Porto. Return with this format: [day 1 city, day 2 city, ...]"
        );
    }

    #[test]
    fn test_large_trip_length_is_forwarded() {
        let prompt = ItineraryPrompt::new("Japan", "Tokyo", "Tokyo", 120);
        assert!(prompt.text().starts_with("Do a 120 day travel itinerary"));
    }

    #[test]
    fn test_request_sampling_parameters() {
        let prompt = ItineraryPrompt::new("Italy", "Rome", "Milan", 5);
        let req = CompletionRequest::for_itinerary(DEFAULT_MODEL, &prompt);
        assert_eq!(req.model, "text-davinci-003");
        assert_eq!(req.temperature, 0.9);
        assert_eq!(req.top_p, 1.0);
        assert_eq!(req.max_tokens, 150);
        assert_eq!(req.frequency_penalty, 0.0);
        assert_eq!(req.presence_penalty, 0.6);
        assert_eq!(req.stop, vec![" Human:".to_string(), " AI:".to_string()]);

        let body = serde_json::to_value(&req).unwrap();
        for field in [
            "model",
            "prompt",
            "temperature",
            "max_tokens",
            "top_p",
            "frequency_penalty",
            "presence_penalty",
            "stop",
        ] {
            assert!(body.get(field).is_some(), "missing field {}", field);
        }
    }
}
