// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Itinera contributors

pub mod client;
pub mod parser;
pub mod prompt;

pub use client::{GenerationError, OpenAiClient, TextGenerator};
pub use parser::{parse_city_list, CityList};
pub use prompt::{CompletionRequest, ItineraryPrompt, DEFAULT_MODEL};

/// Asks the model for an itinerary and returns its raw, unvalidated text.
pub fn generate_itinerary(
    generator: &dyn TextGenerator,
    model: &str,
    prompt: &ItineraryPrompt,
) -> Result<String, GenerationError> {
    let request = CompletionRequest::for_itinerary(model, prompt);
    let text = generator.complete(&request)?;
    log::debug!("Raw itinerary completion — text={:?}", text);
    Ok(text)
}

/// Generates and parses in one step.
pub fn generate_city_list(
    generator: &dyn TextGenerator,
    model: &str,
    prompt: &ItineraryPrompt,
) -> Result<CityList, GenerationError> {
    let raw = generate_itinerary(generator, model, prompt)?;
    let list = parse_city_list(&raw);
    if !list.bracketed {
        log::warn!(
            "Completion was not a bracketed list; splitting anyway — cities={}",
            list.len()
        );
    }
    Ok(list)
}
