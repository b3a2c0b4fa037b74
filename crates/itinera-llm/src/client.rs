use crate::prompt::CompletionRequest;
use log::{debug, info};
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;

pub const COMPLETIONS_URL: &str = "https://api.openai.com/v1/completions";

#[derive(Error, Debug)]
pub enum GenerationError {
    #[error("no completion API key configured")]
    MissingKey,
    #[error("completion request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("completion response contained no choices")]
    NoChoices,
}

/// Anything that can turn a completion request into raw text.
pub trait TextGenerator {
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError>;
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}

/// Blocking client for an OpenAI-compatible `/v1/completions` endpoint.
pub struct OpenAiClient {
    http: reqwest::blocking::Client,
    api_key: String,
    endpoint: String,
}

impl OpenAiClient {
    /// `timeout` of `None` leaves requests unbounded.
    pub fn new(api_key: &str, timeout: Option<Duration>) -> Result<Self, GenerationError> {
        if api_key.trim().is_empty() {
            return Err(GenerationError::MissingKey);
        }
        let http = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .build()?;
        Ok(Self {
            http,
            api_key: api_key.trim().to_string(),
            endpoint: COMPLETIONS_URL.to_string(),
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

impl TextGenerator for OpenAiClient {
    fn complete(&self, request: &CompletionRequest) -> Result<String, GenerationError> {
        info!(
            "Requesting itinerary completion — model={} endpoint={}",
            request.model, self.endpoint
        );
        let response: CompletionResponse = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()?
            .error_for_status()?
            .json()?;

        let text = response
            .choices
            .into_iter()
            .next()
            .map(|c| c.text)
            .ok_or(GenerationError::NoChoices)?;
        debug!("Completion received — chars={}", text.len());
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prompt::ItineraryPrompt;
    use std::io::{Read, Write};
    use std::net::TcpListener;
    use std::thread::JoinHandle;

    /// Answers one request with `status` and `body`; the handle yields the raw request.
    fn serve_once(status: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base = format!("http://{}", listener.local_addr().unwrap());
        let handle = std::thread::spawn(move || {
            let (mut stream, _) = listener.accept().unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 1024];
            loop {
                let n = stream.read(&mut buf).unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let content_length = text[..head_end]
                        .lines()
                        .filter_map(|l| l.split_once(':'))
                        .find(|(k, _)| k.trim().eq_ignore_ascii_case("content-length"))
                        .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                        .unwrap_or(0);
                    if raw.len() >= head_end + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
                status,
                body.len(),
                body
            );
            stream.write_all(response.as_bytes()).unwrap();
            String::from_utf8_lossy(&raw).into_owned()
        });
        (base, handle)
    }

    fn lisbon_porto() -> CompletionRequest {
        CompletionRequest::for_itinerary(
            "text-davinci-003",
            &ItineraryPrompt::new("Portugal", "Lisbon", "Porto", 3),
        )
    }

    #[test]
    fn test_complete_over_http() {
        let (base, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"text":"\n[Lisbon, Coimbra, Porto]"},{"text":"ignored"}]}"#,
        );
        let client = OpenAiClient::new("sk-test", None)
            .unwrap()
            .with_endpoint(format!("{}/v1/completions", base));

        let text = client.complete(&lisbon_porto()).unwrap();
        assert_eq!(text, "\n[Lisbon, Coimbra, Porto]");

        let request = server.join().unwrap();
        let (head, body) = request.split_once("\r\n\r\n").unwrap();
        assert_eq!(head.lines().next().unwrap(), "POST /v1/completions HTTP/1.1");
        assert!(head
            .lines()
            .any(|l| l.eq_ignore_ascii_case("authorization: Bearer sk-test")));

        let sent: serde_json::Value = serde_json::from_str(body).unwrap();
        assert_eq!(sent["model"], "text-davinci-003");
        assert!((sent["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert_eq!(sent["max_tokens"], 150);
        assert_eq!(sent["stop"], serde_json::json!([" Human:", " AI:"]));
        assert!(sent["prompt"].as_str().unwrap().contains("Lisbon"));
    }

    #[test]
    fn test_complete_without_choices() {
        let (base, server) = serve_once("200 OK", r#"{"choices": []}"#);
        let client = OpenAiClient::new("sk-test", None)
            .unwrap()
            .with_endpoint(format!("{}/v1/completions", base));

        assert!(matches!(
            client.complete(&lisbon_porto()),
            Err(GenerationError::NoChoices)
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_complete_http_error() {
        let (base, server) = serve_once("429 Too Many Requests", r#"{"error": {}}"#);
        let client = OpenAiClient::new("sk-test", None)
            .unwrap()
            .with_endpoint(format!("{}/v1/completions", base));

        assert!(matches!(
            client.complete(&lisbon_porto()),
            Err(GenerationError::Http(_))
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_blank_key_is_rejected() {
        assert!(matches!(
            OpenAiClient::new("   ", None),
            Err(GenerationError::MissingKey)
        ));
    }

    #[test]
    fn test_response_first_choice() {
        let raw = r#"{"id":"cmpl-1","choices":[{"text":"\n[Lisbon, Porto]","index":0},{"text":"other"}]}"#;
        let parsed: CompletionResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parsed.choices[0].text, "\n[Lisbon, Porto]");
    }

    #[test]
    fn test_response_without_choices() {
        let parsed: CompletionResponse = serde_json::from_str(r#"{"id":"x"}"#).unwrap();
        assert!(parsed.choices.is_empty());
    }
}
