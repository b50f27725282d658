//! Single-shot exchange with the completion service.
//!
//! No retries happen here. A failed call is returned to the caller as
//! [`Error::CompletionService`].

use crate::{
    config::{ApiKey, Config},
    error::{Error, Result},
    flatten::FlattenedText,
    prompt::{Prompt, PromptBuilder},
};
use once_cell::sync::OnceCell;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// A text completion backend.
///
/// Implementations must be shareable across threads so one pipeline can
/// serve concurrent requests.
pub trait CompletionService: Send + Sync {
    /// Sends both turns and returns the raw completion text.
    ///
    /// # Errors
    ///
    /// Returns [`Error::CompletionService`] on transport failure, a
    /// non-success status, or an empty completion.
    fn complete(&self, prompt: &Prompt) -> Result<String>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 2],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Debug, Deserialize)]
struct ChatReply {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
}

/// OpenAI-compatible chat-completions client.
///
/// The underlying blocking HTTP client is created on first use, so the
/// value itself may be constructed inside an async runtime.
#[derive(Debug, Clone)]
pub struct OpenAiClient {
    http: OnceCell<Client>,
    timeout: Option<Duration>,
    url: String,
    api_key: ApiKey,
    model: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiClient {
    /// Creates a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if no API key is configured.
    pub fn new(config: &Config) -> Result<Self> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| Error::config("an API key is required for the completion service"))?;

        Ok(Self {
            http: OnceCell::new(),
            timeout: config.request_timeout,
            url: config.completions_url(),
            api_key,
            model: config.model.clone(),
            temperature: config.temperature,
            max_tokens: config.max_output_tokens,
        })
    }

    fn http(&self) -> Result<&Client> {
        // `None` disables reqwest's default 30s timeout.
        self.http.get_or_try_init(|| {
            Client::builder()
                .timeout(self.timeout)
                .build()
                .map_err(Error::from)
        })
    }

    fn request_body<'a>(&'a self, prompt: &'a Prompt) -> ChatRequest<'a> {
        ChatRequest {
            model: &self.model,
            messages: [
                ChatMessage {
                    role: "system",
                    content: &prompt.system,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt.user,
                },
            ],
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        }
    }
}

impl CompletionService for OpenAiClient {
    fn complete(&self, prompt: &Prompt) -> Result<String> {
        let started = Instant::now();
        debug!("Sending completion request to {} (model {})", self.url, self.model);

        let response = self
            .http()?
            .post(&self.url)
            .bearer_auth(self.api_key.expose())
            .json(&self.request_body(prompt))
            .send()?;

        let status = response.status();
        let body = response.text()?;
        debug!(
            "Completion service answered {} in {}ms",
            status,
            started.elapsed().as_millis()
        );

        if !status.is_success() {
            return Err(Error::completion(describe_failure(status, &body)));
        }

        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| Error::completion(format!("unexpected response body: {e}")))?;

        completion_text(parsed)
    }
}

fn describe_failure(status: reqwest::StatusCode, body: &str) -> String {
    match serde_json::from_str::<ApiError>(body) {
        Ok(api_error) => format!("API error ({status}): {}", api_error.error.message),
        Err(_) => format!("API error ({status}): {}", body.trim()),
    }
}

fn completion_text(response: ChatResponse) -> Result<String> {
    let content = response
        .choices
        .into_iter()
        .next()
        .and_then(|choice| choice.message.content)
        .map(|text| text.trim().to_string())
        .unwrap_or_default();

    if content.is_empty() {
        return Err(Error::completion("service returned an empty completion"));
    }

    Ok(content)
}

/// Builds the instruction for a flattened table and obtains its completion.
pub struct ExtractionClient {
    prompts: PromptBuilder,
    service: Box<dyn CompletionService>,
}

impl ExtractionClient {
    /// Creates a client over an arbitrary completion backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt templates fail to load.
    pub fn new(config: &Config, service: Box<dyn CompletionService>) -> Result<Self> {
        Ok(Self {
            prompts: PromptBuilder::new(config)?,
            service,
        })
    }

    /// Returns the prompt that would be sent for `text`.
    ///
    /// # Errors
    ///
    /// Returns an error if template rendering fails.
    pub fn prompt(&self, text: &FlattenedText) -> Result<Prompt> {
        self.prompts.build(text)
    }

    /// Sends the flattened table and returns the raw completion text.
    ///
    /// # Errors
    ///
    /// Returns an error if the prompt cannot be rendered or the service call
    /// fails.
    pub fn extract(&self, text: &FlattenedText) -> Result<String> {
        let prompt = self.prompt(text)?;
        info!(
            "Requesting extraction for {} characters of table text",
            text.char_count()
        );
        self.service.complete(&prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use crate::flatten::Flattener;
    use crate::reader::RawTable;
    use std::io::{BufRead, BufReader, Read, Write};
    use std::net::TcpListener;
    use std::sync::{Arc, Mutex};
    use std::thread;

    struct RecordingService {
        seen: Arc<Mutex<Vec<Prompt>>>,
        reply: String,
    }

    impl CompletionService for RecordingService {
        fn complete(&self, prompt: &Prompt) -> Result<String> {
            self.seen.lock().unwrap().push(prompt.clone());
            Ok(self.reply.clone())
        }
    }

    /// Answers exactly one HTTP request with the given status line and JSON
    /// body, and hands back the raw request it received.
    fn serve_once(status: &'static str, body: &'static str) -> (String, thread::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let base_url = format!("http://{}/v1", listener.local_addr().unwrap());

        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);

            let mut head = String::new();
            let mut content_length = 0;
            loop {
                let mut line = String::new();
                reader.read_line(&mut line).unwrap();
                if let Some((name, value)) = line.split_once(':') {
                    if name.eq_ignore_ascii_case("content-length") {
                        content_length = value.trim().parse().unwrap();
                    }
                }
                head.push_str(&line);
                if line == "\r\n" || line.is_empty() {
                    break;
                }
            }
            let mut payload = vec![0; content_length];
            reader.read_exact(&mut payload).unwrap();

            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let mut stream = reader.into_inner();
            stream.write_all(response.as_bytes()).unwrap();
            stream.flush().unwrap();

            head + &String::from_utf8_lossy(&payload)
        });

        (base_url, handle)
    }

    fn client_for(base_url: &str) -> OpenAiClient {
        let config = Config::builder()
            .api_key("sk-test")
            .api_base_url(base_url)
            .request_timeout(Duration::from_secs(10))
            .build()
            .unwrap();
        OpenAiClient::new(&config).unwrap()
    }

    fn sample_prompt() -> Prompt {
        Prompt {
            system: "sys".to_string(),
            user: "Acme\tX100".to_string(),
        }
    }

    #[test]
    fn test_complete_returns_trimmed_content() {
        let (base_url, server) = serve_once(
            "200 OK",
            r#"{"choices":[{"message":{"role":"assistant","content":"\n[{\"OEM\":\"Acme\"}]\n"}}]}"#,
        );

        let text = client_for(&base_url).complete(&sample_prompt()).unwrap();
        assert_eq!(text, r#"[{"OEM":"Acme"}]"#);

        let request = server.join().unwrap();
        assert!(request.starts_with("POST /v1/chat/completions "));
        assert!(request.to_lowercase().contains("authorization: bearer sk-test"));
        assert!(request.contains(r#""model":"gpt-4o""#));
        assert!(request.contains(r#""content":"Acme\tX100""#));
    }

    #[test]
    fn test_complete_surfaces_api_error_message() {
        let (base_url, server) = serve_once(
            "429 Too Many Requests",
            r#"{"error":{"message":"Rate limit reached for gpt-4o","type":"requests"}}"#,
        );

        let err = client_for(&base_url).complete(&sample_prompt()).unwrap_err();
        server.join().unwrap();

        assert!(err.is_completion());
        let message = err.to_string();
        assert!(message.contains("429"), "{message}");
        assert!(message.contains("Rate limit reached for gpt-4o"), "{message}");
    }

    #[test]
    fn test_complete_transport_failure() {
        let err = client_for("http://127.0.0.1:1/v1")
            .complete(&sample_prompt())
            .unwrap_err();
        assert!(err.is_completion());
        assert_eq!(err.kind(), ErrorKind::CompletionService);
    }

    #[test]
    fn test_client_requires_api_key() {
        let config = Config::builder().build().unwrap();
        let err = OpenAiClient::new(&config).unwrap_err();
        assert!(err.is_config());
    }

    #[test]
    fn test_request_body_shape() {
        let config = Config::builder().api_key("sk-test").build().unwrap();
        let client = OpenAiClient::new(&config).unwrap();
        let prompt = Prompt {
            system: "sys".to_string(),
            user: "usr".to_string(),
        };

        let body = serde_json::to_value(client.request_body(&prompt)).unwrap();

        assert_eq!(body["model"], "gpt-4o");
        assert_eq!(body["max_tokens"], 4000);
        assert!((body["temperature"].as_f64().unwrap() - 0.1).abs() < 1e-6);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "sys");
        assert_eq!(body["messages"][1]["role"], "user");
        assert_eq!(body["messages"][1]["content"], "usr");
    }

    #[test]
    fn test_completion_text_trims() {
        let response: ChatResponse = serde_json::from_str(
            r#"{"choices":[{"message":{"role":"assistant","content":"  [] \n"}}]}"#,
        )
        .unwrap();
        assert_eq!(completion_text(response).unwrap(), "[]");
    }

    #[test]
    fn test_empty_completion_is_error() {
        for body in [
            r#"{"choices":[]}"#,
            r#"{}"#,
            r#"{"choices":[{"message":{"content":null}}]}"#,
            r#"{"choices":[{"message":{"content":"   "}}]}"#,
        ] {
            let response: ChatResponse = serde_json::from_str(body).unwrap();
            let err = completion_text(response).unwrap_err();
            assert!(err.is_completion(), "{body}");
        }
    }

    #[test]
    fn test_describe_failure_uses_api_message() {
        let message = describe_failure(
            reqwest::StatusCode::TOO_MANY_REQUESTS,
            r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#,
        );
        assert!(message.contains("429"));
        assert!(message.contains("Rate limit reached"));

        let message = describe_failure(reqwest::StatusCode::BAD_GATEWAY, "upstream down\n");
        assert!(message.ends_with("upstream down"));
    }

    #[test]
    fn test_extraction_client_sends_table_text() {
        let config = Config::builder().build().unwrap();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let service = RecordingService {
            seen: Arc::clone(&seen),
            reply: "[]".to_string(),
        };
        let table = RawTable::new(vec![vec!["Acme".to_string(), "X100".to_string()]]);
        let text = Flattener::new(&config).flatten(&table);

        let client = ExtractionClient::new(&config, Box::new(service)).unwrap();
        assert_eq!(client.extract(&text).unwrap(), "[]");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].user.contains("Acme\tX100"));
        assert!(seen[0].system.contains("data extraction specialist"));
        assert_eq!(seen[0], client.prompt(&text).unwrap());
    }
}
