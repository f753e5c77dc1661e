//! Cover letter generation. The pipeline only sees the [`CoverLetterWriter`] trait; the text it
//! returns is stored as-is.

use log::debug;
use reqwest::blocking::Client;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::LlmConfig;
use crate::job::JobRecord;

const SYSTEM_PROMPT: &str =
    "You are a professional cover letter writer. Write concise, personalized cover letters.";

#[derive(Debug, Error)]
pub enum CoverLetterError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("model API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("model returned empty content")]
    EmptyContent,

    #[error("{0}")]
    Other(String),
}

pub trait CoverLetterWriter {
    fn generate(&self, job: &JobRecord, resume: &str) -> Result<String, CoverLetterError>;
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: String,
}

/// Writes letters with a local Ollama model through its `/api/chat` endpoint.
pub struct OllamaWriter {
    client: Client,
    endpoint: String,
    model: String,
}

impl OllamaWriter {
    pub fn new(config: &LlmConfig) -> Result<Self, CoverLetterError> {
        let client = Client::builder().timeout(config.timeout()).build()?;
        Ok(OllamaWriter {
            client,
            endpoint: format!("{}/api/chat", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
        })
    }
}

impl CoverLetterWriter for OllamaWriter {
    fn generate(&self, job: &JobRecord, resume: &str) -> Result<String, CoverLetterError> {
        let prompt = build_prompt(job, resume);
        let request = ChatRequest {
            model: &self.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
            stream: false,
        };

        debug!("Requesting cover letter for '{}' from {}", job.title, self.model);
        let resp = self.client.post(&self.endpoint).json(&request).send()?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().unwrap_or_default();
            return Err(CoverLetterError::Api {
                status: status.as_u16(),
                message,
            });
        }

        let body: ChatResponse = resp.json()?;
        let text = body.message.content.trim();
        if text.is_empty() {
            return Err(CoverLetterError::EmptyContent);
        }
        Ok(text.to_string())
    }
}

pub fn build_prompt(job: &JobRecord, resume: &str) -> String {
    format!(
        "Write a professional, concise cover letter for the following position. \
The letter should be personalized based on the job requirements and the candidate's experience.

CANDIDATE RESUME:
{resume}

JOB POSTING:
Title: {title}
Company: {company}
Description: {description}

REQUIREMENTS:
- Make it 3-4 paragraphs
- Address the hiring manager as \"Dear Hiring Manager\"
- Highlight 2-3 relevant skills from the candidate's resume that match the job
- Show enthusiasm for the role and company
- End with a professional closing
- Keep it under 250 words

Write only the cover letter text, no explanations.",
        resume = resume,
        title = job.title,
        company = job.company,
        description = job.description,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::sample_job;

    #[test]
    fn prompt_carries_job_and_resume() {
        let job = sample_job("l", "Junior Java Developer", "Spring Boot services", &[]);
        let prompt = build_prompt(&job, "SKILLS: Java");
        assert!(prompt.contains("Title: Junior Java Developer"));
        assert!(prompt.contains("Company: TechCorp"));
        assert!(prompt.contains("Description: Spring Boot services"));
        assert!(prompt.contains("SKILLS: Java"));
    }

    #[test]
    fn endpoint_ignores_trailing_slash() {
        let config = LlmConfig {
            base_url: "http://localhost:11434/".to_string(),
            ..LlmConfig::default()
        };
        let writer = OllamaWriter::new(&config).unwrap();
        assert_eq!(writer.endpoint, "http://localhost:11434/api/chat");
    }

    #[test]
    fn chat_request_shape() {
        let request = ChatRequest {
            model: "llama3",
            messages: vec![ChatMessage {
                role: "user",
                content: "hi",
            }],
            stream: false,
        };
        let value = serde_json::to_value(&request).unwrap();
        assert_eq!(
            value,
            serde_json::json!({"model": "llama3", "messages": [{"role": "user", "content": "hi"}], "stream": false})
        );
    }
}
