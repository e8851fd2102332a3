use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};
use url::Url;

use crate::{template::Template, util::wrap_text};

const ENDPOINT: &str = "generateTestData";
const DETAIL_WIDTH: usize = 75;

#[derive(Debug, Error)]
pub enum SubmissionError {
    #[error("invalid generation service URL '{url}': {message}")]
    InvalidBaseUrl { url: String, message: String },
    #[error("Unable to reach the generation service at {target}: {message}")]
    Transport { target: String, message: String },
    #[error("{}, {}:\n{}", .kind, .title, wrap_text(.detail, DETAIL_WIDTH))]
    Service {
        kind: String,
        title: String,
        detail: String,
    },
    #[error(
        "Exception occured during the events generation, Error : {status} {body}\nPlease save/export the InputTemplate and/or Design data for further validations"
    )]
    Unknown { status: u16, body: String },
}

/// Problem-detail body returned by the service on validation failures.
#[derive(Debug, Deserialize)]
struct ProblemDetail {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    title: Option<String>,
    detail: String,
}

/// Classify a non-success response body.
pub fn classify_failure(status: u16, body: &str) -> SubmissionError {
    match serde_json::from_str::<ProblemDetail>(body) {
        Ok(problem) => SubmissionError::Service {
            kind: problem.kind,
            title: problem.title.unwrap_or_default(),
            detail: problem.detail,
        },
        Err(_) => SubmissionError::Unknown {
            status,
            body: body.to_string(),
        },
    }
}

/// Client for the external test-data generation service.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    http: reqwest::Client,
    endpoint: Url,
}

impl GenerationClient {
    /// `base` is the service root, e.g. `http://localhost:8080/api`.
    pub fn new(base: &str) -> Result<Self, SubmissionError> {
        let invalid = |message: String| SubmissionError::InvalidBaseUrl {
            url: base.to_string(),
            message,
        };
        let mut root = Url::parse(base).map_err(|e| invalid(e.to_string()))?;
        if !root.path().ends_with('/') {
            let path = format!("{}/", root.path());
            root.set_path(&path);
        }
        let endpoint = root.join(ENDPOINT).map_err(|e| invalid(e.to_string()))?;
        Ok(GenerationClient {
            http: reqwest::Client::new(),
            endpoint,
        })
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    /// Post `template` and return the raw response body of a successful generation.
    pub async fn submit(&self, template: &Template) -> Result<String, SubmissionError> {
        let target = self.endpoint.to_string();
        let transport = |e: reqwest::Error| SubmissionError::Transport {
            target: target.clone(),
            message: e.to_string(),
        };
        info!(endpoint = %self.endpoint, events = template.events.len(), "submitting template");

        let response = self
            .http
            .post(self.endpoint.clone())
            .json(template)
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        debug!(%status, bytes = body.len(), "generation service responded");

        if status.is_success() {
            Ok(body)
        } else {
            Err(classify_failure(status.as_u16(), &body))
        }
    }
}
