// src/trigger.rs

//! Manual crawl trigger.
//!
//! Maps orchestrator results onto status-coded responses: success is 200,
//! an unknown source is a client error (400), anything else is a server
//! error (500) carrying the diagnostic text.

use serde::Serialize;

use crate::error::AppError;
use crate::pipeline::CrawlOrchestrator;

pub const OK: u16 = 200;
pub const BAD_REQUEST: u16 = 400;
pub const INTERNAL_ERROR: u16 = 500;

/// Error payload for a failed trigger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ErrorResponse {
    pub status: u16,
    pub code: String,
    pub message: String,
}

impl From<&AppError> for ErrorResponse {
    fn from(error: &AppError) -> Self {
        let status = if error.is_client_error() {
            BAD_REQUEST
        } else {
            INTERNAL_ERROR
        };
        Self {
            status,
            code: error.code().to_string(),
            message: error.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TriggerBody {
    Message(String),
    Sources(Vec<String>),
    Error(ErrorResponse),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TriggerResponse {
    pub status: u16,
    pub body: TriggerBody,
}

impl TriggerResponse {
    fn ok(message: String) -> Self {
        Self {
            status: OK,
            body: TriggerBody::Message(message),
        }
    }

    fn error(error: &AppError) -> Self {
        let body = ErrorResponse::from(error);
        Self {
            status: body.status,
            body: TriggerBody::Error(body),
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == OK
    }
}

/// `POST /crawl/all`
pub async fn crawl_all(orchestrator: &CrawlOrchestrator) -> TriggerResponse {
    match orchestrator.crawl_all().await {
        Ok(summary) => {
            let failed = summary.failed();
            let mut message = format!(
                "Crawled {} sources, {} new posts",
                summary.succeeded(),
                summary.persisted_total()
            );
            if !failed.is_empty() {
                let names: Vec<&str> = failed.iter().map(|r| r.source.as_str()).collect();
                message.push_str(&format!(" ({} failed: {})", failed.len(), names.join(", ")));
            }
            TriggerResponse::ok(message)
        }
        Err(e) => {
            log::error!("Manual crawl failed: {e}");
            TriggerResponse::error(&e)
        }
    }
}

/// `POST /crawl/source?name=X`
pub async fn crawl_source(orchestrator: &CrawlOrchestrator, name: &str) -> TriggerResponse {
    match orchestrator.crawl_by_source(name).await {
        Ok(report) => {
            TriggerResponse::ok(format!("Crawled {name}, {} new posts", report.persisted()))
        }
        Err(e) => TriggerResponse::error(&e),
    }
}

/// `GET /crawl/sources`
pub fn sources(orchestrator: &CrawlOrchestrator) -> TriggerResponse {
    TriggerResponse {
        status: OK,
        body: TriggerBody::Sources(orchestrator.available_sources()),
    }
}
