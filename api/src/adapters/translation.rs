//! Comment translation and moderation

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};

use crate::domain::entities::Language;
use crate::domain::ports::{ContentModerator, Translator};
use crate::error::DomainError;

/// Translation through a JSON endpoint taking `{text, target}`
pub struct HttpTranslator {
    http: Client,
    url: Option<String>,
}

#[derive(Serialize)]
struct TranslateRequest<'a> {
    text: &'a str,
    target: String,
}

#[derive(Deserialize)]
struct TranslateResponse {
    text: String,
}

impl HttpTranslator {
    pub fn new(url: Option<String>) -> Self {
        Self {
            http: Client::builder()
                .timeout(Duration::from_secs(15))
                .build()
                .unwrap_or_default(),
            url,
        }
    }
}

#[async_trait]
impl Translator for HttpTranslator {
    async fn translate(&self, text: &str, target: Language) -> Result<String, DomainError> {
        let Some(url) = &self.url else {
            return Err(DomainError::external("translate", "translation is not configured"));
        };

        let resp = self
            .http
            .post(url)
            .json(&TranslateRequest {
                text,
                target: target.to_string(),
            })
            .send()
            .await
            .map_err(|e| DomainError::external("translate", e))?;

        if !resp.status().is_success() {
            return Err(DomainError::external(
                "translate",
                format!("translator returned {}", resp.status()),
            ));
        }

        let body: TranslateResponse = resp
            .json()
            .await
            .map_err(|e| DomainError::external("translate", e))?;
        Ok(body.text)
    }
}

/// Accepts every comment
pub struct PassThroughModerator;

#[async_trait]
impl ContentModerator for PassThroughModerator {
    async fn check(&self, _text: &str) -> Result<(), DomainError> {
        Ok(())
    }
}
