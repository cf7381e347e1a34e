//! Captcha solver collaborator (capsolver wire contract).
//!
//! Submission/poll protocol: `createTask` returns a task id, `getTaskResult`
//! is polled until the task reports `ready` or `failed`. The caller decides
//! how long it is willing to wait; this client polls indefinitely.

use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

use crate::config::CaptchaConfig;
use crate::error::{BotError, Result};

#[derive(Debug, Deserialize)]
struct CreateTaskResponse {
    #[serde(rename = "errorId", default)]
    error_id: i64,
    #[serde(rename = "taskId")]
    task_id: Option<String>,
    #[serde(rename = "errorDescription")]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TaskResultResponse {
    #[serde(rename = "errorId", default)]
    error_id: i64,
    status: Option<String>,
    solution: Option<CaptchaSolution>,
    #[serde(rename = "errorDescription")]
    error_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CaptchaSolution {
    #[serde(rename = "gRecaptchaResponse")]
    g_recaptcha_response: Option<String>,
}

/// Client for the external captcha solving service
#[derive(Clone)]
pub struct CaptchaSolver {
    http: Client,
    config: CaptchaConfig,
}

impl CaptchaSolver {
    pub fn new(config: CaptchaConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()?;

        Ok(Self { http, config })
    }

    /// Solve one reCAPTCHA v3 challenge for the configured page.
    ///
    /// Polls until the solver reports a terminal status; a `failed` status or
    /// a non-zero error id surfaces as a `Captcha` error.
    pub async fn solve(&self) -> Result<String> {
        let task_id = self.create_task().await?;
        debug!(task_id = %task_id, "captcha task submitted");

        loop {
            sleep(Duration::from_secs(self.config.poll_interval_secs)).await;

            let result: TaskResultResponse = self
                .http
                .post(format!("{}/getTaskResult", self.config.base_url))
                .json(&json!({
                    "clientKey": self.config.api_key,
                    "taskId": task_id,
                }))
                .send()
                .await?
                .json()
                .await?;

            if result.error_id != 0 || result.status.as_deref() == Some("failed") {
                let reason = result
                    .error_description
                    .unwrap_or_else(|| "solver reported failure".to_string());
                warn!(task_id = %task_id, %reason, "captcha solve failed");
                return Err(BotError::Captcha(reason));
            }

            if result.status.as_deref() == Some("ready") {
                return result
                    .solution
                    .and_then(|s| s.g_recaptcha_response)
                    .ok_or_else(|| {
                        BotError::Captcha("ready result carried no solution".to_string())
                    });
            }
        }
    }

    async fn create_task(&self) -> Result<String> {
        let payload = json!({
            "clientKey": self.config.api_key,
            "task": {
                "type": "ReCaptchaV3TaskProxyLess",
                "websiteKey": self.config.site_key,
                "websiteURL": self.config.page_url,
                "pageAction": self.config.action,
            }
        });

        let response: CreateTaskResponse = self
            .http
            .post(format!("{}/createTask", self.config.base_url))
            .json(&payload)
            .send()
            .await?
            .json()
            .await?;

        if response.error_id != 0 {
            return Err(BotError::Captcha(
                response
                    .error_description
                    .unwrap_or_else(|| "task creation rejected".to_string()),
            ));
        }

        response
            .task_id
            .ok_or_else(|| BotError::Captcha("no task id in create response".to_string()))
    }
}
