//! HTTP endpoint check
//!
//! Requests a URL once per run:
//!
//! - transport failure or unexpected status code → run error
//! - body not matching the configured pattern → warning
//!
//! The response time of the last run is kept for inspection.

use std::sync::{Mutex, PoisonError};
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use regex::Regex;
use tracing::{instrument, trace};

use crate::config::{HttpCheckConfig, HttpMethod};

use super::{Check, CheckError, CheckId, SenderStats};

#[derive(Debug, Default)]
struct LastRun {
    warnings: Vec<CheckError>,
    sender_stats: SenderStats,
    response_time: Option<Duration>,
}

pub struct HttpCheck {
    id: CheckId,
    config: HttpCheckConfig,
    body_pattern: Option<Regex>,
    client: reqwest::Client,
    last_run: Mutex<LastRun>,
}

impl HttpCheck {
    pub fn new(config: HttpCheckConfig) -> Result<Self> {
        let body_pattern = config
            .body_pattern
            .as_deref()
            .map(Regex::new)
            .transpose()
            .with_context(|| format!("invalid body pattern for check {}", config.name))?;

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout))
            .build()
            .context("failed to build HTTP client")?;

        Ok(Self {
            id: CheckId::new("http", &config.name),
            config,
            body_pattern,
            client,
            last_run: Mutex::new(LastRun::default()),
        })
    }

    /// Response time of the last run that got a response
    pub fn last_response_time(&self) -> Option<Duration> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .response_time
    }

    /// Returns (status_code, body)
    async fn execute_request(&self) -> Result<(u16, String)> {
        let method = match self.config.method {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
            HttpMethod::Head => reqwest::Method::HEAD,
        };

        let response = self
            .client
            .request(method, &self.config.url)
            .send()
            .await
            .context("HTTP request failed")?;

        let status_code = response.status().as_u16();

        let body = if matches!(self.config.method, HttpMethod::Head) {
            String::new()
        } else {
            response
                .text()
                .await
                .context("failed to read response body")?
        };

        Ok((status_code, body))
    }

    fn status_accepted(&self, status_code: u16) -> bool {
        match &self.config.expected_status {
            Some(expected) => expected.contains(&status_code),
            None => (200..300).contains(&status_code),
        }
    }
}

#[async_trait]
impl Check for HttpCheck {
    fn id(&self) -> CheckId {
        self.id.clone()
    }

    fn name(&self) -> String {
        self.id.group().to_string()
    }

    fn interval(&self) -> Duration {
        Duration::from_secs(self.config.interval)
    }

    #[instrument(skip(self), fields(check = %self.id))]
    async fn run(&self) -> Result<(), CheckError> {
        trace!("checking {}", self.config.url);

        let start = Instant::now();
        let result = self.execute_request().await;
        let response_time = start.elapsed();

        let mut last_run = LastRun::default();

        let outcome = match result {
            Ok((status_code, body)) => {
                last_run.response_time = Some(response_time);
                last_run.sender_stats.metric_samples = 1;

                if let Some(pattern) = &self.body_pattern
                    && !pattern.is_match(&body)
                {
                    last_run.warnings.push(CheckError::new(format!(
                        "response body does not match pattern '{pattern}'"
                    )));
                }

                if self.status_accepted(status_code) {
                    Ok(())
                } else {
                    Err(CheckError::new(format!(
                        "unexpected status code: {status_code}"
                    )))
                }
            }
            Err(e) => Err(CheckError::from(e)),
        };

        *self.last_run.lock().unwrap_or_else(PoisonError::into_inner) = last_run;

        outcome
    }

    fn warnings(&self) -> Vec<CheckError> {
        self.last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .warnings
            .clone()
    }

    fn sender_stats(&self) -> anyhow::Result<SenderStats> {
        Ok(self
            .last_run
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .sender_stats)
    }
}
