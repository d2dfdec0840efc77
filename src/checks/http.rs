// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 stagehand contributors

//! HTTP check
//!
//! GETs a URL and validates the status code and, optionally, the body.

use async_trait::async_trait;
use std::time::Duration;

use super::{Check, CheckError, CheckType, RetryOpts};
use crate::config::PlatformConfig;
use crate::stages::{ContentMatch, HttpCheckSpec};

/// Application name that maps to the bare DNS domain
pub const APEX_APP: &str = "@";

const DEFAULT_RETRY: RetryOpts = RetryOpts::new(0, 5);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP status/content check
pub struct HttpCheck {
    spec: HttpCheckSpec,
}

impl HttpCheck {
    pub fn new(spec: HttpCheckSpec) -> Self {
        Self { spec }
    }

    /// The URL this check requests
    pub fn target_url(&self, config: &PlatformConfig) -> Result<String, CheckError> {
        if let Some(ref url) = self.spec.url {
            return Ok(url.clone());
        }

        let Some(ref app) = self.spec.app else {
            return Err(CheckError::Config("HTTP check needs 'url' or 'app'".into()));
        };
        if config.dns_domain.is_empty() {
            return Err(CheckError::Config(format!(
                "HTTP check for app '{}' needs a dns_domain",
                app
            )));
        }

        let path = self.path();
        if app == APEX_APP {
            Ok(format!("https://{}{}", config.dns_domain, path))
        } else {
            Ok(format!("https://{}.{}{}", app, config.dns_domain, path))
        }
    }

    fn path(&self) -> String {
        match self.spec.path.as_deref() {
            None | Some("") => String::new(),
            Some(p) if p.starts_with('/') => p.to_string(),
            Some(p) => format!("/{}", p),
        }
    }

    fn expected_status(&self) -> Vec<u16> {
        if self.spec.status.is_empty() {
            vec![200]
        } else {
            self.spec.status.clone()
        }
    }

    fn validate_content(&self, url: &str, status: u16, body: &str) -> Result<(), CheckError> {
        let mismatch = |detail: String| CheckError::Content {
            url: url.to_string(),
            status,
            detail,
        };

        match &self.spec.content {
            None => Ok(()),
            Some(ContentMatch::Exact(expected)) => {
                if body == expected {
                    Ok(())
                } else {
                    Err(mismatch(format!("body does not equal '{}'", expected)))
                }
            }
            Some(ContentMatch::Json { key, value }) => {
                let json: serde_json::Value = serde_json::from_str(body)
                    .map_err(|e| mismatch(format!("body is not JSON: {}", e)))?;

                let actual = match json.get(key) {
                    Some(serde_json::Value::String(s)) => s.clone(),
                    Some(other) => other.to_string(),
                    None => return Err(mismatch(format!("key '{}' not present", key))),
                };

                if actual == *value {
                    Ok(())
                } else {
                    Err(mismatch(format!(
                        "key '{}' is '{}', expected '{}'",
                        key, actual, value
                    )))
                }
            }
        }
    }
}

#[async_trait]
impl Check for HttpCheck {
    async fn run(&self, config: &PlatformConfig) -> Result<(), CheckError> {
        let url = self.target_url(config)?;
        let request_error = |e: reqwest::Error| CheckError::Request {
            url: url.clone(),
            message: e.to_string(),
        };

        let client = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.skip_tls_verify)
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(request_error)?;

        let response = client.get(&url).send().await.map_err(request_error)?;
        let status = response.status().as_u16();
        let body = response.text().await.map_err(request_error)?;

        let expected = self.expected_status();
        if !expected.contains(&status) {
            return Err(CheckError::Status {
                url,
                status,
                expected,
            });
        }

        self.validate_content(&url, status, &body)
    }

    fn id(&self) -> String {
        if let Some(ref id) = self.spec.id {
            return id.clone();
        }
        match (&self.spec.url, &self.spec.app) {
            (Some(url), _) => url.clone(),
            (None, Some(app)) => format!("{}{}", app, self.path()),
            (None, None) => "http".to_string(),
        }
    }

    fn check_type(&self) -> CheckType {
        CheckType::Http
    }

    fn retry_opts(&self) -> RetryOpts {
        DEFAULT_RETRY.with_spec(self.spec.retry)
    }
}
