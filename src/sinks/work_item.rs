use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use log::{info, warn};
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{Method, Url};
use serde::Serialize;
use serde_json::Value;
use std::time::Duration;

use super::Sink;
use crate::config::{HttpMethod, WorkItemConfig};
use crate::error::SinkError;
use crate::format::FormattedAlert;

const JSON_PATCH: &str = "application/json-patch+json";
const MAX_TITLE_CHARS: usize = 255;
const MAX_ERROR_BODY_CHARS: usize = 512;

/// Creates Azure DevOps work items through the REST API.
pub struct WorkItemSink {
    client: reqwest::Client,
    url: Url,
    method: Method,
    authorization: String,
    tag_with_alert_id: bool,
}

#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct PatchOperation {
    pub op: &'static str,
    pub path: &'static str,
    pub value: String,
}

impl WorkItemSink {
    pub fn new(config: &WorkItemConfig) -> Result<Self, SinkError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            url: endpoint(config)?,
            method: match config.method {
                HttpMethod::Post => Method::POST,
                HttpMethod::Patch => Method::PATCH,
            },
            authorization: basic_auth(&config.personal_access_token),
            tag_with_alert_id: config.tag_with_alert_id,
        })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    pub fn patch_document(&self, alert: &FormattedAlert) -> Vec<PatchOperation> {
        let mut ops = vec![
            PatchOperation {
                op: "add",
                path: "/fields/System.Title",
                value: truncate_chars(&alert.full_title(), MAX_TITLE_CHARS),
            },
            PatchOperation {
                op: "add",
                path: "/fields/System.Description",
                value: alert.html_fragment(),
            },
        ];
        if self.tag_with_alert_id {
            ops.push(PatchOperation {
                op: "add",
                path: "/fields/System.Tags",
                value: alert.alert_id.clone(),
            });
        }
        ops
    }
}

#[async_trait]
impl Sink for WorkItemSink {
    fn name(&self) -> &'static str {
        "work_item"
    }

    async fn deliver(&self, alert: &FormattedAlert) -> Result<(), SinkError> {
        let response = self
            .client
            .request(self.method.clone(), self.url.clone())
            .header(CONTENT_TYPE, JSON_PATCH)
            .header(AUTHORIZATION, &self.authorization)
            .json(&self.patch_document(alert))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SinkError::UnexpectedStatus {
                status: status.as_u16(),
                body: truncate_chars(&body, MAX_ERROR_BODY_CHARS),
            });
        }

        match response.json::<Value>().await {
            Ok(body) => info!(
                "Work item {} created for alert {}",
                body.get("id").map(Value::to_string).unwrap_or_else(|| "?".to_string()),
                alert.alert_id
            ),
            Err(e) => warn!(
                "Work item created for alert {} but response was not JSON: {}",
                alert.alert_id, e
            ),
        }
        Ok(())
    }
}

/// `{base}/{org}/{project}/_apis/wit/workitems/${type}?api-version={version}`
pub fn endpoint(config: &WorkItemConfig) -> Result<Url, SinkError> {
    let mut url = Url::parse(&config.base_url)
        .map_err(|e| SinkError::Config(format!("invalid base_url {:?}: {}", config.base_url, e)))?;

    url.path_segments_mut()
        .map_err(|_| {
            SinkError::Config(format!("base_url {:?} cannot be a base", config.base_url))
        })?
        .pop_if_empty()
        .extend([
            config.organization.as_str(),
            config.project.as_str(),
            "_apis",
            "wit",
            "workitems",
            &format!("${}", config.work_item_type),
        ]);
    url.query_pairs_mut()
        .append_pair("api-version", &config.api_version);

    Ok(url)
}

fn basic_auth(token: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!(":{}", token)))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((idx, _)) => text[..idx].to_string(),
        None => text.to_string(),
    }
}
