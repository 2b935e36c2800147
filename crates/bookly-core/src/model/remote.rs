//! HTTP annotation server client.
//!
//! Wire format: `POST {base}/annotate` with `{"text": "..."}` returns
//! `{"entities": [{"start": 0, "end": 4, "label": "PERSON"}]}` where the
//! offsets are bytes into the submitted text. `GET {base}/health` must
//! answer 2xx for the model to count as available.

use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

use super::{EntityKind, EntityModel, ModelError, ModelSpan};

const DEFAULT_MAX_WINDOW: usize = 8 * 1024;
const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

pub struct RemoteModel {
    base_url: String,
    client: reqwest::Client,
    max_window: usize,
    request_timeout: Duration,
}

impl RemoteModel {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            base_url,
            client: reqwest::Client::new(),
            max_window: DEFAULT_MAX_WINDOW,
            request_timeout: DEFAULT_REQUEST_TIMEOUT,
        }
    }

    /// Largest text window to send per request, in bytes.
    pub fn with_max_window(mut self, bytes: usize) -> Self {
        self.max_window = bytes.max(1);
        self
    }

    /// Timeout for a single HTTP request. The pipeline applies its own
    /// per-call deadline on top of this.
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl EntityModel for RemoteModel {
    fn name(&self) -> &str {
        "remote"
    }

    fn max_window(&self) -> usize {
        self.max_window
    }

    fn annotate<'a>(
        &'a self,
        text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ModelSpan>, ModelError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/annotate", self.base_url);
            let resp = self
                .client
                .post(&url)
                .json(&serde_json::json!({ "text": text }))
                .timeout(self.request_timeout)
                .send()
                .await
                .map_err(|e| ModelError::Unavailable { reason: e.to_string() })?;

            let status = resp.status();
            if status.as_u16() == 429 || status.is_server_error() {
                return Err(ModelError::Unavailable {
                    reason: format!("HTTP {status}"),
                });
            }
            if !status.is_success() {
                return Err(ModelError::Invalid {
                    reason: format!("HTTP {status}"),
                });
            }

            let data: serde_json::Value = resp.json().await.map_err(|e| ModelError::Invalid {
                reason: e.to_string(),
            })?;
            parse_entities(&data)
        })
    }

    fn availability<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), ModelError>> + Send + 'a>> {
        Box::pin(async move {
            let url = format!("{}/health", self.base_url);
            let resp = self
                .client
                .get(&url)
                .timeout(self.request_timeout)
                .send()
                .await
                .map_err(|e| ModelError::Unavailable {
                    reason: format!("cannot reach {}: {}", self.base_url, e),
                })?;
            if resp.status().is_success() {
                Ok(())
            } else {
                Err(ModelError::Unavailable {
                    reason: format!("health check returned HTTP {}", resp.status()),
                })
            }
        })
    }
}

fn parse_entities(data: &serde_json::Value) -> Result<Vec<ModelSpan>, ModelError> {
    let Some(items) = data["entities"].as_array() else {
        return Err(ModelError::Invalid {
            reason: "response missing 'entities' array".to_string(),
        });
    };
    let mut spans = Vec::with_capacity(items.len());
    for item in items {
        // entries without offsets are skipped, not fatal
        let (Some(start), Some(end)) = (item["start"].as_u64(), item["end"].as_u64()) else {
            tracing::debug!(entity = %item, "skipping entity without offsets");
            continue;
        };
        spans.push(ModelSpan {
            start: start as usize,
            end: end as usize,
            kind: kind_for_label(item["label"].as_str().unwrap_or("")),
        });
    }
    Ok(spans)
}

/// Map server labels onto span kinds. The label set follows the common
/// NER conventions (spaCy-style), anything unknown is kept as `Other`.
fn kind_for_label(label: &str) -> EntityKind {
    match label {
        "PERSON" | "PER" => EntityKind::Person,
        "ORG" => EntityKind::Org,
        "WORK_OF_ART" | "TITLE" => EntityKind::TitleCandidate,
        _ => EntityKind::Other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_entities_with_labels() {
        let data = serde_json::json!({
            "entities": [
                { "start": 0, "end": 8, "label": "PERSON" },
                { "start": 12, "end": 20, "label": "WORK_OF_ART" },
                { "start": 24, "end": 30, "label": "ORG" },
                { "start": 34, "end": 38, "label": "DATE" },
            ]
        });
        let spans = parse_entities(&data).unwrap();
        assert_eq!(spans.len(), 4);
        assert_eq!(spans[0].kind, EntityKind::Person);
        assert_eq!(spans[1].kind, EntityKind::TitleCandidate);
        assert_eq!(spans[2].kind, EntityKind::Org);
        assert_eq!(spans[3].kind, EntityKind::Other);
        assert_eq!(spans[0].start, 0);
        assert_eq!(spans[0].end, 8);
    }

    #[test]
    fn entities_without_offsets_are_skipped() {
        let data = serde_json::json!({
            "entities": [
                { "label": "PERSON" },
                { "start": 2, "end": 6, "label": "PER" },
            ]
        });
        let spans = parse_entities(&data).unwrap();
        assert_eq!(spans.len(), 1);
        assert_eq!(spans[0].kind, EntityKind::Person);
    }

    #[test]
    fn missing_entities_array_is_invalid() {
        let data = serde_json::json!({ "spans": [] });
        assert!(matches!(
            parse_entities(&data),
            Err(ModelError::Invalid { .. })
        ));
    }

    #[test]
    fn trailing_slash_is_trimmed() {
        let model = RemoteModel::new("http://localhost:9000/");
        assert_eq!(model.base_url(), "http://localhost:9000");
    }
}
