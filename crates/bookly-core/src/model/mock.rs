//! Scripted model for tests.
//!
//! Responses are served in the order given, then the final response
//! repeats for any further calls. An optional delay simulates slow
//! models for timeout tests.

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use super::{EntityModel, ModelError, ModelSpan};

#[derive(Debug, Clone)]
pub enum MockResponse {
    Spans(Vec<ModelSpan>),
    Unavailable(String),
    Invalid(String),
}

pub struct MockModel {
    name: String,
    responses: Mutex<Vec<MockResponse>>,
    fallback: MockResponse,
    delay: Option<Duration>,
    max_window: usize,
    availability_error: Option<String>,
    call_count: AtomicUsize,
}

impl MockModel {
    pub fn new(name: &str, response: MockResponse) -> Self {
        Self {
            name: name.to_string(),
            responses: Mutex::new(Vec::new()),
            fallback: response,
            delay: None,
            max_window: 64 * 1024,
            availability_error: None,
            call_count: AtomicUsize::new(0),
        }
    }

    /// Serve the given responses in order, repeating the last one once
    /// the script runs out.
    pub fn with_sequence(name: &str, mut responses: Vec<MockResponse>) -> Self {
        assert!(!responses.is_empty(), "sequence must not be empty");
        let fallback = responses
            .last()
            .cloned()
            .unwrap_or(MockResponse::Spans(Vec::new()));
        responses.reverse();
        Self {
            name: name.to_string(),
            responses: Mutex::new(responses),
            fallback,
            delay: None,
            max_window: 64 * 1024,
            availability_error: None,
            call_count: AtomicUsize::new(0),
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn with_max_window(mut self, bytes: usize) -> Self {
        self.max_window = bytes.max(1);
        self
    }

    /// Make `availability()` fail with the given reason.
    pub fn with_availability_error(mut self, reason: &str) -> Self {
        self.availability_error = Some(reason.to_string());
        self
    }

    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::SeqCst)
    }

    fn next_response(&self) -> MockResponse {
        let mut responses = self.responses.lock().unwrap();
        responses.pop().unwrap_or_else(|| self.fallback.clone())
    }
}

impl EntityModel for MockModel {
    fn name(&self) -> &str {
        &self.name
    }

    fn max_window(&self) -> usize {
        self.max_window
    }

    fn annotate<'a>(
        &'a self,
        _text: &'a str,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<ModelSpan>, ModelError>> + Send + 'a>> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        let response = self.next_response();
        let delay = self.delay;
        Box::pin(async move {
            if let Some(d) = delay {
                tokio::time::sleep(d).await;
            }
            match response {
                MockResponse::Spans(spans) => Ok(spans),
                MockResponse::Unavailable(reason) => Err(ModelError::Unavailable { reason }),
                MockResponse::Invalid(reason) => Err(ModelError::Invalid { reason }),
            }
        })
    }

    fn availability<'a>(
        &'a self,
    ) -> Pin<Box<dyn Future<Output = Result<(), ModelError>> + Send + 'a>> {
        let error = self.availability_error.clone();
        Box::pin(async move {
            match error {
                Some(reason) => Err(ModelError::Unavailable { reason }),
                None => Ok(()),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::EntityKind;

    #[tokio::test]
    async fn serves_sequence_then_repeats_last() {
        let span = ModelSpan {
            start: 0,
            end: 4,
            kind: EntityKind::Person,
        };
        let model = MockModel::with_sequence(
            "seq",
            vec![
                MockResponse::Spans(vec![span.clone()]),
                MockResponse::Spans(Vec::new()),
            ],
        );
        assert_eq!(model.annotate("text").await.unwrap(), vec![span]);
        assert_eq!(model.annotate("text").await.unwrap(), Vec::new());
        assert_eq!(model.annotate("text").await.unwrap(), Vec::new());
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn availability_error_reports_unavailable() {
        let model = MockModel::new("down", MockResponse::Spans(Vec::new()))
            .with_availability_error("connection refused");
        let err = model.availability().await.unwrap_err();
        assert!(matches!(err, ModelError::Unavailable { ref reason } if reason == "connection refused"));
    }

    #[tokio::test]
    async fn scripted_errors_surface() {
        let model = MockModel::new("bad", MockResponse::Invalid("garbage".to_string()));
        assert!(matches!(
            model.annotate("x").await,
            Err(ModelError::Invalid { .. })
        ));
    }
}
