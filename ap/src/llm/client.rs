//! LlmClient trait definition

use async_trait::async_trait;

use super::{CompletionRequest, CompletionResponse, LlmError};

/// Stateless LLM client - each call is independent (fresh context)
///
/// The planner never keeps a conversation open: every proposal or estimate
/// is a single self-contained request, so a client can be shared freely
/// between concurrent scoring tasks.
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Send a single completion request (blocking until complete)
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError>;
}

#[cfg(test)]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tracing::debug;

    /// Mock LLM client for unit tests
    ///
    /// Replays scripted results in order and records every request it saw.
    pub struct MockLlmClient {
        responses: Mutex<VecDeque<Result<CompletionResponse, LlmError>>>,
        requests: Mutex<Vec<CompletionRequest>>,
        call_count: AtomicUsize,
    }

    impl MockLlmClient {
        pub fn new(responses: Vec<Result<CompletionResponse, LlmError>>) -> Self {
            debug!(response_count = %responses.len(), "MockLlmClient::new: called");
            Self {
                responses: Mutex::new(responses.into()),
                requests: Mutex::new(Vec::new()),
                call_count: AtomicUsize::new(0),
            }
        }

        /// Convenience: every scripted response is plain text
        pub fn texts(texts: &[&str]) -> Self {
            Self::new(texts.iter().map(|t| Ok(CompletionResponse::text(*t))).collect())
        }

        pub fn call_count(&self) -> usize {
            self.call_count.load(Ordering::SeqCst)
        }

        pub fn requests(&self) -> Vec<CompletionRequest> {
            self.requests.lock().map(|r| r.clone()).unwrap_or_default()
        }
    }

    #[async_trait]
    impl LlmClient for MockLlmClient {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, LlmError> {
            debug!("MockLlmClient::complete: called");
            let idx = self.call_count.fetch_add(1, Ordering::SeqCst);
            debug!(%idx, "MockLlmClient::complete: fetching response");
            if let Ok(mut requests) = self.requests.lock() {
                requests.push(request);
            }
            let next = self.responses.lock().ok().and_then(|mut r| r.pop_front());
            next.unwrap_or_else(|| {
                debug!("MockLlmClient::complete: no more mock responses");
                Err(LlmError::unavailable("No more mock responses"))
            })
        }
    }

    #[cfg(test)]
    mod tests {
        use super::*;

        #[tokio::test]
        async fn test_mock_client_returns_responses() {
            let client = MockLlmClient::texts(&["Response 1", "Response 2"]);
            let req = CompletionRequest::single("Test", "hello", 1000);

            let resp1 = client.complete(req.clone()).await.unwrap();
            assert_eq!(resp1.content, Some("Response 1".to_string()));

            let resp2 = client.complete(req.clone()).await.unwrap();
            assert_eq!(resp2.content, Some("Response 2".to_string()));

            assert_eq!(client.call_count(), 2);
            assert_eq!(client.requests().len(), 2);
        }

        #[tokio::test]
        async fn test_mock_client_errors_when_exhausted() {
            let client = MockLlmClient::new(vec![]);
            let result = client.complete(CompletionRequest::single("Test", "hello", 10)).await;
            assert!(matches!(result, Err(LlmError::Unavailable { .. })));
        }

        #[tokio::test]
        async fn test_mock_client_replays_errors() {
            let client = MockLlmClient::new(vec![Err(LlmError::Malformed("junk".to_string()))]);
            let result = client.complete(CompletionRequest::single("Test", "hello", 10)).await;
            assert!(matches!(result, Err(LlmError::Malformed(_))));
        }
    }
}
