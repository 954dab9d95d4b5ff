//! services/api/src/adapters/embeddings.rs
//!
//! This module contains the adapter for the hosted sentence-embedding model.
//! It implements the `EmbeddingService` port from the `core` crate.

use async_openai::{config::OpenAIConfig, types::CreateEmbeddingRequestArgs, Client};
use async_trait::async_trait;
use docchat_core::ports::{EmbeddingService, PortError, PortResult};
use tracing::debug;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An adapter that implements `EmbeddingService` using an OpenAI-compatible embeddings API.
///
/// The client is shared read-only across requests; inference happens remotely.
#[derive(Clone)]
pub struct OpenAiEmbeddingAdapter {
    client: Client<OpenAIConfig>,
    model: String,
    batch_size: usize,
}

impl OpenAiEmbeddingAdapter {
    /// Creates a new `OpenAiEmbeddingAdapter`.
    pub fn new(client: Client<OpenAIConfig>, model: String, batch_size: usize) -> Self {
        Self {
            client,
            model,
            batch_size: batch_size.max(1),
        }
    }
}

fn unavailable(e: impl ToString) -> PortError {
    PortError::EmbeddingUnavailable(e.to_string())
}

//=========================================================================================
// `EmbeddingService` Trait Implementation
//=========================================================================================

#[async_trait]
impl EmbeddingService for OpenAiEmbeddingAdapter {
    async fn embed(&self, texts: &[String]) -> PortResult<Vec<Vec<f32>>> {
        let mut vectors = Vec::with_capacity(texts.len());

        for batch in texts.chunks(self.batch_size) {
            let request = CreateEmbeddingRequestArgs::default()
                .model(&self.model)
                .input(batch.to_vec())
                .build()
                .map_err(unavailable)?;

            let response = self
                .client
                .embeddings()
                .create(request)
                .await
                .map_err(unavailable)?;

            if response.data.len() != batch.len() {
                return Err(unavailable(format!(
                    "expected {} embeddings, received {}",
                    batch.len(),
                    response.data.len()
                )));
            }

            // The API does not promise to answer in input order.
            let mut data = response.data;
            data.sort_by_key(|e| e.index);
            vectors.extend(data.into_iter().map(|e| e.embedding));
        }

        debug!(count = vectors.len(), model = %self.model, "Embedded texts");
        Ok(vectors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn adapter(server: &MockServer, batch_size: usize) -> OpenAiEmbeddingAdapter {
        let config = OpenAIConfig::new()
            .with_api_key("test-key")
            .with_api_base(server.uri());
        OpenAiEmbeddingAdapter::new(Client::with_config(config), "embed-model".to_string(), batch_size)
    }

    fn embedding_response(vectors: &[(u32, Vec<f32>)]) -> serde_json::Value {
        json!({
            "object": "list",
            "model": "embed-model",
            "data": vectors
                .iter()
                .map(|(index, embedding)| json!({
                    "object": "embedding",
                    "index": index,
                    "embedding": embedding
                }))
                .collect::<Vec<_>>(),
            "usage": { "prompt_tokens": 3, "total_tokens": 3 }
        })
    }

    #[tokio::test]
    async fn restores_input_order_from_indices() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({ "model": "embed-model", "input": ["first", "second"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(&[
                (1, vec![0.0, 1.0]),
                (0, vec![1.0, 0.0]),
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let vectors = adapter(&server, 16)
            .embed(&["first".to_string(), "second".to_string()])
            .await
            .unwrap();
        assert_eq!(vectors, vec![vec![1.0, 0.0], vec![0.0, 1.0]]);
    }

    #[tokio::test]
    async fn splits_large_inputs_into_batches() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({ "input": ["a", "b"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(&[
                (0, vec![1.0]),
                (1, vec![2.0]),
            ])))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .and(body_partial_json(json!({ "input": ["c"] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(&[(0, vec![3.0])])))
            .expect(1)
            .mount(&server)
            .await;

        let texts: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let vectors = adapter(&server, 2).embed(&texts).await.unwrap();
        assert_eq!(vectors, vec![vec![1.0], vec![2.0], vec![3.0]]);
    }

    #[tokio::test]
    async fn short_response_is_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(200).set_body_json(embedding_response(&[(0, vec![1.0])])))
            .mount(&server)
            .await;

        let texts = vec!["a".to_string(), "b".to_string()];
        let err = adapter(&server, 8).embed(&texts).await.unwrap_err();
        assert_eq!(err.kind(), "embedding_unavailable");
    }

    #[tokio::test]
    async fn rejected_requests_are_unavailable() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/embeddings"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": {
                    "message": "Incorrect API key provided",
                    "type": "invalid_request_error",
                    "param": null,
                    "code": "invalid_api_key"
                }
            })))
            .mount(&server)
            .await;

        let err = adapter(&server, 8).embed(&["a".to_string()]).await.unwrap_err();
        assert!(matches!(err, PortError::EmbeddingUnavailable(_)));
    }
}
