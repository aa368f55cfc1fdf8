use async_trait::async_trait;
use http::{HeaderMap, HeaderValue};
use reqwest::Client;
use tracing::{error, instrument, trace};
use url::Url;

use crate::context::BraidContext;
use crate::error::FetchError;
use crate::response::execution_request::ExecutionRequest;
use crate::response::execution_result::ExecutionResult;
use crate::source::QueryFunction;

/// POSTs compound queries to a GraphQL endpoint.
#[derive(Debug, Clone)]
pub struct HttpGraphQLRetriever {
    endpoint: Url,
    http_client: Client,
    header_map: HeaderMap,
}

impl HttpGraphQLRetriever {
    pub fn new(endpoint: Url) -> Self {
        let mut header_map = HeaderMap::new();
        header_map.insert(
            http::header::CONTENT_TYPE,
            HeaderValue::from_static("application/json; charset=utf-8"),
        );
        HttpGraphQLRetriever {
            endpoint,
            http_client: Client::new(),
            header_map,
        }
    }

    pub fn with_client(mut self, http_client: Client) -> Self {
        self.http_client = http_client;
        self
    }

    /// Headers sent along with every request, on top of the content type.
    pub fn with_headers(mut self, headers: HeaderMap) -> Self {
        self.header_map.extend(headers);
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    fn transport_error(&self, message: String) -> FetchError {
        FetchError::Transport {
            target: self.endpoint.to_string(),
            message,
        }
    }

    async fn post(&self, request: &ExecutionRequest) -> Result<ExecutionResult, FetchError> {
        trace!("Executing HTTP request to source at {}", self.endpoint);

        let response = self
            .http_client
            .post(self.endpoint.clone())
            .headers(self.header_map.clone())
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(format!("Failed to send request: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(self.transport_error(format!("Unexpected status code {}", status)));
        }

        response
            .json::<ExecutionResult>()
            .await
            .map_err(|e| self.transport_error(format!("Failed to parse response: {}", e)))
    }
}

#[async_trait]
impl QueryFunction for HttpGraphQLRetriever {
    #[instrument(level = "trace", skip_all, name = "http_graphql_query", fields(endpoint = %self.endpoint))]
    async fn query(
        &self,
        request: ExecutionRequest,
        _context: &BraidContext,
    ) -> Result<ExecutionResult, FetchError> {
        self.post(&request).await.inspect_err(|e| {
            error!(error = e as &dyn std::error::Error, "GraphQL source request failed");
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use http::{HeaderMap, HeaderValue};
    use mockito::Matcher;
    use serde_json::json;
    use url::Url;

    use super::HttpGraphQLRetriever;
    use crate::context::BraidContext;
    use crate::error::FetchError;
    use crate::loader::DataLoaderRegistry;
    use crate::response::execution_request::ExecutionRequest;
    use crate::schema::TypeRegistry;
    use crate::source::QueryFunction;

    fn context() -> BraidContext {
        BraidContext::new(
            Arc::new(TypeRegistry::default()),
            DataLoaderRegistry::default(),
        )
    }

    #[tokio::test]
    async fn posts_the_request_as_json() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/graphql")
            .match_header("authorization", "Bearer secret")
            .match_body(Matcher::Json(json!({
                "query": "query Bulk_Foo { foo100: foo { id } }",
                "operationName": "Bulk_Foo",
                "variables": {}
            })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(r#"{"data":{"foo100":{"id":"1"}},"errors":[{"path":["foo100","id"]}]}"#)
            .create_async()
            .await;
        let mut headers = HeaderMap::new();
        headers.insert("authorization", HeaderValue::from_static("Bearer secret"));
        let retriever =
            HttpGraphQLRetriever::new(Url::parse(&format!("{}/graphql", server.url())).unwrap())
                .with_headers(headers);
        let request = ExecutionRequest::new("query Bulk_Foo { foo100: foo { id } }")
            .with_operation_name("Bulk_Foo")
            .with_variables(serde_json::Map::new());

        let result = retriever.query(request, &context()).await.unwrap();

        mock.assert_async().await;
        assert_eq!(result.data, Some(json!({ "foo100": { "id": "1" } })));
        let errors = result.errors.unwrap();
        assert_eq!(errors[0].message, "Unknown error");
    }

    #[tokio::test]
    async fn non_success_status_is_a_transport_error() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/")
            .with_status(502)
            .create_async()
            .await;
        let retriever = HttpGraphQLRetriever::new(Url::parse(&server.url()).unwrap());

        let result = retriever
            .query(ExecutionRequest::new("{ foo }"), &context())
            .await;

        match result {
            Err(FetchError::Transport { message, .. }) => {
                assert_eq!(message, "Unexpected status code 502 Bad Gateway")
            }
            other => panic!("unexpected result {:?}", other),
        }
    }
}
