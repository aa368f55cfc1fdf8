use std::sync::Arc;

use async_trait::async_trait;

use crate::context::BraidContext;
use crate::error::FetchError;
use crate::link::Link;
use crate::loader::BatchLoader;
use crate::namespace::SchemaNamespace;
use crate::response::execution_request::ExecutionRequest;
use crate::response::execution_result::ExecutionResult;
use crate::schema::TypeRegistry;

pub mod http;
pub mod local;
pub mod query_executor;
pub mod rest;

pub use http::HttpGraphQLRetriever;
pub use local::{AsyncGraphQLQueryFunction, FnQueryFunction};
pub use query_executor::QueryExecutorSchemaSource;
pub use rest::{HttpRestRetriever, RestRetriever, RestRootField, RestSchemaSource};

/// One underlying schema taking part in the braid.
pub trait SchemaSource: Send + Sync {
    fn namespace(&self) -> &SchemaNamespace;

    /// The schema exposed through the braid, possibly limited to some query fields.
    fn schema(&self) -> &TypeRegistry;

    /// The full schema of the source.
    fn private_schema(&self) -> &TypeRegistry;

    fn links(&self) -> &[Link];

    /// Creates the loader for one batch key. `source` is this source itself.
    fn new_batch_loader(
        &self,
        source: Arc<dyn SchemaSource>,
        link: Option<Link>,
    ) -> Arc<dyn BatchLoader>;
}

/// Executes a compound request against a GraphQL source.
#[async_trait]
pub trait QueryFunction: Send + Sync {
    async fn query(
        &self,
        request: ExecutionRequest,
        context: &BraidContext,
    ) -> Result<ExecutionResult, FetchError>;
}
