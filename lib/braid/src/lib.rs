pub mod ast;
pub mod braid;
pub mod compose;
pub mod config;
pub mod context;
pub mod document;
pub mod error;
pub mod execution;
pub mod fetch;
pub mod link;
pub mod loader;
pub mod mapper;
pub mod namespace;
pub mod planner;
pub mod response;
pub mod schema;
pub mod source;

pub use braid::{Braid, BraidBuilder, GraphQLRequest};
pub use compose::BraidSchema;
pub use error::{BraidError, FetchError, LinkError, MapperError, RequestError};
pub use link::Link;
pub use namespace::SchemaNamespace;
pub use response::execution_result::ExecutionResult;
