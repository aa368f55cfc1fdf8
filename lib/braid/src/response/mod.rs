pub mod execution_request;
pub mod execution_result;
pub mod graphql_error;
