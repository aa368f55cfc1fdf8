use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::response::graphql_error::GraphQLError;

#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ExecutionResult {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<GraphQLError>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<Map<String, Value>>,
}

impl ExecutionResult {
    pub fn from_error_message(message: String) -> ExecutionResult {
        ExecutionResult {
            data: None,
            errors: Some(vec![GraphQLError::from(message)]),
            extensions: None,
        }
    }

    pub fn new(
        data: Option<Value>,
        errors: Option<Vec<GraphQLError>>,
        extensions: Option<Map<String, Value>>,
    ) -> ExecutionResult {
        let final_errors = match errors {
            Some(errors) if errors.is_empty() => None,
            _ => errors,
        };
        let final_extensions = match extensions {
            Some(extensions) if extensions.is_empty() => None,
            _ => extensions,
        };
        ExecutionResult {
            data,
            errors: final_errors,
            extensions: final_extensions,
        }
    }

    /// The top level `data` object, empty when the source returned none.
    pub fn take_data_object(&mut self) -> Map<String, Value> {
        match self.data.take() {
            Some(Value::Object(data)) => data,
            _ => Map::new(),
        }
    }

    pub fn take_errors(&mut self) -> Vec<GraphQLError> {
        self.errors.take().unwrap_or_default()
    }
}
