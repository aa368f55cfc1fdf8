use serde_json::{Map, Value};

use crate::ast::{Field, Type};
use crate::response::graphql_error::{GraphQLError, GraphQLErrorPathSegment};

pub type ResponsePath = Vec<GraphQLErrorPathSegment>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OperationKind {
    Query,
    Mutation,
}

/// One field resolution waiting for a batch.
#[derive(Clone, Debug)]
pub struct FetchEnvironment {
    /// The field as written by the client, with the selections of every
    /// node sharing its response key merged in.
    pub field: Field,
    /// Output type of the field in the braided schema.
    pub field_type: Type,
    pub parent_type: String,
    /// Set when the parent type is one of the braided operation roots.
    pub parent_operation: Option<OperationKind>,
    /// The resolved parent value, `None` for root fields.
    pub source: Option<Value>,
    pub path: ResponsePath,
}

impl FetchEnvironment {
    pub fn source_object(&self) -> Option<&Map<String, Value>> {
        self.source.as_ref().and_then(Value::as_object)
    }
}

/// Data and source errors of one fetch. Error paths are relative to the fetched field.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FieldResult {
    pub data: Value,
    pub errors: Vec<GraphQLError>,
}

impl FieldResult {
    pub fn new(data: Value) -> FieldResult {
        FieldResult {
            data,
            errors: Vec::new(),
        }
    }

    pub fn with_errors(mut self, errors: Vec<GraphQLError>) -> FieldResult {
        self.errors = errors;
        self
    }
}
