use crate::namespace::SchemaNamespace;

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum LinkError {
    #[error("Link is missing required attribute \"{0}\"")]
    MissingAttribute(&'static str),
}

/// Failures while composing the braided schema. No partial schema is produced.
#[derive(thiserror::Error, Debug, Clone)]
pub enum BraidError {
    #[error(transparent)]
    Link(#[from] LinkError),
    #[error("Failed to parse schema of source \"{0}\": {1}")]
    SchemaParse(SchemaNamespace, String),
    #[error("Duplicate schema source namespace: {0}")]
    DuplicateNamespace(SchemaNamespace),
    #[error("Can't find source type: {0}")]
    MissingSourceType(String),
    #[error("Can't find source from field: {0}")]
    MissingSourceFromField(String),
    #[error("Can't find target schema source: {0}")]
    MissingTargetSource(SchemaNamespace),
    #[error("Can't find target type: {0}")]
    MissingTargetType(String),
    #[error("Can't find query field \"{field}\" with argument \"{argument}\" in source \"{namespace}\"")]
    MissingTargetField {
        namespace: SchemaNamespace,
        field: String,
        argument: String,
    },
    #[error("Failed to build schema source \"{0}\": {1}")]
    SourceConfiguration(SchemaNamespace, String),
}

/// Failures of one batch or one fetch. Cloned to every fetch sharing the batch.
#[derive(thiserror::Error, Debug, Clone)]
pub enum FetchError {
    #[error("Request to {target} failed: {message}")]
    Transport { target: String, message: String },
    #[error("Variable \"${0}\" is not defined by the operation")]
    UndefinedVariable(String),
    #[error("Fragment \"{0}\" is not defined in the document")]
    UndefinedFragment(String),
    #[error("Can't find argument \"{argument}\" of query field \"{field}\" in source \"{namespace}\"")]
    MissingLinkArgument {
        namespace: SchemaNamespace,
        field: String,
        argument: String,
    },
    #[error("Can't query for multiple fields if the target type isn't a list")]
    MultipleFieldsForSingleValue,
    #[error("Batch loader returned {actual} results for {expected} fetches")]
    ResultCountMismatch { expected: usize, actual: usize },
    #[error("No batch loader registered for key \"{0}\"")]
    MissingLoader(String),
    #[error("Fetch for \"{0}\" was cancelled before it completed")]
    Cancelled(String),
    #[error("No root field \"{field}\" is configured for source \"{namespace}\"")]
    MissingRootField {
        namespace: SchemaNamespace,
        field: String,
    },
    #[error("Can't resolve non-nullable link \"{0}\" with a null join key")]
    NullJoinKey(String),
    #[error("Invalid request uri \"{0}\"")]
    InvalidUri(String),
    #[error(transparent)]
    Mapper(#[from] MapperError),
}

#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum MapperError {
    #[error("Can't merge values at \"{0}\", getting non-mergeable types")]
    NonMergeableValues(String),
    #[error("Expected an object at \"{0}\"")]
    ExpectedObject(String),
}

/// Failures that reject a whole request before any field is resolved.
#[derive(thiserror::Error, Debug, Clone)]
pub enum RequestError {
    #[error("Failed to parse query: {0}")]
    Parse(String),
    #[error("Unknown operation named \"{0}\"")]
    UnknownOperation(String),
    #[error("Must provide operation name if query contains multiple operations")]
    AmbiguousOperation,
    #[error("Document does not contain any operation")]
    MissingOperation,
    #[error("Subscriptions are not supported")]
    SubscriptionNotSupported,
    #[error("Schema does not support mutations")]
    MutationNotSupported,
    #[error("Variable \"${0}\" of non-null type was not provided")]
    MissingVariable(String),
}
