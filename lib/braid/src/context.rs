use std::sync::Arc;

use ahash::HashMap;
use serde_json::{Map, Value};

use crate::ast::{FragmentDefinition, VariableDefinition};
use crate::loader::{DataLoaderRegistry, DispatchState};
use crate::schema::TypeRegistry;

/// State of one request. Created per execution and never shared between requests.
pub struct BraidContext {
    schema: Arc<TypeRegistry>,
    query: String,
    variables: Map<String, Value>,
    extensions: Option<Map<String, Value>>,
    variable_definitions: Vec<VariableDefinition>,
    fragments: HashMap<String, FragmentDefinition>,
    loaders: DataLoaderRegistry,
    dispatch_state: DispatchState,
}

impl BraidContext {
    pub fn new(schema: Arc<TypeRegistry>, loaders: DataLoaderRegistry) -> BraidContext {
        BraidContext {
            schema,
            query: String::new(),
            variables: Map::new(),
            extensions: None,
            variable_definitions: Vec::new(),
            fragments: HashMap::default(),
            loaders,
            dispatch_state: DispatchState::default(),
        }
    }

    pub fn with_query(mut self, query: impl Into<String>) -> BraidContext {
        self.query = query.into();
        self
    }

    pub fn with_variables(mut self, variables: Map<String, Value>) -> BraidContext {
        self.variables = variables;
        self
    }

    pub fn with_extensions(mut self, extensions: Option<Map<String, Value>>) -> BraidContext {
        self.extensions = extensions;
        self
    }

    pub fn with_variable_definitions(
        mut self,
        variable_definitions: Vec<VariableDefinition>,
    ) -> BraidContext {
        self.variable_definitions = variable_definitions;
        self
    }

    pub fn with_fragments(
        mut self,
        fragments: impl IntoIterator<Item = FragmentDefinition>,
    ) -> BraidContext {
        self.fragments = fragments
            .into_iter()
            .map(|fragment| (fragment.name.clone(), fragment))
            .collect();
        self
    }

    /// The braided schema the request is executed against.
    pub fn schema(&self) -> &TypeRegistry {
        &self.schema
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn variables(&self) -> &Map<String, Value> {
        &self.variables
    }

    pub fn extensions(&self) -> Option<&Map<String, Value>> {
        self.extensions.as_ref()
    }

    pub fn variable_definitions(&self) -> &[VariableDefinition] {
        &self.variable_definitions
    }

    pub fn fragments(&self) -> &HashMap<String, FragmentDefinition> {
        &self.fragments
    }

    pub fn loaders(&self) -> &DataLoaderRegistry {
        &self.loaders
    }

    pub fn dispatch_state(&self) -> &DispatchState {
        &self.dispatch_state
    }
}
