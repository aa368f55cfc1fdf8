use graphql_parser::{schema, Pos};
use indexmap::IndexMap;

use crate::ast::{
    type_definition_name, DirectiveDefinition, FieldDefinition, ObjectType, SchemaDocument,
    TypeDefinition,
};

pub const DEFAULT_QUERY_TYPE_NAME: &str = "Query";
pub const DEFAULT_MUTATION_TYPE_NAME: &str = "Mutation";

/// Type definitions of one schema, keyed by name in declaration order.
#[derive(Clone, Debug, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, TypeDefinition>,
    directives: Vec<DirectiveDefinition>,
    query_type: Option<String>,
    mutation_type: Option<String>,
}

impl TypeRegistry {
    pub fn parse(sdl: &str) -> Result<TypeRegistry, schema::ParseError> {
        let document = schema::parse_schema::<String>(sdl)?.into_static();
        Ok(TypeRegistry::from_document(document))
    }

    pub fn from_document(document: SchemaDocument) -> TypeRegistry {
        let mut registry = TypeRegistry::default();
        for definition in document.definitions {
            match definition {
                schema::Definition::SchemaDefinition(schema_definition) => {
                    registry.query_type = schema_definition.query;
                    registry.mutation_type = schema_definition.mutation;
                }
                schema::Definition::TypeDefinition(type_definition) => {
                    registry.insert(type_definition);
                }
                schema::Definition::DirectiveDefinition(directive) => {
                    registry.directives.push(directive);
                }
                schema::Definition::TypeExtension(schema::TypeExtension::Object(extension)) => {
                    if let Some(object) = registry.object_type_mut(&extension.name) {
                        object.fields.extend(extension.fields);
                    }
                }
                schema::Definition::TypeExtension(_) => {}
            }
        }
        registry
    }

    /// Adds or replaces a type definition.
    pub fn insert(&mut self, definition: TypeDefinition) {
        self.types
            .insert(type_definition_name(&definition).to_string(), definition);
    }

    pub fn remove(&mut self, name: &str) -> Option<TypeDefinition> {
        self.types.shift_remove(name)
    }

    pub fn get_type(&self, name: &str) -> Option<&TypeDefinition> {
        self.types.get(name)
    }

    pub fn contains_type(&self, name: &str) -> bool {
        self.types.contains_key(name)
    }

    pub fn types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types.values()
    }

    pub fn object_type(&self, name: &str) -> Option<&ObjectType> {
        match self.types.get(name) {
            Some(schema::TypeDefinition::Object(object)) => Some(object),
            _ => None,
        }
    }

    pub fn object_type_mut(&mut self, name: &str) -> Option<&mut ObjectType> {
        match self.types.get_mut(name) {
            Some(schema::TypeDefinition::Object(object)) => Some(object),
            _ => None,
        }
    }

    /// Field lookup on object and interface types.
    pub fn field(&self, type_name: &str, field_name: &str) -> Option<&FieldDefinition> {
        let fields = match self.types.get(type_name)? {
            schema::TypeDefinition::Object(object) => &object.fields,
            schema::TypeDefinition::Interface(interface) => &interface.fields,
            _ => return None,
        };
        fields.iter().find(|field| field.name == field_name)
    }

    pub fn query_type_name(&self) -> &str {
        self.query_type.as_deref().unwrap_or(DEFAULT_QUERY_TYPE_NAME)
    }

    pub fn mutation_type_name(&self) -> Option<&str> {
        match self.mutation_type.as_deref() {
            Some(name) => Some(name),
            None if self.types.contains_key(DEFAULT_MUTATION_TYPE_NAME) => {
                Some(DEFAULT_MUTATION_TYPE_NAME)
            }
            None => None,
        }
    }

    pub fn query_type(&self) -> Option<&ObjectType> {
        self.object_type(self.query_type_name())
    }

    pub fn mutation_type(&self) -> Option<&ObjectType> {
        self.mutation_type_name()
            .and_then(|name| self.object_type(name))
    }

    pub fn is_operation_type(&self, name: &str) -> bool {
        name == self.query_type_name() || self.mutation_type_name() == Some(name)
    }

    pub fn non_operation_types(&self) -> impl Iterator<Item = &TypeDefinition> {
        self.types
            .iter()
            .filter(|(name, _)| !self.is_operation_type(name))
            .map(|(_, definition)| definition)
    }

    pub fn is_abstract(&self, name: &str) -> bool {
        matches!(
            self.types.get(name),
            Some(schema::TypeDefinition::Interface(_)) | Some(schema::TypeDefinition::Union(_))
        )
    }

    /// Whether values of `concrete` may appear where `abstract_type` is expected.
    pub fn is_possible_type(&self, abstract_type: &str, concrete: &str) -> bool {
        if abstract_type == concrete {
            return true;
        }
        match self.types.get(abstract_type) {
            Some(schema::TypeDefinition::Union(union)) => {
                union.types.iter().any(|member| member == concrete)
            }
            Some(schema::TypeDefinition::Interface(_)) => self
                .object_type(concrete)
                .is_some_and(|object| {
                    object
                        .implements_interfaces
                        .iter()
                        .any(|interface| interface == abstract_type)
                }),
            _ => false,
        }
    }

    pub fn possible_types(&self, abstract_type: &str) -> Vec<&str> {
        self.types
            .values()
            .filter_map(|definition| match definition {
                schema::TypeDefinition::Object(object)
                    if self.is_possible_type(abstract_type, &object.name) =>
                {
                    Some(object.name.as_str())
                }
                _ => None,
            })
            .collect()
    }

    /// Keeps only the named query fields. An empty list keeps every field.
    pub fn retain_query_fields(&mut self, top_level_fields: &[String]) {
        if top_level_fields.is_empty() {
            return;
        }
        let query_type_name = self.query_type_name().to_string();
        if let Some(query) = self.object_type_mut(&query_type_name) {
            query
                .fields
                .retain(|field| top_level_fields.contains(&field.name));
        }
    }

    pub fn to_document(&self) -> SchemaDocument {
        let mut definitions = Vec::with_capacity(self.types.len() + self.directives.len() + 1);
        let custom_query = self.query_type_name() != DEFAULT_QUERY_TYPE_NAME;
        let custom_mutation = self
            .mutation_type_name()
            .is_some_and(|name| name != DEFAULT_MUTATION_TYPE_NAME);
        if custom_query || custom_mutation {
            definitions.push(schema::Definition::SchemaDefinition(
                schema::SchemaDefinition {
                    position: Pos::default(),
                    directives: Vec::new(),
                    query: Some(self.query_type_name().to_string()),
                    mutation: self.mutation_type_name().map(str::to_string),
                    subscription: None,
                },
            ));
        }
        definitions.extend(
            self.types
                .values()
                .cloned()
                .map(schema::Definition::TypeDefinition),
        );
        definitions.extend(
            self.directives
                .iter()
                .cloned()
                .map(schema::Definition::DirectiveDefinition),
        );
        SchemaDocument { definitions }
    }

    pub fn to_sdl(&self) -> String {
        self.to_document().to_string()
    }
}
