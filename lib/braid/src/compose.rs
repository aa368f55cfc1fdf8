//! Composition of the braided schema out of every source's schema and links.

use std::sync::Arc;

use ahash::HashMap;
use graphql_parser::{query, schema, Pos};
use indexmap::IndexMap;
use tracing::{debug, trace};

use crate::ast::{is_list_type, rewrap_type, FieldDefinition, ObjectType, Type};
use crate::error::BraidError;
use crate::execution::dispatcher::batch_key;
use crate::link::Link;
use crate::loader::{BatchLoader, LINK_SUFFIX};
use crate::namespace::SchemaNamespace;
use crate::schema::{TypeRegistry, DEFAULT_MUTATION_TYPE_NAME, DEFAULT_QUERY_TYPE_NAME};
use crate::source::SchemaSource;

/// The braided schema and the batch loader of every field owned by a source.
pub struct BraidSchema {
    schema: TypeRegistry,
    batch_loaders: IndexMap<String, Arc<dyn BatchLoader>>,
}

impl BraidSchema {
    pub fn compose(sources: &[Arc<dyn SchemaSource>]) -> Result<BraidSchema, BraidError> {
        let mut by_namespace: HashMap<SchemaNamespace, Arc<dyn SchemaSource>> = HashMap::default();
        for source in sources {
            if by_namespace
                .insert(source.namespace().clone(), source.clone())
                .is_some()
            {
                return Err(BraidError::DuplicateNamespace(source.namespace().clone()));
            }
        }

        // each source's types, as modified by its links
        let mut source_types: Vec<TypeRegistry> =
            sources.iter().map(|source| source.schema().clone()).collect();

        let mut link_loaders = Vec::new();
        for (source, types) in sources.iter().zip(source_types.iter_mut()) {
            for link in source.links() {
                let target = apply_link(link, types, &by_namespace)?;
                trace!(
                    source = %source.namespace(),
                    target = %link.target_namespace(),
                    field = %batch_key(link.source_type(), link.source_field()),
                    "linked field"
                );
                link_loaders.push((
                    batch_key(link.source_type(), link.source_field()),
                    target.new_batch_loader(target.clone(), Some(link.clone())),
                ));
            }
        }

        let mut braid = TypeRegistry::default();
        braid.insert(schema::TypeDefinition::Object(empty_object(DEFAULT_QUERY_TYPE_NAME)));
        braid.insert(schema::TypeDefinition::Object(empty_object(
            DEFAULT_MUTATION_TYPE_NAME,
        )));
        for types in &source_types {
            for definition in types.non_operation_types() {
                braid.insert(definition.clone());
            }
        }

        let mut query_loaders = Vec::new();
        let mut mutation_loaders = Vec::new();
        for (source, types) in sources.iter().zip(&source_types) {
            if let Some(query) = types.query_type() {
                for field in &query.fields {
                    add_root_field(&mut braid, DEFAULT_QUERY_TYPE_NAME, field.clone());
                    query_loaders.push((
                        batch_key(DEFAULT_QUERY_TYPE_NAME, &field.name),
                        source.new_batch_loader(source.clone(), None),
                    ));
                }
            }
            if let Some(mutation) = types.mutation_type() {
                for field in &mutation.fields {
                    add_root_field(&mut braid, DEFAULT_MUTATION_TYPE_NAME, field.clone());
                    mutation_loaders.push((
                        batch_key(DEFAULT_MUTATION_TYPE_NAME, &field.name),
                        source.new_batch_loader(source.clone(), None),
                    ));
                }
            }
        }

        if braid
            .mutation_type()
            .is_some_and(|mutation| mutation.fields.is_empty())
        {
            braid.remove(DEFAULT_MUTATION_TYPE_NAME);
        }

        let mut batch_loaders = IndexMap::new();
        for (key, loader) in link_loaders
            .into_iter()
            .chain(query_loaders)
            .chain(mutation_loaders)
        {
            register(&mut batch_loaders, key, loader);
        }
        debug!(
            sources = sources.len(),
            loaders = batch_loaders.len(),
            "composed braided schema"
        );

        Ok(BraidSchema {
            schema: braid,
            batch_loaders,
        })
    }

    pub fn schema(&self) -> &TypeRegistry {
        &self.schema
    }

    pub fn batch_loaders(&self) -> &IndexMap<String, Arc<dyn BatchLoader>> {
        &self.batch_loaders
    }

    pub fn into_parts(self) -> (TypeRegistry, IndexMap<String, Arc<dyn BatchLoader>>) {
        (self.schema, self.batch_loaders)
    }
}

/// A key registered twice keeps the newest loader; the previous one is
/// chained behind it under `key-link`.
fn register(
    loaders: &mut IndexMap<String, Arc<dyn BatchLoader>>,
    key: String,
    loader: Arc<dyn BatchLoader>,
) {
    if let Some(previous) = loaders.insert(key.clone(), loader) {
        loaders.insert(format!("{}{}", key, LINK_SUFFIX), previous);
    }
}

fn empty_object(name: &str) -> ObjectType {
    schema::ObjectType {
        position: Pos::default(),
        description: None,
        name: name.to_string(),
        implements_interfaces: Vec::new(),
        directives: Vec::new(),
        fields: Vec::new(),
    }
}

fn add_root_field(braid: &mut TypeRegistry, root: &str, field: FieldDefinition) {
    if let Some(object) = braid.object_type_mut(root) {
        object.fields.retain(|existing| existing.name != field.name);
        object.fields.push(field);
    }
}

/// Retypes the linked field of `types` and returns the link's target source.
fn apply_link(
    link: &Link,
    types: &mut TypeRegistry,
    sources: &HashMap<SchemaNamespace, Arc<dyn SchemaSource>>,
) -> Result<Arc<dyn SchemaSource>, BraidError> {
    let source_type_name = match link.source_type() {
        DEFAULT_QUERY_TYPE_NAME => types.query_type_name().to_string(),
        DEFAULT_MUTATION_TYPE_NAME => types
            .mutation_type_name()
            .unwrap_or(DEFAULT_MUTATION_TYPE_NAME)
            .to_string(),
        name => name.to_string(),
    };
    let object = types
        .object_type_mut(&source_type_name)
        .ok_or_else(|| BraidError::MissingSourceType(link.source_type().to_string()))?;
    let from_field_type = object
        .fields
        .iter()
        .find(|field| field.name == link.source_from_field())
        .map(|field| field.field_type.clone())
        .ok_or_else(|| {
            BraidError::MissingSourceFromField(format!(
                "{}.{}",
                link.source_type(),
                link.source_from_field()
            ))
        })?;

    let target = sources
        .get(link.target_namespace())
        .cloned()
        .ok_or_else(|| BraidError::MissingTargetSource(link.target_namespace().clone()))?;
    let target_schema = target.private_schema();
    if !target_schema.contains_type(link.target_type()) {
        return Err(BraidError::MissingTargetType(link.target_type().to_string()));
    }
    let has_target_field = target_schema.query_type().is_some_and(|query| {
        query.fields.iter().any(|field| {
            field.name == link.target_field()
                && field
                    .arguments
                    .iter()
                    .any(|argument| argument.name == link.argument_name())
        })
    });
    if !has_target_field {
        return Err(BraidError::MissingTargetField {
            namespace: link.target_namespace().clone(),
            field: link.target_field().to_string(),
            argument: link.argument_name().to_string(),
        });
    }

    if link.is_replace_from_field() {
        object
            .fields
            .retain(|field| field.name != link.source_from_field());
    }

    match object
        .fields
        .iter_mut()
        .find(|field| field.name == link.source_field())
    {
        Some(field) if is_list_type(&field.field_type) => {
            field.field_type = rewrap_type(&field.field_type, link.target_type());
        }
        Some(field) => {
            field.field_type = query::Type::NamedType(link.target_type().to_string());
        }
        None => object.fields.push(linked_field(link, &from_field_type)),
    }
    Ok(target)
}

fn linked_field(link: &Link, from_field_type: &Type) -> FieldDefinition {
    let named = query::Type::NamedType(link.target_type().to_string());
    schema::Field {
        position: Pos::default(),
        description: None,
        name: link.source_field().to_string(),
        arguments: Vec::new(),
        field_type: if is_list_type(from_field_type) {
            query::Type::ListType(Box::new(named))
        } else {
            named
        },
        directives: Vec::new(),
    }
}
