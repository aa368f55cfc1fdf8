use std::sync::Arc;

use crate::document::{DocumentMapper, TypeMapper};
use crate::error::BraidError;
use crate::link::Link;
use crate::loader::BatchLoader;
use crate::namespace::SchemaNamespace;
use crate::planner::batch::QueryExecutorBatchLoader;
use crate::schema::TypeRegistry;
use crate::source::{QueryFunction, SchemaSource};

/// A GraphQL source, queried through a [`QueryFunction`] with one compound query per batch.
pub struct QueryExecutorSchemaSource<Q> {
    namespace: SchemaNamespace,
    schema: TypeRegistry,
    private_schema: TypeRegistry,
    links: Vec<Link>,
    query_function: Arc<Q>,
    document_mapper: Option<Arc<DocumentMapper>>,
}

impl<Q: QueryFunction + 'static> QueryExecutorSchemaSource<Q> {
    pub fn new(
        namespace: impl Into<SchemaNamespace>,
        sdl: &str,
        query_function: Q,
    ) -> Result<QueryExecutorSchemaSource<Q>, BraidError> {
        let namespace = namespace.into();
        let private_schema = TypeRegistry::parse(sdl)
            .map_err(|error| BraidError::SchemaParse(namespace.clone(), error.to_string()))?;
        Ok(QueryExecutorSchemaSource {
            namespace,
            schema: private_schema.clone(),
            private_schema,
            links: Vec::new(),
            query_function: Arc::new(query_function),
            document_mapper: None,
        })
    }

    pub fn with_links(mut self, links: impl IntoIterator<Item = Link>) -> Self {
        self.links.extend(links);
        self
    }

    /// Rewrites the queries sent to the source, for sources whose fields are
    /// named differently from the declared schema.
    pub fn with_document_mapper(mut self, type_mappers: Vec<TypeMapper>) -> Self {
        self.document_mapper = Some(Arc::new(DocumentMapper::new(
            self.private_schema.clone(),
            type_mappers,
        )));
        self
    }

    /// Exposes only the given query fields through the braid. The private
    /// schema keeps all of them for link lookups.
    pub fn with_top_level_fields(mut self, fields: &[String]) -> Self {
        self.schema.retain_query_fields(fields);
        self
    }
}

impl<Q: QueryFunction + 'static> SchemaSource for QueryExecutorSchemaSource<Q> {
    fn namespace(&self) -> &SchemaNamespace {
        &self.namespace
    }

    fn schema(&self) -> &TypeRegistry {
        &self.schema
    }

    fn private_schema(&self) -> &TypeRegistry {
        &self.private_schema
    }

    fn links(&self) -> &[Link] {
        &self.links
    }

    fn new_batch_loader(
        &self,
        source: Arc<dyn SchemaSource>,
        link: Option<Link>,
    ) -> Arc<dyn BatchLoader> {
        Arc::new(
            QueryExecutorBatchLoader::new(source, link, self.query_function.clone())
                .with_document_mapper(self.document_mapper.clone()),
        )
    }
}
