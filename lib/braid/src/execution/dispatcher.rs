use tracing::trace;

use crate::context::BraidContext;
use crate::error::FetchError;
use crate::fetch::{FetchEnvironment, FieldResult};
use crate::loader::LINK_SUFFIX;

pub fn batch_key(type_name: &str, field_name: &str) -> String {
    format!("{}.{}", type_name, field_name)
}

/// Resolves a field through the loader registered under `key`.
///
/// When a second loader exists under `key` suffixed with `-link`, the first
/// result is the join key of a link: it becomes the source of a second fetch,
/// whose result is returned along with the errors of both phases.
pub async fn resolve(
    context: &BraidContext,
    key: &str,
    environment: FetchEnvironment,
) -> Result<FieldResult, FetchError> {
    let loaders = context.loaders();
    let loader = loaders
        .get(key)
        .ok_or_else(|| FetchError::MissingLoader(key.to_string()))?;
    let link_key = format!("{}{}", key, LINK_SUFFIX);
    let Some(link_loader) = loaders.get(&link_key) else {
        return loader.load(environment).await;
    };

    let mut chained = environment.clone();
    let first = loader.load(environment).await?;
    trace!(key = %link_key, "chaining fetch through link");
    chained.source = match first.data {
        serde_json::Value::Null => None,
        data => Some(data),
    };
    let mut second = link_loader.load(chained).await?;
    let mut errors = first.errors;
    errors.append(&mut second.errors);
    Ok(second.with_errors(errors))
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;
    use graphql_parser::query::Type;
    use indexmap::IndexMap;
    use serde_json::{json, Value};

    use super::resolve;
    use crate::ast::new_field;
    use crate::context::BraidContext;
    use crate::error::FetchError;
    use crate::fetch::{FetchEnvironment, FieldResult};
    use crate::loader::scheduler::dispatching;
    use crate::loader::{BatchLoader, DataLoaderRegistry};
    use crate::response::graphql_error::GraphQLError;
    use crate::schema::TypeRegistry;

    struct Constant(Value);

    #[async_trait]
    impl BatchLoader for Constant {
        async fn load(
            &self,
            environments: Vec<FetchEnvironment>,
            _context: &BraidContext,
        ) -> Result<Vec<FieldResult>, FetchError> {
            Ok(environments
                .iter()
                .map(|_| {
                    FieldResult::new(self.0.clone()).with_errors(vec![GraphQLError::from("first")])
                })
                .collect())
        }
    }

    struct SourceEcho;

    #[async_trait]
    impl BatchLoader for SourceEcho {
        async fn load(
            &self,
            environments: Vec<FetchEnvironment>,
            _context: &BraidContext,
        ) -> Result<Vec<FieldResult>, FetchError> {
            Ok(environments
                .into_iter()
                .map(|environment| {
                    FieldResult::new(json!({ "from": environment.source }))
                        .with_errors(vec![GraphQLError::from("second")])
                })
                .collect())
        }
    }

    fn environment() -> FetchEnvironment {
        FetchEnvironment {
            field: new_field("foo"),
            field_type: Type::NamedType("Foo".to_string()),
            parent_type: "Query".to_string(),
            parent_operation: None,
            source: None,
            path: vec!["foo".into()],
        }
    }

    #[tokio::test]
    async fn chains_through_the_link_loader() {
        let mut loaders: IndexMap<String, Arc<dyn BatchLoader>> = IndexMap::new();
        loaders.insert("Query.foo".to_string(), Arc::new(Constant(json!("f1"))));
        loaders.insert("Query.foo-link".to_string(), Arc::new(SourceEcho));
        let context = BraidContext::new(
            Arc::new(TypeRegistry::default()),
            DataLoaderRegistry::new(&loaders),
        );
        context.dispatch_state().enter_fields();

        let result = dispatching(&context, resolve(&context, "Query.foo", environment()))
            .await
            .unwrap();

        assert_eq!(result.data, json!({ "from": "f1" }));
        let messages: Vec<_> = result.errors.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, vec!["first", "second"]);
    }

    #[tokio::test]
    async fn missing_loader_is_an_error() {
        let context = BraidContext::new(
            Arc::new(TypeRegistry::default()),
            DataLoaderRegistry::default(),
        );

        let result = resolve(&context, "Query.nope", environment()).await;

        assert!(matches!(result, Err(FetchError::MissingLoader(key)) if key == "Query.nope"));
    }
}
