mod common;

use async_graphql::{EmptyMutation, EmptySubscription, Schema};
use braid::document::TypeMapper;
use braid::source::{AsyncGraphQLQueryFunction, QueryExecutorSchemaSource};
use braid::{Braid, GraphQLRequest};
use serde_json::json;

use common::{FooQuery, Recording};

const LABELLED_FOO_SDL: &str = r#"
    type Query {
        foo(id: String): Foo
        foos: [Foo!]!
    }
    type Foo {
        id: String!
        label: String!
        kind: String!
    }
"#;

#[tokio::test]
async fn queries_sources_through_their_type_mappers() {
    let schema = Schema::build(FooQuery, EmptyMutation, EmptySubscription).finish();
    let (query_function, requests) = Recording::new(AsyncGraphQLQueryFunction::new(schema));
    let braid = Braid::builder()
        .schema_source(
            QueryExecutorSchemaSource::new("foo", LABELLED_FOO_SDL, query_function)
                .unwrap()
                .with_document_mapper(vec![TypeMapper::new("Foo")
                    .copy("label", "name")
                    .put("kind", "foo")]),
        )
        .build()
        .unwrap();

    let result = braid
        .execute(GraphQLRequest::new(
            r#"{ foo(id: "1") { id label kind } foos { title: label kind } }"#,
        ))
        .await;

    assert_eq!(result.errors, None);
    assert_eq!(
        result.data,
        Some(json!({
            "foo": { "id": "1", "label": "Foo 1", "kind": "foo" },
            "foos": [
                { "title": "Foo 1", "kind": "foo" },
                { "title": "Foo 2", "kind": "foo" },
                { "title": "Foo 3", "kind": "foo" }
            ]
        }))
    );
    let requests = requests.lock();
    assert_eq!(requests.len(), 1);
    assert!(requests[0].query.contains("label: name"));
    assert!(requests[0].query.contains("title: name"));
    assert!(!requests[0].query.contains("kind"));
}
