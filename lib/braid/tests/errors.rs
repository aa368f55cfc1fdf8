mod common;

use braid::response::graphql_error::GraphQLErrorPathSegment;
use braid::source::{FnQueryFunction, HttpGraphQLRetriever, QueryExecutorSchemaSource};
use braid::{Braid, BraidError, ExecutionResult, FetchError, GraphQLRequest, Link};
use futures::future::{ready, Ready};
use serde_json::{json, Value};
use url::Url;

use common::{bar_link, foo_bar_braid, BAR_SDL, FOO_SDL};

fn path(segments: &[&str]) -> Option<Vec<GraphQLErrorPathSegment>> {
    Some(segments.iter().map(|segment| (*segment).into()).collect())
}

type CannedResponse = Ready<Result<ExecutionResult, FetchError>>;

/// A source answering every request with the same response.
fn canned(
    response: Value,
) -> FnQueryFunction<impl Fn(GraphQLRequest) -> CannedResponse + Send + Sync> {
    FnQueryFunction::new(move |_| ready(Ok(serde_json::from_value(response.clone()).unwrap())))
}

#[tokio::test]
async fn source_errors_stay_with_their_field() {
    let test = foo_bar_braid(vec![bar_link("bar")]);

    let result = test
        .braid
        .execute(GraphQLRequest::new(
            r#"{ a: foo(id: "err") { id } b: foo(id: "1") { id } }"#,
        ))
        .await;

    assert_eq!(result.data, Some(json!({ "a": null, "b": { "id": "1" } })));
    let errors = result.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Foo err is broken");
    assert_eq!(errors[0].path, path(&["a"]));
}

#[tokio::test]
async fn errors_without_path_reach_every_fetch_of_the_batch() {
    let source = canned(json!({
        "data": { "foo100": { "id": "1" }, "foo101": { "id": "2" } },
        "errors": [{ "message": "rate limited" }]
    }));
    let braid = Braid::builder()
        .schema_source(QueryExecutorSchemaSource::new("foo", FOO_SDL, source).unwrap())
        .build()
        .unwrap();

    let result = braid
        .execute(GraphQLRequest::new(
            r#"{ a: foo(id: "1") { id } b: foo(id: "2") { id } }"#,
        ))
        .await;

    assert_eq!(result.data, Some(json!({ "a": { "id": "1" }, "b": { "id": "2" } })));
    let errors = result.errors.unwrap();
    let paths: Vec<_> = errors.iter().map(|error| error.path.clone()).collect();
    assert_eq!(paths, vec![path(&["a"]), path(&["b"])]);
    assert!(errors.iter().all(|error| error.message == "rate limited"));
}

#[tokio::test]
async fn nested_source_errors_keep_their_relative_path() {
    let source = canned(json!({
        "data": { "foo100": { "id": "1", "name": null } },
        "errors": [{ "message": "name is hidden", "path": ["foo100", "name"] }]
    }));
    let braid = Braid::builder()
        .schema_source(QueryExecutorSchemaSource::new("foo", FOO_SDL, source).unwrap())
        .build()
        .unwrap();

    let result = braid
        .execute(GraphQLRequest::new(r#"{ foo(id: "1") { id name } }"#))
        .await;

    // Foo.name is non-null, so the null bubbles up to the nullable foo field
    assert_eq!(result.data, Some(json!({ "foo": null })));
    let errors = result.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "name is hidden");
    assert_eq!(errors[0].path, path(&["foo", "name"]));
}

#[tokio::test]
async fn nulls_in_non_null_positions_are_reported() {
    let source = canned(json!({ "data": { "foos100": [{ "id": "1" }, { "id": null }] } }));
    let braid = Braid::builder()
        .schema_source(QueryExecutorSchemaSource::new("foo", FOO_SDL, source).unwrap())
        .build()
        .unwrap();

    let result = braid.execute(GraphQLRequest::new("{ foos { id } }")).await;

    assert_eq!(result.data, Some(Value::Null));
    let errors = result.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Cannot return null for non-nullable field Foo.id.");
    assert_eq!(
        errors[0].path,
        Some(vec!["foos".into(), 1usize.into(), "id".into()])
    );
}

#[tokio::test]
async fn transport_failures_fail_the_whole_batch() {
    let mut server = mockito::Server::new_async().await;
    let mock = server
        .mock("POST", "/graphql")
        .with_status(500)
        .expect(1)
        .create_async()
        .await;
    let endpoint = Url::parse(&format!("{}/graphql", server.url())).unwrap();
    let braid = Braid::builder()
        .schema_source(
            QueryExecutorSchemaSource::new("foo", FOO_SDL, HttpGraphQLRetriever::new(endpoint))
                .unwrap(),
        )
        .build()
        .unwrap();

    let result = braid
        .execute(GraphQLRequest::new(
            r#"{ a: foo(id: "1") { id } b: foo(id: "2") { id } }"#,
        ))
        .await;

    mock.assert_async().await;
    assert_eq!(result.data, Some(json!({ "a": null, "b": null })));
    let errors = result.errors.unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0]
        .message
        .ends_with("failed: Unexpected status code 500 Internal Server Error"));
    assert_eq!(errors[0].path, path(&["a"]));
    assert_eq!(errors[1].path, path(&["b"]));
}

#[tokio::test]
async fn unknown_fields_are_field_errors() {
    let test = foo_bar_braid(Vec::new());

    let result = test
        .braid
        .execute(GraphQLRequest::new(r#"{ foo(id: "1") { id nope } }"#))
        .await;

    assert_eq!(result.data, Some(json!({ "foo": { "id": "1", "nope": null } })));
    let errors = result.errors.unwrap();
    assert_eq!(errors[0].message, "Cannot query field \"nope\" on type \"Foo\".");
    assert_eq!(errors[0].path, path(&["foo", "nope"]));
}

#[tokio::test]
async fn rejects_invalid_requests() {
    let test = foo_bar_braid(Vec::new());
    let message = |result: ExecutionResult| {
        assert_eq!(result.data, None);
        result.errors.unwrap().remove(0).message
    };

    let result = test.braid.execute(GraphQLRequest::new("{ foo(")).await;
    assert!(message(result).starts_with("Failed to parse query"));

    let result = test
        .braid
        .execute(GraphQLRequest::new("query A { foos { id } }").with_operation_name("B"))
        .await;
    assert_eq!(message(result), "Unknown operation named \"B\"");

    let result = test
        .braid
        .execute(GraphQLRequest::new("query A { foos { id } } query B { foos { id } }"))
        .await;
    assert_eq!(
        message(result),
        "Must provide operation name if query contains multiple operations"
    );

    let result = test
        .braid
        .execute(GraphQLRequest::new("fragment F on Foo { id }"))
        .await;
    assert_eq!(message(result), "Document does not contain any operation");

    let result = test
        .braid
        .execute(GraphQLRequest::new("subscription { foos { id } }"))
        .await;
    assert_eq!(message(result), "Subscriptions are not supported");

    let result = test
        .braid
        .execute(GraphQLRequest::new(
            "query Q($id: String!) { barRef(id: $id) }",
        ))
        .await;
    assert_eq!(message(result), "Variable \"$id\" of non-null type was not provided");
}

#[tokio::test]
async fn rejects_mutations_without_mutation_root() {
    let bar = canned(json!({ "data": {} }));
    let braid = Braid::builder()
        .schema_source(QueryExecutorSchemaSource::new("bar", BAR_SDL, bar).unwrap())
        .build()
        .unwrap();

    let result = braid
        .execute(GraphQLRequest::new("mutation { createFoo(name: \"x\") { id } }"))
        .await;

    assert_eq!(result.data, None);
    assert_eq!(result.errors.unwrap()[0].message, "Schema does not support mutations");
}

#[test]
fn composition_fails_on_broken_links() {
    let link = Link::from("Foo", "bar")
        .to("nowhere", "Bar")
        .build()
        .unwrap();
    let foo = canned(json!({ "data": {} }));

    let result = Braid::builder()
        .schema_source(
            QueryExecutorSchemaSource::new("foo", FOO_SDL, foo)
                .unwrap()
                .with_links(vec![link]),
        )
        .build();

    let Err(error) = result else {
        panic!("composition should fail");
    };
    assert!(matches!(error, BraidError::MissingTargetSource(_)));
    assert_eq!(error.to_string(), "Can't find target schema source: nowhere");
}

#[tokio::test]
async fn null_join_keys_of_non_nullable_links_are_field_errors() {
    let link = Link::from("Foo", "bar")
        .to("bar", "Bar")
        .target_field("topbar")
        .build()
        .unwrap();
    let test = foo_bar_braid(vec![link]);

    let result = test
        .braid
        .execute(GraphQLRequest::new("{ foos { id bar { title } } }"))
        .await;

    assert_eq!(
        result.data,
        Some(json!({ "foos": [
            { "id": "1", "bar": { "title": "Bar b1" } },
            { "id": "2", "bar": { "title": "Bar b2" } },
            { "id": "3", "bar": null }
        ] }))
    );
    let errors = result.errors.unwrap();
    assert_eq!(errors.len(), 1);
    assert_eq!(
        errors[0].message,
        "Can't resolve non-nullable link \"Foo.bar\" with a null join key"
    );
    assert_eq!(
        errors[0].path,
        Some(vec!["foos".into(), 2usize.into(), "bar".into()])
    );
    assert_eq!(test.bar_requests.lock().len(), 1);
}
