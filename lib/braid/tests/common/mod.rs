#![allow(dead_code)]

use std::sync::Arc;

use async_graphql::{EmptySubscription, InputObject, Object, Schema, SimpleObject, ID};
use async_trait::async_trait;
use braid::context::BraidContext;
use braid::response::execution_request::ExecutionRequest;
use braid::source::{AsyncGraphQLQueryFunction, QueryExecutorSchemaSource, QueryFunction};
use braid::{Braid, ExecutionResult, FetchError, Link};
use parking_lot::Mutex;

pub const FOO_SDL: &str = r#"
    type Query {
        foo(id: String): Foo
        foos: [Foo!]!
        search(filter: FooFilter): [Foo!]!
        barRef(id: String!): String!
    }
    type Mutation {
        createFoo(name: String!): Foo!
    }
    type Foo {
        id: String!
        name: String!
        bar: String
        bars: [String]!
    }
    input FooFilter {
        name: String
    }
"#;

pub const BAR_SDL: &str = r#"
    type Query {
        topbar(id: ID!): Bar
    }
    type Bar {
        id: ID!
        title: String!
    }
"#;

#[derive(SimpleObject, Clone)]
pub struct Foo {
    id: String,
    name: String,
    bar: Option<String>,
    bars: Vec<Option<String>>,
}

fn foo(id: &str) -> Foo {
    match id {
        "1" => Foo {
            id: "1".to_string(),
            name: "Foo 1".to_string(),
            bar: Some("b1".to_string()),
            bars: vec![Some("b1".to_string()), None, Some("b2".to_string())],
        },
        "2" => Foo {
            id: "2".to_string(),
            name: "Foo 2".to_string(),
            bar: Some("b2".to_string()),
            bars: Vec::new(),
        },
        id => Foo {
            id: id.to_string(),
            name: format!("Foo {}", id),
            bar: None,
            bars: Vec::new(),
        },
    }
}

#[derive(InputObject)]
pub struct FooFilter {
    name: Option<String>,
}

pub struct FooQuery;

#[Object(name = "Query")]
impl FooQuery {
    async fn foo(&self, id: Option<String>) -> async_graphql::Result<Option<Foo>> {
        match id.as_deref() {
            Some("err") => Err(async_graphql::Error::new("Foo err is broken")),
            Some(id) => Ok(Some(foo(id))),
            None => Ok(None),
        }
    }

    async fn foos(&self) -> Vec<Foo> {
        vec![foo("1"), foo("2"), foo("3")]
    }

    async fn search(&self, filter: Option<FooFilter>) -> Vec<Foo> {
        let name = filter.and_then(|filter| filter.name);
        [foo("1"), foo("2"), foo("3")]
            .into_iter()
            .filter(|foo| name.as_ref().map_or(true, |name| &foo.name == name))
            .collect()
    }

    async fn bar_ref(&self, id: String) -> String {
        format!("b{}", id)
    }
}

pub struct FooMutation;

#[Object(name = "Mutation")]
impl FooMutation {
    async fn create_foo(&self, name: String) -> Foo {
        Foo {
            id: format!("new-{}", name),
            name,
            bar: Some("b1".to_string()),
            bars: Vec::new(),
        }
    }
}

#[derive(SimpleObject)]
pub struct Bar {
    id: ID,
    title: String,
}

pub struct BarQuery;

#[Object(name = "Query")]
impl BarQuery {
    async fn topbar(&self, id: ID) -> Option<Bar> {
        let title = format!("Bar {}", id.0);
        Some(Bar { id, title })
    }
}

pub type Requests = Arc<Mutex<Vec<ExecutionRequest>>>;

/// Keeps every request sent to the wrapped query function.
pub struct Recording<Q> {
    inner: Q,
    requests: Requests,
}

impl<Q> Recording<Q> {
    pub fn new(inner: Q) -> (Recording<Q>, Requests) {
        let requests = Requests::default();
        (
            Recording {
                inner,
                requests: requests.clone(),
            },
            requests,
        )
    }
}

#[async_trait]
impl<Q: QueryFunction> QueryFunction for Recording<Q> {
    async fn query(
        &self,
        request: ExecutionRequest,
        context: &BraidContext,
    ) -> Result<ExecutionResult, FetchError> {
        self.requests.lock().push(request.clone());
        self.inner.query(request, context).await
    }
}

pub struct TestBraid {
    pub braid: Braid,
    pub foo_requests: Requests,
    pub bar_requests: Requests,
}

/// Braids the foo and bar schemas, with `links` declared on the foo source.
pub fn foo_bar_braid(links: Vec<Link>) -> TestBraid {
    foo_bar_braid_with(links, false)
}

pub fn foo_bar_braid_with(links: Vec<Link>, include_statistics: bool) -> TestBraid {
    let foo_schema = Schema::build(FooQuery, FooMutation, EmptySubscription).finish();
    let bar_schema = Schema::build(BarQuery, async_graphql::EmptyMutation, EmptySubscription).finish();
    let (foo_function, foo_requests) = Recording::new(AsyncGraphQLQueryFunction::new(foo_schema));
    let (bar_function, bar_requests) = Recording::new(AsyncGraphQLQueryFunction::new(bar_schema));

    let braid = Braid::builder()
        .schema_source(
            QueryExecutorSchemaSource::new("foo", FOO_SDL, foo_function)
                .unwrap()
                .with_links(links),
        )
        .schema_source(QueryExecutorSchemaSource::new("bar", BAR_SDL, bar_function).unwrap())
        .include_statistics(include_statistics)
        .build()
        .unwrap();

    TestBraid {
        braid,
        foo_requests,
        bar_requests,
    }
}

pub fn bar_link(field: &str) -> Link {
    Link::from("Foo", field)
        .to("bar", "Bar")
        .target_field("topbar")
        .nullable()
        .build()
        .unwrap()
}

pub fn request_count(requests: &Requests) -> usize {
    requests.lock().len()
}
