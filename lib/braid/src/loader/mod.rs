//! Per-request batching of field fetches.
//!
//! Every batch key (`Type.field`, optionally suffixed with `-link`) owns a
//! [`DataLoader`] queue. Resolvers enqueue their fetch and wait on a oneshot
//! channel; the [`scheduler`] drains the queues whenever execution cannot
//! make progress without them.

mod dispatch;
pub mod scheduler;
mod statistics;

use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use futures::channel::oneshot;
use futures::future::BoxFuture;
use futures::FutureExt;
use indexmap::IndexMap;
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use crate::context::BraidContext;
use crate::error::FetchError;
use crate::fetch::{FetchEnvironment, FieldResult};

pub use dispatch::DispatchState;
pub use statistics::{LoaderStatistics, StatisticsSnapshot};

pub const LINK_SUFFIX: &str = "-link";

#[async_trait]
pub trait BatchLoader: Send + Sync {
    /// Resolves one batch. Must return exactly one result per environment, in order.
    async fn load(
        &self,
        environments: Vec<FetchEnvironment>,
        context: &BraidContext,
    ) -> Result<Vec<FieldResult>, FetchError>;
}

type FetchOutcome = Result<FieldResult, FetchError>;

pub struct DataLoader {
    key: String,
    batch_loader: Arc<dyn BatchLoader>,
    queue: Mutex<Vec<(FetchEnvironment, oneshot::Sender<FetchOutcome>)>>,
    statistics: LoaderStatistics,
}

impl DataLoader {
    pub fn new(key: impl Into<String>, batch_loader: Arc<dyn BatchLoader>) -> DataLoader {
        DataLoader {
            key: key.into(),
            batch_loader,
            queue: Mutex::new(Vec::new()),
            statistics: LoaderStatistics::default(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Enqueues the fetch right away. The returned future completes once the
    /// batch holding it has been dispatched and resolved.
    pub fn load(
        &self,
        environment: FetchEnvironment,
    ) -> impl Future<Output = FetchOutcome> + Send + 'static {
        let (sender, receiver) = oneshot::channel();
        self.queue.lock().push((environment, sender));
        self.statistics.record_load();
        let key = self.key.clone();
        async move {
            receiver
                .await
                .unwrap_or_else(|_| Err(FetchError::Cancelled(key)))
        }
    }

    pub fn has_pending(&self) -> bool {
        !self.queue.lock().is_empty()
    }

    pub fn statistics(&self) -> StatisticsSnapshot {
        self.statistics.snapshot()
    }

    /// Takes the queued fetches as one batch, if there are any.
    pub fn dispatch<'a>(&'a self, context: &'a BraidContext) -> Option<BoxFuture<'a, ()>> {
        let batch = std::mem::take(&mut *self.queue.lock());
        if batch.is_empty() {
            return None;
        }
        let (environments, senders): (Vec<_>, Vec<_>) = batch.into_iter().unzip();
        self.statistics.record_batch(environments.len());
        debug!(key = %self.key, fetches = environments.len(), "dispatching batch");

        Some(
            async move {
                let expected = senders.len();
                let outcomes: Vec<FetchOutcome> =
                    match self.batch_loader.load(environments, context).await {
                        Ok(results) if results.len() == expected => {
                            results.into_iter().map(Ok).collect()
                        }
                        Ok(results) => vec![
                            Err(FetchError::ResultCountMismatch {
                                expected,
                                actual: results.len(),
                            });
                            expected
                        ],
                        Err(error) => {
                            warn!(
                                key = %self.key,
                                error = &error as &dyn std::error::Error,
                                "batch failed"
                            );
                            vec![Err(error); expected]
                        }
                    };
                for (sender, outcome) in senders.into_iter().zip(outcomes) {
                    if outcome.is_err() {
                        self.statistics.record_error();
                    }
                    // the resolver may be gone already
                    let _ = sender.send(outcome);
                }
            }
            .boxed(),
        )
    }
}

/// The loaders of one request, keyed by batch key.
#[derive(Default)]
pub struct DataLoaderRegistry {
    loaders: IndexMap<String, DataLoader>,
}

impl DataLoaderRegistry {
    pub fn new(batch_loaders: &IndexMap<String, Arc<dyn BatchLoader>>) -> DataLoaderRegistry {
        DataLoaderRegistry {
            loaders: batch_loaders
                .iter()
                .map(|(key, batch_loader)| {
                    (key.clone(), DataLoader::new(key.clone(), batch_loader.clone()))
                })
                .collect(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&DataLoader> {
        self.loaders.get(key)
    }

    pub fn has_pending(&self) -> bool {
        self.loaders.values().any(DataLoader::has_pending)
    }

    pub fn dispatch_all<'a>(&'a self, context: &'a BraidContext) -> Vec<BoxFuture<'a, ()>> {
        self.loaders
            .values()
            .filter_map(|loader| loader.dispatch(context))
            .collect()
    }

    /// Statistics of every loader that was used, plus their sum.
    pub fn statistics(&self) -> Value {
        let mut overall = StatisticsSnapshot::default();
        let mut individual = Map::new();
        for loader in self.loaders.values() {
            let statistics = loader.statistics();
            if statistics.load_count == 0 {
                continue;
            }
            overall = overall + statistics;
            individual.insert(loader.key.clone(), json!(statistics));
        }
        json!({
            "overall-statistics": overall,
            "individual-statistics": individual,
        })
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use graphql_parser::query::Type;
    use indexmap::IndexMap;
    use serde_json::{json, Value};

    use super::{BatchLoader, DataLoaderRegistry};
    use crate::ast::new_field;
    use crate::context::BraidContext;
    use crate::error::FetchError;
    use crate::fetch::{FetchEnvironment, FieldResult};
    use crate::loader::scheduler::dispatching;
    use crate::schema::TypeRegistry;

    struct Echo {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl BatchLoader for Echo {
        async fn load(
            &self,
            environments: Vec<FetchEnvironment>,
            _context: &BraidContext,
        ) -> Result<Vec<FieldResult>, FetchError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(environments
                .into_iter()
                .map(|environment| FieldResult::new(json!(environment.field.name)))
                .collect())
        }
    }

    struct Failing;

    #[async_trait]
    impl BatchLoader for Failing {
        async fn load(
            &self,
            _environments: Vec<FetchEnvironment>,
            _context: &BraidContext,
        ) -> Result<Vec<FieldResult>, FetchError> {
            Err(FetchError::Transport {
                target: "http://localhost".to_string(),
                message: "connection refused".to_string(),
            })
        }
    }

    fn environment(name: &str) -> FetchEnvironment {
        FetchEnvironment {
            field: new_field(name),
            field_type: Type::NamedType("String".to_string()),
            parent_type: "Query".to_string(),
            parent_operation: None,
            source: None,
            path: vec![name.into()],
        }
    }

    fn context(loaders: IndexMap<String, Arc<dyn BatchLoader>>) -> BraidContext {
        BraidContext::new(
            Arc::new(TypeRegistry::default()),
            DataLoaderRegistry::new(&loaders),
        )
    }

    #[tokio::test]
    async fn coalesces_fetches_enqueued_together() {
        let echo = Arc::new(Echo {
            calls: AtomicUsize::new(0),
        });
        let mut loaders: IndexMap<String, Arc<dyn BatchLoader>> = IndexMap::new();
        loaders.insert("Query.a".to_string(), echo.clone());
        let context = context(loaders);
        context.dispatch_state().enter_fields();

        let loader = context.loaders().get("Query.a").unwrap();
        let first = loader.load(environment("one"));
        let second = loader.load(environment("two"));
        let (first, second) = dispatching(&context, futures::future::join(first, second)).await;

        assert_eq!(first.unwrap().data, json!("one"));
        assert_eq!(second.unwrap().data, json!("two"));
        assert_eq!(echo.calls.load(Ordering::SeqCst), 1);
        assert_eq!(
            context.loaders().statistics(),
            json!({
                "overall-statistics": {
                    "loadCount": 2, "batchInvokeCount": 1, "batchLoadCount": 2, "loadErrorCount": 0
                },
                "individual-statistics": {
                    "Query.a": {
                        "loadCount": 2, "batchInvokeCount": 1, "batchLoadCount": 2, "loadErrorCount": 0
                    }
                }
            })
        );
    }

    #[tokio::test]
    async fn batch_failures_reach_every_fetch() {
        let mut loaders: IndexMap<String, Arc<dyn BatchLoader>> = IndexMap::new();
        loaders.insert("Query.a".to_string(), Arc::new(Failing));
        let context = context(loaders);
        context.dispatch_state().enter_fields();

        let loader = context.loaders().get("Query.a").unwrap();
        let first = loader.load(environment("one"));
        let second = loader.load(environment("two"));
        let (first, second) = dispatching(&context, futures::future::join(first, second)).await;

        assert!(matches!(first, Err(FetchError::Transport { .. })));
        assert!(matches!(second, Err(FetchError::Transport { .. })));
        assert_eq!(
            context.loaders().statistics()["overall-statistics"]["loadErrorCount"],
            Value::from(2)
        );
    }

    #[tokio::test]
    async fn dropped_queues_cancel_their_fetches() {
        let mut loaders: IndexMap<String, Arc<dyn BatchLoader>> = IndexMap::new();
        loaders.insert("Query.a".to_string(), Arc::new(Failing));
        let context = context(loaders);

        let pending = context.loaders().get("Query.a").unwrap().load(environment("one"));
        drop(context);

        assert!(matches!(pending.await, Err(FetchError::Cancelled(key)) if key == "Query.a"));
    }
}
