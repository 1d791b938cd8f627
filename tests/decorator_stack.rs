// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Behavior of stacked decorators over a real base client.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use mockall::mock;

use instrumented_clients::telemetry::{find, Recorder, SpanStatus, Value};
use instrumented_clients::testing::{
    CountingRecorder, InMemoryClient, LogLevel, RecordingLogger, RecordingTracer,
};
use instrumented_clients::{
    ClientError, ClientExt, Context, CreateOptions, DeleteOptions, DynamicObject, GetOptions,
    InstrumentConfig, Instrumentation, Layer, ListOptions, ObjectList, Operation, PatchOptions,
    PatchType, ResourceClient, ResourceDescriptor, Result, SharedClient, UpdateOptions,
    WatchEvent, WatchStream, WithLogging, WithMetrics, WithTracing,
};

// ============================================================================
// Helpers
// ============================================================================

struct Sinks {
    tracer: RecordingTracer,
    logger: Arc<RecordingLogger>,
    recorder: Arc<CountingRecorder>,
}

impl Sinks {
    fn new() -> Self {
        Self {
            tracer: RecordingTracer::new(),
            logger: Arc::new(RecordingLogger::new()),
            recorder: Arc::new(CountingRecorder::new()),
        }
    }

    fn factory(&self, layers: Vec<Layer>) -> Instrumentation {
        Instrumentation::new(InstrumentConfig {
            layers,
            ..Default::default()
        })
        .unwrap()
        .with_tracer(Arc::new(self.tracer.clone()))
        .with_logger(self.logger.clone())
        .with_recorder(self.recorder.clone())
    }
}

type FullStack<C> = WithLogging<WithMetrics<WithTracing<C>>>;

fn full_stack<C>(inner: C, sinks: &Sinks) -> FullStack<C> {
    WithTracing::with_tracer(inner, Arc::new(sinks.tracer.clone()), "CoreV1", "ConfigMaps")
        .unwrap()
        .with_metrics(sinks.recorder.clone())
        .with_logging(sinks.logger.clone())
}

fn config_maps() -> ResourceDescriptor {
    ResourceDescriptor::new("CoreV1", "ConfigMaps").unwrap()
}

/// Run a fixed mix of succeeding and failing calls, returning each outcome
/// rendered for comparison.
async fn run_script(client: &dyn ResourceClient<DynamicObject>) -> Vec<String> {
    let ctx = Context::background();
    let obj = DynamicObject::new("app").with_data(serde_json::json!({"mode": "blue"}));
    let mut stale = obj.clone();
    stale.resource_version = Some("0".to_string());

    let create = CreateOptions::default();
    let update = UpdateOptions::default();
    let get = GetOptions::default();
    let list = ListOptions::default();
    let delete = DeleteOptions::default();
    let patch = PatchOptions::default();
    let green = br#"{"data":{"mode":"green"}}"#;

    vec![
        show(client.create(&ctx, &obj, &create).await),
        show(client.create(&ctx, &obj, &create).await),
        show(client.get(&ctx, "app", &get).await),
        show(client.get(&ctx, "absent", &get).await),
        show(client.update(&ctx, &stale, &update).await),
        show(client.update_status(&ctx, &obj, &update).await),
        show(client.patch(&ctx, "app", PatchType::Merge, green, &patch).await),
        show(client.patch(&ctx, "app", PatchType::Json, b"[]", &patch).await),
        show(client.list(&ctx, &list).await),
        show(client.watch(&ctx, &list).await.map(|_| ())),
        show(client.delete(&ctx, "absent", &delete).await),
        show(client.delete(&ctx, "app", &delete).await),
        show(client.delete_collection(&ctx, &delete, &list).await),
    ]
}

fn show<T: std::fmt::Debug>(outcome: Result<T>) -> String {
    format!("{:?}", outcome)
}

/// Calls made by [`run_script`].
const SCRIPT_CALLS: usize = 13;

/// Calls in [`run_script`] that fail.
const SCRIPT_FAILURES: usize = 5;

// ============================================================================
// Transparency
// ============================================================================

#[tokio::test]
async fn test_outcomes_identical_at_every_depth() {
    let bare = InMemoryClient::<DynamicObject>::new("ConfigMap");
    let expected = run_script(&bare).await;

    let stacks = [
        vec![],
        vec![Layer::Tracing],
        vec![Layer::Tracing, Layer::Metrics],
        vec![Layer::Tracing, Layer::Metrics, Layer::Logging],
        vec![Layer::Logging, Layer::Tracing, Layer::Tracing],
    ];
    for layers in stacks {
        let sinks = Sinks::new();
        let client: SharedClient<DynamicObject> = sinks
            .factory(layers.clone())
            .instrument(InMemoryClient::new("ConfigMap"), &config_maps())
            .unwrap();

        assert_eq!(run_script(client.as_ref()).await, expected, "layers {:?}", layers);
    }
}

#[tokio::test]
async fn test_injected_error_passes_through_unchanged() {
    let sinks = Sinks::new();
    let inner = InMemoryClient::<DynamicObject>::new("ConfigMap");
    let error = ClientError::Multiple(vec![
        ClientError::Transport("connection reset".into()),
        ClientError::Forbidden("rbac".into()),
    ]);
    inner.inject_error(Operation::List, error.clone());
    let client = full_stack(inner, &sinks);

    let result = client.list(&Context::background(), &ListOptions::default()).await;
    assert_eq!(result, Err(error));
}

// ============================================================================
// Per-call guarantees
// ============================================================================

#[tokio::test]
async fn test_spans_balanced() {
    let sinks = Sinks::new();
    let client = full_stack(InMemoryClient::<DynamicObject>::new("ConfigMap"), &sinks);

    run_script(&client).await;

    let spans = sinks.tracer.spans();
    assert_eq!(spans.len(), SCRIPT_CALLS);
    assert!(spans.iter().all(|s| s.end_calls == 1));
    assert_eq!(sinks.tracer.open_spans(), 0);
    assert_eq!(
        spans.iter().filter(|s| s.status.is_error()).count(),
        SCRIPT_FAILURES
    );
}

#[tokio::test]
async fn test_one_metric_per_call() {
    let sinks = Sinks::new();
    let client = full_stack(InMemoryClient::<DynamicObject>::new("ConfigMap"), &sinks);

    run_script(&client).await;

    assert_eq!(sinks.recorder.total(), SCRIPT_CALLS);
    assert_eq!(sinks.recorder.count("create"), 2);
    assert_eq!(sinks.recorder.count("update_status"), 1);
    assert_eq!(sinks.recorder.count("delete_collection"), 1);
}

#[tokio::test]
async fn test_one_log_entry_per_call() {
    let sinks = Sinks::new();
    let client = full_stack(InMemoryClient::<DynamicObject>::new("ConfigMap"), &sinks);

    run_script(&client).await;

    let entries = sinks.logger.entries();
    assert_eq!(entries.len(), SCRIPT_CALLS);
    let failures: Vec<_> = entries
        .iter()
        .filter(|e| e.level == LogLevel::Error)
        .collect();
    assert_eq!(failures.len(), SCRIPT_FAILURES);
    assert!(failures.iter().all(|e| e.message.ends_with(" failed") && e.error.is_some()));
    assert!(entries
        .iter()
        .filter(|e| e.level == LogLevel::Info)
        .all(|e| e.message.ends_with(" done") && e.error.is_none()));
}

// ============================================================================
// Nesting
// ============================================================================

/// Recorder that notes how many spans were still open at record time.
struct SpanAwareRecorder {
    tracer: RecordingTracer,
    open_at_record: std::sync::Mutex<Vec<usize>>,
}

impl Recorder for SpanAwareRecorder {
    fn record(&self, _operation: &str, _elapsed: Duration) {
        self.open_at_record
            .lock()
            .unwrap()
            .push(self.tracer.open_spans());
    }
}

#[tokio::test]
async fn test_layers_unwind_inside_out() {
    let sinks = Sinks::new();
    let recorder = Arc::new(SpanAwareRecorder {
        tracer: sinks.tracer.clone(),
        open_at_record: std::sync::Mutex::new(Vec::new()),
    });
    let client = WithTracing::with_tracer(
        InMemoryClient::<DynamicObject>::new("ConfigMap"),
        Arc::new(sinks.tracer.clone()),
        "CoreV1",
        "ConfigMaps",
    )
    .unwrap()
    .with_metrics(recorder.clone())
    .with_logging(sinks.logger.clone());

    client
        .get(&Context::background(), "absent", &GetOptions::default())
        .await
        .unwrap_err();

    // The span had ended before the metric was recorded.
    assert_eq!(*recorder.open_at_record.lock().unwrap(), vec![0]);
    assert_eq!(sinks.logger.entries().len(), 1);
}

#[tokio::test]
async fn test_nested_tracing_layers_form_parent_child() {
    let sinks = Sinks::new();
    let client = sinks
        .factory(vec![Layer::Tracing, Layer::Tracing])
        .instrument(InMemoryClient::<DynamicObject>::new("ConfigMap"), &config_maps())
        .unwrap();

    client
        .list(&Context::background(), &ListOptions::default())
        .await
        .unwrap();

    let spans = sinks.tracer.spans();
    assert_eq!(spans.len(), 2);
    let (outer, inner) = (&spans[0], &spans[1]);
    assert!(outer.context.is_root());
    assert_eq!(inner.context.trace_id, outer.context.trace_id);
    assert_eq!(inner.context.parent_span_id, Some(outer.context.span_id));
    assert!(inner.ended.unwrap() <= outer.ended.unwrap());
}

#[tokio::test]
async fn test_base_client_sees_innermost_span() {
    let sinks = Sinks::new();
    let inner = Arc::new(InMemoryClient::<DynamicObject>::new("ConfigMap"));
    let client = full_stack(Arc::clone(&inner), &sinks);

    client
        .list(&Context::background(), &ListOptions::default())
        .await
        .unwrap();

    let calls = inner.calls();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].operation, Operation::List);
    assert_eq!(calls[0].span, Some(sinks.tracer.spans()[0].context));
}

// ============================================================================
// Scenarios
// ============================================================================

#[tokio::test]
async fn test_create_success_scenario() {
    let sinks = Sinks::new();
    let inner =
        InMemoryClient::<DynamicObject>::new("ConfigMap").with_latency(Duration::from_millis(5));
    let client = full_stack(inner, &sinks);

    let obj = DynamicObject::new("settings").within("default");
    let created = client
        .create(&Context::background(), &obj, &CreateOptions::default())
        .await
        .unwrap();
    assert_eq!(created.name, "settings");
    assert_eq!(created.resource_version.as_deref(), Some("1"));

    let spans = sinks.tracer.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].name, "KUBE CoreV1/ConfigMaps/Create");
    assert_eq!(spans[0].status, SpanStatus::Ok);
    assert_eq!(spans[0].end_calls, 1);

    let observations = sinks.recorder.observations();
    assert_eq!(observations.len(), 1);
    assert_eq!(observations[0].0, "create");
    assert!(observations[0].1 >= Duration::from_millis(5));

    let entries = sinks.logger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, LogLevel::Info);
    assert_eq!(entries[0].message, "Create done");
    match find(&entries[0].attributes, "duration") {
        Some(Value::Duration(elapsed)) => assert!(*elapsed >= Duration::from_millis(5)),
        other => panic!("unexpected duration attribute: {:?}", other),
    }
}

#[tokio::test]
async fn test_create_conflict_scenario() {
    let sinks = Sinks::new();
    let inner = InMemoryClient::<DynamicObject>::new("ConfigMap");
    let conflict = ClientError::Conflict("object has been modified".into());
    inner.inject_error(Operation::Create, conflict.clone());
    let client = full_stack(inner, &sinks);

    let result = client
        .create(&Context::background(), &DynamicObject::new("settings"), &CreateOptions::default())
        .await;
    assert_eq!(result, Err(conflict));

    let spans = sinks.tracer.spans();
    assert_eq!(
        spans[0].status,
        SpanStatus::error("Conflict: object has been modified")
    );
    assert_eq!(spans[0].end_calls, 1);
    assert_eq!(sinks.recorder.count("create"), 1);

    let entries = sinks.logger.entries();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].level, LogLevel::Error);
    assert_eq!(entries[0].message, "Create failed");
    assert_eq!(
        entries[0].error.as_deref(),
        Some("Conflict: object has been modified")
    );
}

#[tokio::test]
async fn test_cancellation_forwarded() {
    let sinks = Sinks::new();
    let client = full_stack(InMemoryClient::<DynamicObject>::new("ConfigMap"), &sinks);
    let (ctx, handle) = Context::background().with_cancel();
    handle.cancel();

    let result = client.get(&ctx, "settings", &GetOptions::default()).await;
    assert_eq!(result, Err(ClientError::Cancelled));
    assert_eq!(sinks.tracer.spans()[0].status, SpanStatus::error("Operation cancelled"));
    assert_eq!(sinks.recorder.total(), 1);
}

#[tokio::test]
async fn test_deadline_forwarded() {
    let sinks = Sinks::new();
    let inner =
        InMemoryClient::<DynamicObject>::new("ConfigMap").with_latency(Duration::from_secs(30));
    let client = full_stack(inner, &sinks);
    let ctx = Context::background().with_timeout(Duration::from_millis(10));

    let result = client.list(&ctx, &ListOptions::default()).await;
    assert_eq!(result, Err(ClientError::DeadlineExceeded));
    assert_eq!(sinks.logger.entries()[0].message, "List failed");
}

#[tokio::test]
async fn test_watch_stream_passes_through() {
    let sinks = Sinks::new();
    let client = full_stack(InMemoryClient::<DynamicObject>::new("ConfigMap"), &sinks);
    let ctx = Context::background();

    let mut events: WatchStream<DynamicObject> =
        client.watch(&ctx, &ListOptions::default()).await.unwrap();
    client
        .create(&ctx, &DynamicObject::new("settings"), &CreateOptions::default())
        .await
        .unwrap();

    match events.recv().await {
        Some(WatchEvent::Added(obj)) => assert_eq!(obj.name, "settings"),
        other => panic!("unexpected event: {:?}", other),
    }
}

// ============================================================================
// Concurrency
// ============================================================================

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_shared_stack_under_concurrent_calls() {
    const TASKS: usize = 32;
    let sinks = Sinks::new();
    // Even names exist, odd names miss.
    let inner = InMemoryClient::<DynamicObject>::new("ConfigMap")
        .with_latency(Duration::from_millis(1))
        .with_objects((0..TASKS).step_by(2).map(|i| DynamicObject::new(format!("cm-{}", i))));
    let client = Arc::new(full_stack(inner, &sinks));

    let tasks: Vec<_> = (0..TASKS)
        .map(|i| {
            let client = Arc::clone(&client);
            tokio::spawn(async move {
                client
                    .get(&Context::background(), &format!("cm-{}", i), &GetOptions::default())
                    .await
            })
        })
        .collect();
    let mut failures = 0;
    for task in tasks {
        if task.await.unwrap().is_err() {
            failures += 1;
        }
    }
    assert_eq!(failures, TASKS / 2);

    assert_eq!(sinks.recorder.total(), TASKS);
    assert_eq!(sinks.recorder.count("get"), TASKS);

    let entries = sinks.logger.entries();
    assert_eq!(entries.len(), TASKS);
    assert_eq!(
        entries.iter().filter(|e| e.level == LogLevel::Error).count(),
        TASKS / 2
    );

    let spans = sinks.tracer.spans();
    assert_eq!(spans.len(), TASKS);
    assert_eq!(sinks.tracer.open_spans(), 0);
    assert!(spans.iter().all(|s| s.end_calls == 1 && s.context.is_root()));
    assert_eq!(spans.iter().filter(|s| s.status.is_error()).count(), TASKS / 2);
    let ids: std::collections::HashSet<_> = spans.iter().map(|s| s.context.span_id).collect();
    assert_eq!(ids.len(), TASKS);
}

// ============================================================================
// Mocked inner client
// ============================================================================

mock! {
    pub Client {}

    #[async_trait]
    impl ResourceClient<DynamicObject> for Client {
        async fn create(
            &self,
            ctx: &Context,
            obj: &DynamicObject,
            opts: &CreateOptions,
        ) -> Result<DynamicObject>;
        async fn update(
            &self,
            ctx: &Context,
            obj: &DynamicObject,
            opts: &UpdateOptions,
        ) -> Result<DynamicObject>;
        async fn update_status(
            &self,
            ctx: &Context,
            obj: &DynamicObject,
            opts: &UpdateOptions,
        ) -> Result<DynamicObject>;
        async fn delete(&self, ctx: &Context, name: &str, opts: &DeleteOptions) -> Result<()>;
        async fn delete_collection(
            &self,
            ctx: &Context,
            opts: &DeleteOptions,
            list_opts: &ListOptions,
        ) -> Result<()>;
        async fn get(&self, ctx: &Context, name: &str, opts: &GetOptions) -> Result<DynamicObject>;
        async fn list(
            &self,
            ctx: &Context,
            opts: &ListOptions,
        ) -> Result<ObjectList<DynamicObject>>;
        async fn watch(
            &self,
            ctx: &Context,
            opts: &ListOptions,
        ) -> Result<WatchStream<DynamicObject>>;
        async fn patch(
            &self,
            ctx: &Context,
            name: &str,
            patch_type: PatchType,
            data: &[u8],
            opts: &PatchOptions,
        ) -> Result<DynamicObject>;
    }
}

#[tokio::test]
async fn test_inner_receives_span_and_arguments() {
    let sinks = Sinks::new();
    let mut mock = MockClient::new();
    mock.expect_get()
        .withf(|ctx, name, _| ctx.span_context().is_some() && name == "settings")
        .times(1)
        .returning(|_, name, _| Ok(DynamicObject::new(name)));
    let client = full_stack(mock, &sinks);

    let obj = client
        .get(&Context::background(), "settings", &GetOptions::default())
        .await
        .unwrap();
    assert_eq!(obj.name, "settings");
}

#[tokio::test]
async fn test_inner_panic_still_closes_span_and_records() {
    let sinks = Sinks::new();
    let mut mock = MockClient::new();
    mock.expect_delete()
        .returning(|_, _, _| panic!("transport blew up"));
    let client = Arc::new(full_stack(mock, &sinks));

    let task = {
        let client = Arc::clone(&client);
        tokio::spawn(async move {
            client
                .delete(&Context::background(), "settings", &DeleteOptions::default())
                .await
        })
    };
    let joined = task.await;
    assert!(joined.unwrap_err().is_panic());

    let spans = sinks.tracer.spans();
    assert_eq!(spans.len(), 1);
    assert_eq!(spans[0].end_calls, 1);
    assert!(spans[0].status.is_error());
    assert_eq!(sinks.recorder.count("delete"), 1);
    assert!(sinks.logger.entries().is_empty());
}
