// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! In-memory resource client.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};

use crate::client::ResourceClient;
use crate::context::{Context, SpanContext};
use crate::descriptor::Operation;
use crate::error::{ClientError, Result};
use crate::types::{
    CreateOptions, DeleteOptions, GetOptions, ListOptions, ObjectList, PatchOptions, PatchType,
    Resource, UpdateOptions, WatchEvent, WatchStream,
};

/// Capacity of the per-watch channel.
const WATCH_BUFFER: usize = 64;

/// Capacity of the shared event fan-out.
const EVENT_BUFFER: usize = 256;

/// A call observed by [`InMemoryClient`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallRecord {
    pub operation: Operation,
    /// Span the caller's context referenced when the call arrived.
    pub span: Option<SpanContext>,
}

/// Base client that keeps objects in a map.
///
/// Used as the innermost client in tests and benchmarks. It honors the
/// context (a cancelled or expired context fails the call), supports
/// optimistic concurrency through resource versions, and fans changes out
/// to watchers. Failures can be injected per operation.
pub struct InMemoryClient<K: Resource> {
    kind: String,
    objects: RwLock<BTreeMap<String, K>>,
    version: AtomicU64,
    events: broadcast::Sender<WatchEvent<K>>,
    failures: Mutex<HashMap<Operation, ClientError>>,
    calls: Mutex<Vec<CallRecord>>,
    latency: Option<Duration>,
}

impl<K: Resource> InMemoryClient<K> {
    /// Create an empty store. `kind` names objects in error messages.
    pub fn new(kind: impl Into<String>) -> Self {
        let (events, _) = broadcast::channel(EVENT_BUFFER);
        Self {
            kind: kind.into(),
            objects: RwLock::new(BTreeMap::new()),
            version: AtomicU64::new(0),
            events,
            failures: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            latency: None,
        }
    }

    /// Delay every call by `latency`. The delay is cut short when the
    /// context is done.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Seed the store with objects, bypassing the client contract.
    pub fn with_objects(self, objects: impl IntoIterator<Item = K>) -> Self {
        for mut obj in objects {
            obj.set_resource_version(self.next_version());
            write(&self.objects).insert(obj.name().to_string(), obj);
        }
        self
    }

    /// Fail the next call of `operation` with `error`.
    pub fn inject_error(&self, operation: Operation, error: ClientError) {
        lock(&self.failures).insert(operation, error);
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<CallRecord> {
        lock(&self.calls).clone()
    }

    pub fn call_count(&self) -> usize {
        lock(&self.calls).len()
    }

    /// Number of stored objects.
    pub fn len(&self) -> usize {
        read(&self.objects).len()
    }

    pub fn is_empty(&self) -> bool {
        read(&self.objects).is_empty()
    }

    fn next_version(&self) -> String {
        (self.version.fetch_add(1, Ordering::SeqCst) + 1).to_string()
    }

    fn current_version(&self) -> String {
        self.version.load(Ordering::SeqCst).to_string()
    }

    fn not_found(&self, name: &str) -> ClientError {
        ClientError::not_found(&self.kind, name)
    }

    fn publish(&self, event: WatchEvent<K>) {
        // No subscribers is fine.
        let _ = self.events.send(event);
    }

    /// Common entry for every call: record it, honor the context, apply
    /// latency and injected failures.
    async fn enter(&self, ctx: &Context, operation: Operation) -> Result<()> {
        lock(&self.calls).push(CallRecord {
            operation,
            span: ctx.span_context().copied(),
        });

        if let Some(err) = ctx.err() {
            return Err(err);
        }
        if let Some(latency) = self.latency {
            tokio::select! {
                err = ctx.done() => return Err(err),
                _ = tokio::time::sleep(latency) => {}
            }
        }
        match lock(&self.failures).remove(&operation) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    fn store(&self, obj: &K, dry_run: bool, must_exist: bool) -> Result<K> {
        let mut objects = write(&self.objects);
        let name = obj.name().to_string();

        match (objects.get(&name), must_exist) {
            (Some(_), false) => return Err(ClientError::already_exists(&self.kind, &name)),
            (None, true) => return Err(self.not_found(&name)),
            (Some(existing), true) => {
                if let Some(expected) = obj.resource_version() {
                    if existing.resource_version() != Some(expected) {
                        return Err(ClientError::Conflict(format!(
                            "{} \"{}\" has been modified",
                            self.kind, name
                        )));
                    }
                }
            }
            (None, false) => {}
        }

        let mut stored = obj.clone();
        if dry_run {
            return Ok(stored);
        }
        stored.set_resource_version(self.next_version());
        objects.insert(name, stored.clone());
        drop(objects);

        self.publish(if must_exist {
            WatchEvent::Modified(stored.clone())
        } else {
            WatchEvent::Added(stored.clone())
        });
        Ok(stored)
    }

    fn apply_patch(
        &self,
        name: &str,
        patch_type: PatchType,
        data: &[u8],
        dry_run: bool,
    ) -> Result<K> {
        if patch_type != PatchType::Merge {
            return Err(ClientError::Unsupported(format!(
                "{:?} patch on in-memory client",
                patch_type
            )));
        }
        let patch: Value = serde_json::from_slice(data)
            .map_err(|e| ClientError::Invalid(format!("malformed patch: {}", e)))?;

        let mut objects = write(&self.objects);
        let existing = objects.get(name).ok_or_else(|| self.not_found(name))?;
        let mut document = serde_json::to_value(existing)
            .map_err(|e| ClientError::Invalid(e.to_string()))?;
        merge_patch(&mut document, &patch);

        let mut patched: K = serde_json::from_value(document)
            .map_err(|e| ClientError::Invalid(format!("patched object is invalid: {}", e)))?;
        if patched.name() != name {
            return Err(ClientError::Invalid("patch cannot rename an object".to_string()));
        }
        if dry_run {
            return Ok(patched);
        }
        patched.set_resource_version(self.next_version());
        objects.insert(name.to_string(), patched.clone());
        drop(objects);

        self.publish(WatchEvent::Modified(patched.clone()));
        Ok(patched)
    }
}

#[async_trait]
impl<K: Resource> ResourceClient<K> for InMemoryClient<K> {
    async fn create(&self, ctx: &Context, obj: &K, opts: &CreateOptions) -> Result<K> {
        self.enter(ctx, Operation::Create).await?;
        self.store(obj, opts.dry_run, false)
    }

    async fn update(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> Result<K> {
        self.enter(ctx, Operation::Update).await?;
        self.store(obj, opts.dry_run, true)
    }

    async fn update_status(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> Result<K> {
        self.enter(ctx, Operation::UpdateStatus).await?;
        self.store(obj, opts.dry_run, true)
    }

    async fn delete(&self, ctx: &Context, name: &str, opts: &DeleteOptions) -> Result<()> {
        self.enter(ctx, Operation::Delete).await?;
        let mut objects = write(&self.objects);
        if opts.dry_run && !objects.contains_key(name) {
            return Err(self.not_found(name));
        } else if opts.dry_run {
            return Ok(());
        }
        let removed = objects.remove(name).ok_or_else(|| self.not_found(name))?;
        drop(objects);

        self.publish(WatchEvent::Deleted(removed));
        Ok(())
    }

    async fn delete_collection(
        &self,
        ctx: &Context,
        opts: &DeleteOptions,
        _list_opts: &ListOptions,
    ) -> Result<()> {
        self.enter(ctx, Operation::DeleteCollection).await?;
        if opts.dry_run {
            return Ok(());
        }
        let removed = std::mem::take(&mut *write(&self.objects));
        for obj in removed.into_values() {
            self.publish(WatchEvent::Deleted(obj));
        }
        Ok(())
    }

    async fn get(&self, ctx: &Context, name: &str, _opts: &GetOptions) -> Result<K> {
        self.enter(ctx, Operation::Get).await?;
        read(&self.objects)
            .get(name)
            .cloned()
            .ok_or_else(|| self.not_found(name))
    }

    async fn list(&self, ctx: &Context, opts: &ListOptions) -> Result<ObjectList<K>> {
        self.enter(ctx, Operation::List).await?;
        let objects = read(&self.objects);
        // A zero limit means no limit.
        let limit = opts.limit.filter(|&limit| limit > 0);

        let remaining = objects.values().filter(|obj| match &opts.continue_token {
            Some(token) => obj.name() > token.as_str(),
            None => true,
        });
        let mut items: Vec<K> = match limit {
            Some(limit) => remaining.take(limit as usize + 1).cloned().collect(),
            None => remaining.cloned().collect(),
        };

        let mut continue_token = None;
        if let Some(limit) = limit {
            if items.len() > limit as usize {
                items.truncate(limit as usize);
                continue_token = items.last().map(|obj| obj.name().to_string());
            }
        }

        Ok(ObjectList {
            items,
            resource_version: Some(self.current_version()),
            continue_token,
        })
    }

    async fn watch(&self, ctx: &Context, _opts: &ListOptions) -> Result<WatchStream<K>> {
        self.enter(ctx, Operation::Watch).await?;

        let mut events = self.events.subscribe();
        let (tx, rx) = mpsc::channel(WATCH_BUFFER);
        let ctx = ctx.clone();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    err = ctx.done() => {
                        let _ = tx.send(WatchEvent::Error(err)).await;
                        break;
                    }
                    _ = tx.closed() => break,
                    event = events.recv() => match event {
                        Ok(event) => {
                            if tx.send(event).await.is_err() {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Lagged(missed)) => {
                            let err = ClientError::Expired(format!(
                                "watch fell behind by {} events",
                                missed
                            ));
                            let _ = tx.send(WatchEvent::Error(err)).await;
                            break;
                        }
                        Err(broadcast::error::RecvError::Closed) => break,
                    },
                }
            }
        });
        Ok(rx)
    }

    async fn patch(
        &self,
        ctx: &Context,
        name: &str,
        patch_type: PatchType,
        data: &[u8],
        opts: &PatchOptions,
    ) -> Result<K> {
        self.enter(ctx, Operation::Patch).await?;
        self.apply_patch(name, patch_type, data, opts.dry_run)
    }
}

/// Apply a JSON merge patch to `target` in place.
fn merge_patch(target: &mut Value, patch: &Value) {
    let Value::Object(patch) = patch else {
        *target = patch.clone();
        return;
    };
    if !target.is_object() {
        *target = Value::Object(Map::new());
    }
    if let Value::Object(fields) = target {
        for (key, value) in patch {
            if value.is_null() {
                fields.remove(key);
            } else {
                merge_patch(fields.entry(key.clone()).or_insert(Value::Null), value);
            }
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn read<T>(lock: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

fn write<T>(lock: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DynamicObject;
    use serde_json::json;

    fn store() -> InMemoryClient<DynamicObject> {
        InMemoryClient::new("ConfigMap")
    }

    #[tokio::test]
    async fn test_create_get_roundtrip() {
        let client = store();
        let ctx = Context::background();

        let created = client
            .create(&ctx, &DynamicObject::new("a"), &CreateOptions::default())
            .await
            .unwrap();
        assert_eq!(created.resource_version.as_deref(), Some("1"));

        let fetched = client.get(&ctx, "a", &GetOptions::default()).await.unwrap();
        assert_eq!(fetched, created);
    }

    #[tokio::test]
    async fn test_dry_run_does_not_persist() {
        let client = store();
        let opts = CreateOptions {
            dry_run: true,
            ..Default::default()
        };
        client
            .create(&Context::background(), &DynamicObject::new("a"), &opts)
            .await
            .unwrap();
        assert!(client.is_empty());
    }

    #[tokio::test]
    async fn test_update_conflict_on_stale_version() {
        let client = store().with_objects([DynamicObject::new("a")]);
        let ctx = Context::background();

        let mut stale = DynamicObject::new("a");
        stale.resource_version = Some("0".to_string());
        let result = client.update(&ctx, &stale, &UpdateOptions::default()).await;
        assert!(matches!(result, Err(ClientError::Conflict(_))));

        let current = client.get(&ctx, "a", &GetOptions::default()).await.unwrap();
        let updated = client
            .update(&ctx, &current, &UpdateOptions::default())
            .await
            .unwrap();
        assert_eq!(updated.resource_version.as_deref(), Some("2"));
    }

    #[tokio::test]
    async fn test_list_pagination() {
        let client = store().with_objects(["a", "b", "c"].map(DynamicObject::new));
        let ctx = Context::background();

        let first = client
            .list(&ctx, &ListOptions::default().with_limit(2))
            .await
            .unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(first.continue_token.as_deref(), Some("b"));

        let second = client
            .list(&ctx, &ListOptions::default().with_limit(2).continue_from("b"))
            .await
            .unwrap();
        assert_eq!(second.len(), 1);
        assert_eq!(second.items[0].name, "c");
        assert!(!second.has_more());
    }

    #[tokio::test]
    async fn test_list_zero_limit_is_unbounded() {
        let client = store().with_objects(["a", "b", "c"].map(DynamicObject::new));

        let list = client
            .list(&Context::background(), &ListOptions::default().with_limit(0))
            .await
            .unwrap();
        assert_eq!(list.len(), 3);
        assert!(list.continue_token.is_none());
    }

    #[tokio::test]
    async fn test_merge_patch() {
        let client = store()
            .with_objects([DynamicObject::new("a").with_data(json!({"x": 1, "y": 2}))]);
        let patched = client
            .patch(
                &Context::background(),
                "a",
                PatchType::Merge,
                br#"{"data":{"y":null,"z":3}}"#,
                &PatchOptions::default(),
            )
            .await
            .unwrap();
        assert_eq!(patched.data, json!({"x": 1, "z": 3}));
    }

    #[tokio::test]
    async fn test_unsupported_patch_type() {
        let client = store().with_objects([DynamicObject::new("a")]);
        let result = client
            .patch(&Context::background(), "a", PatchType::Json, b"[]", &PatchOptions::default())
            .await;
        assert!(matches!(result, Err(ClientError::Unsupported(_))));
    }

    #[tokio::test]
    async fn test_watch_sees_changes() {
        let client = store();
        let ctx = Context::background();
        let mut events = client.watch(&ctx, &ListOptions::default()).await.unwrap();

        client
            .create(&ctx, &DynamicObject::new("a"), &CreateOptions::default())
            .await
            .unwrap();
        client.delete(&ctx, "a", &DeleteOptions::default()).await.unwrap();

        assert!(matches!(events.recv().await, Some(WatchEvent::Added(obj)) if obj.name == "a"));
        assert!(matches!(events.recv().await, Some(WatchEvent::Deleted(obj)) if obj.name == "a"));
    }

    #[tokio::test]
    async fn test_lagging_watch_ends_with_expired() {
        let client = store();
        let ctx = Context::background();
        let mut events = client.watch(&ctx, &ListOptions::default()).await.unwrap();

        // Nothing yields here, so the forwarder falls behind the fan-out.
        for i in 0..EVENT_BUFFER + 8 {
            client
                .create(&ctx, &DynamicObject::new(format!("cm-{}", i)), &CreateOptions::default())
                .await
                .unwrap();
        }

        match events.recv().await {
            Some(WatchEvent::Error(ClientError::Expired(message))) => {
                assert_eq!(message, "watch fell behind by 8 events")
            }
            other => panic!("unexpected event: {:?}", other),
        }
        assert!(events.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancelled_context_fails_call() {
        let client = store();
        let (ctx, handle) = Context::background().with_cancel();
        handle.cancel();

        let result = client.list(&ctx, &ListOptions::default()).await;
        assert_eq!(result, Err(ClientError::Cancelled));
    }

    #[tokio::test]
    async fn test_deadline_cuts_latency_short() {
        let client = store().with_latency(Duration::from_secs(60));
        let ctx = Context::background().with_timeout(Duration::from_millis(10));

        let result = client.get(&ctx, "a", &GetOptions::default()).await;
        assert_eq!(result, Err(ClientError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn test_injected_error_is_one_shot() {
        let client = store();
        let ctx = Context::background();
        client.inject_error(Operation::List, ClientError::Transport("reset".into()));

        assert!(client.list(&ctx, &ListOptions::default()).await.is_err());
        assert!(client.list(&ctx, &ListOptions::default()).await.is_ok());
        assert_eq!(client.call_count(), 2);
    }
}
