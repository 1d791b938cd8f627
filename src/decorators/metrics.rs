// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Metrics decorator: one observation per call.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::client::ResourceClient;
use crate::context::Context;
use crate::descriptor::Operation;
use crate::error::Result;
use crate::telemetry::Recorder;
use crate::types::{
    CreateOptions, DeleteOptions, GetOptions, ListOptions, ObjectList, PatchOptions, PatchType,
    Resource, UpdateOptions, WatchStream,
};

/// Records one observation per call, whatever the outcome.
///
/// The observation is keyed by the operation's metric label (`create`,
/// `update_status`, ...) and carries the call's elapsed time. It is written
/// when the call finishes, panics, or is dropped.
pub struct WithMetrics<C> {
    inner: C,
    recorder: Arc<dyn Recorder>,
}

impl<C> WithMetrics<C> {
    pub fn new(inner: C, recorder: Arc<dyn Recorder>) -> Self {
        Self { inner, recorder }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn observe(&self, operation: Operation) -> Observation<'_> {
        Observation {
            recorder: self.recorder.as_ref(),
            operation,
            start: Instant::now(),
        }
    }
}

/// Pending observation, recorded on drop.
struct Observation<'a> {
    recorder: &'a dyn Recorder,
    operation: Operation,
    start: Instant,
}

impl Drop for Observation<'_> {
    fn drop(&mut self) {
        self.recorder
            .record(self.operation.metric_label(), self.start.elapsed());
    }
}

#[async_trait]
impl<K, C> ResourceClient<K> for WithMetrics<C>
where
    K: Resource,
    C: ResourceClient<K>,
{
    async fn create(&self, ctx: &Context, obj: &K, opts: &CreateOptions) -> Result<K> {
        let _observation = self.observe(Operation::Create);
        self.inner.create(ctx, obj, opts).await
    }

    async fn update(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> Result<K> {
        let _observation = self.observe(Operation::Update);
        self.inner.update(ctx, obj, opts).await
    }

    async fn update_status(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> Result<K> {
        let _observation = self.observe(Operation::UpdateStatus);
        self.inner.update_status(ctx, obj, opts).await
    }

    async fn delete(&self, ctx: &Context, name: &str, opts: &DeleteOptions) -> Result<()> {
        let _observation = self.observe(Operation::Delete);
        self.inner.delete(ctx, name, opts).await
    }

    async fn delete_collection(
        &self,
        ctx: &Context,
        opts: &DeleteOptions,
        list_opts: &ListOptions,
    ) -> Result<()> {
        let _observation = self.observe(Operation::DeleteCollection);
        self.inner.delete_collection(ctx, opts, list_opts).await
    }

    async fn get(&self, ctx: &Context, name: &str, opts: &GetOptions) -> Result<K> {
        let _observation = self.observe(Operation::Get);
        self.inner.get(ctx, name, opts).await
    }

    async fn list(&self, ctx: &Context, opts: &ListOptions) -> Result<ObjectList<K>> {
        let _observation = self.observe(Operation::List);
        self.inner.list(ctx, opts).await
    }

    async fn watch(&self, ctx: &Context, opts: &ListOptions) -> Result<WatchStream<K>> {
        let _observation = self.observe(Operation::Watch);
        self.inner.watch(ctx, opts).await
    }

    async fn patch(
        &self,
        ctx: &Context,
        name: &str,
        patch_type: PatchType,
        data: &[u8],
        opts: &PatchOptions,
    ) -> Result<K> {
        let _observation = self.observe(Operation::Patch);
        self.inner.patch(ctx, name, patch_type, data, opts).await
    }
}
