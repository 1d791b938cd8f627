// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Tracing decorator: one span per call.

use std::sync::Arc;

use async_trait::async_trait;

use crate::client::ResourceClient;
use crate::context::Context;
use crate::descriptor::{Operation, ResourceDescriptor};
use crate::error::{ConfigError, Result};
use crate::telemetry::{
    start_span, KeyValue, SpanGuard, Tracer, TracingTracer, CLIENT_GROUP_KEY, CLIENT_KIND_KEY,
    CLIENT_OPERATION_KEY,
};
use crate::types::{
    CreateOptions, DeleteOptions, GetOptions, ListOptions, ObjectList, PatchOptions, PatchType,
    Resource, UpdateOptions, WatchStream,
};

/// Opens a child span around every call.
///
/// The span is named `"<PROTOCOL> <client>/<kind>/<Operation>"` and the
/// inner client receives a context that references it, so spans opened
/// further in (by another tracing layer or by the transport) become its
/// children. The span status is taken from the outcome, and the span is
/// ended even when the inner call panics or is dropped. It is closed before
/// the call returns, even when the inner client keeps the context (a watch
/// stream does).
pub struct WithTracing<C> {
    inner: C,
    resource: ResourceDescriptor,
    tracer: Arc<dyn Tracer>,
}

impl<C> WithTracing<C> {
    /// Wrap `inner` using the `tracing` backed tracer.
    ///
    /// Fails if `client` or `kind` cannot label a span.
    pub fn new(inner: C, client: &str, kind: &str) -> std::result::Result<Self, ConfigError> {
        Self::with_tracer(inner, Arc::new(TracingTracer), client, kind)
    }

    /// Wrap `inner` using a specific tracer.
    pub fn with_tracer(
        inner: C,
        tracer: Arc<dyn Tracer>,
        client: &str,
        kind: &str,
    ) -> std::result::Result<Self, ConfigError> {
        let resource = ResourceDescriptor::new(client, kind)?;
        Ok(Self::from_descriptor(inner, resource, tracer))
    }

    /// Wrap `inner` with an already validated descriptor.
    pub fn from_descriptor(
        inner: C,
        resource: ResourceDescriptor,
        tracer: Arc<dyn Tracer>,
    ) -> Self {
        Self {
            inner,
            resource,
            tracer,
        }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn descriptor(&self) -> &ResourceDescriptor {
        &self.resource
    }

    fn start(&self, ctx: &Context, operation: Operation) -> (Context, SpanGuard) {
        let name = self.resource.operation(operation).span_name();
        let attributes = vec![
            KeyValue::new(CLIENT_GROUP_KEY, self.resource.group()),
            KeyValue::new(CLIENT_KIND_KEY, self.resource.kind()),
            KeyValue::new(CLIENT_OPERATION_KEY, operation.as_str()),
        ];
        start_span(self.tracer.as_ref(), ctx, &name, attributes)
    }
}

#[async_trait]
impl<K, C> ResourceClient<K> for WithTracing<C>
where
    K: Resource,
    C: ResourceClient<K>,
{
    async fn create(&self, ctx: &Context, obj: &K, opts: &CreateOptions) -> Result<K> {
        let (ctx, span) = self.start(ctx, Operation::Create);
        let result = span.scoped(self.inner.create(&ctx, obj, opts)).await;
        span.finish(&result);
        result
    }

    async fn update(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> Result<K> {
        let (ctx, span) = self.start(ctx, Operation::Update);
        let result = span.scoped(self.inner.update(&ctx, obj, opts)).await;
        span.finish(&result);
        result
    }

    async fn update_status(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> Result<K> {
        let (ctx, span) = self.start(ctx, Operation::UpdateStatus);
        let result = span.scoped(self.inner.update_status(&ctx, obj, opts)).await;
        span.finish(&result);
        result
    }

    async fn delete(&self, ctx: &Context, name: &str, opts: &DeleteOptions) -> Result<()> {
        let (ctx, span) = self.start(ctx, Operation::Delete);
        let result = span.scoped(self.inner.delete(&ctx, name, opts)).await;
        span.finish(&result);
        result
    }

    async fn delete_collection(
        &self,
        ctx: &Context,
        opts: &DeleteOptions,
        list_opts: &ListOptions,
    ) -> Result<()> {
        let (ctx, span) = self.start(ctx, Operation::DeleteCollection);
        let result = span.scoped(self.inner.delete_collection(&ctx, opts, list_opts)).await;
        span.finish(&result);
        result
    }

    async fn get(&self, ctx: &Context, name: &str, opts: &GetOptions) -> Result<K> {
        let (ctx, span) = self.start(ctx, Operation::Get);
        let result = span.scoped(self.inner.get(&ctx, name, opts)).await;
        span.finish(&result);
        result
    }

    async fn list(&self, ctx: &Context, opts: &ListOptions) -> Result<ObjectList<K>> {
        let (ctx, span) = self.start(ctx, Operation::List);
        let result = span.scoped(self.inner.list(&ctx, opts)).await;
        span.finish(&result);
        result
    }

    async fn watch(&self, ctx: &Context, opts: &ListOptions) -> Result<WatchStream<K>> {
        let (ctx, span) = self.start(ctx, Operation::Watch);
        let result = span.scoped(self.inner.watch(&ctx, opts)).await;
        span.finish(&result);
        result
    }

    async fn patch(
        &self,
        ctx: &Context,
        name: &str,
        patch_type: PatchType,
        data: &[u8],
        opts: &PatchOptions,
    ) -> Result<K> {
        let (ctx, span) = self.start(ctx, Operation::Patch);
        let result = span.scoped(self.inner.patch(&ctx, name, patch_type, data, opts)).await;
        span.finish(&result);
        result
    }
}
