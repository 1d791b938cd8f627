// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! Logging decorator: one entry per completed call.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;

use crate::client::ResourceClient;
use crate::context::Context;
use crate::descriptor::Operation;
use crate::error::{combine, ClientError, Result};
use crate::telemetry::{KeyValue, Logger};
use crate::types::{
    CreateOptions, DeleteOptions, GetOptions, ListOptions, ObjectList, PatchOptions, PatchType,
    Resource, UpdateOptions, WatchStream,
};

/// Logs the outcome of every call once it returns.
///
/// A failure is logged at error level as `"<Operation> failed"` with the
/// combined error; a success at info level as `"<Operation> done"`. Both
/// carry `operation` and `duration` attributes. Nothing is logged before
/// the inner call.
pub struct WithLogging<C> {
    inner: C,
    logger: Arc<dyn Logger>,
}

impl<C> WithLogging<C> {
    pub fn new(inner: C, logger: Arc<dyn Logger>) -> Self {
        Self { inner, logger }
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    fn log(&self, operation: Operation, start: Instant, error: Option<&ClientError>) {
        let attributes = [
            KeyValue::new("operation", operation.as_str()),
            KeyValue::new("duration", start.elapsed()),
        ];
        match combine([error]) {
            Some(err) => {
                self.logger
                    .error(&err, &format!("{} failed", operation), &attributes)
            }
            None => self
                .logger
                .info(&format!("{} done", operation), &attributes),
        }
    }
}

#[async_trait]
impl<K, C> ResourceClient<K> for WithLogging<C>
where
    K: Resource,
    C: ResourceClient<K>,
{
    async fn create(&self, ctx: &Context, obj: &K, opts: &CreateOptions) -> Result<K> {
        let start = Instant::now();
        let result = self.inner.create(ctx, obj, opts).await;
        self.log(Operation::Create, start, result.as_ref().err());
        result
    }

    async fn update(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> Result<K> {
        let start = Instant::now();
        let result = self.inner.update(ctx, obj, opts).await;
        self.log(Operation::Update, start, result.as_ref().err());
        result
    }

    async fn update_status(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> Result<K> {
        let start = Instant::now();
        let result = self.inner.update_status(ctx, obj, opts).await;
        self.log(Operation::UpdateStatus, start, result.as_ref().err());
        result
    }

    async fn delete(&self, ctx: &Context, name: &str, opts: &DeleteOptions) -> Result<()> {
        let start = Instant::now();
        let result = self.inner.delete(ctx, name, opts).await;
        self.log(Operation::Delete, start, result.as_ref().err());
        result
    }

    async fn delete_collection(
        &self,
        ctx: &Context,
        opts: &DeleteOptions,
        list_opts: &ListOptions,
    ) -> Result<()> {
        let start = Instant::now();
        let result = self.inner.delete_collection(ctx, opts, list_opts).await;
        self.log(Operation::DeleteCollection, start, result.as_ref().err());
        result
    }

    async fn get(&self, ctx: &Context, name: &str, opts: &GetOptions) -> Result<K> {
        let start = Instant::now();
        let result = self.inner.get(ctx, name, opts).await;
        self.log(Operation::Get, start, result.as_ref().err());
        result
    }

    async fn list(&self, ctx: &Context, opts: &ListOptions) -> Result<ObjectList<K>> {
        let start = Instant::now();
        let result = self.inner.list(ctx, opts).await;
        self.log(Operation::List, start, result.as_ref().err());
        result
    }

    async fn watch(&self, ctx: &Context, opts: &ListOptions) -> Result<WatchStream<K>> {
        let start = Instant::now();
        let result = self.inner.watch(ctx, opts).await;
        self.log(Operation::Watch, start, result.as_ref().err());
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
        let start = Instant::now();
        let result = self.inner.patch(ctx, name, patch_type, data, opts).await;
        self.log(Operation::Patch, start, result.as_ref().err());
        result
    }
}
