// Copyright 2026 Layne Penney
// SPDX-License-Identifier: AGPL-3.0-or-later

//! The typed resource client contract.
//!
//! [`ResourceClient`] is the full operation set of a typed client. Generated
//! per-resource clients implement it, and so does every decorator in
//! [`crate::decorators`], which is what lets a wrapped client stand in for
//! the bare one anywhere.
//!
//! ```rust,ignore
//! use instrumented_clients::{ClientExt, Context, CreateOptions};
//!
//! let client = base
//!     .with_tracing("CoreV1", "ConfigMaps")?
//!     .with_metrics(recorder)
//!     .with_logging(logger);
//!
//! let created = client.create(&Context::background(), &obj, &CreateOptions::default()).await?;
//! ```

use std::sync::Arc;

use async_trait::async_trait;

use crate::context::Context;
use crate::decorators::{WithLogging, WithMetrics, WithTracing};
use crate::error::{ConfigError, Result};
use crate::telemetry::{Logger, Recorder};
use crate::types::{
    CreateOptions, DeleteOptions, GetOptions, ListOptions, ObjectList, PatchOptions, PatchType,
    Resource, UpdateOptions, WatchStream,
};

/// Operations of a typed client for resources of type `K`.
///
/// Every method receives the caller's [`Context`]. Implementations must honor
/// its cancellation and deadline; decorators forward it (or a child carrying
/// a new span) without changing either.
#[async_trait]
pub trait ResourceClient<K: Resource>: Send + Sync {
    async fn create(&self, ctx: &Context, obj: &K, opts: &CreateOptions) -> Result<K>;

    async fn update(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> Result<K>;

    async fn update_status(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> Result<K>;

    async fn delete(&self, ctx: &Context, name: &str, opts: &DeleteOptions) -> Result<()>;

    async fn delete_collection(
        &self,
        ctx: &Context,
        opts: &DeleteOptions,
        list_opts: &ListOptions,
    ) -> Result<()>;

    async fn get(&self, ctx: &Context, name: &str, opts: &GetOptions) -> Result<K>;

    async fn list(&self, ctx: &Context, opts: &ListOptions) -> Result<ObjectList<K>>;

    async fn watch(&self, ctx: &Context, opts: &ListOptions) -> Result<WatchStream<K>>;

    async fn patch(
        &self,
        ctx: &Context,
        name: &str,
        patch_type: PatchType,
        data: &[u8],
        opts: &PatchOptions,
    ) -> Result<K>;
}

/// A boxed client for dynamic dispatch.
pub type BoxedClient<K> = Box<dyn ResourceClient<K>>;

/// Arc-wrapped client for shared ownership.
pub type SharedClient<K> = Arc<dyn ResourceClient<K>>;

macro_rules! forward_client {
    ($ptr:ident) => {
        #[async_trait]
        impl<K, C> ResourceClient<K> for $ptr<C>
        where
            K: Resource,
            C: ResourceClient<K> + ?Sized,
        {
            async fn create(&self, ctx: &Context, obj: &K, opts: &CreateOptions) -> Result<K> {
                (**self).create(ctx, obj, opts).await
            }

            async fn update(&self, ctx: &Context, obj: &K, opts: &UpdateOptions) -> Result<K> {
                (**self).update(ctx, obj, opts).await
            }

            async fn update_status(
                &self,
                ctx: &Context,
                obj: &K,
                opts: &UpdateOptions,
            ) -> Result<K> {
                (**self).update_status(ctx, obj, opts).await
            }

            async fn delete(&self, ctx: &Context, name: &str, opts: &DeleteOptions) -> Result<()> {
                (**self).delete(ctx, name, opts).await
            }

            async fn delete_collection(
                &self,
                ctx: &Context,
                opts: &DeleteOptions,
                list_opts: &ListOptions,
            ) -> Result<()> {
                (**self).delete_collection(ctx, opts, list_opts).await
            }

            async fn get(&self, ctx: &Context, name: &str, opts: &GetOptions) -> Result<K> {
                (**self).get(ctx, name, opts).await
            }

            async fn list(&self, ctx: &Context, opts: &ListOptions) -> Result<ObjectList<K>> {
                (**self).list(ctx, opts).await
            }

            async fn watch(&self, ctx: &Context, opts: &ListOptions) -> Result<WatchStream<K>> {
                (**self).watch(ctx, opts).await
            }

            async fn patch(
                &self,
                ctx: &Context,
                name: &str,
                patch_type: PatchType,
                data: &[u8],
                opts: &PatchOptions,
            ) -> Result<K> {
                (**self).patch(ctx, name, patch_type, data, opts).await
            }
        }
    };
}

forward_client!(Box);
forward_client!(Arc);

/// Builder methods for stacking decorators.
///
/// Each method consumes the client and returns the wrapped one, so layers
/// read inside-out: the first call is the layer closest to the base client.
pub trait ClientExt: Sized {
    /// Wrap with a logging decorator.
    fn with_logging(self, logger: Arc<dyn Logger>) -> WithLogging<Self> {
        WithLogging::new(self, logger)
    }

    /// Wrap with a metrics decorator.
    fn with_metrics(self, recorder: Arc<dyn Recorder>) -> WithMetrics<Self> {
        WithMetrics::new(self, recorder)
    }

    /// Wrap with a tracing decorator using the default tracer.
    fn with_tracing(
        self,
        client: &str,
        kind: &str,
    ) -> std::result::Result<WithTracing<Self>, ConfigError> {
        WithTracing::new(self, client, kind)
    }

    /// Erase the concrete type behind an `Arc`.
    fn shared<K>(self) -> SharedClient<K>
    where
        K: Resource,
        Self: ResourceClient<K> + 'static,
    {
        Arc::new(self)
    }
}

impl<T> ClientExt for T {}
