// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PromptProducerApi: the inbound half of the prompt producer contract
//! (spec §6). No HTTP/RPC framing ships here — that's a collaborator's job —
//! but this trait is the seam such a layer binds to.

use std::collections::BTreeSet;
use std::future::Future;
use std::pin::Pin;

use crate::error::StoreError;
use crate::model::{Prompt, PromptStatus};
use crate::queue::PromptQueue;
use crate::store::prompts::PromptFilter;

/// Object-safe producer surface, boxed-future shape matching
/// [`crate::pane::PaneTransport`]'s convention.
pub trait PromptProducerApi: Send + Sync + 'static {
    fn enqueue(
        &self,
        content: String,
        priority: i64,
        capabilities: BTreeSet<String>,
        target_session: Option<String>,
    ) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + '_>>;

    fn cancel(&self, prompt_id: i64) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>>;

    fn status(&self, prompt_id: i64) -> Pin<Box<dyn Future<Output = Result<Option<PromptStatus>, StoreError>> + Send + '_>>;

    fn list(&self, filter: PromptFilter) -> Pin<Box<dyn Future<Output = Result<Vec<Prompt>, StoreError>> + Send + '_>>;
}

impl PromptProducerApi for PromptQueue {
    fn enqueue(
        &self,
        content: String,
        priority: i64,
        capabilities: BTreeSet<String>,
        target_session: Option<String>,
    ) -> Pin<Box<dyn Future<Output = Result<i64, StoreError>> + Send + '_>> {
        Box::pin(async move { self.enqueue(&content, priority, capabilities, target_session).await })
    }

    fn cancel(&self, prompt_id: i64) -> Pin<Box<dyn Future<Output = Result<(), StoreError>> + Send + '_>> {
        Box::pin(async move { self.cancel(prompt_id).await })
    }

    fn status(&self, prompt_id: i64) -> Pin<Box<dyn Future<Output = Result<Option<PromptStatus>, StoreError>> + Send + '_>> {
        Box::pin(async move { self.status(prompt_id).await })
    }

    fn list(&self, filter: PromptFilter) -> Pin<Box<dyn Future<Output = Result<Vec<Prompt>, StoreError>> + Send + '_>> {
        Box::pin(async move { self.list(filter).await })
    }
}
