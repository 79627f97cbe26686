// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! PromptQueue (component D): a thin, producer-facing API over Store.

use std::collections::BTreeSet;
use std::sync::Arc;

use crate::error::StoreError;
use crate::model::{Prompt, PromptStatus};
use crate::store::prompts::PromptFilter;
use crate::store::Store;

/// Default retry bound applied when a producer doesn't specify one.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

#[derive(Clone)]
pub struct PromptQueue {
    store: Arc<Store>,
    default_max_retries: u32,
}

impl PromptQueue {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store, default_max_retries: DEFAULT_MAX_RETRIES }
    }

    pub fn with_default_max_retries(mut self, max_retries: u32) -> Self {
        self.default_max_retries = max_retries;
        self
    }

    /// Accepted unconditionally; validating `content`'s format is the
    /// producer's responsibility, not the queue's.
    pub async fn enqueue(
        &self,
        content: &str,
        priority: i64,
        required_capabilities: BTreeSet<String>,
        target_session: Option<String>,
    ) -> Result<i64, StoreError> {
        self.store
            .enqueue(content, priority, required_capabilities, target_session, self.default_max_retries)
            .await
    }

    /// Allowed while `status ∈ {pending, assigned, in_progress}`.
    pub async fn cancel(&self, prompt_id: i64) -> Result<(), StoreError> {
        self.store.cancel(prompt_id).await
    }

    pub async fn status(&self, prompt_id: i64) -> Result<Option<PromptStatus>, StoreError> {
        Ok(self.store.get_prompt(prompt_id).await?.map(|p| p.status))
    }

    pub async fn get(&self, prompt_id: i64) -> Result<Option<Prompt>, StoreError> {
        self.store.get_prompt(prompt_id).await
    }

    pub async fn list(&self, filter: PromptFilter) -> Result<Vec<Prompt>, StoreError> {
        self.store.list_prompts(filter).await
    }
}
