//! Mock implementations for testing
//!
//! [`MockNetwork`] records every call and can be scripted to fail.

use crate::config::ClientConfig;
use crate::error::{Result, TrixelError};
use crate::network::{MeasurementBatch, MeasurementNetwork, OfflineNetwork};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Mock measurement network
#[derive(Debug, Default)]
pub struct MockNetwork {
    ids: OfflineNetwork,
    register_failures: Mutex<VecDeque<TrixelError>>,
    publish_failures: Mutex<VecDeque<TrixelError>>,
    delete_failures: Mutex<VecDeque<TrixelError>>,
    published: Mutex<Vec<MeasurementBatch>>,
    registrations: AtomicUsize,
    deletions: AtomicUsize,
}

impl MockNetwork {
    /// Create new mock network that accepts every call
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail the next registration with `error`
    pub fn fail_register_with(&self, error: TrixelError) {
        push(&self.register_failures, error);
    }

    /// Fail the next publish with `error`
    pub fn fail_publish_with(&self, error: TrixelError) {
        push(&self.publish_failures, error);
    }

    /// Fail the next deletion with `error`
    pub fn fail_delete_with(&self, error: TrixelError) {
        push(&self.delete_failures, error);
    }

    /// Batches published so far, oldest first
    pub fn published_batches(&self) -> Vec<MeasurementBatch> {
        self.published
            .lock()
            .map(|batches| batches.clone())
            .unwrap_or_default()
    }

    pub fn registration_count(&self) -> usize {
        self.registrations.load(Ordering::SeqCst)
    }

    pub fn deletion_count(&self) -> usize {
        self.deletions.load(Ordering::SeqCst)
    }
}

fn push(queue: &Mutex<VecDeque<TrixelError>>, error: TrixelError) {
    if let Ok(mut queue) = queue.lock() {
        queue.push_back(error);
    }
}

fn next_failure(queue: &Mutex<VecDeque<TrixelError>>) -> Result<()> {
    match queue.lock().ok().and_then(|mut queue| queue.pop_front()) {
        Some(error) => Err(error),
        None => Ok(()),
    }
}

#[async_trait]
impl MeasurementNetwork for MockNetwork {
    async fn register(&self, config: &mut ClientConfig) -> Result<()> {
        self.registrations.fetch_add(1, Ordering::SeqCst);
        next_failure(&self.register_failures)?;
        self.ids.register(config).await
    }

    async fn publish(&self, _config: &ClientConfig, batch: &MeasurementBatch) -> Result<()> {
        next_failure(&self.publish_failures)?;
        if let Ok(mut published) = self.published.lock() {
            published.push(batch.clone());
        }
        Ok(())
    }

    async fn delete(&self, _config: &ClientConfig) -> Result<()> {
        self.deletions.fetch_add(1, Ordering::SeqCst);
        next_failure(&self.delete_failures)
    }
}
