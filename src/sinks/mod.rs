//! Sink implementations for consumed widgets.
//!
//! Every consumer owns one sink. The binary logs through [`LogSink`]; tests
//! and embedders observe runs with [`CollectSink`] and [`CountSink`], whose
//! clones share state so one handle can be kept outside the pipeline.

use async_trait::async_trait;
use std::marker::PhantomData;
use std::sync::Arc;
use tokio::sync::Mutex as TokioMutex;
use tracing::info;

use crate::core::{Result, Sink};
use crate::widget::Widget;

/// A sink that logs each widget together with the time it spent in flight.
pub struct LogSink {
    /// Logged as the `consumer` field of each event
    consumer: String,
}

impl LogSink {
    /// Create a log sink tagged with a consumer id
    pub fn with_prefix(consumer: impl Into<String>) -> Self {
        Self {
            consumer: consumer.into(),
        }
    }
}

#[async_trait]
impl Sink for LogSink {
    type Item = Widget;

    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
        for widget in items {
            info!(
                consumer = %self.consumer,
                widget = %widget,
                in_flight = ?widget.age(),
                "consumed widget"
            );
        }
        Ok(())
    }
}

/// A sink that collects items into a shared vector.
pub struct CollectSink<T> {
    items: Arc<TokioMutex<Vec<T>>>,
}

impl<T: Send + 'static> CollectSink<T> {
    /// Create a new collect sink
    pub fn new() -> Self {
        Self {
            items: Arc::new(TokioMutex::new(Vec::new())),
        }
    }

    /// Get a clone of the items Arc for external access
    pub fn items(&self) -> Arc<TokioMutex<Vec<T>>> {
        self.items.clone()
    }

    /// Take everything collected so far
    pub async fn take(&self) -> Vec<T> {
        std::mem::take(&mut *self.items.lock().await)
    }
}

#[async_trait]
impl<T: Send + 'static> Sink for CollectSink<T> {
    type Item = T;

    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
        let mut collected = self.items.lock().await;
        collected.extend(items);
        Ok(())
    }
}

impl<T: Send + 'static> Default for CollectSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CollectSink<T> {
    fn clone(&self) -> Self {
        Self {
            items: self.items.clone(),
        }
    }
}

/// A sink that only counts items.
pub struct CountSink<T> {
    count: Arc<TokioMutex<usize>>,
    _phantom: PhantomData<fn(T)>,
}

impl<T> CountSink<T> {
    /// Create a new count sink
    pub fn new() -> Self {
        Self {
            count: Arc::new(TokioMutex::new(0)),
            _phantom: PhantomData,
        }
    }

    /// Get the current count
    pub async fn count(&self) -> usize {
        *self.count.lock().await
    }
}

#[async_trait]
impl<T: Send + 'static> Sink for CountSink<T> {
    type Item = T;

    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
        *self.count.lock().await += items.len();
        Ok(())
    }
}

impl<T> Default for CountSink<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Clone for CountSink<T> {
    fn clone(&self) -> Self {
        Self {
            count: self.count.clone(),
            _phantom: PhantomData,
        }
    }
}
