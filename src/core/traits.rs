//! Core traits for the widget pipeline.
//!
//! Producers expose their output as a [`Source`] that answers explicit
//! demand, and consumers hand every widget they drain to a [`Sink`].

use crate::core::error::Result;
use async_trait::async_trait;

/// A source generates items on demand.
///
/// Sources respond to explicit demand requests, returning at most the
/// number of items asked for. The producer task asks for one item at a
/// time so the bounded queue stays the only place where work piles up.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use widgetweld::core::{Result, Source};
///
/// struct CounterSource {
///     current: u64,
///     max: u64,
/// }
///
/// #[async_trait]
/// impl Source for CounterSource {
///     type Item = u64;
///
///     async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>> {
///         let mut items = Vec::with_capacity(demand);
///         while items.len() < demand && self.current < self.max {
///             items.push(self.current);
///             self.current += 1;
///         }
///         Ok(items)
///     }
/// }
/// ```
#[async_trait]
pub trait Source {
    /// The type of items this source generates
    type Item: Send + 'static;

    /// Return up to `demand` items. An empty Vec means the source is exhausted.
    async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>>;

    /// Get the next single item.
    async fn next(&mut self) -> Result<Option<Self::Item>> {
        let items = self.handle_demand(1).await?;
        Ok(items.into_iter().next())
    }
}

/// A sink accepts the items a consumer drains from the queue.
///
/// # Examples
///
/// ```rust
/// use async_trait::async_trait;
/// use widgetweld::core::{Result, Sink};
///
/// struct LineSink;
///
/// #[async_trait]
/// impl Sink for LineSink {
///     type Item = String;
///
///     async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()> {
///         for item in items {
///             println!("{}", item);
///         }
///         Ok(())
///     }
/// }
/// ```
#[async_trait]
pub trait Sink {
    /// The type of items this sink accepts
    type Item: Send + 'static;

    /// Write a batch of items.
    async fn write_batch(&mut self, items: Vec<Self::Item>) -> Result<()>;

    /// Write a single item.
    ///
    /// Consumers call this once per dequeued widget; the default wraps
    /// [`Sink::write_batch`].
    async fn write(&mut self, item: Self::Item) -> Result<()> {
        self.write_batch(vec![item]).await
    }

    /// Called once when the owning consumer stops.
    async fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}
