//! Widget producers.
//!
//! A [`Producer`] plans which positions of a batch are broken and exposes
//! the batch as a [`WidgetSource`]. In the pipeline the producer drains
//! that source one widget at a time onto the shared bounded queue.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::core::{Error, Result, Source};
use crate::shutdown::StopListener;
use crate::widget::Widget;

/// Choose the positions in `[0, count)` that will hold broken widgets.
///
/// - `broken <= 0`: none.
/// - `broken >= count`: every position.
/// - otherwise `broken` distinct positions drawn uniformly, retrying a draw
///   whenever it lands on a position already taken.
pub fn broken_positions<R>(count: usize, broken: i64, rng: &mut R) -> HashSet<usize>
where
    R: Rng + ?Sized,
{
    if broken <= 0 || count == 0 {
        return HashSet::new();
    }

    let wanted = usize::try_from(broken).unwrap_or(usize::MAX);
    if wanted >= count {
        return (0..count).collect();
    }

    let mut positions = HashSet::with_capacity(wanted);
    while positions.len() < wanted {
        positions.insert(rng.gen_range(0..count));
    }
    positions
}

/// A finite batch of widgets from one producer, handed out on demand.
#[derive(Debug)]
pub struct WidgetSource {
    producer: Arc<str>,
    total: usize,
    next: usize,
    broken: HashSet<usize>,
}

impl WidgetSource {
    /// Create a source for `total` widgets, breaking the given positions
    pub fn new(producer: impl Into<Arc<str>>, total: usize, broken: HashSet<usize>) -> Self {
        Self {
            producer: producer.into(),
            total,
            next: 0,
            broken,
        }
    }

    /// Number of widgets not yet produced
    pub fn remaining(&self) -> usize {
        self.total - self.next
    }

    /// Number of broken widgets in the whole batch
    pub fn broken_count(&self) -> usize {
        self.broken.len()
    }

    fn make_next(&mut self) -> Widget {
        let widget = Widget::new(self.producer.clone(), self.broken.contains(&self.next));
        self.next += 1;
        widget
    }
}

#[async_trait]
impl Source for WidgetSource {
    type Item = Widget;

    async fn handle_demand(&mut self, demand: usize) -> Result<Vec<Self::Item>> {
        let take = demand.min(self.remaining());
        Ok((0..take).map(|_| self.make_next()).collect())
    }
}

/// A widget producer.
#[derive(Debug)]
pub struct Producer {
    id: Arc<str>,
    rng: StdRng,
}

impl Producer {
    /// Create producer number `n`, seeding its generator from the OS
    pub fn new(n: usize) -> Self {
        Self {
            id: format!("producer-{}", n).into(),
            rng: StdRng::from_entropy(),
        }
    }

    /// Create producer number `n` with a reproducible generator.
    ///
    /// Producers sharing a run seed still get distinct streams.
    pub fn with_seed(n: usize, seed: u64) -> Self {
        Self {
            id: format!("producer-{}", n).into(),
            rng: StdRng::seed_from_u64(seed.wrapping_add(n as u64)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Plan a batch of `count` widgets with `broken` of them broken.
    pub fn source(&mut self, count: usize, broken: i64) -> WidgetSource {
        let positions = broken_positions(count, broken, &mut self.rng);
        WidgetSource::new(self.id.clone(), count, positions)
    }

    /// Build a whole batch in memory.
    pub fn batch(&mut self, count: usize, broken: i64) -> Vec<Widget> {
        let mut source = self.source(count, broken);
        (0..count).map(|_| source.make_next()).collect()
    }

    /// Push `count` widgets onto `out`, waiting whenever the queue is full.
    ///
    /// Returns the number of widgets pushed, or [`Error::QueueClosed`] if
    /// every receiver has gone away.
    pub async fn produce(
        &mut self,
        count: usize,
        broken: i64,
        out: &mpsc::Sender<Widget>,
    ) -> Result<usize> {
        let mut source = self.source(count, broken);
        let mut pushed = 0;

        while let Some(widget) = source.next().await? {
            trace!(producer = %self.id, widget = %widget, "pushing widget");
            out.send(widget).await?;
            record_produced();
            pushed += 1;
        }

        debug!(producer = %self.id, pushed, "batch complete");
        Ok(pushed)
    }

    /// Like [`Producer::produce`], but gives up on the rest of the batch as
    /// soon as `stop` fires, including while waiting for queue space.
    pub async fn produce_until(
        &mut self,
        count: usize,
        broken: i64,
        out: &mpsc::Sender<Widget>,
        stop: &StopListener,
    ) -> Result<usize> {
        let mut source = self.source(count, broken);
        debug!(
            producer = %self.id,
            count,
            broken = source.broken_count(),
            "producing batch"
        );

        let mut pushed = 0;
        while !stop.is_stopped() {
            let Some(widget) = source.next().await? else {
                break;
            };

            trace!(producer = %self.id, widget = %widget, "pushing widget");
            tokio::select! {
                biased;
                _ = stop.stopped() => break,
                sent = out.send(widget) => {
                    sent.map_err(|_| Error::QueueClosed)?;
                    record_produced();
                    pushed += 1;
                }
            }
        }

        debug!(
            producer = %self.id,
            pushed,
            abandoned = source.remaining(),
            "producer finished"
        );
        Ok(pushed)
    }
}

fn record_produced() {
    #[cfg(feature = "metrics")]
    crate::metrics::widget_produced();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shutdown::stop_signal;

    fn broken_in(batch: &[Widget]) -> usize {
        batch.iter().filter(|w| w.is_broken()).count()
    }

    #[test]
    fn test_no_broken_when_count_not_positive() {
        let mut producer = Producer::with_seed(0, 7);
        for broken in [-1, 0] {
            let batch = producer.batch(12, broken);
            assert_eq!(batch.len(), 12);
            assert_eq!(broken_in(&batch), 0);
        }
    }

    #[test]
    fn test_exact_broken_count_below_total() {
        let mut rng = StdRng::seed_from_u64(42);
        for count in 1..40usize {
            for broken in 1..count as i64 {
                let positions = broken_positions(count, broken, &mut rng);
                assert_eq!(positions.len(), broken as usize);
                assert!(positions.iter().all(|&p| p < count));
            }
        }
    }

    #[test]
    fn test_all_broken_when_broken_reaches_total() {
        let mut producer = Producer::with_seed(1, 3);
        for broken in [5, 6, 100] {
            let batch = producer.batch(5, broken);
            assert_eq!(batch.len(), 5);
            assert!(batch.iter().all(Widget::is_broken));
        }
    }

    #[test]
    fn test_batch_mix() {
        let mut producer = Producer::with_seed(2, 11);
        let batch = producer.batch(20, 6);

        assert_eq!(batch.len(), 20);
        assert_eq!(broken_in(&batch), 6);
        assert!(batch.iter().all(|w| w.source() == "producer-2"));
    }

    #[test]
    fn test_seeded_placement_is_reproducible() {
        let a = Producer::with_seed(0, 99).source(50, 10);
        let b = Producer::with_seed(0, 99).source(50, 10);
        assert_eq!(a.broken, b.broken);
    }

    #[test]
    fn test_empty_batch() {
        let mut producer = Producer::new(0);
        assert!(producer.batch(0, 3).is_empty());
    }

    #[tokio::test]
    async fn test_handle_demand_respects_remaining() {
        let mut source = Producer::with_seed(0, 1).source(5, 0);

        assert_eq!(source.handle_demand(3).await.unwrap().len(), 3);
        assert_eq!(source.handle_demand(3).await.unwrap().len(), 2);
        assert!(source.handle_demand(3).await.unwrap().is_empty());
        assert!(source.next().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_produce_four_all_broken() {
        let (tx, mut rx) = mpsc::channel(8);
        let mut producer = Producer::new(1);

        let pushed = producer.produce(4, 4, &tx).await.unwrap();
        drop(tx);

        assert_eq!(pushed, 4);
        let mut received = Vec::new();
        while let Some(widget) = rx.recv().await {
            received.push(widget);
        }
        assert_eq!(received.len(), 4);
        assert!(received.iter().all(Widget::is_broken));
    }

    #[tokio::test]
    async fn test_produce_on_closed_queue() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);

        let result = Producer::new(0).produce(3, 0, &tx).await;
        assert!(matches!(result, Err(Error::QueueClosed)));
    }

    #[tokio::test]
    async fn test_produce_until_stops_while_blocked() {
        let (tx, _rx) = mpsc::channel(2);
        let (trigger, stop) = stop_signal();

        let handle = tokio::spawn(async move {
            let mut producer = Producer::new(0);
            producer.produce_until(10, 0, &tx, &stop).await
        });

        // Two widgets fill the queue; the third send parks until stop fires.
        tokio::time::sleep(std::time::Duration::from_millis(20)).await;
        trigger.fire();

        let pushed = handle.await.unwrap().unwrap();
        assert_eq!(pushed, 2);
    }

    #[tokio::test]
    async fn test_produce_until_already_stopped() {
        let (tx, mut rx) = mpsc::channel(4);
        let (trigger, stop) = stop_signal();
        trigger.fire();

        let pushed = Producer::new(0)
            .produce_until(4, 0, &tx, &stop)
            .await
            .unwrap();
        drop(tx);

        assert_eq!(pushed, 0);
        assert!(rx.recv().await.is_none());
    }
}
