//! Consumer workers.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tracing::{debug, trace};

use crate::core::{Result, Sink};
use crate::shutdown::StopListener;
use crate::widget::Widget;

/// Identifier a consumer sends to the moderator for every widget it takes.
pub type ConsumerId = Arc<str>;

/// The receiving end of the widget queue, shared by all consumers.
pub type SharedQueue = Arc<Mutex<mpsc::Receiver<Widget>>>;

/// What a consumer did before it returned.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConsumerStats {
    pub id: String,
    pub consumed: usize,
    pub broken: usize,
}

enum Next {
    Widget(Widget),
    Stopped,
    Drained,
}

/// Drains the shared queue into its sink until the stop signal fires.
pub struct Consumer<S> {
    id: ConsumerId,
    sink: S,
}

impl<S> Consumer<S>
where
    S: Sink<Item = Widget> + Send + 'static,
{
    pub fn new(id: impl Into<ConsumerId>, sink: S) -> Self {
        Self {
            id: id.into(),
            sink,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    /// Run until stopped or until the queue is closed and empty.
    ///
    /// Each widget taken off the queue goes to the sink and then yields one
    /// report. A sink error still reports the widget and finishes the sink
    /// before ending the consumer with that error.
    pub async fn consume(
        mut self,
        queue: SharedQueue,
        stop: StopListener,
        reports: mpsc::Sender<ConsumerId>,
    ) -> Result<ConsumerStats> {
        let mut stats = ConsumerStats {
            id: self.id.to_string(),
            consumed: 0,
            broken: 0,
        };
        let mut failure = None;

        loop {
            // Leave without touching the queue once stopped.
            if stop.is_stopped() {
                debug!(consumer = %self.id, "stop observed");
                break;
            }

            let next = tokio::select! {
                biased;
                _ = stop.stopped() => Next::Stopped,
                widget = async { queue.lock().await.recv().await } => match widget {
                    Some(widget) => Next::Widget(widget),
                    None => Next::Drained,
                },
            };

            let widget = match next {
                Next::Widget(widget) => widget,
                Next::Stopped => {
                    debug!(consumer = %self.id, "stopped while waiting");
                    break;
                }
                Next::Drained => {
                    debug!(consumer = %self.id, "queue closed and drained");
                    break;
                }
            };

            let broken = widget.is_broken();
            trace!(consumer = %self.id, widget = %widget, "took widget");
            let written = self.sink.write(widget).await;

            stats.consumed += 1;
            if broken {
                stats.broken += 1;
            }
            #[cfg(feature = "metrics")]
            crate::metrics::widget_consumed(&self.id, broken);

            let reported = reports.send(self.id.clone()).await;
            if let Err(err) = written {
                failure = Some(err);
                break;
            }
            if reported.is_err() {
                // Only happens if the moderator is gone, which means it has
                // already fired the stop signal.
                debug!(consumer = %self.id, "moderator gone");
                break;
            }
        }

        // The sink is finished on every exit path; a write error outranks a
        // finish error.
        let finished = self.sink.finish().await;
        if let Some(err) = failure {
            if let Err(finish_err) = finished {
                debug!(
                    consumer = %self.id,
                    error = %finish_err,
                    "finish failed after write error"
                );
            }
            return Err(err);
        }
        finished?;
        debug!(
            consumer = %self.id,
            consumed = stats.consumed,
            broken = stats.broken,
            "consumer finished"
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Error;
    use crate::shutdown::stop_signal;
    use crate::sinks::CollectSink;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    fn queue(capacity: usize) -> (mpsc::Sender<Widget>, SharedQueue) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Arc::new(Mutex::new(rx)))
    }

    #[tokio::test]
    async fn test_reports_each_widget_once() {
        let (tx, shared) = queue(8);
        let (report_tx, mut report_rx) = mpsc::channel(8);
        let (_trigger, stop) = stop_signal();
        let sink = CollectSink::new();

        for broken in [false, true, false] {
            tx.send(Widget::new("producer-0", broken)).await.unwrap();
        }
        drop(tx);

        let stats = Consumer::new("consumer-0", sink.clone())
            .consume(shared, stop, report_tx)
            .await
            .unwrap();

        assert_eq!(stats.consumed, 3);
        assert_eq!(stats.broken, 1);
        assert_eq!(sink.items().lock().await.len(), 3);

        let mut reports = Vec::new();
        while let Some(id) = report_rx.recv().await {
            reports.push(id);
        }
        assert_eq!(reports.len(), 3);
        assert!(reports.iter().all(|id| &**id == "consumer-0"));
    }

    #[tokio::test]
    async fn test_already_stopped_does_not_take_widgets() {
        let (tx, shared) = queue(2);
        let (report_tx, _report_rx) = mpsc::channel(2);
        let (trigger, stop) = stop_signal();

        tx.send(Widget::new("producer-0", false)).await.unwrap();
        trigger.fire();

        let stats = Consumer::new("consumer-0", CollectSink::new())
            .consume(shared.clone(), stop, report_tx)
            .await
            .unwrap();

        assert_eq!(stats.consumed, 0);
        assert_eq!(shared.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn test_stop_releases_idle_consumer() {
        let (_tx, shared) = queue(1);
        let (report_tx, _report_rx) = mpsc::channel(1);
        let (trigger, stop) = stop_signal();

        let handle = tokio::spawn(
            Consumer::new("consumer-0", CollectSink::new()).consume(shared, stop, report_tx),
        );

        tokio::time::sleep(Duration::from_millis(10)).await;
        trigger.fire();

        let stats = tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .unwrap()
            .unwrap()
            .unwrap();
        assert_eq!(stats.consumed, 0);
    }

    struct FailingSink;

    #[async_trait]
    impl Sink for FailingSink {
        type Item = Widget;

        async fn write_batch(&mut self, _items: Vec<Widget>) -> Result<()> {
            Err(Error::custom("sink is full"))
        }
    }

    #[tokio::test]
    async fn test_sink_error_still_reports() {
        let (tx, shared) = queue(2);
        let (report_tx, mut report_rx) = mpsc::channel(2);
        let (_trigger, stop) = stop_signal();

        tx.send(Widget::new("producer-0", false)).await.unwrap();

        let result = Consumer::new("consumer-7", FailingSink)
            .consume(shared, stop, report_tx)
            .await;

        assert!(matches!(result, Err(Error::Custom(_))));
        assert_eq!(report_rx.recv().await.as_deref(), Some("consumer-7"));
    }

    /// Fails every write and records whether it was finished.
    struct FlushingSink {
        finished: Arc<AtomicBool>,
        fail_finish: bool,
    }

    #[async_trait]
    impl Sink for FlushingSink {
        type Item = Widget;

        async fn write_batch(&mut self, _items: Vec<Widget>) -> Result<()> {
            Err(Error::custom("write failed"))
        }

        async fn finish(&mut self) -> Result<()> {
            self.finished.store(true, Ordering::SeqCst);
            if self.fail_finish {
                return Err(Error::custom("flush failed"));
            }
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sink_finished_after_write_error() {
        for fail_finish in [false, true] {
            let (tx, shared) = queue(2);
            let (report_tx, _report_rx) = mpsc::channel(2);
            let (_trigger, stop) = stop_signal();
            let finished = Arc::new(AtomicBool::new(false));

            tx.send(Widget::new("producer-0", false)).await.unwrap();

            let sink = FlushingSink {
                finished: finished.clone(),
                fail_finish,
            };
            let result = Consumer::new("consumer-0", sink)
                .consume(shared, stop, report_tx)
                .await;

            assert!(finished.load(Ordering::SeqCst));
            assert!(matches!(result, Err(Error::Custom(msg)) if msg == "write failed"));
        }
    }
}
