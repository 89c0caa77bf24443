//! Pipeline orchestration and execution.
//!
//! [`Pipeline::run`] wires the run together: one bounded widget queue, one
//! report channel and one stop signal, shared by `producers` producer tasks,
//! `consumers` consumer tasks and a single [`Moderator`]. The moderator
//! fires the stop signal after `producers * widgets_per_producer` reports,
//! which releases every consumer and any producer still waiting on the
//! queue.

pub mod consumer;
pub mod moderator;

use std::sync::Arc;

use futures::future::join_all;
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

use crate::config::Config;
use crate::core::{Error, Result, Sink};
use crate::shutdown::stop_signal;
use crate::sinks::LogSink;
use crate::sources::Producer;
use crate::widget::Widget;

pub use consumer::{Consumer, ConsumerId, ConsumerStats, SharedQueue};
pub use moderator::{Moderator, ModeratorReport};

/// Validated configuration for a pipeline run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipelineConfig {
    /// Widgets each producer makes
    pub widgets_per_producer: usize,
    /// Number of producer tasks
    pub producers: usize,
    /// Number of consumer tasks
    pub consumers: usize,
    /// Broken widgets per producer batch; zero or less means none
    pub broken_per_batch: i64,
    /// Capacity of the widget queue
    pub queue_capacity: usize,
    /// Capacity of the report channel
    pub report_capacity: usize,
    /// Seed for broken-widget placement
    pub seed: Option<u64>,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            widgets_per_producer: 10,
            producers: 1,
            consumers: 1,
            broken_per_batch: -1,
            queue_capacity: 1,
            report_capacity: 1,
            seed: None,
        }
    }
}

impl PipelineConfig {
    /// Set the number of widgets per producer
    pub fn widgets_per_producer(mut self, count: usize) -> Self {
        self.widgets_per_producer = count;
        self
    }

    /// Set the producer count. The queue keeps one slot per producer.
    pub fn producers(mut self, count: usize) -> Self {
        self.producers = count;
        self.queue_capacity = count.max(1);
        self
    }

    /// Set the consumer count. The report channel keeps one slot per consumer.
    pub fn consumers(mut self, count: usize) -> Self {
        self.consumers = count;
        self.report_capacity = count.max(1);
        self
    }

    /// Set the broken widgets per batch
    pub fn broken_per_batch(mut self, count: i64) -> Self {
        self.broken_per_batch = count;
        self
    }

    /// Override the widget queue capacity
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = capacity;
        self
    }

    /// Override the report channel capacity
    pub fn report_capacity(mut self, capacity: usize) -> Self {
        self.report_capacity = capacity;
        self
    }

    /// Fix the placement of broken widgets
    pub fn seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    /// Reports the moderator waits for: `producers * widgets_per_producer`
    pub fn expected_total(&self) -> Result<usize> {
        self.producers
            .checked_mul(self.widgets_per_producer)
            .ok_or_else(|| {
                Error::invalid_config(format!(
                    "{} producers x {} widgets overflows",
                    self.producers, self.widgets_per_producer
                ))
            })
    }

    /// Check that a run with this configuration can finish.
    pub fn validate(&self) -> Result<()> {
        let total = self.expected_total()?;
        if total > 0 && self.consumers == 0 {
            return Err(Error::invalid_config(format!(
                "{} widgets will be produced but no consumer was requested",
                total
            )));
        }
        if self.queue_capacity == 0 {
            return Err(Error::invalid_config("queue capacity must be at least 1"));
        }
        if self.report_capacity == 0 {
            return Err(Error::invalid_config(
                "report channel capacity must be at least 1",
            ));
        }
        Ok(())
    }
}

impl TryFrom<&Config> for PipelineConfig {
    type Error = Error;

    fn try_from(config: &Config) -> Result<Self> {
        let count = |value: i64, what: &str| {
            usize::try_from(value).map_err(|_| {
                Error::invalid_config(format!("{} must not be negative, got {}", what, value))
            })
        };

        let mut pipeline = PipelineConfig::default()
            .widgets_per_producer(count(config.widgets_per_producer, "widget count")?)
            .producers(count(config.producer_count, "producer count")?)
            .consumers(count(config.consumer_count, "consumer count")?)
            .broken_per_batch(config.broken_per_batch);
        pipeline.seed = config.seed;
        Ok(pipeline)
    }
}

/// What a finished run observed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Reports the moderator waited for
    pub expected_total: usize,
    /// Reports the moderator received
    pub reports: usize,
    /// Consumer whose report completed the count
    pub last_consumer: Option<String>,
    /// Widgets pushed onto the queue, summed over producers
    pub produced: usize,
    /// Per-consumer results, in consumer order
    pub consumers: Vec<ConsumerStats>,
    /// Whether the stop signal had fired when the run ended
    pub stopped: bool,
}

impl RunSummary {
    /// Widgets consumed across all consumers
    pub fn consumed(&self) -> usize {
        self.consumers.iter().map(|c| c.consumed).sum()
    }

    /// Broken widgets consumed across all consumers
    pub fn broken(&self) -> usize {
        self.consumers.iter().map(|c| c.broken).sum()
    }
}

/// A configured producer/consumer/moderator run.
pub struct Pipeline {
    config: PipelineConfig,
}

impl Pipeline {
    /// Create a pipeline, rejecting configurations that could never finish
    pub fn new(config: PipelineConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Create a pipeline from command-line parameters
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(PipelineConfig::try_from(config)?)
    }

    /// Run with every consumer logging what it takes.
    pub async fn run(self) -> Result<RunSummary> {
        self.run_with(|id| LogSink::with_prefix(id)).await
    }

    /// Run with one sink per consumer, built by `make_sink` from the
    /// consumer's id.
    ///
    /// Returns once every consumer has finished and the producers and the
    /// moderator have been joined. The first consumer error wins, then a
    /// moderator error, then a producer error.
    pub async fn run_with<F, S>(self, mut make_sink: F) -> Result<RunSummary>
    where
        F: FnMut(&str) -> S,
        S: Sink<Item = Widget> + Send + 'static,
    {
        let config = self.config;
        // Fixed before any producer starts.
        let expected_total = config.expected_total()?;

        info!(
            producers = config.producers,
            consumers = config.consumers,
            widgets_per_producer = config.widgets_per_producer,
            broken_per_batch = config.broken_per_batch,
            expected_total,
            "starting pipeline"
        );

        let (queue_tx, queue_rx) = mpsc::channel::<Widget>(config.queue_capacity);
        let queue: SharedQueue = Arc::new(Mutex::new(queue_rx));
        let (report_tx, report_rx) = mpsc::channel::<ConsumerId>(config.report_capacity);
        let (trigger, stop) = stop_signal();

        let moderator = tokio::spawn(Moderator::new(expected_total, trigger, report_rx).run());

        let producers: Vec<JoinHandle<Result<usize>>> = (0..config.producers)
            .map(|n| {
                let mut producer = match config.seed {
                    Some(seed) => Producer::with_seed(n, seed),
                    None => Producer::new(n),
                };
                let out = queue_tx.clone();
                let stop = stop.clone();
                let count = config.widgets_per_producer;
                let broken = config.broken_per_batch;
                tokio::spawn(async move { producer.produce_until(count, broken, &out, &stop).await })
            })
            .collect();
        // The queue closes once the last producer is done.
        drop(queue_tx);

        let consumers: Vec<JoinHandle<Result<ConsumerStats>>> = (0..config.consumers)
            .map(|n| {
                let id = format!("consumer-{}", n);
                let sink = make_sink(&id);
                let consumer = Consumer::new(id, sink);
                tokio::spawn(consumer.consume(queue.clone(), stop.clone(), report_tx.clone()))
            })
            .collect();
        // The report channel closes once the last consumer is done.
        drop(report_tx);

        let mut first_error: Option<Error> = None;
        let mut keep = |err: Error| {
            error!(error = %err, "pipeline task failed");
            first_error.get_or_insert(err);
        };

        let mut consumer_stats = Vec::with_capacity(config.consumers);
        for joined in join_all(consumers).await {
            match joined {
                Ok(Ok(stats)) => consumer_stats.push(stats),
                Ok(Err(err)) => keep(err),
                Err(join) => keep(join.into()),
            }
        }

        let moderator_report = match moderator.await {
            Ok(Ok(report)) => Some(report),
            Ok(Err(err)) => {
                keep(err);
                None
            }
            Err(join) => {
                keep(join.into());
                None
            }
        };

        let mut produced = 0;
        for joined in join_all(producers).await {
            match joined {
                Ok(Ok(pushed)) => produced += pushed,
                Ok(Err(err)) => keep(err),
                Err(join) => keep(join.into()),
            }
        }

        if let Some(err) = first_error {
            return Err(err);
        }

        let summary = RunSummary {
            expected_total,
            reports: moderator_report.as_ref().map_or(0, |r| r.observed),
            last_consumer: moderator_report.and_then(|r| r.last_consumer),
            produced,
            consumers: consumer_stats,
            stopped: stop.is_stopped(),
        };
        info!(
            reports = summary.reports,
            consumed = summary.consumed(),
            broken = summary.broken(),
            produced = summary.produced,
            "pipeline finished"
        );
        Ok(summary)
    }
}
