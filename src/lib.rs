//! # Producer/Consumer Widget Pipeline
//!
//! A fixed number of producers push widgets onto a shared bounded queue,
//! a fixed number of consumers drain it, and a moderator counts every
//! consumption to decide when the run is over.
//!
//! ## Core Concepts
//!
//! - **Widget**: an immutable, timestamped record, possibly marked broken
//! - **Producer**: generates a batch of widgets and pushes them onto the queue
//! - **Consumer**: drains the queue into a [`core::Sink`], reporting each widget
//! - **Moderator**: fires the stop signal once every produced widget is reported
//! - **Pipeline**: wires the three together and waits for the consumers
//!
//! ## Example
//!
//! ```rust
//! use widgetweld::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::default()
//!         .producers(2)
//!         .consumers(3)
//!         .widgets_per_producer(50)
//!         .broken_per_batch(5);
//!
//!     let summary = Pipeline::new(config)?.run().await?;
//!     assert_eq!(summary.reports, 100);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod core;
pub mod flag;
pub mod pipeline;
pub mod shutdown;
pub mod sinks;
pub mod sources;
pub mod telemetry;
pub mod widget;

// Re-export commonly used items
pub mod prelude {
    pub use crate::config::Config;
    pub use crate::core::{Error, FlagError, Result, Sink, Source};
    pub use crate::pipeline::{ConsumerStats, Pipeline, PipelineConfig, RunSummary};
    pub use crate::shutdown::{stop_signal, StopListener, StopTrigger};
    pub use crate::sinks::{CollectSink, CountSink, LogSink};
    pub use crate::sources::{Producer, WidgetSource};
    pub use crate::widget::{Widget, WidgetId};
}

// Re-export main error type
pub use crate::core::{Error, Result};

#[cfg(feature = "metrics")]
pub mod metrics;

// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
