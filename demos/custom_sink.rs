//! Runs the pipeline with a sink that tallies broken widgets per producer.
//!
//! ```bash
//! cargo run --example custom_sink
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use widgetweld::prelude::*;

type Tally = Arc<Mutex<BTreeMap<String, (usize, usize)>>>;

struct TallySink {
    tally: Tally,
}

#[async_trait]
impl Sink for TallySink {
    type Item = Widget;

    async fn write_batch(&mut self, items: Vec<Widget>) -> Result<()> {
        let mut tally = self.tally.lock().await;
        for widget in items {
            let entry = tally.entry(widget.source().to_string()).or_default();
            entry.0 += 1;
            if widget.is_broken() {
                entry.1 += 1;
            }
        }
        Ok(())
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    widgetweld::telemetry::init_tracing();

    let config = PipelineConfig::default()
        .producers(3)
        .consumers(2)
        .widgets_per_producer(20)
        .broken_per_batch(4);

    let tally = Tally::default();
    let shared = tally.clone();
    let summary = Pipeline::new(config)?
        .run_with(move |_| TallySink {
            tally: shared.clone(),
        })
        .await?;

    println!("=== Consumed per producer ===");
    for (producer, (total, broken)) in tally.lock().await.iter() {
        println!("{}: {} widgets, {} broken", producer, total, broken);
    }

    println!("\n=== Consumed per consumer ===");
    for stats in &summary.consumers {
        println!("{}: {} widgets", stats.id, stats.consumed);
    }
    Ok(())
}
