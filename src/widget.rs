//! The widget record that flows through the pipeline.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use chrono::{DateTime, Local};

static EPOCH: OnceLock<Instant> = OnceLock::new();
static LAST_ID: AtomicU64 = AtomicU64::new(0);

/// Identity of a widget: nanoseconds on the monotonic clock since the
/// first widget of the process was made.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WidgetId(u64);

impl WidgetId {
    /// Take the id for a widget created at `now`.
    ///
    /// Ids strictly increase: a reading that collides with (or trails) the
    /// previous id is bumped to the next free value.
    fn at(now: Instant) -> Self {
        let epoch = *EPOCH.get_or_init(Instant::now);
        let nanos = u64::try_from(now.saturating_duration_since(epoch).as_nanos())
            .unwrap_or(u64::MAX - 1);

        let mut last = LAST_ID.load(Ordering::Relaxed);
        loop {
            let candidate = nanos.max(last + 1);
            match LAST_ID.compare_exchange_weak(
                last,
                candidate,
                Ordering::AcqRel,
                Ordering::Relaxed,
            ) {
                Ok(_) => return WidgetId(candidate),
                Err(actual) => last = actual,
            }
        }
    }

    /// The raw nanosecond value
    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for WidgetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work. Immutable once built.
#[derive(Debug, Clone)]
pub struct Widget {
    id: WidgetId,
    source: Arc<str>,
    created_at: Instant,
    created_time: DateTime<Local>,
    broken: bool,
}

impl Widget {
    /// Create a widget stamped with the current instant
    pub fn new(source: impl Into<Arc<str>>, broken: bool) -> Self {
        let created_at = Instant::now();
        Self {
            id: WidgetId::at(created_at),
            source: source.into(),
            created_at,
            created_time: Local::now(),
            broken,
        }
    }

    pub fn id(&self) -> WidgetId {
        self.id
    }

    /// Identifier of the producer that made this widget
    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Wall-clock time the widget was created
    pub fn created_time(&self) -> DateTime<Local> {
        self.created_time
    }

    pub fn is_broken(&self) -> bool {
        self.broken
    }

    /// Time elapsed since the widget was created
    pub fn age(&self) -> Duration {
        self.created_at.elapsed()
    }
}

impl fmt::Display for Widget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "id={} source={} time={} broken={}",
            self.id,
            self.source,
            self.created_time.format("%H:%M:%S%.6f"),
            self.broken
        )
    }
}
