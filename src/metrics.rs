//! Pipeline counters recorded through the `metrics` facade.
//!
//! Nothing is exported unless the application installs a recorder.

use metrics::counter;

pub const WIDGETS_PRODUCED: &str = "widgetweld_widgets_produced_total";
pub const WIDGETS_CONSUMED: &str = "widgetweld_widgets_consumed_total";
pub const BROKEN_WIDGETS_CONSUMED: &str = "widgetweld_broken_widgets_consumed_total";

pub(crate) fn widget_produced() {
    counter!(WIDGETS_PRODUCED).increment(1);
}

pub(crate) fn widget_consumed(consumer: &str, broken: bool) {
    counter!(WIDGETS_CONSUMED, "consumer" => consumer.to_string()).increment(1);
    if broken {
        counter!(BROKEN_WIDGETS_CONSUMED, "consumer" => consumer.to_string()).increment(1);
    }
}
