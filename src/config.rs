//! Run parameters as the command line sees them.

use crate::core::FlagError;
use crate::flag::{int_flag, parse_int, FlagSet};

/// Raw run parameters: defaults overlaid with whatever the command line
/// supplied. Counts are signed here because `-k` uses `-1` for "none";
/// [`crate::pipeline::PipelineConfig`] is the validated form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// `-n`: widgets each producer makes
    pub widgets_per_producer: i64,
    /// `-p`: number of producers
    pub producer_count: i64,
    /// `-c`: number of consumers
    pub consumer_count: i64,
    /// `-k`: broken widgets per producer batch; zero or less means none
    pub broken_per_batch: i64,
    /// `-seed`: fixes broken-widget placement; random when absent
    pub seed: Option<u64>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            widgets_per_producer: 10,
            producer_count: 1,
            consumer_count: 1,
            broken_per_batch: -1,
            seed: None,
        }
    }
}

impl Config {
    /// Build the flag set that writes into this config.
    pub fn flag_set(&mut self, program: &str) -> Result<FlagSet<'_>, FlagError> {
        let mut flags = FlagSet::new(program);
        flags.define(
            "n",
            "Sets the number of widgets created per producer (integer)",
            int_flag(&mut self.widgets_per_producer),
        )?;
        flags.define(
            "p",
            "Sets the number of producers created (integer)",
            int_flag(&mut self.producer_count),
        )?;
        flags.define(
            "c",
            "Sets the number of consumers created (integer)",
            int_flag(&mut self.consumer_count),
        )?;
        flags.define(
            "k",
            "Sets how many widgets of each batch are broken (integer)",
            int_flag(&mut self.broken_per_batch),
        )?;

        let seed = &mut self.seed;
        flags.define(
            "seed",
            "Seeds broken-widget placement for reproducible runs (integer)",
            move |value: &str| {
                let parsed = parse_int(value)?;
                *seed = Some(
                    u64::try_from(parsed).map_err(|_| "seed must not be negative".to_string())?,
                );
                Ok(())
            },
        )?;
        Ok(flags)
    }

    /// Parse `args` (without the program name) over the defaults.
    ///
    /// The config is returned even when parsing fails; it holds whatever
    /// was parsed before the first error.
    pub fn from_args<I, S>(args: I) -> (Self, Result<(), FlagError>)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut config = Self::default();
        let result = config
            .flag_set("")
            .and_then(|flags| flags.with_output(std::io::sink()).parse(args));
        (config, result)
    }
}
