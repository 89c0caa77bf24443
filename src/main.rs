use std::process::ExitCode;

use tracing::{error, info, warn};
use widgetweld::prelude::*;
use widgetweld::telemetry;

#[tokio::main]
async fn main() -> ExitCode {
    telemetry::init_tracing();

    let mut config = Config::default();
    let parsed = match config.flag_set("widgetweld") {
        Ok(mut flags) => flags
            .parse(std::env::args().skip(1))
            .map_err(|err| (err, flags.usage())),
        Err(err) => {
            error!(error = %err, "failed to define flags");
            return ExitCode::from(2);
        }
    };

    match parsed {
        Ok(()) => {}
        Err((err @ FlagError::NotDefined(_), _)) => {
            // Parsing stopped at the unknown flag; run with what was read.
            warn!("{}", err);
        }
        Err((FlagError::HelpRequested, _)) => return ExitCode::SUCCESS,
        Err((err, usage)) => {
            error!("'{}'", err);
            // Same stream as the usage printed for -h.
            print!("{}", usage);
            return ExitCode::from(Error::from(err).exit_status());
        }
    }

    let pipeline = match Pipeline::from_config(&config) {
        Ok(pipeline) => pipeline,
        Err(err) => {
            error!("{}", err);
            return ExitCode::from(err.exit_status());
        }
    };

    match pipeline.run().await {
        Ok(summary) => {
            info!(
                consumed = summary.consumed(),
                broken = summary.broken(),
                last_consumer = summary.last_consumer.as_deref().unwrap_or("-"),
                "done"
            );
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!("{}", err);
            ExitCode::from(err.exit_status())
        }
    }
}
