//! Layercast Worker Entrypoint
//!
//! Usage: layercast-worker handle
//!
//! Reads a single job invocation from stdin, distributes the layer into the
//! requested region, and writes the job result to stdout. Configured through
//! the `LAYERCAST_*` environment variables.

use std::process::ExitCode;

use layercast_worker::{init_logging, JobHandler, WorkerConfig};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    if args.len() >= 2 && args[1] == "handle" {
        let config = WorkerConfig::from_env();
        init_logging(config.log_format, "info");

        // A reported failure is still a handled job.
        match JobHandler::new(config).run() {
            Ok(_) => ExitCode::SUCCESS,
            Err(e) => {
                tracing::error!(error = %e, "job handler error");
                ExitCode::FAILURE
            }
        }
    } else {
        eprintln!("Usage: layercast-worker handle");
        eprintln!();
        eprintln!("Handles one job invocation, reading JSON from stdin and writing the result to stdout.");
        ExitCode::FAILURE
    }
}
