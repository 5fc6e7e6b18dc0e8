//! asminfo: export type metadata of a compiled module as JSON.
//!
//! Two modes:
//! - **One-shot**: `asminfo <path>`: scan one module, print the document, exit
//! - **Service**: `asminfo --server`: read one module path per line on stdin,
//!   answer each with one JSON line on stdout

mod commands;
mod logging;
mod parse;
mod recycle;

use std::io::{self, BufReader, Write};
use std::path::Path;
use std::process;
use std::sync::Arc;

use asminfo_engine::{Engine, ServiceConfig};
use asminfo_executor::{ScanService, ServeOutcome};
use asminfo_metadata::ClrIntrospector;
use tracing::{debug, error, info};

use commands::{build_cli, USAGE};
use parse::{matches_to_action, CliAction};

/// Success, including "File not found!" and usage output
pub const EXIT_OK: i32 = 0;
/// The scan or the configuration failed
pub const EXIT_FAILURE: i32 = 1;
/// Internal failure
pub const EXIT_SOFTWARE: i32 = 70;
/// Recycling was due but the restart failed
pub const EXIT_TEMPFAIL: i32 = 75;

fn main() {
    let matches = build_cli().get_matches();

    let action = match matches_to_action(&matches) {
        Ok(action) => action,
        Err(e) => {
            eprintln!("{}", e);
            process::exit(EXIT_FAILURE);
        }
    };

    let exit_code = match action {
        CliAction::Usage => {
            println!("{}", USAGE);
            EXIT_OK
        }
        CliAction::Scan { path, config } => {
            logging::init_logging(config.log_level.as_deref());
            run_once(&path, &config)
        }
        CliAction::Serve { config } => {
            logging::init_logging(config.log_level.as_deref());
            run_server(&config)
        }
    };
    process::exit(exit_code);
}

fn run_once(path: &Path, config: &ServiceConfig) -> i32 {
    if !path.exists() {
        println!("File not found!");
        return EXIT_OK;
    }

    let engine = Engine::new(Arc::new(ClrIntrospector::new()), config);
    let extraction = match engine.scan(path) {
        Ok(extraction) => extraction,
        Err(e) => {
            eprintln!("{}", e);
            return if e.is_fatal() { EXIT_SOFTWARE } else { EXIT_FAILURE };
        }
    };

    match extraction.result.to_json() {
        Ok(json) => {
            println!("{}", json);
            EXIT_OK
        }
        Err(e) => {
            eprintln!("cannot encode result: {}", e);
            EXIT_SOFTWARE
        }
    }
}

fn run_server(config: &ServiceConfig) -> i32 {
    debug!(?config, "starting scan service");
    let service = ScanService::with_config(Arc::new(ClrIntrospector::new()), config);

    let stdin = io::stdin();
    let mut input = BufReader::new(stdin.lock());
    let mut output = io::stdout().lock();

    match service.serve(&mut input, &mut output) {
        Ok(ServeOutcome::Eof) => EXIT_OK,
        Ok(ServeOutcome::Recycle) => {
            let _ = output.flush();
            drop(output);
            info!(stats = ?service.stats(), "restarting service process");
            match recycle::restart() {
                Ok(code) => code,
                Err(e) => {
                    error!(error = %e, "restart failed");
                    EXIT_TEMPFAIL
                }
            }
        }
        Err(e) => {
            error!(error = %e, "scan service stopped");
            EXIT_SOFTWARE
        }
    }
}
