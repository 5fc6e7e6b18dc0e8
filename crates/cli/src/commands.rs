//! Command-line definition.

use clap::{value_parser, Arg, ArgAction, Command};

/// Printed when neither a path nor `--server` is given.
pub const USAGE: &str = "usage: either --server to start server or path to dll";

/// Build the `asminfo` command.
pub fn build_cli() -> Command {
    Command::new("asminfo")
        .about("Export type metadata of a compiled module as JSON")
        .version(env!("CARGO_PKG_VERSION"))
        .arg(
            Arg::new("path")
                .help("Module to scan once")
                .value_name("PATH"),
        )
        .arg(
            Arg::new("server")
                .long("server")
                .help("Serve scan requests from stdin, one path per line")
                .action(ArgAction::SetTrue)
                .conflicts_with("path"),
        )
        .arg(
            Arg::new("config")
                .long("config")
                .value_name("FILE")
                .help("TOML service configuration"),
        )
        .arg(
            Arg::new("max-contexts")
                .long("max-contexts")
                .value_name("N")
                .value_parser(value_parser!(usize))
                .help("Maximum simultaneously live load contexts"),
        )
        .arg(
            Arg::new("recycle-after")
                .long("recycle-after")
                .value_name("N")
                .value_parser(value_parser!(u64))
                .help("Restart the service after N load contexts"),
        )
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .value_name("LEVEL")
                .help("trace, debug, info, warn or error (RUST_LOG takes precedence)"),
        )
}
