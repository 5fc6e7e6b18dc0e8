//! ArgMatches → CliAction conversion.

use std::path::PathBuf;

use asminfo_engine::{ConfigError, ServiceConfig};
use clap::ArgMatches;

/// What the invocation asks for.
#[derive(Debug, PartialEq, Eq)]
pub enum CliAction {
    /// Nothing to do; print usage.
    Usage,
    /// Scan one module and exit.
    Scan {
        /// Module path
        path: PathBuf,
        /// Resolved configuration
        config: ServiceConfig,
    },
    /// Run the persistent service.
    Serve {
        /// Resolved configuration
        config: ServiceConfig,
    },
}

/// Convert clap ArgMatches into a CliAction.
pub fn matches_to_action(matches: &ArgMatches) -> Result<CliAction, ConfigError> {
    let server = matches.get_flag("server");
    let path = matches.get_one::<String>("path").map(PathBuf::from);
    if !server && path.is_none() {
        return Ok(CliAction::Usage);
    }

    let config = resolve_config(matches)?;
    Ok(match path {
        Some(path) if !server => CliAction::Scan { path, config },
        _ => CliAction::Serve { config },
    })
}

/// Defaults, then `--config`, then individual flags.
fn resolve_config(matches: &ArgMatches) -> Result<ServiceConfig, ConfigError> {
    let mut builder = ServiceConfig::builder();
    if let Some(file) = matches.get_one::<String>("config") {
        builder = builder.file(file)?;
    }
    if let Some(&cap) = matches.get_one::<usize>("max-contexts") {
        builder = builder.max_live_contexts(cap);
    }
    if let Some(&n) = matches.get_one::<u64>("recycle-after") {
        builder = builder.recycle_after(n);
    }
    if let Some(level) = matches.get_one::<String>("log-level") {
        builder = builder.log_level(level.clone());
    }
    builder.build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commands::build_cli;
    use std::io::Write;

    fn action(args: &[&str]) -> Result<CliAction, ConfigError> {
        let matches = build_cli()
            .try_get_matches_from(std::iter::once("asminfo").chain(args.iter().copied()))
            .unwrap();
        matches_to_action(&matches)
    }

    #[test]
    fn test_no_arguments_is_usage() {
        assert_eq!(action(&[]).unwrap(), CliAction::Usage);
        assert_eq!(action(&["--log-level", "debug"]).unwrap(), CliAction::Usage);
    }

    #[test]
    fn test_path_is_one_shot() {
        match action(&["lib/Foo.dll"]).unwrap() {
            CliAction::Scan { path, config } => {
                assert_eq!(path, PathBuf::from("lib/Foo.dll"));
                assert_eq!(config, ServiceConfig::default());
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_server_with_overrides() {
        let action = action(&["--server", "--max-contexts", "2", "--recycle-after", "50"]).unwrap();
        let CliAction::Serve { config } = action else {
            panic!("expected serve, got {action:?}");
        };
        assert_eq!(config.max_live_contexts, 2);
        assert_eq!(config.recycle_after, Some(50));
    }

    #[test]
    fn test_flags_override_config_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "max_live_contexts = 9").unwrap();
        writeln!(file, "recycle_after = 10").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let CliAction::Serve { config } =
            action(&["--server", "--config", &path, "--max-contexts", "3"]).unwrap()
        else {
            panic!("expected serve");
        };
        assert_eq!(config.max_live_contexts, 3);
        assert_eq!(config.recycle_after, Some(10));
    }

    #[test]
    fn test_invalid_values_are_config_errors() {
        assert!(matches!(
            action(&["--server", "--max-contexts", "0"]),
            Err(ConfigError::Invalid(_))
        ));
        assert!(matches!(
            action(&["--server", "--config", "/nope.toml"]),
            Err(ConfigError::Io { .. })
        ));
    }

    #[test]
    fn test_server_and_path_conflict() {
        assert!(build_cli()
            .try_get_matches_from(["asminfo", "--server", "a.dll"])
            .is_err());
    }
}
