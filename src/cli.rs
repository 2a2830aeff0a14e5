//! Command-line argument handling.
//!
//! The surface is deliberately small: pick a config file, export the
//! default config, or print the version. Anything else runs the TUI.

use std::path::PathBuf;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CliCommand {
    /// Start the TUI, optionally with an explicit config file.
    Run { config: Option<PathBuf> },
    /// Write the default configuration to a file and exit.
    ExportDefaults { path: PathBuf },
    /// Print the version and exit.
    Version,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageError(pub String);

impl std::fmt::Display for UsageError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for UsageError {}

/// Parse command-line arguments. The first argument (the program name) is
/// skipped.
pub fn parse_args<I>(args: I) -> Result<CliCommand, UsageError>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter().skip(1);
    let mut config = None;
    let mut export = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "-c" | "--config" => {
                let value = args
                    .next()
                    .ok_or_else(|| UsageError(format!("{arg} requires a path")))?;
                config = Some(PathBuf::from(value));
            }
            "-e" | "--export-defaults" => {
                let value = args
                    .next()
                    .ok_or_else(|| UsageError(format!("{arg} requires a path")))?;
                export = Some(PathBuf::from(value));
            }
            "-V" | "--version" => return Ok(CliCommand::Version),
            "-h" | "--help" => {
                return Err(UsageError(usage()));
            }
            other => {
                return Err(UsageError(format!("unknown argument {other:?}\n{}", usage())));
            }
        }
    }

    match export {
        Some(path) => Ok(CliCommand::ExportDefaults { path }),
        None => Ok(CliCommand::Run { config }),
    }
}

fn usage() -> String {
    [
        "usage: arbor [options]",
        "",
        "options:",
        "  -c, --config PATH           use this configuration file",
        "  -e, --export-defaults PATH  write the default configuration to PATH and exit",
        "  -V, --version               print the version and exit",
        "  -h, --help                  show this help",
    ]
    .join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliCommand, UsageError> {
        let full: Vec<String> = std::iter::once("arbor".to_string())
            .chain(args.iter().map(|a| a.to_string()))
            .collect();
        parse_args(full)
    }

    #[test]
    fn no_arguments_runs_the_tui() {
        assert_eq!(Ok(CliCommand::Run { config: None }), parse(&[]));
    }

    #[test]
    fn config_flag_takes_a_path() {
        assert_eq!(
            Ok(CliCommand::Run {
                config: Some(PathBuf::from("x.toml"))
            }),
            parse(&["--config", "x.toml"])
        );
        assert!(parse(&["--config"]).is_err());
    }

    #[test]
    fn export_defaults_wins_over_running() {
        assert_eq!(
            Ok(CliCommand::ExportDefaults {
                path: PathBuf::from("out.toml")
            }),
            parse(&["-e", "out.toml", "-c", "ignored.toml"])
        );
    }

    #[test]
    fn unknown_arguments_are_usage_errors() {
        let error = parse(&["--frobnicate"]).unwrap_err();
        assert!(error.to_string().contains("--frobnicate"));
        assert!(error.to_string().contains("usage:"));
    }

    #[test]
    fn version_flag_short_circuits() {
        assert_eq!(Ok(CliCommand::Version), parse(&["-V", "--config"]));
    }
}
