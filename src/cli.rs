//! Command-line interface definitions.

use crate::config::{BuildOptions, CONFIG_FILE, ServeOptions};
use clap::{Parser, Subcommand};
use std::{path::PathBuf, time::Duration};

/// Rule-driven static site builder
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Config file
    #[arg(short, long, default_value = CONFIG_FILE)]
    pub config: PathBuf,

    /// Log every page as it is peeked, written or copied
    #[arg(short, long)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Shared build arguments
#[derive(clap::Args, Debug, Clone, Default)]
pub struct BuildArgs {
    /// Rebuild every page, changed or not
    #[arg(short, long)]
    pub force: bool,

    /// Kill external commands after this many seconds (overrides TIMEOUT)
    #[arg(long, value_name = "SECS")]
    pub timeout: Option<u64>,
}

impl BuildArgs {
    pub fn options(&self) -> BuildOptions {
        BuildOptions {
            force: self.force,
            timeout: self.timeout.map(Duration::from_secs),
        }
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Build the site, writing only changed pages
    Build {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// Process every page and print it instead of writing it
    Summary {
        /// Kill external commands after this many seconds (overrides TIMEOUT)
        #[arg(long, value_name = "SECS")]
        timeout: Option<u64>,
    },

    /// Build, then serve the output with live reload while watching
    Serve {
        #[command(flatten)]
        build_args: BuildArgs,

        /// Interface to bind on
        #[arg(short, long)]
        interface: Option<String>,

        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },

    /// Build, then rebuild whenever sources, templates or config change
    Watch {
        #[command(flatten)]
        build_args: BuildArgs,
    },

    /// List available processors
    Processors,

    /// Print the parsed config as JSON
    Config,

    /// Print what is known about one page as JSON
    Dump {
        /// Source path, output path or URL of the page
        path: String,
    },

    /// Write an example site
    Init {
        /// Target directory (default: current directory)
        dir: Option<PathBuf>,
    },
}

impl Commands {
    /// Dev server settings, defaults filled in.
    pub fn serve_options(&self) -> ServeOptions {
        let mut options = ServeOptions::default();
        if let Self::Serve { interface, port, .. } = self {
            if let Some(interface) = interface {
                options.interface.clone_from(interface);
            }
            if let Some(port) = port {
                options.port = *port;
            }
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("rulesite").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_build_defaults() {
        let cli = parse(&["build"]);
        assert_eq!(cli.config, PathBuf::from(CONFIG_FILE));
        assert!(!cli.verbose);
        let Commands::Build { build_args } = cli.command else {
            panic!("expected build");
        };
        let options = build_args.options();
        assert!(!options.force);
        assert_eq!(options.timeout, None);
    }

    #[test]
    fn test_build_flags() {
        let cli = parse(&["-c", "other.conf", "-v", "build", "-f", "--timeout", "5"]);
        assert_eq!(cli.config, PathBuf::from("other.conf"));
        assert!(cli.verbose);
        let Commands::Build { build_args } = cli.command else {
            panic!("expected build");
        };
        let options = build_args.options();
        assert!(options.force);
        assert_eq!(options.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn test_serve_options() {
        let cli = parse(&["serve", "-p", "9000"]);
        let options = cli.command.serve_options();
        assert_eq!(options.port, 9000);
        assert_eq!(options.interface, "127.0.0.1");
    }

    #[test]
    fn test_dump_and_init() {
        assert!(matches!(parse(&["dump", "blog/a.md"]).command, Commands::Dump { path } if path == "blog/a.md"));
        assert!(matches!(parse(&["init"]).command, Commands::Init { dir: None }));
    }

    #[test]
    fn test_missing_subcommand_is_error() {
        assert!(Cli::try_parse_from(["rulesite"]).is_err());
        assert!(Cli::try_parse_from(["rulesite", "build", "--timeout", "soon"]).is_err());
    }
}
