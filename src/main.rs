//! rulesite - a rule-driven static site builder.

mod cli;
mod config;
mod init;
mod logger;
mod page;
mod processors;
mod serve;
mod site;
mod template;
mod utils;
mod watch;

use anyhow::{Result, anyhow};
use clap::Parser;
use cli::{Cli, Commands};
use config::{BuildOptions, ConfigError, SiteConfig};
use logger::WatchStatus;
use processors::ProcessorMap;
use serve::{ReloadKind, Reloader, serve_site};
use site::Site;
use std::{
    io::{Write, stdout},
    path::{Path, PathBuf},
    process::ExitCode,
};

fn main() -> ExitCode {
    let cli = Cli::parse();
    logger::set_verbose(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log!("error"; "{err:#}");
            if err.downcast_ref::<ConfigError>().is_some() {
                ExitCode::from(1)
            } else {
                ExitCode::from(2)
            }
        }
    }
}

fn run(cli: &Cli) -> Result<()> {
    let config_path = cli.config.as_path();

    match &cli.command {
        Commands::Init { dir } => init::new_site(dir.as_deref().unwrap_or(Path::new("."))),
        Commands::Processors => print_processors(),
        Commands::Config => {
            let config = SiteConfig::from_path(config_path)?;
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
        Commands::Build { build_args } => build(config_path, build_args.options()).map(|_| ()),
        Commands::Summary { timeout } => {
            let options = BuildOptions {
                force: false,
                timeout: timeout.map(std::time::Duration::from_secs),
            };
            let mut site = Site::load(config_path, options)?;
            site.collect()?;
            site.find_deps();
            site.summary(&mut stdout().lock())
        }
        Commands::Dump { path } => {
            let mut site = Site::load(config_path, BuildOptions::default())?;
            site.collect()?;
            site.find_deps();
            let id = site
                .find(path)
                .ok_or_else(|| anyhow!("no page with source or output path '{path}'"))?;
            println!("{}", serde_json::to_string_pretty(&site.describe(id))?);
            Ok(())
        }
        Commands::Watch { build_args } => {
            let options = build_args.options();
            build(config_path, options.clone())?;
            watch(config_path, options, None)
        }
        Commands::Serve { build_args, .. } => {
            let options = build_args.options();
            build(config_path, options.clone())?;

            let output = SiteConfig::from_path(config_path)?.output;
            let reloader = Reloader::default();
            let watch_path = config_path.to_path_buf();
            let watch_reloader = reloader.clone();
            std::thread::spawn(move || {
                if let Err(e) = watch(&watch_path, options, Some(watch_reloader)) {
                    log!("watch"; "{e:#}");
                }
            });

            serve_site(&output, &cli.command.serve_options(), reloader)
        }
    }
}

/// Load the site from scratch and build it.
fn build(config_path: &Path, options: BuildOptions) -> Result<usize> {
    let mut site = Site::load(config_path, options)?;
    site.build()
}

fn print_processors() -> Result<()> {
    let processors = ProcessorMap::default();
    let mut out = stdout().lock();
    for (name, processor) in processors.visible() {
        writeln!(out, "- {name:<16} {}", processor.description())?;
    }
    Ok(())
}

/// Rebuild on every change to the config, templates or sources.
fn watch(config_path: &Path, options: BuildOptions, reloader: Option<Reloader>) -> Result<()> {
    let config = SiteConfig::from_path(config_path)?;
    let mut paths: Vec<PathBuf> = vec![config.config_path.clone(), config.source.clone()];
    paths.extend(config.templates.iter().cloned());

    let mut status = WatchStatus::new();
    watch::watch_blocking(&paths, &config.output, |changed| {
        match build(config_path, options.clone()) {
            Ok(0) => status.unchanged("nothing to rebuild"),
            Ok(count) => {
                status.success(&format!("rebuilt {count} pages"));
                if let Some(reloader) = &reloader {
                    reloader.notify(ReloadKind::for_paths(changed));
                }
            }
            Err(e) => status.error("build failed", &format!("{e:#}")),
        }
    })
}
