mod manifest;
mod privileges;
mod prompt;
mod runner;

use anyhow::{Context, Result};
use clap::Parser;
use std::{
    ffi::OsString,
    io,
    path::{Path, PathBuf},
};
use tollgate_core::{EXIT_USAGE, Engine, Session};
use tracing_subscriber::{EnvFilter, fmt};

use crate::manifest::{load_manifest, script_name};
use crate::privileges::SudoPrivileges;
use crate::prompt::TerminalPrompter;
use crate::runner::PlaybookRunner;

#[derive(Parser)]
#[command(name = "tollgate")]
#[command(version, about = "Run a playbook behind a validated command line", long_about = None)]
#[command(override_usage = "tollgate <MANIFEST> [ARGS]...")]
struct Cli {
    /// Tool manifest (JSON); the remaining arguments are passed to the tool
    #[arg(value_name = "MANIFEST")]
    manifest: PathBuf,
}

fn main() {
    init_tracing();

    let (own, tool_args) = split_argv(std::env::args_os().collect());
    let cli = Cli::parse_from(own);

    let args = match tool_args
        .into_iter()
        .map(OsString::into_string)
        .collect::<Result<Vec<_>, _>>()
    {
        Ok(args) => args,
        Err(arg) => {
            eprintln!("error: argument is not valid UTF-8: {}", arg.to_string_lossy());
            std::process::exit(EXIT_USAGE);
        }
    };

    let code = match run(&cli.manifest, &args) {
        Ok(code) => code,
        Err(err) => {
            eprintln!("error: {err:#}");
            EXIT_USAGE
        }
    };
    std::process::exit(code);
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_env("TOLLGATE_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .compact()
        .init();
}

/// Split at the manifest path: flags before it are ours, everything after
/// it belongs to the tool, including its own `--help`.
fn split_argv(mut argv: Vec<OsString>) -> (Vec<OsString>, Vec<OsString>) {
    let end = argv
        .iter()
        .skip(1)
        .position(|arg| !arg.to_string_lossy().starts_with('-'))
        .map_or(argv.len(), |pos| pos + 2);
    let rest = argv.split_off(end);
    (argv, rest)
}

fn run(manifest_path: &Path, args: &[String]) -> Result<i32> {
    let manifest = load_manifest(manifest_path)?;
    let (definition, runner) = manifest
        .into_parts()
        .with_context(|| format!("invalid manifest: {}", manifest_path.display()))?;

    let mut playbook = PlaybookRunner::new(runner.playbook);
    if let Some(program) = runner.program {
        playbook = playbook.with_program(program);
    }

    let mut prompter = TerminalPrompter::new().context("failed to install Ctrl-C handler")?;

    tracing::debug!(manifest = %manifest_path.display(), "running tool");
    let mut engine = Engine::new(definition, script_name(manifest_path));
    let privileges = SudoPrivileges::from_env();

    Ok(engine.run(
        args,
        Session {
            runner: &mut playbook,
            privileges: &privileges,
            prompter: &mut prompter,
        },
        &mut io::stdout(),
        &mut io::stderr(),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn os(items: &[&str]) -> Vec<OsString> {
        items.iter().map(OsString::from).collect()
    }

    #[test]
    fn tool_arguments_start_after_manifest() {
        let (own, rest) = split_argv(os(&["tollgate", "tool.json", "--help", "-v"]));
        assert_eq!(own, os(&["tollgate", "tool.json"]));
        assert_eq!(rest, os(&["--help", "-v"]));

        let (own, rest) = split_argv(os(&["tollgate", "--version"]));
        assert_eq!(own, os(&["tollgate", "--version"]));
        assert!(rest.is_empty());

        let (own, rest) = split_argv(os(&["tollgate"]));
        assert_eq!(own, os(&["tollgate"]));
        assert!(rest.is_empty());
    }
}
