use anyhow::{Context, Result, bail};
use indexmap::IndexMap;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::Command;
use tollgate_core::Runner;

pub const DEFAULT_PROGRAM: &str = "ansible-playbook";

/// Loaded in place of any `ansible.cfg` in the working or home directory.
const ANSIBLE_CONFIG: &str = "/etc/ansible/ansible.cfg";

/// Runs an Ansible playbook against localhost with the tool variables as
/// extra vars.
#[derive(Debug, Clone)]
pub struct PlaybookRunner {
    playbook: PathBuf,
    program: String,
}

impl PlaybookRunner {
    pub fn new(playbook: impl Into<PathBuf>) -> Self {
        Self {
            playbook: playbook.into(),
            program: DEFAULT_PROGRAM.to_string(),
        }
    }

    pub fn with_program(mut self, program: impl Into<String>) -> Self {
        self.program = program.into();
        self
    }

    fn check_playbook(&self) -> Result<&Path> {
        let playbook = self.playbook.as_path();
        if playbook.as_os_str().is_empty() {
            bail!("no playbook given");
        }
        if !playbook.is_absolute() {
            bail!("path to playbook must be absolute");
        }
        if !playbook.is_file() {
            bail!("playbook must exist: {}", playbook.display());
        }
        Ok(playbook)
    }

    /// The playbook invocation for `variables`.
    ///
    /// The first `-v` given to the tool only lifts the output filter, so the
    /// playbook sees one level less.
    pub fn command(&self, variables: &[(String, Value)], verbosity: u8) -> Result<Command> {
        let playbook = self.check_playbook()?;
        let dir = playbook
            .parent()
            .with_context(|| format!("playbook has no parent: {}", playbook.display()))?;

        let extra_vars: IndexMap<&str, &Value> = variables
            .iter()
            .map(|(name, value)| (name.as_str(), value))
            .collect();
        let extra_vars =
            serde_json::to_string(&extra_vars).context("failed to encode playbook variables")?;

        let mut cmd = Command::new(&self.program);
        cmd.current_dir(dir)
            .env("ANSIBLE_CONFIG", ANSIBLE_CONFIG)
            .env("ANSIBLE_RETRY_FILES_ENABLED", "false")
            .args(["--inventory", "localhost,", "--connection", "local"])
            .arg("--extra-vars")
            .arg(extra_vars);

        if verbosity == 0 {
            cmd.env("ANSIBLE_DISPLAY_OK_HOSTS", "false")
                .env("ANSIBLE_DISPLAY_SKIPPED_HOSTS", "false");
        } else if verbosity > 1 {
            cmd.arg(format!("-{}", "v".repeat(usize::from(verbosity - 1))));
        }

        cmd.arg(playbook);
        Ok(cmd)
    }

    fn try_run(&self, variables: &[(String, Value)], verbosity: u8) -> Result<bool> {
        let mut cmd = self.command(variables, verbosity)?;
        tracing::debug!(
            program = %self.program,
            playbook = %self.playbook.display(),
            "running playbook"
        );
        let status = cmd
            .status()
            .with_context(|| format!("failed to run {}", self.program))?;
        tracing::debug!(%status, "playbook finished");
        Ok(status.success())
    }
}

impl Runner for PlaybookRunner {
    fn run(&mut self, variables: &[(String, Value)], verbosity: u8) -> bool {
        match self.try_run(variables, verbosity) {
            Ok(success) => success,
            Err(err) => {
                eprintln!("error: {err:#}");
                false
            }
        }
    }
}
