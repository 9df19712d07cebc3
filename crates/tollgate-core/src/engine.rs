use std::io::Write;

use serde_json::Value;
use tracing::debug;

use crate::args::ParsedArgs;
use crate::capability::{Privileges, Runner};
use crate::constraints;
use crate::error::{EXIT_FAILURE, EXIT_SUCCESS, Error, IdentityError, UsageError};
use crate::param::ToolDefinition;
use crate::prompt::{self, Prompter};
use crate::registry::{Registry, Tokenized};

/// What a successful parse produced.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome {
    Parsed(ParsedArgs),
    /// `-h/--help` was given; holds the rendered help.
    Help(String),
}

/// The capabilities one invocation runs against.
pub struct Session<'a> {
    pub runner: &'a mut dyn Runner,
    pub privileges: &'a dyn Privileges,
    pub prompter: &'a mut dyn Prompter,
}

/// Parses, validates and forwards the arguments of one tool invocation.
#[derive(Debug, Clone)]
pub struct Engine {
    definition: ToolDefinition,
    script_name: String,
    sudo_user: Option<String>,
}

impl Engine {
    pub fn new(definition: ToolDefinition, script_name: impl Into<String>) -> Self {
        Self {
            definition,
            script_name: script_name.into(),
            sudo_user: None,
        }
    }

    /// User the process was elevated from, once [`Engine::become_user`] ran.
    pub fn sudo_user(&self) -> Option<&str> {
        self.sudo_user.as_deref()
    }

    /// Fail unless the process runs as the configured `check_user`.
    pub fn check_user(&self, privileges: &dyn Privileges) -> Result<(), IdentityError> {
        let Some(user) = &self.definition.check_user else {
            return Ok(());
        };
        if privileges.is_user(user)? {
            Ok(())
        } else {
            Err(IdentityError::WrongUser(user.clone()))
        }
    }

    /// Switch to the configured `become_user` and remember who invoked us.
    pub fn become_user(&mut self, privileges: &dyn Privileges) -> Result<(), IdentityError> {
        let Some(user) = &self.definition.become_user else {
            return Ok(());
        };
        let invoker = privileges.become_user(user)?;
        debug!(user = %user, invoker = %invoker, "running elevated");
        self.sudo_user = Some(invoker);
        Ok(())
    }

    /// Tokenize `argv`, prompt for missing values, then enforce the
    /// cross-parameter constraints and move values to their `dest`.
    pub fn parse_args(
        &self,
        argv: &[String],
        prompter: &mut dyn Prompter,
    ) -> Result<Outcome, Error> {
        let registry = Registry::new(&self.definition, &self.script_name)?;

        let mut args = match registry.tokenize(argv)? {
            Tokenized::Args(args) => args,
            Tokenized::Help(text) => return Ok(Outcome::Help(text)),
        };

        let prompted = prompt::collect_missing(&self.definition.parameters, &args, prompter)?;
        if !prompted.is_empty() {
            let mut argv = argv.to_vec();
            // `--name=value` keeps values that start with `-` from being read as flags.
            argv.extend(
                prompted
                    .iter()
                    .map(|(name, value)| format!("--{name}={value}")),
            );
            args = match registry.tokenize(&argv)? {
                Tokenized::Args(args) => args,
                Tokenized::Help(text) => return Ok(Outcome::Help(text)),
            };
        }

        constraints::enforce(&self.definition, &mut args)?;
        debug!(count = args.iter().count(), "arguments accepted");
        Ok(Outcome::Parsed(args))
    }

    /// The variables handed to the runner: the invoking user (if elevated),
    /// the script name, then one `param_<key>` entry per parsed value.
    pub fn variables(&self, args: &ParsedArgs) -> Vec<(String, Value)> {
        let mut variables = Vec::new();
        if let Some(user) = &self.sudo_user {
            variables.push(("sudo_user".to_string(), Value::String(user.clone())));
        }
        variables.push((
            "script_name".to_string(),
            Value::String(self.script_name.clone()),
        ));
        variables.extend(
            args.iter()
                .map(|(key, value)| (format!("param_{key}"), value.clone())),
        );
        variables
    }

    /// Hand the variables to `runner` and print the success message if it
    /// succeeded.
    pub fn execute(
        &self,
        args: &ParsedArgs,
        runner: &mut dyn Runner,
        stdout: &mut dyn Write,
    ) -> bool {
        let variables = self.variables(args);
        let success = runner.run(&variables, args.verbosity());
        debug!(success, "runner finished");
        if success && let Some(message) = &self.definition.success_msg {
            let _ = writeln!(stdout, "{message}");
        }
        success
    }

    fn report(&self, err: &Error, stderr: &mut dyn Write) {
        let text = match err {
            Error::Usage(usage) => self.render_usage(usage),
            Error::Config(config) => format!("error: {config}\n"),
            other => format!("{other}\n"),
        };
        let _ = stderr.write_all(text.as_bytes());
        if !text.ends_with('\n') {
            let _ = stderr.write_all(b"\n");
        }
    }

    fn render_usage(&self, err: &UsageError) -> String {
        match Registry::new(&self.definition, &self.script_name) {
            Ok(registry) => registry.render(err),
            Err(_) => format!("error: {err}\n"),
        }
    }

    /// The whole invocation: identity check, elevation, parsing, runner.
    /// Returns the process exit status.
    pub fn run(
        &mut self,
        argv: &[String],
        session: Session<'_>,
        stdout: &mut dyn Write,
        stderr: &mut dyn Write,
    ) -> i32 {
        let Session {
            runner,
            privileges,
            prompter,
        } = session;

        let parsed = self
            .check_user(privileges)
            .and_then(|()| self.become_user(privileges))
            .map_err(Error::from)
            .and_then(|()| self.parse_args(argv, prompter));

        match parsed {
            Ok(Outcome::Help(text)) => {
                let _ = stdout.write_all(text.as_bytes());
                EXIT_SUCCESS
            }
            Ok(Outcome::Parsed(args)) => {
                if self.execute(&args, runner, stdout) {
                    EXIT_SUCCESS
                } else {
                    EXIT_FAILURE
                }
            }
            Err(err) => {
                self.report(&err, stderr);
                err.exit_code()
            }
        }
    }
}
