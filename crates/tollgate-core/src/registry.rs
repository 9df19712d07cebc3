//! Registration of a [`ToolDefinition`] onto a clap [`Command`].
//!
//! The definition is checked as a whole first so that a broken tool fails
//! before any user input is looked at.

use std::collections::HashSet;
use std::ffi::OsStr;

use clap::builder::{PossibleValue, TypedValueParser};
use clap::error::ErrorKind;
use clap::{Arg, ArgAction, ArgMatches, Command};
use serde_json::Value;
use tracing::debug;

use crate::args::{ParsedArgs, VERBOSE_KEY};
use crate::error::{ConfigError, UsageError};
use crate::param::{Action, ParamType, Parameter, ToolDefinition};

const HELP_KEY: &str = "help";
const REQUIRED_HEADING: &str = "required arguments";
const OPTIONAL_HEADING: &str = "optional arguments";

/// Result of one tokenizer pass.
#[derive(Debug, Clone, PartialEq)]
pub enum Tokenized {
    Args(ParsedArgs),
    Help(String),
}

/// Turns a raw value into a typed one, then checks it against `choices`.
#[derive(Debug, Clone)]
struct ParamValueParser {
    ty: Option<ParamType>,
    choices: Option<Vec<Value>>,
}

fn choice_text(choice: &Value) -> String {
    match choice {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

impl ParamValueParser {
    fn convert(&self, raw: &str) -> Result<Value, String> {
        let value = match &self.ty {
            None | Some(ParamType::String) => Value::String(raw.to_string()),
            Some(ParamType::Integer) => raw
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| "invalid integer".to_string())?,
            Some(ParamType::Validated(validator)) => {
                validator.validate(raw).map_err(|err| err.to_string())?
            }
        };

        if let Some(choices) = &self.choices
            && !choices.contains(&value)
        {
            let allowed: Vec<String> = choices
                .iter()
                .map(|choice| format!("'{}'", choice_text(choice)))
                .collect();
            return Err(format!("invalid choice (choose from {})", allowed.join(", ")));
        }
        Ok(value)
    }
}

impl TypedValueParser for ParamValueParser {
    type Value = Value;

    fn parse_ref(
        &self,
        cmd: &Command,
        arg: Option<&Arg>,
        value: &OsStr,
    ) -> Result<Self::Value, clap::Error> {
        let Some(raw) = value.to_str() else {
            return Err(clap::Error::new(ErrorKind::InvalidUtf8).with_cmd(cmd));
        };
        self.convert(raw).map_err(|reason| {
            let arg = arg.map(ToString::to_string).unwrap_or_default();
            let mut cmd = cmd.clone();
            cmd.error(
                ErrorKind::ValueValidation,
                format!("argument {arg}: {reason}: '{raw}'"),
            )
        })
    }

    fn possible_values(&self) -> Option<Box<dyn Iterator<Item = PossibleValue> + '_>> {
        let choices = self.choices.as_ref()?;
        Some(Box::new(
            choices
                .iter()
                .map(|choice| PossibleValue::new(choice_text(choice))),
        ))
    }
}

fn reserved(name: &str) -> bool {
    name == HELP_KEY || name == VERBOSE_KEY
}

fn invalid(param: &Parameter, reason: &str) -> ConfigError {
    ConfigError::InvalidParameter {
        name: param.name.clone(),
        reason: reason.to_string(),
    }
}

fn check_parameter(param: &Parameter) -> Result<(), ConfigError> {
    if param.prompt.is_some() && (param.required || param.positional) {
        return Err(ConfigError::PromptRequired(param.name.clone()));
    }
    if param.prompt.is_some() && !param.action.takes_value() {
        return Err(ConfigError::PromptWithoutValue(param.name.clone()));
    }

    if param.action.takes_value() && param.choices.is_none() {
        match param.ty {
            None => return Err(ConfigError::MissingType(param.name.clone())),
            Some(ParamType::String) => {
                return Err(ConfigError::RawStringType(param.name.clone()));
            }
            Some(_) => {}
        }
    }
    if !param.action.takes_value() {
        if param.default.is_some() {
            return Err(invalid(param, "a default requires an action that takes a value"));
        }
        if param.choices.is_some() {
            return Err(invalid(param, "choices require an action that takes a value"));
        }
    }
    if param.action.uses_const() && param.constant.is_none() {
        return Err(invalid(param, "this action requires a const value"));
    }
    if param.positional && param.action != Action::Store {
        return Err(invalid(param, "positional arguments only support the store action"));
    }
    if param.positional && param.short.is_some() {
        return Err(invalid(param, "positional arguments can't have a short option"));
    }
    Ok(())
}

fn check_reference(
    definition: &ToolDefinition,
    reference: &str,
    context: impl FnOnce() -> String,
) -> Result<(), ConfigError> {
    match definition.find(reference) {
        Some(_) => Ok(()),
        None => Err(ConfigError::UnknownParameter {
            reference: reference.to_string(),
            context: context(),
        }),
    }
}

/// Reject definitions that can never be parsed correctly.
pub fn check_definition(definition: &ToolDefinition) -> Result<(), ConfigError> {
    let mut keys = HashSet::new();
    let mut shorts: Vec<(char, &str)> = Vec::new();
    let mut optional_positional: Option<&str> = None;

    for param in &definition.parameters {
        if param.name.is_empty() {
            return Err(ConfigError::MissingName);
        }
        if reserved(&param.key()) {
            return Err(ConfigError::Reserved(format!("--{}", param.name)));
        }
        if !keys.insert(param.key()) {
            return Err(ConfigError::DuplicateName(param.name.clone()));
        }
        if let Some(short) = param.short {
            if short == 'h' || short == 'v' {
                return Err(ConfigError::Reserved(format!("-{short}")));
            }
            if let Some((_, first)) = shorts.iter().find(|(taken, _)| *taken == short) {
                return Err(ConfigError::DuplicateShort {
                    short,
                    first: first.to_string(),
                    second: param.name.clone(),
                });
            }
            shorts.push((short, param.name.as_str()));
        }

        check_parameter(param)?;

        if param.positional {
            let mandatory = param.default.is_none();
            if let Some(earlier) = optional_positional
                && mandatory
            {
                return Err(invalid(
                    param,
                    &format!("required positional argument follows optional '{earlier}'"),
                ));
            }
            if !mandatory {
                optional_positional = Some(param.name.as_str());
            }
        }

        if let Some(dependency) = &param.depends_on {
            check_reference(definition, dependency, || format!("'--{}'", param.name))?;
        }
    }

    for group in &definition.mutually_exclusive {
        for member in group {
            check_reference(definition, member, || "a mutually exclusive group".to_string())?;
        }
    }
    for group in &definition.required_one_of {
        for member in group {
            check_reference(definition, member, || "a required-one-of group".to_string())?;
        }
    }
    Ok(())
}

fn build_arg(param: &Parameter) -> Arg {
    let key = param.key();
    let mut arg = Arg::new(key);

    if param.positional {
        arg = arg.value_name(param.name.clone());
    } else {
        arg = arg.long(param.name.clone());
        if let Some(short) = param.short {
            arg = arg.short(short);
        }
    }

    let mandatory = (param.required || param.positional) && param.default.is_none();
    let heading = if param.required || param.positional {
        REQUIRED_HEADING
    } else {
        OPTIONAL_HEADING
    };
    arg = arg.required(mandatory).help_heading(heading);

    if let Some(help) = &param.help {
        arg = arg.help(help.clone());
    }

    let parser = ParamValueParser {
        ty: param.ty.clone(),
        choices: param.choices.clone(),
    };
    let arg = match param.action {
        Action::Store => arg.action(ArgAction::Set).value_parser(parser),
        Action::Append => arg.action(ArgAction::Append).value_parser(parser),
        Action::StoreTrue | Action::StoreConst => arg.action(ArgAction::SetTrue),
        Action::StoreFalse => arg.action(ArgAction::SetFalse),
        Action::AppendConst | Action::Count => arg.action(ArgAction::Count),
    };
    match &param.default {
        Some(default) => arg.default_value(default.clone()),
        None => arg,
    }
}

/// Build the clap command for an already checked definition.
pub fn build_command(definition: &ToolDefinition, script_name: &str) -> Command {
    let mut cmd = Command::new(script_name.to_string())
        .no_binary_name(true)
        .args_override_self(true)
        .disable_help_flag(true)
        .disable_version_flag(true);
    if let Some(description) = &definition.description {
        cmd = cmd.about(description.clone());
    }

    cmd = cmd.arg(
        Arg::new(HELP_KEY)
            .short('h')
            .long(HELP_KEY)
            .action(ArgAction::Help)
            .help("show this help message and exit")
            .help_heading(OPTIONAL_HEADING),
    );
    for param in &definition.parameters {
        cmd = cmd.arg(build_arg(param));
    }
    cmd.arg(
        Arg::new(VERBOSE_KEY)
            .short('v')
            .long(VERBOSE_KEY)
            .action(ArgAction::Count)
            .help("run with a lot of debugging output")
            .help_heading(OPTIONAL_HEADING),
    )
}

fn extract(param: &Parameter, matches: &ArgMatches) -> Value {
    let key = param.key();
    let repeated = |count: u8| match (&param.constant, count) {
        (Some(constant), n) if n > 0 => Value::Array(vec![constant.clone(); usize::from(n)]),
        _ => Value::Null,
    };

    match param.action {
        Action::Store => matches.get_one::<Value>(&key).cloned().unwrap_or(Value::Null),
        Action::Append => matches
            .get_many::<Value>(&key)
            .map(|values| Value::Array(values.cloned().collect()))
            .unwrap_or(Value::Null),
        Action::StoreTrue | Action::StoreFalse => Value::Bool(matches.get_flag(&key)),
        Action::StoreConst => match (matches.get_flag(&key), &param.constant) {
            (true, Some(constant)) => constant.clone(),
            _ => Value::Null,
        },
        Action::AppendConst => repeated(matches.get_count(&key)),
        Action::Count => match matches.get_count(&key) {
            0 => Value::Null,
            n => Value::from(n),
        },
    }
}

/// A checked definition together with its clap command.
#[derive(Debug, Clone)]
pub struct Registry<'a> {
    definition: &'a ToolDefinition,
    command: Command,
}

impl<'a> Registry<'a> {
    pub fn new(definition: &'a ToolDefinition, script_name: &str) -> Result<Self, ConfigError> {
        check_definition(definition)?;
        Ok(Self {
            definition,
            command: build_command(definition, script_name),
        })
    }

    /// Run the tokenizer over `argv` (without the program name).
    pub fn tokenize(&self, argv: &[String]) -> Result<Tokenized, UsageError> {
        let matches = match self.command.clone().try_get_matches_from(argv) {
            Ok(matches) => matches,
            Err(err) if err.kind() == ErrorKind::DisplayHelp => {
                return Ok(Tokenized::Help(err.to_string()));
            }
            Err(err) => return Err(UsageError::Parse(err.to_string())),
        };

        let mut args = ParsedArgs::new(matches.get_count(VERBOSE_KEY));
        for param in &self.definition.parameters {
            args.insert(param.key(), extract(param, &matches));
        }
        args.insert(VERBOSE_KEY, Value::from(args.verbosity()));
        debug!(count = args.iter().count(), "tokenized arguments");
        Ok(Tokenized::Args(args))
    }

    /// Render a usage error the way the tokenizer renders its own.
    pub fn render(&self, err: &UsageError) -> String {
        match err {
            UsageError::Parse(text) => text.clone(),
            other => {
                let kind = match other {
                    UsageError::MutuallyExclusive { .. } => ErrorKind::ArgumentConflict,
                    _ => ErrorKind::MissingRequiredArgument,
                };
                self.command.clone().error(kind, other.to_string()).to_string()
            }
        }
    }
}
