//! Declarative command-line tools.
//!
//! A [`ToolDefinition`] lists typed parameters and the rules between them.
//! The [`Engine`] turns one command line into validated variables:
//!
//! 1. check the invoking identity and elevate if configured,
//! 2. tokenize `argv` with clap, running every value through its validator,
//! 3. prompt for missing values and tokenize again with them appended,
//! 4. enforce dependencies, exclusive groups and required-one-of groups,
//! 5. move values to their `dest` and hand everything to a [`Runner`].

pub mod args;
pub mod capability;
pub mod constraints;
pub mod engine;
pub mod error;
pub mod param;
pub mod prompt;
pub mod registry;

pub use args::ParsedArgs;
pub use capability::{Privileges, Runner, SUDO_USER_VAR, validate_sudo_user};
pub use engine::{Engine, Outcome, Session};
pub use error::{
    ConfigError, EXIT_FAILURE, EXIT_PROMPT, EXIT_SUCCESS, EXIT_USAGE, Error, IdentityError,
    PromptError, UsageError,
};
pub use param::{Action, ParamType, Parameter, PromptOptions, PromptText, ToolDefinition};
pub use prompt::Prompter;
