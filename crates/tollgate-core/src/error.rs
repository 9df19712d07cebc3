use thiserror::Error;
use tollgate_types::InvalidArgument;

/// The runner reported success.
pub const EXIT_SUCCESS: i32 = 0;
/// The runner failed, or the identity check / elevation did.
pub const EXIT_FAILURE: i32 = 1;
/// Bad definition, bad arguments or a violated constraint.
pub const EXIT_USAGE: i32 = 2;
/// Interactive input was cancelled or not confirmed.
pub const EXIT_PROMPT: i32 = 3;

/// The tool definition itself is unusable.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("parameter without name given")]
    MissingName,

    #[error("'--{0}' is defined more than once")]
    DuplicateName(String),

    #[error("'-{short}' is used by both '--{first}' and '--{second}'")]
    DuplicateShort {
        short: char,
        first: String,
        second: String,
    },

    #[error("'{0}' is reserved")]
    Reserved(String),

    #[error("'--{0}': a type must be specified for each user-supplied argument")]
    MissingType(String),

    #[error("'--{0}': restricted_str instead of str must be used for all string arguments")]
    RawStringType(String),

    #[error("'--{0}' is required and can't be combined with prompt")]
    PromptRequired(String),

    #[error("'--{0}' does not take a value and can't be combined with prompt")]
    PromptWithoutValue(String),

    #[error("'{reference}' referenced by {context} is not a known parameter")]
    UnknownParameter { reference: String, context: String },

    #[error("'--{name}': unknown type '{ty}'")]
    UnknownType { name: String, ty: String },

    #[error("'--{name}': {source}")]
    InvalidType {
        name: String,
        #[source]
        source: InvalidArgument,
    },

    #[error("'--{name}': {reason}")]
    InvalidParameter { name: String, reason: String },
}

/// The command line does not satisfy the tool definition.
#[derive(Debug, Error)]
pub enum UsageError {
    /// Rejected by the tokenizer or a validator; holds the rendered report.
    #[error("{0}")]
    Parse(String),

    #[error("argument --{name} requires --{dependency} to be present.")]
    MissingDependency { name: String, dependency: String },

    #[error("arguments {} are mutually exclusive.", .given.join(", "))]
    MutuallyExclusive { given: Vec<String> },

    #[error("at least one of {} is needed.", .group.join(", "))]
    RequiredOneOf { group: Vec<String> },
}

#[derive(Debug, Error)]
pub enum PromptError {
    #[error("cancelled")]
    Cancelled,

    #[error("{0}")]
    Mismatch(String),

    #[error("failed to read input: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("This script can only be used by the user {0}")]
    WrongUser(String),

    #[error("unknown user: {0}")]
    UnknownUser(String),

    #[error("could not determine the invoking user")]
    MissingSudoUser,

    #[error("invalid username: \"{0}\"")]
    InvalidSudoUser(String),

    #[error("failed to switch to user {user}: {reason}")]
    Elevation { user: String, reason: String },
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Usage(#[from] UsageError),

    #[error(transparent)]
    Prompt(#[from] PromptError),

    #[error(transparent)]
    Identity(#[from] IdentityError),
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Config(_) | Error::Usage(_) => EXIT_USAGE,
            Error::Prompt(_) => EXIT_PROMPT,
            Error::Identity(_) => EXIT_FAILURE,
        }
    }
}
