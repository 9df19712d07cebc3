use std::sync::Arc;

use serde::Deserialize;
use serde_json::{Map, Value};
use tollgate_types::{
    Domain, DomainOptions, RestrictedInt, RestrictedIntOptions, RestrictedString,
    RestrictedStringOptions, Uri, UriOptions, Validator, X509Certificate,
    X509CertificateOptions, X509PrivateKey,
};

use crate::error::ConfigError;

/// How a parameter turns its raw text into a value.
#[derive(Debug, Clone)]
pub enum ParamType {
    /// Plain integer without bounds.
    Integer,
    /// Unrestricted text. Only allowed together with `choices`.
    String,
    Validated(Arc<dyn Validator>),
}

impl ParamType {
    pub fn validated(validator: impl Validator + 'static) -> Self {
        ParamType::Validated(Arc::new(validator))
    }

    /// Build a type from its manifest name and construction parameters.
    pub fn from_name(
        param: &str,
        ty: &str,
        params: Map<String, Value>,
    ) -> Result<Self, ConfigError> {
        let invalid = |source| ConfigError::InvalidType {
            name: param.to_string(),
            source,
        };

        let ty = match ty {
            "int" => ParamType::Integer,
            "str" => ParamType::String,
            "restricted_str" => {
                let options = options::<RestrictedStringOptions>(param, params)?;
                ParamType::validated(RestrictedString::new(options).map_err(invalid)?)
            }
            "restricted_int" => {
                let options = options::<RestrictedIntOptions>(param, params)?;
                ParamType::validated(RestrictedInt::new(options).map_err(invalid)?)
            }
            "domain" => {
                let options = options::<DomainOptions>(param, params)?;
                ParamType::validated(Domain::new(options).map_err(invalid)?)
            }
            "uri" => {
                let options = options::<UriOptions>(param, params)?;
                ParamType::validated(Uri::new(options).map_err(invalid)?)
            }
            "x509_certificate" => {
                let options = options::<X509CertificateOptions>(param, params)?;
                ParamType::validated(X509Certificate::new(options))
            }
            "x509_privatekey" => {
                options::<Empty>(param, params)?;
                ParamType::validated(X509PrivateKey::new())
            }
            other => {
                return Err(ConfigError::UnknownType {
                    name: param.to_string(),
                    ty: other.to_string(),
                });
            }
        };
        Ok(ty)
    }

    pub fn name(&self) -> &'static str {
        match self {
            ParamType::Integer => "int",
            ParamType::String => "str",
            ParamType::Validated(validator) => validator.name(),
        }
    }
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct Empty {}

fn options<T: for<'de> Deserialize<'de>>(
    param: &str,
    params: Map<String, Value>,
) -> Result<T, ConfigError> {
    serde_json::from_value(Value::Object(params)).map_err(|err| ConfigError::InvalidParameter {
        name: param.to_string(),
        reason: format!("invalid type parameters: {err}"),
    })
}

/// What supplying a parameter on the command line does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    #[default]
    Store,
    StoreTrue,
    StoreFalse,
    StoreConst,
    Append,
    AppendConst,
    Count,
}

impl Action {
    /// Whether the flag consumes a user supplied value.
    pub fn takes_value(self) -> bool {
        matches!(self, Action::Store | Action::Append)
    }

    pub fn uses_const(self) -> bool {
        matches!(self, Action::StoreConst | Action::AppendConst)
    }
}

/// Prompt or confirmation text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PromptText {
    Default,
    Custom(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptOptions {
    pub confirm: Option<PromptText>,
    pub confirm_error: Option<String>,
    pub accept_empty: bool,
    pub no_echo: bool,
    pub strip: bool,
}

/// One command-line argument of a tool.
#[derive(Debug, Clone, Default)]
pub struct Parameter {
    pub name: String,
    pub short: Option<char>,
    pub help: Option<String>,
    /// Output key the value is moved to after the constraint checks.
    pub dest: Option<String>,
    pub positional: bool,
    pub required: bool,
    pub ty: Option<ParamType>,
    pub action: Action,
    pub choices: Option<Vec<Value>>,
    pub constant: Option<Value>,
    /// Raw default, validated like a command-line value.
    pub default: Option<String>,
    pub depends_on: Option<String>,
    pub prompt: Option<PromptText>,
    pub prompt_options: PromptOptions,
}

impl Parameter {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    /// Key of the parameter in the parsed arguments.
    pub fn key(&self) -> String {
        self.name.replace('-', "_")
    }

    /// Matches either the long name or the short alias.
    pub fn is_called(&self, name: &str) -> bool {
        self.name == name || self.short.is_some_and(|short| name.chars().eq([short]))
    }

    pub fn short(mut self, short: char) -> Self {
        self.short = Some(short);
        self
    }

    pub fn help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn dest(mut self, dest: impl Into<String>) -> Self {
        self.dest = Some(dest.into());
        self
    }

    pub fn positional(mut self) -> Self {
        self.positional = true;
        self
    }

    pub fn required(mut self) -> Self {
        self.required = true;
        self
    }

    pub fn ty(mut self, ty: ParamType) -> Self {
        self.ty = Some(ty);
        self
    }

    pub fn validator(self, validator: impl Validator + 'static) -> Self {
        self.ty(ParamType::validated(validator))
    }

    pub fn action(mut self, action: Action) -> Self {
        self.action = action;
        self
    }

    pub fn choices<I, V>(mut self, choices: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.choices = Some(choices.into_iter().map(Into::into).collect());
        self
    }

    pub fn constant(mut self, constant: impl Into<Value>) -> Self {
        self.constant = Some(constant.into());
        self
    }

    pub fn default_value(mut self, default: impl Into<String>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn depends_on(mut self, other: impl Into<String>) -> Self {
        self.depends_on = Some(other.into());
        self
    }

    pub fn prompt(mut self, prompt: PromptText) -> Self {
        self.prompt = Some(prompt);
        self
    }

    pub fn prompt_options(mut self, options: PromptOptions) -> Self {
        self.prompt_options = options;
        self
    }
}

/// A complete tool: its parameters, group constraints and identity rules.
#[derive(Debug, Clone, Default)]
pub struct ToolDefinition {
    pub description: Option<String>,
    pub parameters: Vec<Parameter>,
    pub mutually_exclusive: Vec<Vec<String>>,
    pub required_one_of: Vec<Vec<String>>,
    pub success_msg: Option<String>,
    pub become_user: Option<String>,
    pub check_user: Option<String>,
}

impl ToolDefinition {
    /// Look a parameter up by long name or short alias.
    pub fn find(&self, name: &str) -> Option<&Parameter> {
        self.parameters.iter().find(|param| param.is_called(name))
    }
}
