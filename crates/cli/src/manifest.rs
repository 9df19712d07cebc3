use anyhow::{Context, Result, bail};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tollgate_core::{Action, ParamType, Parameter, PromptOptions, PromptText, ToolDefinition};

pub const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Manifest {
    #[serde(default)]
    pub schema_version: Option<u32>,

    #[serde(default)]
    pub description: Option<String>,

    #[serde(default)]
    pub success_msg: Option<String>,

    #[serde(default)]
    pub become_user: Option<String>,

    #[serde(default)]
    pub check_user: Option<String>,

    #[serde(default)]
    pub parameters: Vec<ParameterManifest>,

    #[serde(default)]
    pub mutually_exclusive: Vec<Vec<String>>,

    #[serde(default)]
    pub required_one_of: Vec<Vec<String>>,

    pub runner: RunnerManifest,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RunnerManifest {
    pub playbook: PathBuf,

    /// Executable used to run the playbook, `ansible-playbook` when unset.
    #[serde(default)]
    pub program: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ParameterManifest {
    pub name: String,

    #[serde(default)]
    pub short: Option<char>,

    #[serde(default)]
    pub help: Option<String>,

    #[serde(default)]
    pub dest: Option<String>,

    #[serde(default)]
    pub positional: bool,

    #[serde(default)]
    pub required: bool,

    #[serde(default, rename = "type")]
    pub ty: Option<String>,

    #[serde(default)]
    pub type_params: Map<String, Value>,

    #[serde(default)]
    pub action: Action,

    #[serde(default)]
    pub choices: Option<Vec<Value>>,

    #[serde(default, rename = "const")]
    pub constant: Option<Value>,

    #[serde(default)]
    pub default: Option<Value>,

    #[serde(default)]
    pub depends_on: Option<String>,

    #[serde(default)]
    pub prompt: Option<PromptSetting>,

    #[serde(default)]
    pub prompt_options: PromptOptionsManifest,
}

/// `true` for the default text, a string for custom text.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum PromptSetting {
    Enabled(bool),
    Text(String),
}

impl PromptSetting {
    fn into_text(self) -> Option<PromptText> {
        match self {
            PromptSetting::Enabled(true) => Some(PromptText::Default),
            PromptSetting::Enabled(false) => None,
            PromptSetting::Text(text) if text.is_empty() => None,
            PromptSetting::Text(text) => Some(PromptText::Custom(text)),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct PromptOptionsManifest {
    #[serde(default)]
    pub confirm: Option<PromptSetting>,

    #[serde(default)]
    pub confirm_error: Option<String>,

    #[serde(default)]
    pub accept_empty: bool,

    #[serde(default)]
    pub no_echo: bool,

    #[serde(default)]
    pub strip: bool,
}

impl From<PromptOptionsManifest> for PromptOptions {
    fn from(options: PromptOptionsManifest) -> Self {
        PromptOptions {
            confirm: options.confirm.and_then(PromptSetting::into_text),
            confirm_error: options.confirm_error,
            accept_empty: options.accept_empty,
            no_echo: options.no_echo,
            strip: options.strip,
        }
    }
}

impl ParameterManifest {
    pub fn into_parameter(self) -> Result<Parameter> {
        let ty = match &self.ty {
            Some(ty) => Some(ParamType::from_name(&self.name, ty, self.type_params)?),
            None if !self.type_params.is_empty() => {
                bail!("'--{}': typeParams given without a type", self.name)
            }
            None => None,
        };

        let default = match self.default {
            None | Some(Value::Null) => None,
            Some(Value::String(raw)) => Some(raw),
            Some(Value::Number(number)) => Some(number.to_string()),
            Some(other) => bail!(
                "'--{}': default must be a string or a number, got {other}",
                self.name
            ),
        };

        Ok(Parameter {
            name: self.name,
            short: self.short,
            help: self.help,
            dest: self.dest,
            positional: self.positional,
            required: self.required,
            ty,
            action: self.action,
            choices: self.choices,
            constant: self.constant,
            default,
            depends_on: self.depends_on,
            prompt: self.prompt.and_then(PromptSetting::into_text),
            prompt_options: self.prompt_options.into(),
        })
    }
}

impl Manifest {
    /// Split into the tool definition and the runner settings.
    pub fn into_parts(self) -> Result<(ToolDefinition, RunnerManifest)> {
        let parameters = self
            .parameters
            .into_iter()
            .map(ParameterManifest::into_parameter)
            .collect::<Result<Vec<_>>>()?;

        let definition = ToolDefinition {
            description: self.description,
            parameters,
            mutually_exclusive: self.mutually_exclusive,
            required_one_of: self.required_one_of,
            success_msg: self.success_msg,
            become_user: self.become_user,
            check_user: self.check_user,
        };
        Ok((definition, self.runner))
    }
}

pub fn load_manifest(path: &Path) -> Result<Manifest> {
    let contents = fs::read_to_string(path)
        .with_context(|| format!("failed to read manifest: {}", path.display()))?;
    let manifest: Manifest = serde_json::from_str(&contents)
        .with_context(|| format!("failed to parse manifest: {}", path.display()))?;

    if let Some(version) = manifest.schema_version
        && version != SCHEMA_VERSION
    {
        bail!(
            "unsupported schemaVersion {version} in {} (expected {SCHEMA_VERSION})",
            path.display()
        );
    }
    Ok(manifest)
}

/// The name tools see as `script_name`.
pub fn script_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
