use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::{InvalidArgument, ValidationResult, Validator};

fn default_minlen() -> Option<usize> {
    Some(1)
}

fn default_maxlen() -> Option<usize> {
    Some(255)
}

/// Construction options for [`RestrictedString`].
///
/// `minlen` and `maxlen` default to 1 and 255; an explicit `null` disables
/// the bound.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RestrictedStringOptions {
    #[serde(default)]
    pub allowed_chars: Option<String>,
    #[serde(default)]
    pub regex: Option<String>,
    #[serde(default = "default_minlen")]
    pub minlen: Option<usize>,
    #[serde(default = "default_maxlen")]
    pub maxlen: Option<usize>,
}

impl Default for RestrictedStringOptions {
    fn default() -> Self {
        Self {
            allowed_chars: None,
            regex: None,
            minlen: default_minlen(),
            maxlen: default_maxlen(),
        }
    }
}

impl RestrictedStringOptions {
    pub fn allowed_chars(chars: impl Into<String>) -> Self {
        Self {
            allowed_chars: Some(chars.into()),
            ..Self::default()
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            regex: Some(pattern.into()),
            ..Self::default()
        }
    }
}

/// A string limited to a character set or a fully anchored pattern.
#[derive(Debug, Clone)]
pub struct RestrictedString {
    pattern: Regex,
    minlen: Option<usize>,
    maxlen: Option<usize>,
}

impl RestrictedString {
    pub fn new(options: RestrictedStringOptions) -> ValidationResult<Self> {
        let RestrictedStringOptions {
            allowed_chars,
            regex,
            minlen,
            maxlen,
        } = options;

        if let (Some(min), Some(max)) = (minlen, maxlen)
            && min > max
        {
            return Err(InvalidArgument::new("minlen must be smaller than maxlen"));
        }

        let allowed_chars = allowed_chars.filter(|chars| !chars.is_empty());
        let regex = regex.filter(|pattern| !pattern.is_empty());

        let source = match (allowed_chars, regex) {
            (None, None) => {
                return Err(InvalidArgument::new(
                    "either allowed_chars or regex must be supplied",
                ));
            }
            (Some(_), Some(_)) => {
                return Err(InvalidArgument::new(
                    "allowed_chars or regex are mutally exclusive",
                ));
            }
            (Some(chars), None) => format!(r"\A[{chars}]+\z"),
            (None, Some(pattern)) => {
                let inner = pattern
                    .strip_prefix('^')
                    .and_then(|rest| rest.strip_suffix('$'))
                    .ok_or_else(|| InvalidArgument::new("regex must be anchored"))?;
                // `$` would also match before a trailing newline.
                format!(r"\A(?:{inner})\z")
            }
        };

        let pattern = Regex::new(&source)
            .map_err(|err| InvalidArgument::new(format!("invalid pattern: {err}")))?;

        Ok(Self {
            pattern,
            minlen,
            maxlen,
        })
    }

    pub fn check<'a>(&self, raw: &'a str) -> ValidationResult<&'a str> {
        let len = raw.chars().count();
        if let Some(max) = self.maxlen
            && len > max
        {
            return Err(InvalidArgument::new(format!(
                "string is too long (must be <= {max})"
            )));
        }
        if let Some(min) = self.minlen
            && len < min
        {
            return Err(InvalidArgument::new(format!(
                "string is too short (must be >= {min})"
            )));
        }
        if !self.pattern.is_match(raw) {
            return Err(InvalidArgument::new("invalid value"));
        }
        Ok(raw)
    }
}

impl Validator for RestrictedString {
    fn name(&self) -> &'static str {
        "string"
    }

    fn validate(&self, raw: &str) -> ValidationResult<Value> {
        self.check(raw).map(|value| Value::String(value.to_string()))
    }
}

/// Construction options for [`RestrictedInt`]. Bounds may be given as
/// numbers or numeric strings.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RestrictedIntOptions {
    #[serde(default)]
    pub minimum: Option<Value>,
    #[serde(default)]
    pub maximum: Option<Value>,
}

impl RestrictedIntOptions {
    pub fn range(minimum: Option<i64>, maximum: Option<i64>) -> Self {
        Self {
            minimum: minimum.map(Value::from),
            maximum: maximum.map(Value::from),
        }
    }
}

fn bound(value: Option<Value>, which: &str) -> ValidationResult<Option<i64>> {
    let invalid = || InvalidArgument::new(format!("{which} is not a integer"));
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(number)) => number.as_i64().map(Some).ok_or_else(invalid),
        Some(Value::String(text)) => text.trim().parse().map(Some).map_err(|_| invalid()),
        Some(_) => Err(invalid()),
    }
}

/// An integer with optional inclusive bounds.
#[derive(Debug, Clone, Copy)]
pub struct RestrictedInt {
    minimum: Option<i64>,
    maximum: Option<i64>,
}

impl RestrictedInt {
    pub fn new(options: RestrictedIntOptions) -> ValidationResult<Self> {
        let minimum = bound(options.minimum, "minimum")?;
        let maximum = bound(options.maximum, "maximum")?;

        if let (Some(min), Some(max)) = (minimum, maximum)
            && min > max
        {
            return Err(InvalidArgument::new("minimum must be smaller than maximum"));
        }

        Ok(Self { minimum, maximum })
    }

    pub fn check(&self, raw: &str) -> ValidationResult<i64> {
        let value: i64 = raw
            .trim()
            .parse()
            .map_err(|_| InvalidArgument::new("invalid integer"))?;

        if let Some(min) = self.minimum
            && value < min
        {
            return Err(InvalidArgument::new(format!(
                "value too small (must be >= {min})"
            )));
        }
        if let Some(max) = self.maximum
            && value > max
        {
            return Err(InvalidArgument::new(format!(
                "value too big (must be <= {max})"
            )));
        }
        Ok(value)
    }
}

impl Validator for RestrictedInt {
    fn name(&self) -> &'static str {
        "integer"
    }

    fn validate(&self, raw: &str) -> ValidationResult<Value> {
        self.check(raw).map(Value::from)
    }
}
