use regex::Regex;
use serde::Deserialize;
use serde_json::Value;

use crate::{InvalidArgument, ValidationResult, Validator};

const DOMAIN_PATTERN: &str = r"\A(([a-zA-Z0-9]|[a-zA-Z0-9][a-zA-Z0-9\-]*[a-zA-Z0-9])\.)*([A-Za-z0-9]|[A-Za-z0-9][A-Za-z0-9\-]*[A-Za-z0-9])\z";

const MAX_LABEL_LEN: usize = 63;

fn default_maxlen() -> usize {
    255
}

/// Construction options for [`Domain`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct DomainOptions {
    #[serde(default)]
    pub wildcard: bool,
    #[serde(default = "default_maxlen")]
    pub maxlen: usize,
}

impl Default for DomainOptions {
    fn default() -> Self {
        Self {
            wildcard: false,
            maxlen: default_maxlen(),
        }
    }
}

impl DomainOptions {
    pub fn wildcard() -> Self {
        Self {
            wildcard: true,
            ..Self::default()
        }
    }
}

/// A registrable DNS name below a known public suffix.
///
/// The returned value is the IDNA (punycode, lowercase) form of the input,
/// keeping a leading `*.` and a trailing dot if they were given.
#[derive(Debug, Clone)]
pub struct Domain {
    options: DomainOptions,
    pattern: Regex,
}

impl Domain {
    pub fn new(options: DomainOptions) -> ValidationResult<Self> {
        let pattern = Regex::new(DOMAIN_PATTERN)
            .map_err(|err| InvalidArgument::new(format!("invalid pattern: {err}")))?;
        Ok(Self { options, pattern })
    }

    pub fn check(&self, raw: &str) -> ValidationResult<String> {
        if raw.contains('@') {
            return Err(InvalidArgument::new(
                "this looks like an email-adress, try only supplying the part after the @",
            ));
        }

        let normalized =
            idna::domain_to_ascii(raw).map_err(|_| InvalidArgument::new("invalid domain"))?;

        let mut host = normalized.strip_suffix('.').unwrap_or(&normalized);
        if self.options.wildcard {
            host = host.strip_prefix("*.").unwrap_or(host);
        }

        if host.split('.').any(|label| label.len() > MAX_LABEL_LEN)
            || host.len() > self.options.maxlen
        {
            return Err(InvalidArgument::new("domain too long"));
        }
        if !host.contains('.') {
            return Err(InvalidArgument::new("domain has too few components"));
        }
        if !self.pattern.is_match(host) {
            return Err(InvalidArgument::new("invalid domain"));
        }
        if !psl::suffix(host.as_bytes()).is_some_and(|suffix| suffix.is_known()) {
            return Err(InvalidArgument::new("invalid domain suffix"));
        }
        if psl::domain(host.as_bytes()).is_none() {
            return Err(InvalidArgument::new("invalid domain"));
        }

        Ok(normalized)
    }
}

impl Validator for Domain {
    fn name(&self) -> &'static str {
        "domain"
    }

    fn validate(&self, raw: &str) -> ValidationResult<Value> {
        self.check(raw).map(Value::String)
    }
}
