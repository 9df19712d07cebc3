use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{Domain, DomainOptions, InvalidArgument, ValidationResult, Validator};

const SCHEME_PATTERN: &str = r"\A[a-z][a-z0-9+.-]*\z";
const SCHEME_MAX_LEN: usize = 255;
const PATH_PATTERN: &str = r"\A/([\p{L}0-9._=-]+/?)*\z";
const PATH_MAX_LEN: usize = 512;

fn yes() -> bool {
    true
}

/// Construction options for [`Uri`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct UriOptions {
    #[serde(default = "yes")]
    pub optional_scheme: bool,
    #[serde(default = "yes")]
    pub optional_domain: bool,
    #[serde(default)]
    pub domain_options: DomainOptions,
}

impl Default for UriOptions {
    fn default() -> Self {
        Self {
            optional_scheme: true,
            optional_domain: true,
            domain_options: DomainOptions::default(),
        }
    }
}

/// The normalized pieces of an accepted URI. Absent parts are empty strings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UriParts {
    pub scheme: String,
    pub domain: String,
    pub path: String,
    pub full: String,
}

/// A `scheme://domain/path` reference; query and fragment are discarded.
#[derive(Debug, Clone)]
pub struct Uri {
    optional_scheme: bool,
    optional_domain: bool,
    domain: Domain,
    scheme_pattern: Regex,
    path_pattern: Regex,
}

fn compile(pattern: &str) -> ValidationResult<Regex> {
    Regex::new(pattern).map_err(|err| InvalidArgument::new(format!("invalid pattern: {err}")))
}

/// Split off the scheme (lowercased) and authority of `raw`, dropping any
/// query or fragment.
fn split(raw: &str) -> (String, &str, &str) {
    let mut scheme = String::new();
    let mut rest = raw;

    if let Some(colon) = raw.find(':')
        && colon > 0
    {
        let candidate = &raw[..colon];
        let leads_with_letter = candidate
            .chars()
            .next()
            .is_some_and(|c| c.is_ascii_alphabetic());
        let scheme_chars = candidate
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'));
        if leads_with_letter && scheme_chars {
            scheme = candidate.to_ascii_lowercase();
            rest = &raw[colon + 1..];
        }
    }

    let mut netloc = "";
    if let Some(after) = rest.strip_prefix("//") {
        let end = after.find(['/', '?', '#']).unwrap_or(after.len());
        netloc = &after[..end];
        rest = &after[end..];
    }

    let end = rest.find(['?', '#']).unwrap_or(rest.len());
    (scheme, netloc, &rest[..end])
}

impl Uri {
    pub fn new(options: UriOptions) -> ValidationResult<Self> {
        Ok(Self {
            optional_scheme: options.optional_scheme,
            optional_domain: options.optional_domain,
            domain: Domain::new(options.domain_options)?,
            scheme_pattern: compile(SCHEME_PATTERN)?,
            path_pattern: compile(PATH_PATTERN)?,
        })
    }

    pub fn check(&self, raw: &str) -> ValidationResult<UriParts> {
        let (scheme, mut domain, mut path) = split(raw);

        // "example.com/foo" has no "//", so the host ends up in the path.
        if domain.is_empty() {
            let (head, tail) = path.split_once('/').unwrap_or((path, ""));
            if head.contains('.') {
                domain = head;
                path = tail;
            }
        }

        if !scheme.is_empty() {
            if scheme.chars().count() > SCHEME_MAX_LEN {
                return Err(InvalidArgument::new("scheme too long"));
            }
            if !self.scheme_pattern.is_match(&scheme) {
                return Err(InvalidArgument::new("invalid scheme"));
            }
        }

        let domain = if domain.is_empty() {
            String::new()
        } else {
            self.domain.check(domain)?
        };

        let path = format!("/{}", path.trim_start_matches('/'));
        if path.chars().count() > PATH_MAX_LEN {
            return Err(InvalidArgument::new("path too long"));
        }
        if !self.path_pattern.is_match(&path) {
            return Err(InvalidArgument::new("invalid path"));
        }

        let mut missing = Vec::new();
        if !self.optional_scheme && scheme.is_empty() {
            missing.push("scheme");
        }
        if !self.optional_domain && domain.is_empty() {
            missing.push("domain");
        }
        if !missing.is_empty() {
            return Err(InvalidArgument::new(format!(
                "missing {}",
                missing.join(", ")
            )));
        }

        let full = if scheme.is_empty() {
            format!("{domain}{path}")
        } else {
            format!("{scheme}://{domain}{path}")
        };

        Ok(UriParts {
            scheme,
            domain,
            path,
            full,
        })
    }
}

impl Validator for Uri {
    fn name(&self) -> &'static str {
        "URI"
    }

    fn validate(&self, raw: &str) -> ValidationResult<Value> {
        let parts = self.check(raw)?;
        serde_json::to_value(parts)
            .map_err(|err| InvalidArgument::new(format!("invalid URI: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn uri() -> Uri {
        Uri::new(UriOptions::default()).unwrap()
    }

    #[test]
    fn full_uri_is_split() {
        let parts = uri().check("HTTPS://Example.com/foo/bar?x=1#top").unwrap();
        assert_eq!(
            parts,
            UriParts {
                scheme: "https".to_string(),
                domain: "example.com".to_string(),
                path: "/foo/bar".to_string(),
                full: "https://example.com/foo/bar".to_string(),
            }
        );
    }

    #[test]
    fn scheme_less_host_and_path() {
        let parts = uri().check("example.com/foo").unwrap();
        assert_eq!(parts.scheme, "");
        assert_eq!(parts.domain, "example.com");
        assert_eq!(parts.path, "/foo");
        assert_eq!(parts.full, "example.com/foo");
    }

    #[test]
    fn bare_path_is_normalized() {
        let parts = uri().check("//").unwrap();
        assert_eq!(parts.path, "/");
        assert_eq!(parts.full, "/");

        let parts = uri().check("foo/bar").unwrap();
        assert_eq!(parts.domain, "");
        assert_eq!(parts.path, "/foo/bar");
        assert!(uri().check("foo//bar").is_err());

        let parts = uri().check("///foo").unwrap();
        assert_eq!(parts.path, "/foo");
    }

    #[test]
    fn unicode_letters_are_allowed_in_paths() {
        let parts = uri().check("https://example.com/über/straße").unwrap();
        assert_eq!(parts.path, "/über/straße");
    }

    #[test]
    fn rejects_bad_components() {
        let check = uri();
        assert_eq!(
            check.check("https://example.com/a b").unwrap_err().message(),
            "invalid path"
        );
        assert_eq!(
            check.check("https://localhost/").unwrap_err().message(),
            "domain has too few components"
        );
        assert!(
            check
                .check("mailto://user@example.com")
                .unwrap_err()
                .message()
                .contains("email")
        );
        let long_path = format!("https://example.com/{}", "a".repeat(600));
        assert_eq!(check.check(&long_path).unwrap_err().message(), "path too long");
    }

    #[test]
    fn required_components_are_named() {
        let strict = Uri::new(UriOptions {
            optional_scheme: false,
            optional_domain: false,
            ..UriOptions::default()
        })
        .unwrap();
        assert_eq!(
            strict.check("/foo").unwrap_err().message(),
            "missing scheme, domain"
        );
        assert_eq!(
            strict.check("example.com/foo").unwrap_err().message(),
            "missing scheme"
        );
        assert!(strict.check("https://example.com/foo").is_ok());
    }

    #[test]
    fn domain_options_are_forwarded() {
        let options: UriOptions = serde_json::from_value(serde_json::json!({
            "domainOptions": {"wildcard": true}
        }))
        .unwrap();
        let parts = Uri::new(options).unwrap().check("https://*.example.com/").unwrap();
        assert_eq!(parts.domain, "*.example.com");
        assert!(uri().check("https://*.example.com/").is_err());
    }

    #[test]
    fn result_is_a_mapping() {
        let value = uri().validate("https://example.com").unwrap();
        assert_eq!(value["scheme"], "https");
        assert_eq!(value["domain"], "example.com");
        assert_eq!(value["path"], "/");
        assert_eq!(value["full"], "https://example.com/");
    }

    #[test]
    fn full_form_revalidates_to_itself() {
        let check = uri();
        for raw in ["https://Example.com/foo", "example.com/a/b/", "/only/path"] {
            let first = check.check(raw).unwrap();
            let again = check.check(&first.full).unwrap();
            assert_eq!(first, again);
        }
    }
}
