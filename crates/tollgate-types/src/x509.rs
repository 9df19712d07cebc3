use std::fs;

use base64::Engine;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use x509_parser::der_parser::ber::{BerObject, BerObjectContent};
use x509_parser::der_parser::parse_der;
use x509_parser::extensions::GeneralName;
use x509_parser::oid_registry::{
    OID_KEY_TYPE_EC_PUBLIC_KEY, OID_PKCS1_RSAENCRYPTION, OID_SIG_ED25519,
};
use x509_parser::pem::{Pem, parse_x509_pem};
use x509_parser::time::ASN1Time;

use crate::{InvalidArgument, ValidationResult, Validator};

const CERTIFICATE_LABEL: &str = "CERTIFICATE";
const ED25519_KEY_LEN: usize = 32;

fn yes() -> bool {
    true
}

/// Read the first PEM block of the file at `path`.
fn read_pem(path: &str) -> Option<Pem> {
    let data = fs::read(path).ok()?;
    let (_, pem) = parse_x509_pem(&data).ok()?;
    Some(pem)
}

/// Re-encode a PEM block with 64 column lines.
fn encode_pem(pem: &Pem) -> String {
    let body = base64::engine::general_purpose::STANDARD.encode(&pem.contents);
    let mut text = format!("-----BEGIN {}-----\n", pem.label);
    for line in body.as_bytes().chunks(64) {
        text.push_str(&String::from_utf8_lossy(line));
        text.push('\n');
    }
    text.push_str(&format!("-----END {}-----\n", pem.label));
    text
}

/// Construction options for [`X509Certificate`].
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct X509CertificateOptions {
    #[serde(default = "yes")]
    pub needs_domain: bool,
    #[serde(default = "yes")]
    pub not_expired: bool,
}

impl Default for X509CertificateOptions {
    fn default() -> Self {
        Self {
            needs_domain: true,
            not_expired: true,
        }
    }
}

/// A parsed certificate file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Certificate {
    pub path: String,
    /// Subject common name followed by the DNS subject alternative names.
    pub domains: Vec<String>,
    pub expired: bool,
    /// Unix timestamp of the end of the validity period.
    pub not_after: i64,
    pub pem: String,
}

/// A path to a PEM encoded X.509 certificate.
#[derive(Debug, Clone, Default)]
pub struct X509Certificate {
    options: X509CertificateOptions,
}

impl X509Certificate {
    pub fn new(options: X509CertificateOptions) -> Self {
        Self { options }
    }

    pub fn check(&self, path: &str) -> ValidationResult<Certificate> {
        let invalid = || InvalidArgument::new("invalid certificate");

        let pem = read_pem(path)
            .filter(|pem| pem.label == CERTIFICATE_LABEL)
            .ok_or_else(invalid)?;
        let cert = pem.parse_x509().map_err(|_| invalid())?;

        let mut domains = Vec::new();
        if let Some(cn) = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
        {
            domains.push(cn.to_string());
        }
        if let Ok(Some(san)) = cert.subject_alternative_name() {
            for name in &san.value.general_names {
                if let GeneralName::DNSName(dns) = name {
                    domains.push((*dns).to_string());
                }
            }
        }

        let not_after = cert.validity().not_after;
        let expired = not_after < ASN1Time::now();

        if self.options.needs_domain && domains.is_empty() {
            return Err(InvalidArgument::new(
                "certificate is not valid for a single domain",
            ));
        }
        if self.options.not_expired && expired {
            return Err(InvalidArgument::new("certificate is no longer valid"));
        }

        Ok(Certificate {
            path: path.to_string(),
            domains,
            expired,
            not_after: not_after.timestamp(),
            pem: encode_pem(&pem),
        })
    }
}

impl Validator for X509Certificate {
    fn name(&self) -> &'static str {
        "x509_certificate"
    }

    fn validate(&self, raw: &str) -> ValidationResult<Value> {
        let cert = self.check(raw)?;
        serde_json::to_value(cert).map_err(|_| InvalidArgument::new("invalid certificate"))
    }
}

/// A parsed private key file.
/// Decode `der` completely, rejecting trailing bytes.
fn decode(der: &[u8]) -> Option<BerObject<'_>> {
    match parse_der(der) {
        Ok((rest, object)) if rest.is_empty() => Some(object),
        _ => None,
    }
}

fn sequence<'a, 'b>(object: &'b BerObject<'a>) -> Option<&'b [BerObject<'a>]> {
    match &object.content {
        BerObjectContent::Sequence(items) => Some(items),
        _ => None,
    }
}

fn octets<'a>(object: &BerObject<'a>) -> Option<&'a [u8]> {
    match object.content {
        BerObjectContent::OctetString(bytes) => Some(bytes),
        _ => None,
    }
}

fn is_integer(object: &BerObject) -> bool {
    matches!(object.content, BerObjectContent::Integer(_))
}

fn has_version(object: &BerObject, allowed: &[u64]) -> bool {
    is_integer(object) && object.as_u64().is_ok_and(|version| allowed.contains(&version))
}

/// PKCS#1 `RSAPrivateKey`: version, then modulus through coefficient.
fn is_rsa_key(der: &[u8]) -> bool {
    let Some(key) = decode(der) else {
        return false;
    };
    sequence(&key).is_some_and(|items| {
        items.len() >= 9
            && has_version(&items[0], &[0, 1])
            && items[1..9].iter().all(is_integer)
    })
}

/// SEC1 `ECPrivateKey`: version 1 and the key octets, then the optional
/// parameters and public key.
fn is_ec_key(der: &[u8]) -> bool {
    let Some(key) = decode(der) else {
        return false;
    };
    sequence(&key).is_some_and(|items| {
        (2..=4).contains(&items.len())
            && has_version(&items[0], &[1])
            && octets(&items[1]).is_some_and(|key| !key.is_empty())
    })
}

/// PKCS#8 `PrivateKeyInfo`. Keys of known algorithms are decoded as well.
fn is_pkcs8_key(der: &[u8]) -> bool {
    let Some(info) = decode(der) else {
        return false;
    };
    let Some(items) = sequence(&info) else {
        return false;
    };
    if items.len() < 3 || !has_version(&items[0], &[0, 1]) {
        return false;
    }
    let algorithm = sequence(&items[1])
        .and_then(|identifier| identifier.first())
        .and_then(|oid| oid.as_oid().ok());
    let (Some(algorithm), Some(key)) = (algorithm, octets(&items[2])) else {
        return false;
    };

    if *algorithm == OID_PKCS1_RSAENCRYPTION {
        is_rsa_key(key)
    } else if *algorithm == OID_KEY_TYPE_EC_PUBLIC_KEY {
        is_ec_key(key)
    } else if *algorithm == OID_SIG_ED25519 {
        decode(key).and_then(|inner| octets(&inner).map(<[u8]>::len)) == Some(ED25519_KEY_LEN)
    } else {
        !key.is_empty()
    }
}

fn is_private_key(pem: &Pem) -> bool {
    match pem.label.as_str() {
        "PRIVATE KEY" => is_pkcs8_key(&pem.contents),
        "RSA PRIVATE KEY" => is_rsa_key(&pem.contents),
        "EC PRIVATE KEY" => is_ec_key(&pem.contents),
        _ => false,
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrivateKey {
    pub path: String,
    pub pem: String,
}

/// A path to a PEM encoded private key (PKCS#8, PKCS#1 or SEC1).
#[derive(Debug, Clone, Copy, Default)]
pub struct X509PrivateKey;

impl X509PrivateKey {
    pub fn new() -> Self {
        Self
    }

    pub fn check(&self, path: &str) -> ValidationResult<PrivateKey> {
        let pem = read_pem(path)
            .filter(is_private_key)
            .ok_or_else(|| InvalidArgument::new("invalid key"))?;

        Ok(PrivateKey {
            path: path.to_string(),
            pem: encode_pem(&pem),
        })
    }
}

impl Validator for X509PrivateKey {
    fn name(&self) -> &'static str {
        "x509_privatekey"
    }

    fn validate(&self, raw: &str) -> ValidationResult<Value> {
        let key = self.check(raw)?;
        serde_json::to_value(key).map_err(|_| InvalidArgument::new("invalid key"))
    }
}
