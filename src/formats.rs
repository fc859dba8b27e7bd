//! Reusable formats and checks for schemas

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::{Result, SynthError, ValidationError, Violation};
use crate::schema::TypeSpec;
use crate::validate::FieldPath;
use crate::value::AttributeMap;

static IPV4_CIDR: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"^((25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)/(3[0-2]|[12]?\d)$",
    )
    .unwrap()
});

static IPV4_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^((25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)\.){3}(25[0-5]|2[0-4]\d|1\d\d|[1-9]?\d)$").unwrap()
});

static ARN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^arn:aws[a-zA-Z-]*:[a-z0-9-]+:[a-z0-9-]*:(\d{12})?:.+$").unwrap()
});

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_-]*$").unwrap());

/// IPv4 network in CIDR notation (`10.0.0.0/16`)
pub fn ipv4_cidr() -> Regex {
    IPV4_CIDR.clone()
}

/// Dotted-quad IPv4 address
pub fn ipv4_address() -> Regex {
    IPV4_ADDRESS.clone()
}

/// Amazon Resource Name
pub fn arn() -> Regex {
    ARN.clone()
}

/// Names usable as resource, data source and output identifiers
pub fn identifier() -> Regex {
    IDENTIFIER.clone()
}

pub(crate) fn is_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// Integer in `0..=65535`
pub fn port() -> TypeSpec {
    TypeSpec::integer().range(0, 65535)
}

/// Invariant for `from`/`to` style pairs: when both are set, `low <= high`.
/// Use with `SchemaBuilder::check`.
pub fn ordered(
    low: &'static str,
    high: &'static str,
) -> impl Fn(&AttributeMap) -> std::result::Result<(), String> + Send + Sync + 'static {
    move |attrs| {
        let lo = attrs.get(low).and_then(|v| v.as_f64());
        let hi = attrs.get(high).and_then(|v| v.as_f64());
        match (lo, hi) {
            (Some(lo), Some(hi)) if lo > hi => {
                Err(format!("'{}' ({}) is greater than '{}' ({})", low, lo, high, hi))
            }
            _ => Ok(()),
        }
    }
}

/// Reject a block, output or scope name that is not an identifier
pub(crate) fn require_identifier(what: &str, name: &str) -> Result<()> {
    if is_identifier(name) {
        return Ok(());
    }
    Err(SynthError::SchemaViolation(ValidationError::new(
        FieldPath::root(),
        Violation::Name,
        format!("{} name '{}' is not an identifier", what, name),
    )))
}
