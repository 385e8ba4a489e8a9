//! Sign-in message codec (EIP-4361)
//!
//! The message is a plain-text wire contract with the client: the signature is
//! computed over its exact bytes, so parsing never normalizes the input and
//! rendering reproduces the canonical layout.

use chrono::{DateTime, SecondsFormat, Utc};
use std::fmt;
use std::iter::Peekable;
use std::str::{FromStr, Split};
use thiserror::Error;

use super::crypto::validate_address;

const HEADER_SUFFIX: &str = " wants you to sign in with your Ethereum account:";
const URI_TAG: &str = "URI: ";
const VERSION_TAG: &str = "Version: ";
const CHAIN_ID_TAG: &str = "Chain ID: ";
const NONCE_TAG: &str = "Nonce: ";
const ISSUED_AT_TAG: &str = "Issued At: ";
const EXPIRATION_TIME_TAG: &str = "Expiration Time: ";
const NOT_BEFORE_TAG: &str = "Not Before: ";
const REQUEST_ID_TAG: &str = "Request ID: ";
const RESOURCES_TAG: &str = "Resources:";

/// The only message version defined by EIP-4361
pub const SUPPORTED_VERSION: &str = "1";

/// Minimum nonce length accepted in a message
const MIN_NONCE_LEN: usize = 8;

/// Message parsing errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum SiweParseError {
    #[error("Missing or malformed message header")]
    InvalidHeader,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Missing field: {0}")]
    MissingField(&'static str),

    #[error("Invalid {field}: {reason}")]
    InvalidField { field: &'static str, reason: String },

    #[error("Unsupported message version: {0}")]
    UnsupportedVersion(String),

    #[error("Unexpected line: {0}")]
    UnexpectedLine(String),
}

/// Parsed sign-in message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiweMessage {
    pub scheme: Option<String>,
    pub domain: String,
    pub address: String,
    pub statement: Option<String>,
    pub uri: String,
    pub version: String,
    pub chain_id: u64,
    pub nonce: String,
    pub issued_at: DateTime<Utc>,
    pub expiration_time: Option<DateTime<Utc>>,
    pub not_before: Option<DateTime<Utc>>,
    pub request_id: Option<String>,
    pub resources: Vec<String>,
}

type Lines<'a> = Peekable<Split<'a, char>>;

impl FromStr for SiweMessage {
    type Err = SiweParseError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let mut lines = raw.split('\n').peekable();

        let authority = lines
            .next()
            .and_then(|line| line.strip_suffix(HEADER_SUFFIX))
            .ok_or(SiweParseError::InvalidHeader)?;
        let (scheme, domain) = match authority.split_once("://") {
            Some((scheme, domain)) => (Some(scheme.to_string()), domain),
            None => (None, authority),
        };
        if domain.is_empty() || domain.contains(char::is_whitespace) {
            return Err(SiweParseError::InvalidHeader);
        }
        if matches!(&scheme, Some(s) if s.is_empty() || s.contains(char::is_whitespace)) {
            return Err(SiweParseError::InvalidHeader);
        }

        let address = lines.next().ok_or(SiweParseError::MissingField("address"))?;
        validate_address(address).map_err(|e| SiweParseError::InvalidAddress(e.to_string()))?;

        expect_blank(&mut lines)?;
        let statement = parse_statement(&mut lines)?;

        let uri = required(&mut lines, URI_TAG, "URI")?;
        if uri.is_empty() || uri.contains(char::is_whitespace) {
            return Err(invalid("URI", "must be a non-empty URI"));
        }

        let version = required(&mut lines, VERSION_TAG, "Version")?;
        if version != SUPPORTED_VERSION {
            return Err(SiweParseError::UnsupportedVersion(version.to_string()));
        }

        let chain_id = required(&mut lines, CHAIN_ID_TAG, "Chain ID")?
            .parse::<u64>()
            .map_err(|e| invalid("Chain ID", e))?;

        let nonce = required(&mut lines, NONCE_TAG, "Nonce")?;
        if nonce.len() < MIN_NONCE_LEN || !nonce.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(invalid(
                "Nonce",
                "must be at least 8 alphanumeric characters",
            ));
        }

        let issued_at = parse_timestamp(required(&mut lines, ISSUED_AT_TAG, "Issued At")?, "Issued At")?;
        let expiration_time = optional(&mut lines, EXPIRATION_TIME_TAG)
            .map(|v| parse_timestamp(v, "Expiration Time"))
            .transpose()?;
        let not_before = optional(&mut lines, NOT_BEFORE_TAG)
            .map(|v| parse_timestamp(v, "Not Before"))
            .transpose()?;
        let request_id = optional(&mut lines, REQUEST_ID_TAG).map(str::to_string);

        let mut resources = Vec::new();
        if lines.next_if(|line| *line == RESOURCES_TAG).is_some() {
            while let Some(line) = lines.next_if(|line| line.starts_with("- ")) {
                resources.push(line[2..].to_string());
            }
        }

        if let Some(extra) = lines.next() {
            return Err(SiweParseError::UnexpectedLine(extra.to_string()));
        }

        Ok(SiweMessage {
            scheme,
            domain: domain.to_string(),
            address: address.to_string(),
            statement,
            uri: uri.to_string(),
            version: version.to_string(),
            chain_id,
            nonce: nonce.to_string(),
            issued_at,
            expiration_time,
            not_before,
            request_id,
            resources,
        })
    }
}

/// Accepts both `address, "", statement, "", URI` and the statement-less
/// `address, "", "", URI` layouts, plus the compact `address, "", URI` form
/// some wallets emit.
fn parse_statement(lines: &mut Lines<'_>) -> Result<Option<String>, SiweParseError> {
    match lines.peek() {
        Some(line) if line.is_empty() => {
            lines.next();
            Ok(None)
        }
        Some(line) if line.starts_with(URI_TAG) => Ok(None),
        Some(_) => {
            let statement = lines.next().map(str::to_string);
            expect_blank(lines)?;
            Ok(statement)
        }
        None => Err(SiweParseError::MissingField("URI")),
    }
}

fn expect_blank(lines: &mut Lines<'_>) -> Result<(), SiweParseError> {
    match lines.next() {
        Some("") => Ok(()),
        Some(other) => Err(SiweParseError::UnexpectedLine(other.to_string())),
        None => Err(SiweParseError::MissingField("URI")),
    }
}

fn required<'a>(
    lines: &mut Lines<'a>,
    tag: &str,
    field: &'static str,
) -> Result<&'a str, SiweParseError> {
    optional(lines, tag).ok_or(SiweParseError::MissingField(field))
}

fn optional<'a>(lines: &mut Lines<'a>, tag: &str) -> Option<&'a str> {
    let line = lines.next_if(|line| line.starts_with(tag))?;
    Some(&line[tag.len()..])
}

fn parse_timestamp(value: &str, field: &'static str) -> Result<DateTime<Utc>, SiweParseError> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| invalid(field, e))
}

fn invalid(field: &'static str, reason: impl ToString) -> SiweParseError {
    SiweParseError::InvalidField {
        field,
        reason: reason.to_string(),
    }
}

impl fmt::Display for SiweMessage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(scheme) = &self.scheme {
            write!(f, "{scheme}://")?;
        }
        writeln!(f, "{}{}", self.domain, HEADER_SUFFIX)?;
        writeln!(f, "{}", self.address)?;
        writeln!(f)?;
        if let Some(statement) = &self.statement {
            writeln!(f, "{statement}")?;
        }
        writeln!(f)?;
        writeln!(f, "{URI_TAG}{}", self.uri)?;
        writeln!(f, "{VERSION_TAG}{}", self.version)?;
        writeln!(f, "{CHAIN_ID_TAG}{}", self.chain_id)?;
        writeln!(f, "{NONCE_TAG}{}", self.nonce)?;
        write!(f, "{ISSUED_AT_TAG}{}", format_timestamp(&self.issued_at))?;
        if let Some(expiration_time) = &self.expiration_time {
            write!(f, "\n{EXPIRATION_TIME_TAG}{}", format_timestamp(expiration_time))?;
        }
        if let Some(not_before) = &self.not_before {
            write!(f, "\n{NOT_BEFORE_TAG}{}", format_timestamp(not_before))?;
        }
        if let Some(request_id) = &self.request_id {
            write!(f, "\n{REQUEST_ID_TAG}{request_id}")?;
        }
        if !self.resources.is_empty() {
            write!(f, "\n{RESOURCES_TAG}")?;
            for resource in &self.resources {
                write!(f, "\n- {resource}")?;
            }
        }
        Ok(())
    }
}

fn format_timestamp(ts: &DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}
