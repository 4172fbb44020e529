//! Input validation and normalization applied before a transfer starts.
//!
//! Device identifiers are checked against a per-deployment [`AddressPolicy`]:
//! link-layer platforms hand out MAC-like tokens and accept anything
//! non-empty, while UUID platforms require a well-formed UUID string.

use std::fmt;
use std::sync::Arc;

use percent_encoding::percent_decode_str;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{DfuError, DfuResult};

const FILE_SCHEME: &str = "file://";
const HYPHENATED_UUID_LEN: usize = 36;
const HYPHEN_POSITIONS: [usize; 4] = [8, 13, 18, 23];

/// A device identifier that passed the address policy.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceId {
    address: String,
    uuid: Option<Uuid>,
}

impl DeviceId {
    /// The identifier exactly as the caller supplied it.
    pub fn as_str(&self) -> &str {
        &self.address
    }

    /// Parsed UUID, present only under [`AddressPolicy::Uuid`].
    pub fn uuid(&self) -> Option<Uuid> {
        self.uuid
    }
}

impl fmt::Display for DeviceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.address)
    }
}

/// Serializable name of a built-in policy, used by persisted settings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AddressPolicyKind {
    #[default]
    LinkLayer,
    Uuid,
}

/// How device identifiers are validated on this deployment target.
#[derive(Clone)]
pub enum AddressPolicy {
    /// Any non-empty token (Bluetooth MAC-style addresses).
    LinkLayer,
    /// Must parse as a UUID (platforms that hide the MAC behind a peripheral UUID).
    Uuid,
    /// Caller-supplied predicate.
    Custom(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl AddressPolicy {
    /// Validate a raw identifier.
    pub fn validate(&self, raw: &str) -> DfuResult<DeviceId> {
        let uuid = match self {
            AddressPolicy::LinkLayer if !raw.is_empty() => None,
            AddressPolicy::Uuid => match parse_hyphenated_uuid(raw) {
                Some(uuid) => Some(uuid),
                None => return Err(invalid(raw)),
            },
            AddressPolicy::Custom(accepts) if accepts(raw) => None,
            _ => return Err(invalid(raw)),
        };

        Ok(DeviceId {
            address: raw.to_string(),
            uuid,
        })
    }
}

impl From<AddressPolicyKind> for AddressPolicy {
    fn from(kind: AddressPolicyKind) -> Self {
        match kind {
            AddressPolicyKind::LinkLayer => AddressPolicy::LinkLayer,
            AddressPolicyKind::Uuid => AddressPolicy::Uuid,
        }
    }
}

impl fmt::Debug for AddressPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AddressPolicy::LinkLayer => f.write_str("LinkLayer"),
            AddressPolicy::Uuid => f.write_str("Uuid"),
            AddressPolicy::Custom(_) => f.write_str("Custom(..)"),
        }
    }
}

/// Accept only the 8-4-4-4-12 hyphenated form; `Uuid::try_parse` alone also
/// takes simple, braced and `urn:uuid:` strings.
fn parse_hyphenated_uuid(raw: &str) -> Option<Uuid> {
    let hyphenated = raw.len() == HYPHENATED_UUID_LEN
        && raw
            .char_indices()
            .all(|(i, c)| HYPHEN_POSITIONS.contains(&i) == (c == '-'));
    if !hyphenated {
        return None;
    }
    Uuid::try_parse(raw).ok()
}

fn invalid(raw: &str) -> DfuError {
    DfuError::InvalidDeviceAddress {
        address: raw.to_string(),
    }
}

/// Normalize a firmware file reference into the local path the engine expects.
///
/// `file://` URIs lose their scheme and are percent-decoded. A path with a
/// malformed escape, or one that does not decode to valid UTF-8, is returned
/// undecoded. Any other scheme (e.g. `content://`) is returned unchanged.
pub fn normalize_file_reference(raw: &str) -> String {
    let Some(path) = raw.strip_prefix(FILE_SCHEME) else {
        return raw.to_string();
    };
    if !has_well_formed_escapes(path) {
        return path.to_string();
    }

    percent_decode_str(path)
        .decode_utf8()
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

/// Every `%` must start a two-hex-digit escape.
fn has_well_formed_escapes(path: &str) -> bool {
    let bytes = path.as_bytes();
    bytes.iter().enumerate().all(|(i, &b)| {
        b != b'%'
            || matches!(
                (bytes.get(i + 1), bytes.get(i + 2)),
                (Some(hi), Some(lo)) if hi.is_ascii_hexdigit() && lo.is_ascii_hexdigit()
            )
    })
}
