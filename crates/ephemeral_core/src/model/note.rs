//! Note record, identifier and expiration policy.
//!
//! # Responsibility
//! - Generate and validate unguessable note identifiers.
//! - Resolve user-facing expiration policies into stored limits.
//! - Decide whether a note state is expired at a given instant.
//!
//! # Invariants
//! - `NoteId` values are exactly `NOTE_ID_LEN` ASCII alphanumerics.
//! - `max_views` and `expires_at` are mutually exclusive.
//! - `current_views` never decreases.

use once_cell::sync::Lazy;
use rand::distributions::Alphanumeric;
use rand::rngs::OsRng;
use rand::Rng;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;
use std::time::{SystemTime, UNIX_EPOCH};

/// Length of generated note identifiers (62^12, about 71 bits).
pub const NOTE_ID_LEN: usize = 12;

const MINUTE_MS: i64 = 60 * 1000;
const HOUR_MS: i64 = 60 * MINUTE_MS;

static NOTE_ID_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9]{12}$").expect("valid note id regex"));

/// Returns the current wall-clock time in Unix epoch milliseconds.
pub fn now_epoch_ms() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX))
        .unwrap_or(0)
}

/// Validation failures for note input and persisted note state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NoteValidationError {
    /// Content is empty or whitespace only.
    EmptyContent,
    /// Policy name is not one of the supported wire names.
    UnknownPolicy(String),
    /// Identifier does not have the generated shape.
    MalformedId(String),
    /// Both a view limit and a time limit were set.
    ConflictingLimits,
    /// `max_views` was set to zero or below.
    NonPositiveMaxViews(i64),
    /// `current_views` is negative.
    NegativeViewCount(i64),
}

impl Display for NoteValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyContent => write!(f, "note content must not be empty"),
            Self::UnknownPolicy(name) => write!(
                f,
                "unknown expiration policy `{name}`; expected {}",
                ExpirationPolicy::wire_names().join("|")
            ),
            Self::MalformedId(value) => write!(f, "malformed note id `{value}`"),
            Self::ConflictingLimits => {
                write!(f, "a note cannot have both a view limit and a time limit")
            }
            Self::NonPositiveMaxViews(value) => {
                write!(f, "max_views must be positive, got {value}")
            }
            Self::NegativeViewCount(value) => {
                write!(f, "current_views must not be negative, got {value}")
            }
        }
    }
}

impl Error for NoteValidationError {}

/// Opaque, unguessable note identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(String);

impl NoteId {
    /// Draws a fresh identifier from the operating system CSPRNG.
    pub fn generate() -> Self {
        let value = OsRng
            .sample_iter(&Alphanumeric)
            .take(NOTE_ID_LEN)
            .map(char::from)
            .collect();
        Self(value)
    }

    /// Validates an identifier received from a caller.
    ///
    /// Anything that does not look like a generated id can never name a
    /// stored note.
    pub fn parse(value: &str) -> Result<Self, NoteValidationError> {
        if NOTE_ID_RE.is_match(value) {
            Ok(Self(value.to_string()))
        } else {
            Err(NoteValidationError::MalformedId(value.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

impl Display for NoteId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for NoteId {
    type Err = NoteValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::parse(value)
    }
}

/// Expiration rule chosen when a note is created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ExpirationPolicy {
    #[serde(rename = "1_view")]
    OneView,
    #[serde(rename = "5_views")]
    FiveViews,
    #[serde(rename = "10_views")]
    TenViews,
    #[serde(rename = "10_minutes")]
    TenMinutes,
    #[serde(rename = "1_hour")]
    OneHour,
    #[serde(rename = "24_hours")]
    TwentyFourHours,
}

/// Stored limits a policy resolves to at creation time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicyLimits {
    pub max_views: Option<u32>,
    pub expires_at: Option<i64>,
}

impl ExpirationPolicy {
    pub const ALL: [ExpirationPolicy; 6] = [
        Self::OneView,
        Self::FiveViews,
        Self::TenViews,
        Self::TenMinutes,
        Self::OneHour,
        Self::TwentyFourHours,
    ];

    /// Name used by the create request contract.
    pub fn wire_name(self) -> &'static str {
        match self {
            Self::OneView => "1_view",
            Self::FiveViews => "5_views",
            Self::TenViews => "10_views",
            Self::TenMinutes => "10_minutes",
            Self::OneHour => "1_hour",
            Self::TwentyFourHours => "24_hours",
        }
    }

    pub fn wire_names() -> Vec<&'static str> {
        Self::ALL.iter().map(|policy| policy.wire_name()).collect()
    }

    /// Resolves the policy to exactly one stored limit relative to `now_ms`.
    pub fn limits(self, now_ms: i64) -> PolicyLimits {
        let views = |max| PolicyLimits {
            max_views: Some(max),
            expires_at: None,
        };
        let lifetime = |ttl_ms: i64| PolicyLimits {
            max_views: None,
            expires_at: Some(now_ms.saturating_add(ttl_ms)),
        };

        match self {
            Self::OneView => views(1),
            Self::FiveViews => views(5),
            Self::TenViews => views(10),
            Self::TenMinutes => lifetime(10 * MINUTE_MS),
            Self::OneHour => lifetime(HOUR_MS),
            Self::TwentyFourHours => lifetime(24 * HOUR_MS),
        }
    }
}

impl Display for ExpirationPolicy {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.wire_name())
    }
}

impl FromStr for ExpirationPolicy {
    type Err = NoteValidationError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|policy| policy.wire_name() == value.trim())
            .ok_or_else(|| NoteValidationError::UnknownPolicy(value.to_string()))
    }
}

/// Which limit made a note inaccessible.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExpiryReason {
    Time,
    Views,
}

impl ExpiryReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Time => "time",
            Self::Views => "views",
        }
    }
}

/// Stored note record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    /// Stored verbatim.
    pub content: String,
    /// `None` means no view limit.
    pub max_views: Option<u32>,
    pub current_views: u32,
    /// Unix epoch milliseconds. `None` means no time limit.
    pub expires_at: Option<i64>,
    /// Unix epoch milliseconds. Informational only.
    pub created_at: i64,
}

impl Note {
    /// Returns why the note is expired at `now_ms`, or `None` if it is live.
    ///
    /// The time limit is checked before the view limit.
    pub fn expiry_reason(&self, now_ms: i64) -> Option<ExpiryReason> {
        if matches!(self.expires_at, Some(expires_at) if now_ms >= expires_at) {
            return Some(ExpiryReason::Time);
        }
        if matches!(self.max_views, Some(max_views) if self.current_views >= max_views) {
            return Some(ExpiryReason::Views);
        }
        None
    }

    pub fn is_expired(&self, now_ms: i64) -> bool {
        self.expiry_reason(now_ms).is_some()
    }

    pub fn validate(&self) -> Result<(), NoteValidationError> {
        validate_limits(self.max_views.map(i64::from), self.expires_at)
    }
}

/// Creation input for the note store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NoteDraft {
    pub content: String,
    pub max_views: Option<u32>,
    pub expires_at: Option<i64>,
    pub created_at: i64,
}

impl NoteDraft {
    /// Builds a draft from a policy, resolving its limit against `now_ms`.
    pub fn from_policy(content: impl Into<String>, policy: ExpirationPolicy, now_ms: i64) -> Self {
        let limits = policy.limits(now_ms);
        Self {
            content: content.into(),
            max_views: limits.max_views,
            expires_at: limits.expires_at,
            created_at: now_ms,
        }
    }

    /// Builds a draft with neither limit; such a note lives until purged.
    pub fn unlimited(content: impl Into<String>, now_ms: i64) -> Self {
        Self {
            content: content.into(),
            max_views: None,
            expires_at: None,
            created_at: now_ms,
        }
    }

    /// Checks the creation invariants.
    ///
    /// Only the emptiness check trims; stored content is never modified.
    pub fn validate(&self) -> Result<(), NoteValidationError> {
        if self.content.trim().is_empty() {
            return Err(NoteValidationError::EmptyContent);
        }
        validate_limits(self.max_views.map(i64::from), self.expires_at)
    }
}

/// Shared limit checks for drafts and persisted rows.
pub(crate) fn validate_limits(
    max_views: Option<i64>,
    expires_at: Option<i64>,
) -> Result<(), NoteValidationError> {
    if max_views.is_some() && expires_at.is_some() {
        return Err(NoteValidationError::ConflictingLimits);
    }
    if let Some(value) = max_views.filter(|value| *value <= 0) {
        return Err(NoteValidationError::NonPositiveMaxViews(value));
    }
    Ok(())
}
