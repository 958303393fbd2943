#![forbid(unsafe_code)]

use serde::{Deserialize, Serialize};
use ulid::Ulid;

pub const MAX_MESSAGE_CONTENT_CHARS: usize = 5_000;
pub const MAX_MESSAGE_SUBJECT_CHARS: usize = 200;
pub const MAX_CONNECTION_NOTE_CHARS: usize = 1_000;
const MAX_SLUG_CHARS: usize = 64;

/// Returns the project code name.
#[must_use]
pub const fn project_name() -> &'static str {
    "tradepost"
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum DomainError {
    #[error("user id is invalid")]
    InvalidUserId,
    #[error("company id is invalid")]
    InvalidCompanyId,
    #[error("connection id is invalid")]
    InvalidConnectionId,
    #[error("message id is invalid")]
    InvalidMessageId,
    #[error("company name is invalid")]
    InvalidCompanyName,
    #[error("industry type is invalid")]
    InvalidIndustryType,
    #[error("message content is invalid")]
    InvalidMessageContent,
    #[error("message subject is invalid")]
    InvalidMessageSubject,
    #[error("connection note is invalid")]
    InvalidConnectionNote,
    #[error("connection status is invalid")]
    InvalidConnectionStatus,
    #[error("role is invalid")]
    InvalidRole,
}

macro_rules! ulid_id {
    ($(#[$meta:meta])* $name:ident, $error:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(try_from = "String", into = "String")]
        pub struct $name(Ulid);

        impl $name {
            #[must_use]
            pub fn new() -> Self {
                Self(Ulid::new())
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl TryFrom<String> for $name {
            type Error = DomainError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }

        impl core::str::FromStr for $name {
            type Err = DomainError;

            fn from_str(value: &str) -> Result<Self, Self::Err> {
                let parsed = Ulid::from_string(value).map_err(|_| DomainError::$error)?;
                Ok(Self(parsed))
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.0.to_string()
            }
        }

        impl core::fmt::Display for $name {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

ulid_id!(
    /// Identity issued by the external identity provider.
    UserId,
    InvalidUserId
);
ulid_id!(CompanyId, InvalidCompanyId);
ulid_id!(ConnectionId, InvalidConnectionId);
ulid_id!(MessageId, InvalidMessageId);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Admin => "admin",
        }
    }
}

impl TryFrom<&str> for Role {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "user" => Ok(Self::User),
            "admin" => Ok(Self::Admin),
            _ => Err(DomainError::InvalidRole),
        }
    }
}

/// Lifecycle of a connection request between two companies.
///
/// `Pending` is the only state with outgoing transitions; `Accepted` and
/// `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ConnectionStatus {
    Pending,
    Accepted,
    Rejected,
}

impl ConnectionStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Accepted => "ACCEPTED",
            Self::Rejected => "REJECTED",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Accepted | Self::Rejected)
        )
    }
}

impl TryFrom<&str> for ConnectionStatus {
    type Error = DomainError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value {
            "PENDING" => Ok(Self::Pending),
            "ACCEPTED" => Ok(Self::Accepted),
            "REJECTED" => Ok(Self::Rejected),
            _ => Err(DomainError::InvalidConnectionStatus),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionDecision {
    Accept,
    Reject,
}

impl ConnectionDecision {
    #[must_use]
    pub const fn target_status(self) -> ConnectionStatus {
        match self {
            Self::Accept => ConnectionStatus::Accepted,
            Self::Reject => ConnectionStatus::Rejected,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageContent(String);

impl MessageContent {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageContent {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().is_empty() || value.chars().count() > MAX_MESSAGE_CONTENT_CHARS {
            return Err(DomainError::InvalidMessageContent);
        }
        if value.chars().any(|c| c == '\0') {
            return Err(DomainError::InvalidMessageContent);
        }
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MessageSubject(String);

impl MessageSubject {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for MessageSubject {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_free_text(&value, MAX_MESSAGE_SUBJECT_CHARS)
            .map_err(|()| DomainError::InvalidMessageSubject)?;
        Ok(Self(value))
    }
}

/// Optional note attached to a connection request.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ConnectionNote(String);

impl ConnectionNote {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl TryFrom<String> for ConnectionNote {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        validate_free_text(&value, MAX_CONNECTION_NOTE_CHARS)
            .map_err(|()| DomainError::InvalidConnectionNote)?;
        Ok(Self(value))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CompanyName(String);

impl CompanyName {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// URL-safe identifier derived from the name.
    #[must_use]
    pub fn slug(&self) -> String {
        slugify(&self.0)
    }
}

impl TryFrom<String> for CompanyName {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        let trimmed = value.trim();
        if !(2..=100).contains(&trimmed.chars().count()) {
            return Err(DomainError::InvalidCompanyName);
        }
        if trimmed.chars().any(char::is_control) {
            return Err(DomainError::InvalidCompanyName);
        }
        if slugify(trimmed).is_empty() {
            return Err(DomainError::InvalidCompanyName);
        }
        Ok(Self(trimmed.to_owned()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct IndustryType(String);

impl IndustryType {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for IndustryType {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if !(2..=64).contains(&value.len()) {
            return Err(DomainError::InvalidIndustryType);
        }
        if value
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ' ' || c == '&')
        {
            return Ok(Self(value));
        }
        Err(DomainError::InvalidIndustryType)
    }
}

/// Lowercase ASCII slug: alphanumerics kept, every other run collapsed to one `-`.
#[must_use]
pub fn slugify(value: &str) -> String {
    let mut slug = String::with_capacity(value.len());
    let mut pending_dash = false;
    for c in value.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
        if slug.len() >= MAX_SLUG_CHARS {
            break;
        }
    }
    slug
}

fn validate_free_text(value: &str, max_chars: usize) -> Result<(), ()> {
    if value.chars().count() > max_chars {
        return Err(());
    }
    if value.chars().any(|c| c == '\0') {
        return Err(());
    }
    Ok(())
}
