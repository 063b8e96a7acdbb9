//! Accounts and commit identities

use std::cmp::Ordering;
use std::hash::{Hash, Hasher};

use serde::{Deserialize, Serialize};

/// Numeric account identifier assigned by the account directory
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(pub u64);

impl std::fmt::Display for AccountId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A user account known to the account directory
///
/// Accounts compare, order and hash by `id` only, so sets of accounts
/// behave like sets of ids while still carrying the display data.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Account {
    /// Directory-assigned id
    pub id: AccountId,
    /// Login handle
    pub username: String,
    /// Full name, if known
    #[serde(default)]
    pub display_name: Option<String>,
    /// Registered email addresses, preferred first
    #[serde(default)]
    pub emails: Vec<String>,
    /// Inactive accounts are never added to a change
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

impl Account {
    /// Create an active account with no email or display name
    pub fn new(id: u64, username: impl Into<String>) -> Self {
        Self {
            id: AccountId(id),
            username: username.into(),
            display_name: None,
            emails: Vec::new(),
            active: true,
        }
    }

    /// Add an email address
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.emails.push(email.into());
        self
    }

    /// Set the display name
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Mark the account inactive
    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    /// The preferred email, if any
    pub fn preferred_email(&self) -> Option<&str> {
        self.emails.first().map(String::as_str)
    }

    /// Check whether this account owns the given email (case-insensitive)
    pub fn has_email(&self, email: &str) -> bool {
        self.emails.iter().any(|e| e.eq_ignore_ascii_case(email))
    }

    /// Check whether a free-form identifier names this account
    ///
    /// Matches the numeric id, username, any email, or the display name.
    pub fn is_named_by(&self, identifier: &str) -> bool {
        let identifier = identifier.trim();
        if identifier.is_empty() {
            return false;
        }
        if identifier.parse::<u64>().ok() == Some(self.id.0) {
            return true;
        }
        self.username.eq_ignore_ascii_case(identifier)
            || self.has_email(identifier)
            || self
                .display_name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(identifier))
    }
}

impl PartialEq for Account {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Account {}

impl Hash for Account {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Account {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Account {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl std::fmt::Display for Account {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.username, self.id)
    }
}

/// Name and email of a commit author or committer
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Person {
    pub name: String,
    pub email: String,
}

impl Person {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// Check whether a query value names this person
    ///
    /// Matches the full email, the email local part, the full name, or any
    /// single word of the name.
    pub fn is_named_by(&self, value: &str) -> bool {
        let value = value.trim();
        if value.is_empty() {
            return false;
        }
        if self.email.eq_ignore_ascii_case(value) || self.name.eq_ignore_ascii_case(value) {
            return true;
        }
        if let Some((local, _)) = self.email.split_once('@') {
            if local.eq_ignore_ascii_case(value) {
                return true;
            }
        }
        self.name
            .split_whitespace()
            .any(|part| part.eq_ignore_ascii_case(value))
    }
}
