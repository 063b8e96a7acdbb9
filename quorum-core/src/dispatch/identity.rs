//! Identity a dispatched task acts as

use serde::{Deserialize, Serialize};

use crate::model::{Account, AccountId, Change};

/// The account on whose behalf remote calls are made
///
/// Carried by value into every task; nothing is read from ambient state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IdentityContext {
    pub account_id: AccountId,
    pub username: String,
}

impl IdentityContext {
    pub fn new(account: &Account) -> Self {
        Self {
            account_id: account.id,
            username: account.username.clone(),
        }
    }

    /// Act as the owner of a change
    pub fn for_owner(change: &Change) -> Self {
        Self::new(&change.owner)
    }
}

impl std::fmt::Display for IdentityContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.username, self.account_id)
    }
}
