//! Admin-managed account data: wallet credits and blocked usernames.
//!
//! Usernames are stored lowercased without the leading `@`.

use std::collections::{HashMap, HashSet};
use std::sync::{Mutex, PoisonError};

#[derive(Debug, Default)]
struct Accounts {
    credits: HashMap<String, u64>,
    blocked: HashSet<String>,
}

/// In-memory registry shared by the flow controller and its admin branch
#[derive(Debug, Default)]
pub struct AccountRegistry {
    inner: Mutex<Accounts>,
}

fn normalize(username: &str) -> String {
    username.trim().trim_start_matches('@').to_lowercase()
}

impl AccountRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `cents` to the user's wallet, returning the new total
    pub fn credit(&self, username: &str, cents: u64) -> u64 {
        let mut accounts = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        let total = accounts.credits.entry(normalize(username)).or_insert(0);
        *total = total.saturating_add(cents);
        *total
    }

    /// Credited amount in cents, zero for unknown users
    pub fn credit_of(&self, username: &str) -> u64 {
        let accounts = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        accounts.credits.get(&normalize(username)).copied().unwrap_or(0)
    }

    /// Block a username. Returns `false` if it was already blocked.
    pub fn block(&self, username: &str) -> bool {
        let mut accounts = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        accounts.blocked.insert(normalize(username))
    }

    pub fn is_blocked(&self, username: &str) -> bool {
        let accounts = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        accounts.blocked.contains(&normalize(username))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_credit_accumulates_case_insensitively() {
        let registry = AccountRegistry::new();
        assert_eq!(registry.credit("@Alice", 500), 500);
        assert_eq!(registry.credit("alice", 250), 750);
        assert_eq!(registry.credit_of("ALICE"), 750);
        assert_eq!(registry.credit_of("bob"), 0);
    }

    #[test]
    fn test_block() {
        let registry = AccountRegistry::new();
        assert!(!registry.is_blocked("spammer"));
        assert!(registry.block("@Spammer"));
        assert!(!registry.block("spammer"));
        assert!(registry.is_blocked("SPAMMER"));
    }
}
