//! GC-exemption whitelist.

use std::collections::HashSet;
use std::sync::Mutex;

use thiserror::Error;

/// Whitelist registry errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum WhitelistError {
    #[error("session {0} already present in whitelist")]
    AlreadyPresent(String),

    #[error("session {0} not found in whitelist")]
    NotFound(String),
}

/// Thread-safe set of session ids exempt from garbage collection.
///
/// This is the only shared mutable state the scheduler holds in memory;
/// everything else lives in the catalog store.
#[derive(Debug, Default)]
pub struct Whitelist {
    sessions: Mutex<HashSet<String>>,
}

impl Whitelist {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a session. Fails if it is already registered.
    pub fn add(&self, session_id: &str) -> Result<(), WhitelistError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if !sessions.insert(session_id.to_string()) {
            return Err(WhitelistError::AlreadyPresent(session_id.to_string()));
        }
        Ok(())
    }

    /// Deregisters a session. Fails if it was not registered.
    pub fn remove(&self, session_id: &str) -> Result<(), WhitelistError> {
        let mut sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        if !sessions.remove(session_id) {
            return Err(WhitelistError::NotFound(session_id.to_string()));
        }
        Ok(())
    }

    pub fn contains(&self, session_id: &str) -> bool {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.contains(session_id)
    }

    pub fn list(&self) -> Vec<String> {
        let sessions = self.sessions.lock().unwrap_or_else(|e| e.into_inner());
        sessions.iter().cloned().collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_remove_contains() {
        let whitelist = Whitelist::new();
        assert!(!whitelist.contains("s1"));

        whitelist.add("s1").unwrap();
        assert!(whitelist.contains("s1"));

        whitelist.remove("s1").unwrap();
        assert!(!whitelist.contains("s1"));
    }

    #[test]
    fn duplicate_add_fails() {
        let whitelist = Whitelist::new();
        whitelist.add("s1").unwrap();
        assert_eq!(
            whitelist.add("s1"),
            Err(WhitelistError::AlreadyPresent("s1".to_string()))
        );
    }

    #[test]
    fn removing_absent_session_fails() {
        let whitelist = Whitelist::new();
        assert_eq!(
            whitelist.remove("s1"),
            Err(WhitelistError::NotFound("s1".to_string()))
        );
    }
}
