//! In-memory identity backend with call recording and failure injection.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use anyhow::{Result, anyhow, bail};
use async_trait::async_trait;
use chrono::TimeDelta;
use onefs_s3_core::{Clock, Identity, IdentityBackend, KeyPair, NewIdentity, SystemClock};

/// Backend operations that can be observed or made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BackendOperation {
    /// `list_scopes`
    ListScopes,
    /// `list_identities`
    ListIdentities,
    /// `create_identity`
    CreateIdentity,
    /// `set_supplemental_groups`
    SetSupplementalGroups,
    /// `mint_key_pair`
    MintKeyPair,
    /// `delete_identity`
    DeleteIdentity,
}

/// One recorded backend call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    /// Scope enumeration.
    ListScopes,
    /// Identity enumeration for a scope.
    ListIdentities {
        /// Scope listed.
        scope: String,
    },
    /// Identity creation.
    CreateIdentity(NewIdentity),
    /// Group assignment.
    SetSupplementalGroups {
        /// Identity name.
        name: String,
        /// Groups assigned.
        groups: Vec<String>,
        /// Scope of the identity.
        scope: String,
    },
    /// Key minting.
    MintKeyPair {
        /// Identity name.
        name: String,
        /// Scope of the identity.
        scope: String,
        /// Expiry requested for the superseded key.
        expiry_minutes: i64,
    },
    /// Identity deletion.
    DeleteIdentity {
        /// Identity name.
        name: String,
        /// Scope of the identity.
        scope: String,
    },
}

impl BackendCall {
    /// Operation this call belongs to.
    #[must_use]
    pub const fn operation(&self) -> BackendOperation {
        match self {
            Self::ListScopes => BackendOperation::ListScopes,
            Self::ListIdentities { .. } => BackendOperation::ListIdentities,
            Self::CreateIdentity(_) => BackendOperation::CreateIdentity,
            Self::SetSupplementalGroups { .. } => BackendOperation::SetSupplementalGroups,
            Self::MintKeyPair { .. } => BackendOperation::MintKeyPair,
            Self::DeleteIdentity { .. } => BackendOperation::DeleteIdentity,
        }
    }
}

/// Key pair held by the fake backend for an identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MintedKey {
    /// Access key identifier.
    pub access_id: String,
    /// Secret key material.
    pub secret_key: String,
    /// Epoch-second expiry, `None` while the key never expires.
    pub expiry: Option<i64>,
}

#[derive(Debug, Default)]
struct IdentityRecord {
    groups: Vec<String>,
    keys: Vec<MintedKey>,
}

#[derive(Debug)]
struct FailureRule {
    operation: BackendOperation,
    subject: Option<String>,
}

#[derive(Debug, Default)]
struct State {
    scopes: BTreeMap<String, BTreeMap<String, IdentityRecord>>,
    calls: Vec<BackendCall>,
    failures: Vec<FailureRule>,
    next_key: u64,
}

impl State {
    fn check(&self, operation: BackendOperation, subject: &str) -> Result<()> {
        let injected = self.failures.iter().any(|rule| {
            rule.operation == operation && rule.subject.as_deref().is_none_or(|s| s == subject)
        });
        if injected {
            bail!("injected {operation:?} failure for '{subject}'");
        }
        Ok(())
    }

    fn identity_mut(&mut self, name: &str, scope: &str) -> Result<&mut IdentityRecord> {
        self.scopes
            .get_mut(scope)
            .and_then(|identities| identities.get_mut(name))
            .ok_or_else(|| anyhow!("identity '{name}' not found in scope '{scope}'"))
    }
}

/// Identity backend that keeps every scope, identity, and key in memory.
#[derive(Debug, Clone)]
pub struct MemoryIdentityBackend {
    state: Arc<Mutex<State>>,
    clock: Arc<dyn Clock>,
}

impl Default for MemoryIdentityBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryIdentityBackend {
    /// Empty backend using the system clock for key expiries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_clock(Arc::new(SystemClock))
    }

    /// Empty backend computing key expiries from `clock`.
    #[must_use]
    pub fn with_clock(clock: Arc<dyn Clock>) -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            clock,
        }
    }

    /// Register a scope with no identities.
    pub fn add_scope(&self, scope: &str) {
        self.lock().scopes.entry(scope.to_string()).or_default();
    }

    /// Seed an identity directly, bypassing call recording.
    pub fn insert_identity(&self, scope: &str, name: &str) {
        self.lock()
            .scopes
            .entry(scope.to_string())
            .or_default()
            .entry(name.to_string())
            .or_default();
    }

    /// Fail every call of `operation`.
    pub fn fail(&self, operation: BackendOperation) {
        self.lock().failures.push(FailureRule {
            operation,
            subject: None,
        });
    }

    /// Fail calls of `operation` addressing `subject` (identity name, or the
    /// scope for `list_identities`).
    pub fn fail_for(&self, operation: BackendOperation, subject: &str) {
        self.lock().failures.push(FailureRule {
            operation,
            subject: Some(subject.to_string()),
        });
    }

    /// Remove every injected failure.
    pub fn clear_failures(&self) {
        self.lock().failures.clear();
    }

    /// Every call received so far, in order.
    #[must_use]
    pub fn calls(&self) -> Vec<BackendCall> {
        self.lock().calls.clone()
    }

    /// Calls of one operation, in order.
    #[must_use]
    pub fn calls_of(&self, operation: BackendOperation) -> Vec<BackendCall> {
        self.lock()
            .calls
            .iter()
            .filter(|call| call.operation() == operation)
            .cloned()
            .collect()
    }

    /// Identity names in `scope`, sorted.
    #[must_use]
    pub fn identities(&self, scope: &str) -> Vec<String> {
        self.lock()
            .scopes
            .get(scope)
            .map(|identities| identities.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Supplemental groups of an identity.
    #[must_use]
    pub fn groups_of(&self, name: &str, scope: &str) -> Option<Vec<String>> {
        self.lock()
            .scopes
            .get(scope)
            .and_then(|identities| identities.get(name))
            .map(|record| record.groups.clone())
    }

    /// Keys held by an identity, oldest first.
    #[must_use]
    pub fn keys_of(&self, name: &str, scope: &str) -> Vec<MintedKey> {
        self.lock()
            .scopes
            .get(scope)
            .and_then(|identities| identities.get(name))
            .map(|record| record.keys.clone())
            .unwrap_or_default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl IdentityBackend for MemoryIdentityBackend {
    async fn list_scopes(&self) -> Result<Vec<String>> {
        let mut state = self.lock();
        state.calls.push(BackendCall::ListScopes);
        state.check(BackendOperation::ListScopes, "")?;
        Ok(state.scopes.keys().cloned().collect())
    }

    async fn list_identities(&self, scope: &str) -> Result<Vec<Identity>> {
        let mut state = self.lock();
        state.calls.push(BackendCall::ListIdentities {
            scope: scope.to_string(),
        });
        state.check(BackendOperation::ListIdentities, scope)?;
        Ok(state
            .scopes
            .get(scope)
            .map(|identities| identities.keys().map(Identity::new).collect())
            .unwrap_or_default())
    }

    async fn create_identity(&self, identity: &NewIdentity) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::CreateIdentity(identity.clone()));
        state.check(BackendOperation::CreateIdentity, &identity.name)?;
        let identities = state.scopes.entry(identity.scope.clone()).or_default();
        if identities.contains_key(&identity.name) {
            bail!(
                "identity '{}' already exists in scope '{}'",
                identity.name,
                identity.scope
            );
        }
        identities.insert(identity.name.clone(), IdentityRecord::default());
        Ok(())
    }

    async fn set_supplemental_groups(
        &self,
        name: &str,
        groups: &[String],
        scope: &str,
    ) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::SetSupplementalGroups {
            name: name.to_string(),
            groups: groups.to_vec(),
            scope: scope.to_string(),
        });
        state.check(BackendOperation::SetSupplementalGroups, name)?;
        state.identity_mut(name, scope)?.groups = groups.to_vec();
        Ok(())
    }

    async fn mint_key_pair(&self, name: &str, scope: &str, expiry_minutes: i64) -> Result<KeyPair> {
        let now = self.clock.now();
        let mut state = self.lock();
        state.calls.push(BackendCall::MintKeyPair {
            name: name.to_string(),
            scope: scope.to_string(),
            expiry_minutes,
        });
        state.check(BackendOperation::MintKeyPair, name)?;

        state.next_key += 1;
        let serial = state.next_key;
        let record = state.identity_mut(name, scope)?;

        let mut prior_key_expiry = 0;
        if expiry_minutes > 0 {
            let expiry = TimeDelta::try_minutes(expiry_minutes)
                .and_then(|lease| now.checked_add_signed(lease))
                .ok_or_else(|| anyhow!("expiry of {expiry_minutes} minutes is out of range"))?
                .timestamp();
            if let Some(previous) = record.keys.last_mut() {
                previous.expiry = Some(expiry);
                prior_key_expiry = expiry;
            }
        }

        let key = MintedKey {
            access_id: format!("AKID{serial:08}"),
            secret_key: format!("secret-{name}-{serial}"),
            expiry: None,
        };
        record.keys.push(key.clone());
        Ok(KeyPair {
            access_id: key.access_id,
            secret_key: key.secret_key,
            prior_key_expiry,
        })
    }

    async fn delete_identity(&self, name: &str, scope: &str) -> Result<()> {
        let mut state = self.lock();
        state.calls.push(BackendCall::DeleteIdentity {
            name: name.to_string(),
            scope: scope.to_string(),
        });
        state.check(BackendOperation::DeleteIdentity, name)?;
        state
            .scopes
            .get_mut(scope)
            .and_then(|identities| identities.remove(name))
            .map(|_| ())
            .ok_or_else(|| anyhow!("identity '{name}' not found in scope '{scope}'"))
    }
}
