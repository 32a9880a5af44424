//! Tutor identity: token validation, the persisted session context, and the gate that
//! decides whether the chat may send.

use crate::store::{KeyValueStore, StoreError};
use std::fmt;
use std::sync::Arc;

/// Local state key holding the identity token.
pub const IDENTITY_KEY: &str = "tutorchat_userId";

/// Shown under the prompt when the submitted token is malformed.
pub const INVALID_IDENTITY_NOTICE: &str =
    "Ingresa una matrícula válida (4–32 caracteres, letras/números/_-)";

const MIN_LEN: usize = 4;
const MAX_LEN: usize = 32;

/// A syntactically valid identity token (trimmed, 4–32 of `[A-Za-z0-9_-]`).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Identity(String);

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{}", INVALID_IDENTITY_NOTICE)]
pub struct InvalidIdentity;

impl Identity {
    pub fn parse(raw: &str) -> Result<Self, InvalidIdentity> {
        let t = raw.trim();
        let len = t.chars().count();
        let charset_ok = t
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if (MIN_LEN..=MAX_LEN).contains(&len) && charset_ok {
            Ok(Self(t.to_string()))
        } else {
            Err(InvalidIdentity)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Persistence boundary for the tutor identity, injected into the panel.
#[derive(Clone)]
pub struct SessionContext {
    store: Arc<dyn KeyValueStore>,
}

impl SessionContext {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Persisted identity, if present and still well-formed.
    pub fn load_identity(&self) -> Option<Identity> {
        match self.store.get(IDENTITY_KEY) {
            Ok(Some(raw)) => match Identity::parse(&raw) {
                Ok(id) => Some(id),
                Err(_) => {
                    log::warn!("ignoring malformed persisted identity");
                    None
                }
            },
            Ok(None) => None,
            Err(e) => {
                log::error!("reading identity: {}", e);
                None
            }
        }
    }

    pub fn save_identity(&self, identity: &Identity) -> Result<(), StoreError> {
        self.store.set(IDENTITY_KEY, identity.as_str())
    }

    pub fn clear_identity(&self) -> Result<(), StoreError> {
        self.store.clear(IDENTITY_KEY)
    }
}

/// Gate state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateState {
    Unidentified,
    Identified(Identity),
}

/// What a successful prompt submission did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Submitted {
    /// The identity differs from the one in use before; the chat should restart.
    pub changed: bool,
}

/// Identity state machine with the prompt ("modal") flag.
pub struct IdentityGate {
    context: SessionContext,
    state: GateState,
    /// Last identity used in this session, kept across a server rejection.
    last: Option<Identity>,
    prompt_open: bool,
    /// Prompt input field.
    pub draft: String,
    error: Option<String>,
    forget_rejected: bool,
}

impl IdentityGate {
    /// Mount: Identified if a token is persisted, otherwise Unidentified with the prompt open.
    pub fn new(context: SessionContext) -> Self {
        let persisted = context.load_identity();
        let (state, prompt_open) = match persisted.clone() {
            Some(id) => (GateState::Identified(id), false),
            None => (GateState::Unidentified, true),
        };
        Self {
            context,
            state,
            last: persisted,
            prompt_open,
            draft: String::new(),
            error: None,
            forget_rejected: false,
        }
    }

    /// Also clear the persisted token when the server rejects it.
    pub fn forget_rejected(mut self, yes: bool) -> Self {
        self.forget_rejected = yes;
        self
    }

    pub fn state(&self) -> &GateState {
        &self.state
    }

    pub fn identity(&self) -> Option<&Identity> {
        match &self.state {
            GateState::Identified(id) => Some(id),
            GateState::Unidentified => None,
        }
    }

    pub fn is_prompt_open(&self) -> bool {
        self.prompt_open
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Sending is allowed only with an identity and the prompt closed.
    pub fn can_send(&self) -> bool {
        self.identity().is_some() && !self.prompt_open
    }

    /// The prompt can be dismissed only when an identity is in place.
    pub fn can_cancel(&self) -> bool {
        self.identity().is_some()
    }

    pub fn open_prompt(&mut self) {
        self.prompt_open = true;
    }

    /// "Change identity": open the prompt pre-filled with the current token.
    pub fn open_change(&mut self) {
        self.draft = self
            .identity()
            .map(|id| id.as_str().to_string())
            .unwrap_or_default();
        self.error = None;
        self.prompt_open = true;
    }

    /// Close the prompt without changes. Refused while Unidentified.
    pub fn cancel(&mut self) -> bool {
        if !self.can_cancel() {
            return false;
        }
        self.prompt_open = false;
        self.error = None;
        true
    }

    /// Submit the prompt draft.
    pub fn submit(&mut self) -> Result<Submitted, InvalidIdentity> {
        let draft = std::mem::take(&mut self.draft);
        let result = self.submit_token(&draft);
        if result.is_err() {
            self.draft = draft;
        }
        result
    }

    /// Validate, persist, and switch to Identified.
    pub fn submit_token(&mut self, raw: &str) -> Result<Submitted, InvalidIdentity> {
        let id = match Identity::parse(raw) {
            Ok(id) => id,
            Err(e) => {
                self.error = Some(e.to_string());
                return Err(e);
            }
        };
        let changed = self.last.as_ref() != Some(&id);
        self.adopt(id);
        self.draft.clear();
        self.error = None;
        self.prompt_open = false;
        Ok(Submitted { changed })
    }

    /// Server answered `invalid`: back to Unidentified with the prompt open.
    pub fn reject(&mut self) {
        self.state = GateState::Unidentified;
        self.prompt_open = true;
        if self.forget_rejected {
            if let Err(e) = self.context.clear_identity() {
                log::error!("clearing rejected identity: {}", e);
            }
        }
    }

    /// Server issued a different identity (e.g. normalized). Returns true if it was adopted.
    pub fn replace(&mut self, raw: &str) -> bool {
        let Ok(id) = Identity::parse(raw) else {
            log::warn!("server issued malformed identity, ignoring");
            return false;
        };
        if self.identity() == Some(&id) {
            return false;
        }
        log::info!("server replaced identity with {}", id);
        self.adopt(id);
        true
    }

    fn adopt(&mut self, id: Identity) {
        if let Err(e) = self.context.save_identity(&id) {
            log::error!("persisting identity: {}", e);
        }
        self.last = Some(id.clone());
        self.state = GateState::Identified(id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;

    fn context() -> (SessionContext, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::new());
        (SessionContext::new(store.clone()), store)
    }

    #[test]
    fn identity_validation() {
        assert_eq!(Identity::parse("  UNIV011 ").unwrap().as_str(), "UNIV011");
        assert!(Identity::parse("ab_-").is_ok());
        assert!(Identity::parse(&"a".repeat(32)).is_ok());
        assert!(Identity::parse("abc").is_err());
        assert!(Identity::parse(&"a".repeat(33)).is_err());
        assert!(Identity::parse("UNIV 011").is_err());
        assert!(Identity::parse("matrícula").is_err());
        assert!(Identity::parse("").is_err());
    }

    #[test]
    fn fresh_profile_starts_unidentified_with_prompt() {
        let (ctx, _) = context();
        let gate = IdentityGate::new(ctx);
        assert_eq!(gate.state(), &GateState::Unidentified);
        assert!(gate.is_prompt_open());
        assert!(!gate.can_send());
        assert!(!gate.can_cancel());
    }

    #[test]
    fn submit_persists_and_closes_prompt() {
        let (ctx, store) = context();
        let mut gate = IdentityGate::new(ctx);
        gate.draft = "UNIV011".into();
        let s = gate.submit().unwrap();
        assert!(s.changed);
        assert!(!gate.is_prompt_open());
        assert!(gate.can_send());
        assert_eq!(store.get(IDENTITY_KEY).unwrap().as_deref(), Some("UNIV011"));
    }

    #[test]
    fn identity_survives_remount_with_foreign_state_entries() {
        let dir = std::env::temp_dir().join(format!("ipeth-identity-{}", uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("state.json");
        std::fs::write(&path, r#"{"theme": 1}"#).unwrap();

        let ctx = SessionContext::new(Arc::new(crate::store::FileStore::new(&path)));
        let mut gate = IdentityGate::new(ctx);
        assert!(gate.submit_token("UNIV011").unwrap().changed);

        let remounted = IdentityGate::new(SessionContext::new(Arc::new(
            crate::store::FileStore::new(&path),
        )));
        assert!(!remounted.is_prompt_open());
        assert_eq!(remounted.identity().map(|id| id.as_str()), Some("UNIV011"));
        let _ = std::fs::remove_dir_all(dir);
    }

    #[test]
    fn invalid_submit_keeps_state_and_reports() {
        let (ctx, store) = context();
        let mut gate = IdentityGate::new(ctx);
        gate.draft = "x!".into();
        assert!(gate.submit().is_err());
        assert_eq!(gate.error(), Some(INVALID_IDENTITY_NOTICE));
        assert_eq!(gate.draft, "x!");
        assert!(gate.is_prompt_open());
        assert_eq!(store.get(IDENTITY_KEY).unwrap(), None);
    }

    #[test]
    fn persisted_identity_is_restored_on_mount() {
        let (ctx, store) = context();
        store.set(IDENTITY_KEY, "UNIV011").unwrap();
        let gate = IdentityGate::new(ctx);
        assert_eq!(gate.identity().map(|i| i.as_str()), Some("UNIV011"));
        assert!(gate.can_send());
    }

    #[test]
    fn reject_keeps_persisted_token_by_default() {
        let (ctx, store) = context();
        store.set(IDENTITY_KEY, "UNIV011").unwrap();
        let mut gate = IdentityGate::new(ctx);
        gate.reject();
        assert_eq!(gate.state(), &GateState::Unidentified);
        assert!(gate.is_prompt_open());
        assert!(!gate.can_send());
        assert_eq!(store.get(IDENTITY_KEY).unwrap().as_deref(), Some("UNIV011"));

        let s = gate.submit_token("UNIV011").unwrap();
        assert!(!s.changed);
    }

    #[test]
    fn reject_can_forget_persisted_token() {
        let (ctx, store) = context();
        store.set(IDENTITY_KEY, "UNIV011").unwrap();
        let mut gate = IdentityGate::new(ctx).forget_rejected(true);
        gate.reject();
        assert_eq!(store.get(IDENTITY_KEY).unwrap(), None);
    }

    #[test]
    fn replace_overwrites_persisted_token() {
        let (ctx, store) = context();
        let mut gate = IdentityGate::new(ctx);
        gate.submit_token("univ011").unwrap();
        assert!(gate.replace("UNIV011"));
        assert!(!gate.replace("UNIV011"));
        assert_eq!(store.get(IDENTITY_KEY).unwrap().as_deref(), Some("UNIV011"));
    }

    #[test]
    fn change_prefills_and_cancel_restores() {
        let (ctx, _) = context();
        let mut gate = IdentityGate::new(ctx);
        gate.submit_token("UNIV011").unwrap();
        gate.open_change();
        assert_eq!(gate.draft, "UNIV011");
        assert!(!gate.can_send());
        assert!(gate.cancel());
        assert!(gate.can_send());
    }
}
