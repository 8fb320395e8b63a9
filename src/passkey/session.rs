//! Pending ceremony sessions
//!
//! Registration sessions are keyed by the identity they were begun for.
//! Authentication uses a single shared slot because the challenge is issued
//! before the responding user is known.
//!
//! A session taken for verification leaves an `Invalidated` tombstone behind.
//! The orchestrator removes it once the ceremony succeeds, so a failed
//! ceremony can never be finished by resubmitting the same response.

use std::collections::HashMap;

use chrono::{DateTime, Duration, Utc};

use crate::passkey::errors::CeremonyError;

/// Which ceremony a session belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CeremonyKind {
    Registration,
    Authentication,
}

impl CeremonyKind {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Registration => "registration",
            Self::Authentication => "authentication",
        }
    }
}

/// Engine state plus the challenge it was issued with
#[derive(Debug, Clone)]
pub struct PendingSession<S> {
    pub challenge: String,
    pub state: S,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

impl<S> PendingSession<S> {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

#[derive(Debug)]
enum Slot<S> {
    Pending(PendingSession<S>),
    Invalidated { at: DateTime<Utc> },
}

impl<S> Slot<S> {
    fn is_live(&self, now: DateTime<Utc>, ttl: Duration) -> bool {
        match self {
            Self::Pending(session) => !session.is_expired(now),
            Self::Invalidated { at } => now < *at + ttl,
        }
    }
}

/// Outcome of taking a slot, before the caller writes back the tombstone
enum Taken<S> {
    Session(PendingSession<S>),
    Expired,
    Missing,
}

fn take_slot<S>(slot: Option<Slot<S>>, now: DateTime<Utc>) -> Taken<S> {
    match slot {
        Some(Slot::Pending(session)) if session.is_expired(now) => Taken::Expired,
        Some(Slot::Pending(session)) => Taken::Session(session),
        Some(Slot::Invalidated { .. }) | None => Taken::Missing,
    }
}

/// Registry of in-flight ceremonies
///
/// `R` and `A` are the engine's registration and authentication state types.
#[derive(Debug)]
pub struct SessionRegistry<R, A> {
    ttl: Duration,
    registrations: HashMap<String, Slot<R>>,
    authentication: Option<Slot<A>>,
}

impl<R, A> SessionRegistry<R, A> {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            registrations: HashMap::new(),
            authentication: None,
        }
    }

    fn pending<S>(&self, challenge: String, state: S) -> PendingSession<S> {
        let created_at = Utc::now();
        PendingSession {
            challenge,
            state,
            created_at,
            expires_at: created_at + self.ttl,
        }
    }

    /// Store a registration session for `identity`, replacing any earlier one
    pub fn begin_registration(&mut self, identity: &str, challenge: String, state: R) {
        let session = self.pending(challenge, state);
        if let Some(Slot::Pending(previous)) = self
            .registrations
            .insert(identity.to_string(), Slot::Pending(session))
        {
            log::debug!(
                "Replaced pending registration for {identity} (challenge issued {})",
                previous.created_at
            );
        }
    }

    /// Take the pending registration for `identity`, leaving a tombstone
    ///
    /// # Errors
    ///
    /// `NoPendingSession` if nothing is pending (or it was already taken),
    /// `SessionExpired` if the session outlived its TTL.
    pub fn consume_registration(
        &mut self,
        identity: &str,
    ) -> Result<PendingSession<R>, CeremonyError> {
        let now = Utc::now();
        let taken = take_slot(self.registrations.remove(identity), now);
        self.registrations
            .insert(identity.to_string(), Slot::Invalidated { at: now });
        match taken {
            Taken::Session(session) => Ok(session),
            Taken::Expired => Err(CeremonyError::SessionExpired(
                CeremonyKind::Registration.as_str(),
            )),
            Taken::Missing => Err(CeremonyError::NoPendingSession(
                CeremonyKind::Registration.as_str(),
            )),
        }
    }

    /// Drop the tombstone left by a successful registration
    pub fn mark_registration_complete(&mut self, identity: &str) {
        self.registrations.remove(identity);
    }

    /// Store the shared authentication session, replacing any earlier one
    pub fn begin_authentication(&mut self, challenge: String, state: A) {
        let session = self.pending(challenge, state);
        if let Some(Slot::Pending(_)) = self.authentication.replace(Slot::Pending(session)) {
            log::debug!("Replaced unconsumed authentication session");
        }
    }

    /// Take the shared authentication session, leaving a tombstone
    ///
    /// # Errors
    ///
    /// `NoPendingSession` if the slot is empty or already taken,
    /// `SessionExpired` if the session outlived its TTL.
    pub fn consume_authentication(&mut self) -> Result<PendingSession<A>, CeremonyError> {
        let now = Utc::now();
        let taken = take_slot(
            self.authentication.replace(Slot::Invalidated { at: now }),
            now,
        );
        match taken {
            Taken::Session(session) => Ok(session),
            Taken::Expired => Err(CeremonyError::SessionExpired(
                CeremonyKind::Authentication.as_str(),
            )),
            Taken::Missing => Err(CeremonyError::NoPendingSession(
                CeremonyKind::Authentication.as_str(),
            )),
        }
    }

    /// Drop the tombstone left by a successful authentication
    pub fn mark_authentication_complete(&mut self) {
        self.authentication = None;
    }

    /// Remove expired sessions and tombstones older than the TTL
    pub fn purge_expired(&mut self) {
        self.purge_expired_at(Utc::now());
    }

    fn purge_expired_at(&mut self, now: DateTime<Utc>) {
        let ttl = self.ttl;
        let before = self.registrations.len();
        self.registrations.retain(|_, slot| slot.is_live(now, ttl));
        let purged = before - self.registrations.len();
        if purged > 0 {
            log::debug!("Purged {purged} stale registration session(s)");
        }

        if self.authentication.as_ref().is_some_and(|slot| !slot.is_live(now, ttl)) {
            log::debug!("Purged stale authentication session");
            self.authentication = None;
        }
    }

    /// Challenge of the live registration session for `identity`, if any
    #[must_use]
    pub fn pending_registration_challenge(&self, identity: &str) -> Option<&str> {
        match self.registrations.get(identity) {
            Some(Slot::Pending(session)) => Some(session.challenge.as_str()),
            _ => None,
        }
    }

    #[must_use]
    pub fn has_pending_registration(&self, identity: &str) -> bool {
        self.pending_registration_challenge(identity).is_some()
    }

    /// Challenge of the live authentication session, if any
    #[must_use]
    pub fn pending_authentication_challenge(&self) -> Option<&str> {
        match &self.authentication {
            Some(Slot::Pending(session)) => Some(session.challenge.as_str()),
            _ => None,
        }
    }

    /// Number of registration entries, tombstones included
    #[must_use]
    pub fn registration_entries(&self) -> usize {
        self.registrations.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type Registry = SessionRegistry<&'static str, &'static str>;

    fn registry() -> Registry {
        SessionRegistry::new(Duration::seconds(300))
    }

    #[test]
    fn test_registration_consumed_once() {
        let mut sessions = registry();
        sessions.begin_registration("a@x.com", "c1".to_string(), "state");

        let session = sessions.consume_registration("a@x.com").unwrap();
        assert_eq!(session.challenge, "c1");
        assert_eq!(session.state, "state");

        let err = sessions.consume_registration("a@x.com").unwrap_err();
        assert!(matches!(err, CeremonyError::NoPendingSession("registration")));
    }

    #[test]
    fn test_registration_bound_to_identity() {
        let mut sessions = registry();
        sessions.begin_registration("a@x.com", "c1".to_string(), "state");

        let err = sessions.consume_registration("b@x.com").unwrap_err();
        assert!(matches!(err, CeremonyError::NoPendingSession(_)));
        assert!(sessions.has_pending_registration("a@x.com"));
    }

    #[test]
    fn test_new_registration_replaces_old() {
        let mut sessions = registry();
        sessions.begin_registration("a@x.com", "c1".to_string(), "first");
        sessions.begin_registration("a@x.com", "c2".to_string(), "second");

        assert_eq!(sessions.pending_registration_challenge("a@x.com"), Some("c2"));
        let session = sessions.consume_registration("a@x.com").unwrap();
        assert_eq!(session.state, "second");
    }

    #[test]
    fn test_tombstone_cleared_on_success_only() {
        let mut sessions = registry();
        sessions.begin_registration("a@x.com", "c1".to_string(), "state");
        sessions.consume_registration("a@x.com").unwrap();
        assert_eq!(sessions.registration_entries(), 1);
        assert!(!sessions.has_pending_registration("a@x.com"));

        sessions.mark_registration_complete("a@x.com");
        assert_eq!(sessions.registration_entries(), 0);
    }

    #[test]
    fn test_expired_registration_rejected() {
        let mut sessions: Registry = SessionRegistry::new(Duration::zero());
        sessions.begin_registration("a@x.com", "c1".to_string(), "state");

        let err = sessions.consume_registration("a@x.com").unwrap_err();
        assert!(matches!(err, CeremonyError::SessionExpired("registration")));

        // The expired session is gone for good
        let err = sessions.consume_registration("a@x.com").unwrap_err();
        assert!(matches!(err, CeremonyError::NoPendingSession(_)));
    }

    #[test]
    fn test_authentication_slot_is_shared_and_replaced() {
        let mut sessions = registry();
        sessions.begin_authentication("c1".to_string(), "first");
        sessions.begin_authentication("c2".to_string(), "second");
        assert_eq!(sessions.pending_authentication_challenge(), Some("c2"));

        let session = sessions.consume_authentication().unwrap();
        assert_eq!(session.state, "second");

        let err = sessions.consume_authentication().unwrap_err();
        assert!(matches!(err, CeremonyError::NoPendingSession("authentication")));

        sessions.mark_authentication_complete();
        assert!(sessions.consume_authentication().is_err());
    }

    #[test]
    fn test_expired_authentication_rejected() {
        let mut sessions: Registry = SessionRegistry::new(Duration::zero());
        sessions.begin_authentication("c1".to_string(), "state");

        let err = sessions.consume_authentication().unwrap_err();
        assert!(matches!(err, CeremonyError::SessionExpired("authentication")));
    }

    #[test]
    fn test_purge_drops_stale_entries() {
        let mut sessions = registry();
        sessions.begin_registration("a@x.com", "c1".to_string(), "a");
        sessions.begin_registration("b@x.com", "c2".to_string(), "b");
        sessions.consume_registration("b@x.com").unwrap();
        sessions.begin_authentication("c3".to_string(), "auth");

        sessions.purge_expired();
        assert_eq!(sessions.registration_entries(), 2);

        sessions.purge_expired_at(Utc::now() + Duration::seconds(301));
        assert_eq!(sessions.registration_entries(), 0);
        assert_eq!(sessions.pending_authentication_challenge(), None);
    }
}
