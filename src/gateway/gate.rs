//! Response gate: who gets an automated reply, and at most once per message.

use parley_core::{error::ParleyError, traits::AnsweredStore};
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Decides whether an author is eligible for automated replies.
pub trait ResponderPolicy: Send + Sync {
    fn is_eligible(&self, author_name: &str) -> bool;
}

/// Eligible when the author name equals or contains an allow-list entry.
///
/// This is a text match, not an identity match: the entry "Al" also admits
/// "Alice". Blank entries are ignored since they would admit everyone.
pub struct SubstringPolicy {
    allow_list: Vec<String>,
}

impl SubstringPolicy {
    pub fn new(allow_list: Vec<String>) -> Self {
        Self { allow_list }
    }
}

impl ResponderPolicy for SubstringPolicy {
    fn is_eligible(&self, author_name: &str) -> bool {
        self.allow_list
            .iter()
            .filter(|entry| !entry.trim().is_empty())
            .any(|entry| author_name == entry || author_name.contains(entry.as_str()))
    }
}

/// Eligible only on an exact name match.
pub struct ExactPolicy {
    allow_list: HashSet<String>,
}

impl ExactPolicy {
    pub fn new(allow_list: Vec<String>) -> Self {
        Self {
            allow_list: allow_list.into_iter().collect(),
        }
    }
}

impl ResponderPolicy for ExactPolicy {
    fn is_eligible(&self, author_name: &str) -> bool {
        self.allow_list.contains(author_name)
    }
}

type InFlight = Arc<Mutex<HashSet<String>>>;

fn lock_in_flight(in_flight: &InFlight) -> MutexGuard<'_, HashSet<String>> {
    // The set holds plain ids; a panic elsewhere cannot leave it half-written.
    in_flight.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Reply decision plus the answered-message set.
///
/// Cloning shares the same answered set and in-flight claims.
#[derive(Clone)]
pub struct ResponseGate {
    policy: Arc<dyn ResponderPolicy>,
    answered: Arc<dyn AnsweredStore>,
    in_flight: InFlight,
}

impl ResponseGate {
    pub fn new(policy: Arc<dyn ResponderPolicy>, answered: Arc<dyn AnsweredStore>) -> Self {
        Self {
            policy,
            answered,
            in_flight: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    /// Eligible author and not yet answered. Does not reserve the id;
    /// use [`claim`](Self::claim) when a reply will actually be attempted.
    pub async fn should_respond(&self, message_id: &str, body: &str, author_name: &str) -> bool {
        if !self.policy.is_eligible(author_name) {
            debug!("gate: {message_id} from '{author_name}' not on allow-list");
            return false;
        }
        match self.answered.contains(message_id).await {
            Ok(true) => {
                debug!("gate: {message_id} already answered");
                false
            }
            Ok(false) => {
                debug!("gate: {message_id} eligible ({} chars)", body.chars().count());
                true
            }
            Err(e) => {
                warn!("gate: answered lookup failed for {message_id}: {e}");
                false
            }
        }
    }

    /// Record that `message_id` received a reply. Returns `false` if it
    /// was already recorded.
    pub async fn mark_answered(&self, message_id: &str) -> Result<bool, ParleyError> {
        self.answered.insert(message_id).await
    }

    /// Decide and reserve in one step.
    ///
    /// While the returned claim lives, every other claim for the same id
    /// gets `None`. Commit it after a successful send; dropping it without
    /// committing releases the id unmarked. A claim whose commit failed is
    /// never released, so the id stays blocked for the life of the process.
    pub async fn claim(
        &self,
        message_id: &str,
        body: &str,
        author_name: &str,
    ) -> Option<ReplyClaim> {
        if !self.policy.is_eligible(author_name) {
            debug!("gate: {message_id} from '{author_name}' not on allow-list");
            return None;
        }

        if !lock_in_flight(&self.in_flight).insert(message_id.to_string()) {
            debug!("gate: {message_id} already claimed by a concurrent delivery");
            return None;
        }
        // From here on the claim owns the id and releases it on drop.
        let claim = ReplyClaim {
            message_id: message_id.to_string(),
            gate: self.clone(),
            pinned: false,
        };

        self.should_respond(message_id, body, author_name)
            .await
            .then_some(claim)
    }

    /// Number of ids currently reserved by live claims.
    #[cfg(test)]
    pub fn in_flight(&self) -> usize {
        lock_in_flight(&self.in_flight).len()
    }
}

/// Exclusive right to reply to one message.
pub struct ReplyClaim {
    message_id: String,
    gate: ResponseGate,
    /// Set when the answered store rejected the commit; the reservation
    /// then outlives the claim.
    pinned: bool,
}

impl ReplyClaim {
    /// Mark the message answered, then release the reservation.
    ///
    /// If the answered store fails, the id stays reserved in memory so a
    /// redelivery still cannot trigger a second reply.
    pub async fn commit(mut self) -> Result<(), ParleyError> {
        let result = self.gate.mark_answered(&self.message_id).await.map(|_| ());
        self.pinned = result.is_err();
        result
    }
}

impl Drop for ReplyClaim {
    fn drop(&mut self) {
        if !self.pinned {
            lock_in_flight(&self.gate.in_flight).remove(&self.message_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use parley_memory::InMemoryAnswered;

    /// Answered store whose writes always fail.
    struct ReadOnlyAnswered;

    #[async_trait]
    impl AnsweredStore for ReadOnlyAnswered {
        async fn contains(&self, _message_id: &str) -> Result<bool, ParleyError> {
            Ok(false)
        }

        async fn insert(&self, _message_id: &str) -> Result<bool, ParleyError> {
            Err(ParleyError::Memory("database is locked".into()))
        }
    }

    fn gate(allow: &[&str]) -> ResponseGate {
        let policy = SubstringPolicy::new(allow.iter().map(|s| s.to_string()).collect());
        ResponseGate::new(Arc::new(policy), Arc::new(InMemoryAnswered::default()))
    }

    #[test]
    fn test_substring_policy() {
        let policy = SubstringPolicy::new(vec!["Alice".into()]);
        assert!(policy.is_eligible("Alice"));
        assert!(policy.is_eligible("Alice Smith"));
        assert!(!policy.is_eligible("Bob"));
        assert!(!policy.is_eligible("alice"));

        let loose = SubstringPolicy::new(vec!["Al".into()]);
        assert!(loose.is_eligible("Alice"));
    }

    #[test]
    fn test_substring_policy_ignores_blank_entries() {
        let policy = SubstringPolicy::new(vec!["".into(), "  ".into()]);
        assert!(!policy.is_eligible("Anyone"));
    }

    #[test]
    fn test_exact_policy() {
        let policy = ExactPolicy::new(vec!["Alice".into()]);
        assert!(policy.is_eligible("Alice"));
        assert!(!policy.is_eligible("Alice Smith"));
    }

    #[tokio::test]
    async fn test_should_respond_until_marked() {
        let gate = gate(&["Alice"]);
        assert!(gate.should_respond("m1", "hello", "Alice").await);
        assert!(gate.should_respond("m1", "hello", "Alice").await);
        assert!(!gate.should_respond("m1", "hello", "Bob").await);

        assert!(gate.mark_answered("m1").await.unwrap());
        assert!(!gate.should_respond("m1", "hello", "Alice").await);
        assert!(!gate.should_respond("m1", "hello", "Alice").await);
        assert!(!gate.mark_answered("m1").await.unwrap());
    }

    #[tokio::test]
    async fn test_claim_excludes_concurrent_claims() {
        let gate = gate(&["Alice"]);
        let first = gate.claim("m1", "hello", "Alice").await.unwrap();
        assert!(gate.claim("m1", "hello", "Alice").await.is_none());
        assert!(gate.claim("m2", "other", "Alice").await.is_some());
        assert_eq!(gate.in_flight(), 1);

        first.commit().await.unwrap();
        assert_eq!(gate.in_flight(), 0);
        assert!(gate.claim("m1", "hello", "Alice").await.is_none());
        assert!(!gate.should_respond("m1", "hello", "Alice").await);
    }

    #[tokio::test]
    async fn test_dropped_claim_releases_unmarked() {
        let gate = gate(&["Alice"]);
        let claim = gate.claim("m1", "hello", "Alice").await.unwrap();
        drop(claim);
        assert_eq!(gate.in_flight(), 0);
        assert!(gate.should_respond("m1", "hello", "Alice").await);
        assert!(gate.claim("m1", "hello", "Alice").await.is_some());
    }

    #[tokio::test]
    async fn test_parallel_claims_yield_one_winner() {
        let gate = gate(&["Alice"]);
        let mut handles = Vec::new();
        for _ in 0..16 {
            let gate = gate.clone();
            handles.push(tokio::spawn(async move {
                match gate.claim("dup", "hello", "Alice").await {
                    Some(claim) => {
                        tokio::task::yield_now().await;
                        claim.commit().await.unwrap();
                        1
                    }
                    None => 0,
                }
            }));
        }
        let mut winners = 0;
        for handle in handles {
            winners += handle.await.unwrap();
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_ineligible_author_never_claims() {
        let gate = gate(&["Alice"]);
        assert!(gate.claim("m1", "hello", "Bob").await.is_none());
        assert_eq!(gate.in_flight(), 0);
    }

    #[tokio::test]
    async fn test_failed_commit_keeps_id_blocked() {
        let policy = SubstringPolicy::new(vec!["Alice".into()]);
        let gate = ResponseGate::new(Arc::new(policy), Arc::new(ReadOnlyAnswered));

        let claim = gate.claim("m1", "hello", "Alice").await.unwrap();
        assert!(claim.commit().await.is_err());
        assert_eq!(gate.in_flight(), 1);
        assert!(gate.claim("m1", "hello", "Alice").await.is_none());
        assert!(gate.claim("m2", "hello", "Alice").await.is_some());
    }
}
