//! Process-lifetime answered-message set.

use async_trait::async_trait;
use parley_core::{error::ParleyError, traits::AnsweredStore};
use std::collections::HashSet;
use std::sync::Mutex;

/// In-memory answered set. Entries live as long as the process.
#[derive(Default)]
pub struct InMemoryAnswered {
    ids: Mutex<HashSet<String>>,
}

impl InMemoryAnswered {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.ids.lock().map(|ids| ids.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl AnsweredStore for InMemoryAnswered {
    async fn contains(&self, message_id: &str) -> Result<bool, ParleyError> {
        let ids = self
            .ids
            .lock()
            .map_err(|_| ParleyError::Memory("answered set lock poisoned".into()))?;
        Ok(ids.contains(message_id))
    }

    async fn insert(&self, message_id: &str) -> Result<bool, ParleyError> {
        let mut ids = self
            .ids
            .lock()
            .map_err(|_| ParleyError::Memory("answered set lock poisoned".into()))?;
        Ok(ids.insert(message_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insert_reports_first_insert_only() {
        let set = InMemoryAnswered::new();
        assert!(!set.contains("m1").await.unwrap());
        assert!(set.insert("m1").await.unwrap());
        assert!(!set.insert("m1").await.unwrap());
        assert!(set.contains("m1").await.unwrap());
        assert_eq!(set.len(), 1);
    }
}
