use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Opaque blob capturing what a skill needs to check on and undo its action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RollbackHandle {
    pub id: Uuid,
    pub skill_name: String,
    /// Id of the target the skill acted on.
    pub target_id: String,
    pub created_at: DateTime<Utc>,
    /// Skill-specific serialized state (operation ids, previous values).
    pub undo_state: serde_yaml::Value,
}

impl RollbackHandle {
    pub fn new(
        skill_name: impl Into<String>,
        target_id: impl Into<String>,
        undo_state: serde_yaml::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            skill_name: skill_name.into(),
            target_id: target_id.into(),
            created_at: Utc::now(),
            undo_state,
        }
    }
}

/// Ordered log of rollback handles for an experiment.
/// Rollback pops in LIFO (reverse) order.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct RollbackLog {
    entries: Vec<RollbackHandle>,
}

impl RollbackLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, handle: RollbackHandle) {
        self.entries.push(handle);
    }

    pub fn iter(&self) -> impl Iterator<Item = &RollbackHandle> {
        self.entries.iter()
    }

    /// Returns an iterator from most-recent to oldest (LIFO).
    pub fn iter_reverse(&self) -> impl Iterator<Item = &RollbackHandle> {
        self.entries.iter().rev()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn iter_reverse_is_lifo() {
        let mut log = RollbackLog::new();
        log.push(RollbackHandle::new("first", "a", serde_yaml::Value::Null));
        log.push(RollbackHandle::new("second", "b", serde_yaml::Value::Null));

        let order: Vec<_> = log.iter_reverse().map(|h| h.skill_name.as_str()).collect();
        assert_eq!(order, vec!["second", "first"]);
        assert_eq!(log.len(), 2);
    }
}
