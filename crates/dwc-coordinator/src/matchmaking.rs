//! Matchmaking group membership.
//!
//! Only membership is tracked here. Pairing and room sizing are left to the
//! protocol layer.

use std::sync::Arc;

use dwc_core::liveness::Clock;
use tracing::info;

use crate::error::Result;
use crate::storage::{Pending, Profile, StateDatabase};

#[derive(Clone)]
pub struct MatchmakingQueue {
    db: StateDatabase,
    clock: Arc<dyn Clock>,
}

impl MatchmakingQueue {
    pub fn new(db: StateDatabase, clock: Arc<dyn Clock>) -> Self {
        Self { db, clock }
    }

    /// Add a profile to a group. Joining twice returns the existing entry.
    pub async fn join(&self, profile_id: i64, group_id: i64) -> Result<Pending> {
        self.db.get_profile(profile_id).await?;
        let pending = self.db.join_pending(profile_id, group_id, self.clock.now()).await?;
        info!(profile_id, group_id, "Joined matchmaking group");
        Ok(pending)
    }

    /// Returns `false` if the profile was not in the group.
    pub async fn leave(&self, profile_id: i64, group_id: i64) -> Result<bool> {
        let removed = self.db.leave_pending(profile_id, group_id).await?;
        if removed {
            info!(profile_id, group_id, "Left matchmaking group");
        }
        Ok(removed)
    }

    /// Current occupants in join order.
    pub async fn members_of(&self, group_id: i64) -> Result<Vec<Profile>> {
        Ok(self.db.list_pending_profiles(group_id).await?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::error::CoordinatorError;
    use crate::storage::ProfileAttrs;
    use dwc_core::liveness::ManualClock;

    async fn queue_with_profiles(n: usize) -> (MatchmakingQueue, Vec<i64>) {
        let db = StateDatabase::open_in_memory().await.unwrap();
        let mut ids = Vec::with_capacity(n);
        for i in 0..n {
            let (profile, _) = db
                .get_or_create_profile(&format!("user{i}"), "ADAJ", &ProfileAttrs::default(), 0, |id| {
                    Some(format!("cfc-{id}"))
                })
                .await
                .unwrap();
            ids.push(profile.profile_id);
        }
        let queue = MatchmakingQueue::new(db, Arc::new(ManualClock::new(1_700_000_000)));
        (queue, ids)
    }

    #[tokio::test]
    async fn join_twice_then_leave_twice() {
        let (queue, ids) = queue_with_profiles(1).await;
        let first = queue.join(ids[0], 9).await.unwrap();
        let second = queue.join(ids[0], 9).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(queue.members_of(9).await.unwrap().len(), 1);

        assert!(queue.leave(ids[0], 9).await.unwrap());
        assert!(!queue.leave(ids[0], 9).await.unwrap());
        assert!(queue.members_of(9).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn members_in_join_order_per_group() {
        let (queue, ids) = queue_with_profiles(3).await;
        queue.join(ids[2], 1).await.unwrap();
        queue.join(ids[0], 1).await.unwrap();
        queue.join(ids[1], 2).await.unwrap();

        let members: Vec<i64> = queue
            .members_of(1)
            .await
            .unwrap()
            .iter()
            .map(|p| p.profile_id)
            .collect();
        assert_eq!(members, vec![ids[2], ids[0]]);
        assert_eq!(queue.members_of(2).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn join_unknown_profile_not_found() {
        let (queue, _) = queue_with_profiles(0).await;
        assert!(matches!(
            queue.join(5, 9).await,
            Err(CoordinatorError::NotFound(_))
        ));
    }
}
