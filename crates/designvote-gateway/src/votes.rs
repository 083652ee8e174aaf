use tracing::{debug, error, warn};
use uuid::Uuid;

use designvote_db::StoreError;
use designvote_types::events::GatewayEvent;

use crate::Gateway;

#[derive(Debug, thiserror::Error)]
pub enum VoteError {
    #[error("malformed design id '{0}'")]
    MalformedId(String),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("spawn_blocking join error: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl VoteError {
    /// What the voter is told. Storage details stay in the log.
    pub fn client_message(&self) -> &'static str {
        match self {
            VoteError::MalformedId(_) | VoteError::Store(StoreError::NotFound(_)) => "Design not found",
            _ => "Backend error, failed to update vote",
        }
    }
}

/// Record one vote in its own unit of work and return the new total.
pub async fn cast_vote(gateway: &Gateway, design_id: &str) -> Result<(Uuid, i64), VoteError> {
    let id: Uuid = design_id
        .parse()
        .map_err(|_| VoteError::MalformedId(design_id.to_string()))?;

    let db = gateway.db.clone();
    let key = id.to_string();
    let votes = tokio::task::spawn_blocking(move || db.unit_of_work(|uow| uow.increment_votes(&key)))
        .await??;

    Ok((id, votes))
}

/// Handle a `vote` command: on success every open connection learns the new
/// total; on failure only `conn_id` hears about it.
pub async fn handle_vote(gateway: &Gateway, conn_id: Uuid, design_id: &str) {
    match cast_vote(gateway, design_id).await {
        Ok((design_id, votes)) => {
            debug!("Design {} now has {} votes", design_id, votes);
            gateway
                .dispatcher
                .broadcast(GatewayEvent::VoteSuccess { design_id, votes });
        }
        Err(e) => {
            match &e {
                VoteError::MalformedId(_) | VoteError::Store(StoreError::NotFound(_)) => {
                    warn!("Vote from {} rejected: {}", conn_id, e)
                }
                _ => error!("Vote from {} failed: {}", conn_id, e),
            }
            gateway
                .dispatcher
                .send_to_connection(
                    conn_id,
                    GatewayEvent::VoteError {
                        error: e.client_message().to_string(),
                    },
                )
                .await;
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use designvote_db::{Database, DesignRow};

    use super::*;

    fn gateway_with_design() -> (Gateway, DesignRow) {
        let db = Database::open_in_memory().unwrap();
        let design = DesignRow::new("https://blobs/a.png", None);
        db.unit_of_work(|uow| uow.insert_design(&design)).unwrap();
        (Gateway::new(Arc::new(db), "secret"), design)
    }

    fn stored_votes(gateway: &Gateway, id: &str) -> i64 {
        gateway
            .db
            .unit_of_work(|uow| uow.get_design(id))
            .unwrap()
            .unwrap()
            .votes
    }

    #[tokio::test]
    async fn vote_is_broadcast_to_all_with_stored_total() {
        let (gateway, design) = gateway_with_design();
        let (voter, mut voter_rx) = gateway.dispatcher.register_connection(Uuid::new_v4()).await;
        let mut voter_feed = gateway.dispatcher.subscribe();
        let mut other_feed = gateway.dispatcher.subscribe();

        handle_vote(&gateway, voter, &design.id).await;

        let expected = GatewayEvent::VoteSuccess {
            design_id: design.id.parse().unwrap(),
            votes: 1,
        };
        assert_eq!(voter_feed.recv().await.unwrap(), expected);
        assert_eq!(other_feed.recv().await.unwrap(), expected);
        assert!(voter_rx.try_recv().is_err());
        assert_eq!(stored_votes(&gateway, &design.id), 1);
    }

    #[tokio::test]
    async fn missing_design_errors_only_to_sender() {
        let (gateway, design) = gateway_with_design();
        let (voter, mut voter_rx) = gateway.dispatcher.register_connection(Uuid::new_v4()).await;
        let (_bystander, mut bystander_rx) = gateway.dispatcher.register_connection(Uuid::new_v4()).await;
        let mut feed = gateway.dispatcher.subscribe();

        handle_vote(&gateway, voter, &Uuid::new_v4().to_string()).await;

        assert_eq!(
            voter_rx.recv().await.unwrap(),
            GatewayEvent::VoteError { error: "Design not found".into() }
        );
        assert!(bystander_rx.try_recv().is_err());
        assert!(feed.try_recv().is_err());
        assert_eq!(stored_votes(&gateway, &design.id), 0);
    }

    #[tokio::test]
    async fn malformed_id_is_rejected() {
        let (gateway, _) = gateway_with_design();
        let err = cast_vote(&gateway, "not-a-uuid").await.unwrap_err();
        assert!(matches!(err, VoteError::MalformedId(_)));
    }

    #[tokio::test]
    async fn concurrent_votes_are_not_lost() {
        let (gateway, design) = gateway_with_design();

        let tasks: Vec<_> = (0..20)
            .map(|_| {
                let gateway = gateway.clone();
                let id = design.id.clone();
                tokio::spawn(async move { cast_vote(&gateway, &id).await.unwrap() })
            })
            .collect();
        for task in tasks {
            task.await.unwrap();
        }

        assert_eq!(stored_votes(&gateway, &design.id), 20);
    }
}
