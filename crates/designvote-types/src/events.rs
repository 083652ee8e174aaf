use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Events sent over the realtime gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayEvent {
    /// Server confirms the connection is open
    Ready { user_id: Uuid, username: String },

    /// A vote was recorded; sent to every open connection
    VoteSuccess { design_id: Uuid, votes: i64 },

    /// A vote failed; sent only to the connection that cast it
    VoteError { error: String },
}

/// Commands sent FROM client TO server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum GatewayCommand {
    /// Authenticate a connection that did not pass a token on upgrade
    Identify { token: String },

    /// Cast one vote for a design. The id is kept as a raw string so that a
    /// malformed id can be answered with `vote_error` instead of being
    /// dropped as an unparseable frame.
    Vote { design_id: String },
}
