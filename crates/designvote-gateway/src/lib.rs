//! Realtime channel: WebSocket connections, broadcast fan-out and the vote
//! event.

pub mod connection;
pub mod dispatcher;
pub mod votes;

use std::sync::Arc;

use designvote_db::Database;

use crate::dispatcher::Dispatcher;

/// Everything a connection needs; cheap to clone per socket.
#[derive(Clone)]
pub struct Gateway {
    pub dispatcher: Dispatcher,
    pub db: Arc<Database>,
    pub jwt_secret: Arc<str>,
}

impl Gateway {
    pub fn new(db: Arc<Database>, jwt_secret: &str) -> Self {
        Self {
            dispatcher: Dispatcher::new(),
            db,
            jwt_secret: Arc::from(jwt_secret),
        }
    }
}
