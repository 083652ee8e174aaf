//! Wire types shared by the HTTP API, the realtime gateway and the server.

pub mod api;
pub mod events;
