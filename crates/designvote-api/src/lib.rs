//! HTTP handlers for accounts, designs and comments.

pub mod auth;
pub mod blob;
pub mod comments;
pub mod designs;
pub mod error;
pub mod extract;
pub mod middleware;

pub use auth::{AppState, AppStateInner};
pub use error::AppError;
