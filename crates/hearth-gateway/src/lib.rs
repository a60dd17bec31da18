pub mod channels;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod identity;
pub mod messages;
pub mod reactions;
pub mod service;

pub use dispatcher::Dispatcher;
pub use error::ChatError;
pub use service::{ChatService, ChatSettings};
