pub mod auth;
pub mod channels;
pub mod messages;
pub mod middleware;
pub mod session;
