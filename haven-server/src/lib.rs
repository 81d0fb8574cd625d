pub mod chat;
pub mod http;
