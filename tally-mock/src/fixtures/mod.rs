pub mod ads;
pub mod analytics;
pub mod chat;
