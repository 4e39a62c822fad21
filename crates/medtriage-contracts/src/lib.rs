pub mod analysis;
pub mod chat;
pub mod errors;
pub mod events;
pub mod models;
