pub mod api;
pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod moderation;
pub mod query;
pub mod repository;
pub mod schema;
pub mod settings;
pub mod slug;
pub mod state;
pub mod storage;

pub mod server;
