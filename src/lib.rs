pub mod clock;
pub mod config;
pub mod humanize;
pub mod jobs;
pub mod journal;
pub mod node;
pub mod observability;
pub mod server;
pub mod store;
