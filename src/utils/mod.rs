pub mod schedule;
pub mod security;
pub mod server;
pub mod time;
