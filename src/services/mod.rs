pub mod canvas;
pub mod feed;
pub mod indexer;
pub mod node;
pub mod pending;
