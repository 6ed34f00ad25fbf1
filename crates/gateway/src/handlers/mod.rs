//! API handlers module

pub mod digests;
pub mod health;
pub mod refresh;
pub mod stories;
pub mod timelines;
