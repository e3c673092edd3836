//! SeaORM entity definitions for the durable store.

pub mod alias;
pub mod application;
pub mod owner;
pub mod release;
