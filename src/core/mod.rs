pub mod classify;
pub mod error;
pub mod events;
pub mod render;
pub mod utils;
