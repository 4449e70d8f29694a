pub mod clock;
pub mod constants;
pub mod engine;
pub mod entities;
pub mod error;
pub mod rng;
pub mod server;
pub mod server_protocol;
pub mod server_utils;
pub mod types;
pub mod world;
