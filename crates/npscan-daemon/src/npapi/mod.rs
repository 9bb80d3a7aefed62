//! Neptune's Pride scanning API.

mod client;

pub use client::{ClientError, GameClient, HttpGameClient};
