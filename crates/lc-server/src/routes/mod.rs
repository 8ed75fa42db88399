//! Route handlers for the HTTP API.

pub mod admin;
pub mod delivery;
pub mod events;
pub mod health;
pub mod status;
