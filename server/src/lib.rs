//! LAN chat relay server library.
//! This crate exposes internal modules for integration testing.
//! The binary entry point is in main.rs.

pub mod chat;
pub mod client;
pub mod config;
pub mod error;
pub mod proto;
pub mod relay;
pub mod server;
pub mod state;
