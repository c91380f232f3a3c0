/*
 * Maelstrom client engine
 * Core library exports and module declarations
 */

pub mod config;
pub mod contract;
pub mod economics;
pub mod events;
pub mod executor;
pub mod locator;
pub mod models;
pub mod rpc;
pub mod service;
pub mod tokenlist;
pub mod trade;

pub use config::Config;
pub use models::*;
pub use service::PoolService;
