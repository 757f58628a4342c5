//! Real-time relay: connection registry, fan-out, heartbeat, and the
//! per-client session loop.

pub mod broadcast;
pub mod connection;
pub mod gateway;
pub mod heartbeat;
pub mod registry;
pub mod session;
