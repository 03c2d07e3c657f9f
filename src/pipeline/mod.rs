//! Per-request check chain: real-client-address extraction runs first so
//! admission control keys on the genuine caller, admission runs before
//! authentication so an unauthenticated flood is still throttled, and a
//! successful authentication threads the verified identity into the
//! request for handlers to read. Any failure short-circuits the chain.

pub mod admission;
pub mod auth;
pub mod client_addr;
pub mod selector;
