//! The packet generator attached to the DUT's front-panel ports.

use async_trait::async_trait;
use sonic_everflow_common::EverflowResult;
use std::time::Duration;

/// Send and receive access to PTF ports.
///
/// Ports are addressed by PTF index. Frames are raw Ethernet bytes.
#[async_trait]
pub trait Dataplane: Send + Sync {
    /// Drops every frame received so far.
    async fn flush(&self) -> EverflowResult<()>;

    async fn send(&self, port: u32, frame: &[u8]) -> EverflowResult<()>;

    /// Waits up to `timeout` for the next frame on any of `ports`.
    async fn poll(&self, ports: &[u32], timeout: Duration) -> EverflowResult<Option<(u32, Vec<u8>)>>;
}
