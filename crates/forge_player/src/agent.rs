use async_trait::async_trait;

/// The network-layer session handle a [`crate::Player`] writes through.
/// Implemented by whatever transport owns the underlying connection.
#[async_trait]
pub trait Agent: Send + Sync {
    /// Sends a payload to the peer.
    async fn write(&self, payload: Vec<u8>);
    /// Sends a payload tagged with an application-defined status/opcode.
    async fn write_with_code(&self, code: u16, payload: Vec<u8>);
    /// Gracefully closes the connection.
    async fn close(&self);
    /// Tears the connection down immediately, releasing any resources.
    async fn destroy(&self);
}
