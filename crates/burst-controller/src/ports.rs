use async_trait::async_trait;

/// Paints on the host page. Implementations report problems through their
/// return values and never error.
#[async_trait]
pub trait ActionSink: Send + Sync {
    /// Dispatches one paint action for `batch` units. `true` means the host
    /// accepted the commit, not that charges were spent.
    async fn perform_action(&self, batch: u32) -> bool;

    /// Charge count shown by the host, when it exposes one.
    async fn read_local_count(&self) -> Option<u32>;

    /// Re-centres the host view. Returns `true` on success.
    async fn recalibrate_view(&self) -> bool {
        false
    }
}

/// Asks the host to reload the whole session.
#[async_trait]
pub trait ReloadHook: Send + Sync {
    async fn request_reload(&self, reason: &str);
}
