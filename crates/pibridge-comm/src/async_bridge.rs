//! Tokio front end for [`PiBridge`].
//!
//! Bus calls block on the guard and on the medium, so each one runs on the
//! blocking pool and never stalls a runtime worker.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;

use crate::bridge::PiBridge;
use crate::error::Result;
use crate::router::Target;
use crate::stats::StatsSnapshot;
use crate::transaction::Response;

/// Cloneable async handle to a shared [`PiBridge`].
#[derive(Debug, Clone)]
pub struct AsyncPiBridge {
    inner: Arc<PiBridge>,
}

impl AsyncPiBridge {
    /// Wrap a bridge.
    pub fn new(bridge: PiBridge) -> Self {
        Self {
            inner: Arc::new(bridge),
        }
    }

    /// The blocking bridge underneath.
    pub fn blocking(&self) -> &PiBridge {
        &self.inner
    }

    /// Current counter values.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats()
    }

    /// Async form of [`PiBridge::request`].
    pub async fn request(
        &self,
        target: Target,
        command: u16,
        payload: impl Into<Bytes>,
        max_len: usize,
        timeout: Option<Duration>,
    ) -> Result<Response> {
        let payload = payload.into();
        self.run(move |bridge| bridge.request(target, command, &payload, max_len, timeout))
            .await
    }

    /// Async form of [`PiBridge::send_to`].
    pub async fn send_to(&self, target: Target, command: u16, payload: impl Into<Bytes>) -> Result<()> {
        let payload = payload.into();
        self.run(move |bridge| bridge.send_to(target, command, &payload))
            .await
    }

    /// Async form of [`PiBridge::send`].
    pub async fn send(&self, data: impl Into<Bytes>) -> Result<()> {
        let data = data.into();
        self.run(move |bridge| bridge.send(&data)).await
    }

    /// Async form of [`PiBridge::recv_timeout`]; collects up to `len` bytes.
    pub async fn recv_timeout(&self, len: usize, timeout: Duration) -> Result<Bytes> {
        self.run(move |bridge| {
            let mut buf = vec![0u8; len];
            let n = bridge.recv_timeout(&mut buf, timeout)?;
            buf.truncate(n);
            Ok(Bytes::from(buf))
        })
        .await
    }

    /// Async form of [`PiBridge::clear_fifo`].
    pub async fn clear_fifo(&self) -> Result<()> {
        self.run(|bridge| bridge.clear_fifo()).await
    }

    async fn run<T, F>(&self, call: F) -> Result<T>
    where
        T: Send + 'static,
        F: FnOnce(&PiBridge) -> Result<T> + Send + 'static,
    {
        let bridge = Arc::clone(&self.inner);
        tokio::task::spawn_blocking(move || call(&bridge)).await?
    }
}

impl From<PiBridge> for AsyncPiBridge {
    fn from(bridge: PiBridge) -> Self {
        Self::new(bridge)
    }
}
