//! Shared harness: fake plugin services served in-process on an ephemeral
//! port.

#![allow(dead_code, clippy::unwrap_used, clippy::panic)] // Each test binary uses a subset

use std::pin::Pin;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use futures::Stream;
use tokio::net::TcpListener;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::Status;
use tonic::transport::server::Router;

use drone_rpc::{ClientConfig, Drone, RetryPolicy};

/// Server-side response stream.
pub type FrameStream<T> = Pin<Box<dyn Stream<Item = Result<T, Status>> + Send>>;

/// Client config for a local test server: short retries, bounded attempts.
pub fn test_config(port: u16) -> ClientConfig {
    ClientConfig {
        connect_timeout_secs: 2,
        request_timeout_secs: 5,
        retry: RetryPolicy {
            initial_delay_ms: 10,
            max_delay_ms: 50,
            multiplier: 2.0,
            max_attempts: Some(2),
        },
        ..ClientConfig::new("127.0.0.1", port)
    }
}

/// Serve `router` on 127.0.0.1 and connect a client to it.
pub async fn serve(router: Router) -> Drone {
    serve_with(router, test_config).await
}

/// Like [`serve`], with the client config built from the bound port.
pub async fn serve_with(router: Router, config: impl FnOnce(u16) -> ClientConfig) -> Drone {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(router.serve_with_incoming(TcpListenerStream::new(listener)));
    Drone::connect(config(port)).await.unwrap()
}

/// A port nothing listens on.
pub async fn closed_port() -> u16 {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    drop(listener);
    port
}

/// Counts server-side streams that are still open.
#[derive(Debug, Clone, Default)]
pub struct StreamCounter {
    opened: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl StreamCounter {
    pub fn opened(&self) -> usize {
        self.opened.load(Ordering::SeqCst)
    }

    pub fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Stream `frames`, then either close or stay open until the client
    /// goes away.
    pub fn scripted<T: Send + 'static>(&self, frames: Vec<T>, hang: bool) -> FrameStream<T> {
        self.opened.fetch_add(1, Ordering::SeqCst);
        self.live.fetch_add(1, Ordering::SeqCst);
        let guard = LiveGuard(Arc::clone(&self.live));
        Box::pin(async_stream::stream! {
            let _guard = guard;
            for frame in frames {
                yield Ok(frame);
            }
            if hang {
                std::future::pending::<()>().await;
            }
        })
    }

    /// Wait until every server-side stream has been dropped.
    pub async fn wait_for_no_live_streams(&self) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while self.live() > 0 {
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .unwrap_or_else(|_| panic!("{} server stream(s) still open", self.live()));
    }
}

struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}
