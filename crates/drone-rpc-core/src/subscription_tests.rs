//! Tests for the subscription adapter, driven by a scripted fake server.

#![allow(clippy::unwrap_used, clippy::panic)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::stream::{self, BoxStream, Stream, StreamExt};
use tonic::Status;

use crate::error::Error;
use crate::result::ReportedResult;
use crate::retry::RetryPolicy;
use crate::subscription::{SharedSubscription, Step, Subscription, SubscriptionBuilder};

crate::result_code! {
    enum CalResult {
        service: "calibration",
        success: Success,
        next: [Next],
        codes: {
            Unknown = 0,
            Success = 1,
            Next = 2,
            Busy = 6,
            Cancelled = 9,
        }
    }
}

#[derive(Debug, Clone)]
struct Frame {
    code: i32,
    message: &'static str,
    progress: f32,
}

fn progress(progress: f32) -> Result<Frame, Status> {
    Ok(Frame {
        code: 2,
        message: "",
        progress,
    })
}

fn success() -> Result<Frame, Status> {
    Ok(Frame {
        code: 1,
        message: "",
        progress: 0.0,
    })
}

fn failed(code: i32, message: &'static str) -> Result<Frame, Status> {
    Ok(Frame {
        code,
        message,
        progress: 0.0,
    })
}

fn classify(frame: Frame) -> Result<Step<f32>, Error<CalResult>> {
    Step::classify(
        "Test/Calibrate",
        Some(ReportedResult::new(frame.code, frame.message)),
        || Ok(frame.progress),
    )
}

/// What a scripted call does after its frames run out.
enum Tail {
    /// Server closes the stream.
    End,
    /// Server keeps the stream open.
    Hang,
}

struct Script {
    frames: Vec<Result<Frame, Status>>,
    tail: Tail,
}

fn script(frames: Vec<Result<Frame, Status>>, tail: Tail) -> Script {
    Script { frames, tail }
}

/// Counts open server streams.
struct LiveGuard(Arc<AtomicUsize>);

impl Drop for LiveGuard {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

struct Tracked {
    inner: BoxStream<'static, Result<Frame, Status>>,
    _guard: LiveGuard,
}

impl Stream for Tracked {
    type Item = Result<Frame, Status>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.inner.poll_next_unpin(cx)
    }
}

/// Each call pops the next script; calls past the last script hang silently.
#[derive(Clone)]
struct FakeServer {
    scripts: Arc<Mutex<VecDeque<Script>>>,
    calls: Arc<AtomicUsize>,
    live: Arc<AtomicUsize>,
}

impl FakeServer {
    fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Arc::new(Mutex::new(scripts.into())),
            calls: Arc::new(AtomicUsize::new(0)),
            live: Arc::new(AtomicUsize::new(0)),
        }
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn live(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    fn open(
        &self,
    ) -> impl Future<Output = Result<tonic::Response<Tracked>, Status>> + Send + 'static + use<> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self
            .scripts
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| script(Vec::new(), Tail::Hang));
        self.live.fetch_add(1, Ordering::SeqCst);

        let frames = stream::iter(next.frames);
        let inner = match next.tail {
            Tail::End => frames.boxed(),
            Tail::Hang => frames.chain(stream::pending()).boxed(),
        };
        let tracked = Tracked {
            inner,
            _guard: LiveGuard(Arc::clone(&self.live)),
        };
        async move { Ok(tonic::Response::new(tracked)) }
    }
}

const fn fast_retry() -> RetryPolicy {
    RetryPolicy {
        initial_delay_ms: 1,
        max_delay_ms: 5,
        multiplier: 2.0,
        max_attempts: None,
    }
}

fn adapter_with(
    server: &FakeServer,
    builder: SubscriptionBuilder,
) -> SharedSubscription<f32, CalResult> {
    let server = server.clone();
    builder.build(move || server.open(), classify)
}

fn adapter(server: &FakeServer) -> SharedSubscription<f32, CalResult> {
    adapter_with(server, SubscriptionBuilder::new("Test/Calibrate").retry(fast_retry()))
}

/// Read a subscription to its end.
async fn drain(mut sub: Subscription<f32, CalResult>) -> (Vec<f32>, Option<Error<CalResult>>) {
    let mut items = Vec::new();
    let mut error = None;
    while let Some(next) = tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .unwrap()
    {
        match next {
            Ok(item) => {
                assert!(error.is_none(), "item {item} delivered after the error");
                items.push(item);
            }
            Err(e) => error = Some(e),
        }
    }
    (items, error)
}

async fn next_item(sub: &mut Subscription<f32, CalResult>) -> f32 {
    tokio::time::timeout(Duration::from_secs(5), sub.next())
        .await
        .unwrap()
        .unwrap()
        .unwrap()
}

async fn stays_quiet(sub: &mut Subscription<f32, CalResult>) -> bool {
    tokio::time::timeout(Duration::from_millis(50), sub.next())
        .await
        .is_err()
}

async fn wait_for_no_live_streams(server: &FakeServer) {
    for _ in 0..200 {
        if server.live() == 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("server stream was never released");
}

// =========================================================================
// Classification
// =========================================================================

#[tokio::test]
async fn progress_then_success_completes() {
    let server = FakeServer::new(vec![script(
        vec![progress(10.0), progress(50.0), progress(90.0), success()],
        Tail::Hang,
    )]);
    let calibration = adapter(&server);

    let (items, error) = drain(calibration.subscribe()).await;

    assert_eq!(items, vec![10.0, 50.0, 90.0]);
    assert!(error.is_none());
    assert_eq!(server.calls(), 1);
    assert!(!calibration.is_active());
}

#[tokio::test]
async fn no_items_after_success() {
    let server = FakeServer::new(vec![script(
        vec![progress(10.0), success(), progress(99.0)],
        Tail::Hang,
    )]);

    let (items, error) = drain(adapter(&server).subscribe()).await;

    assert_eq!(items, vec![10.0]);
    assert!(error.is_none());
}

#[tokio::test]
async fn failure_code_ends_stream_with_that_code() {
    let server = FakeServer::new(vec![script(
        vec![progress(10.0), failed(6, "busy"), progress(20.0)],
        Tail::Hang,
    )]);

    let (items, error) = drain(adapter(&server).subscribe()).await;

    assert_eq!(items, vec![10.0]);
    match error {
        Some(Error::Protocol { result, message }) => {
            assert_eq!(result, CalResult::Busy);
            assert_eq!(message, "busy");
        }
        other => panic!("expected protocol failure, got {other:?}"),
    }
    assert_eq!(server.calls(), 1);
}

#[tokio::test]
async fn unknown_code_is_a_failure_with_its_value() {
    let server = FakeServer::new(vec![script(vec![failed(42, "newer server")], Tail::Hang)]);

    let (_, error) = drain(adapter(&server).subscribe()).await;

    assert_eq!(
        error.and_then(|e| e.result()),
        Some(CalResult::Unrecognized(42))
    );
}

#[tokio::test]
async fn early_close_is_an_internal_error() {
    let server = FakeServer::new(vec![script(vec![progress(10.0)], Tail::End)]);

    let (items, error) = drain(adapter(&server).subscribe()).await;

    assert_eq!(items, vec![10.0]);
    assert!(matches!(error, Some(Error::Internal(_))));
    assert_eq!(server.calls(), 1);
}

#[tokio::test]
async fn early_close_completes_a_telemetry_stream() {
    let server = FakeServer::new(vec![script(vec![progress(10.0)], Tail::End)]);
    let telemetry = adapter_with(
        &server,
        SubscriptionBuilder::new("Test/Telemetry").completes_on_end(true),
    );

    let (items, error) = drain(telemetry.subscribe()).await;

    assert_eq!(items, vec![10.0]);
    assert!(error.is_none());
}

// =========================================================================
// Sharing and replay
// =========================================================================

#[tokio::test]
async fn concurrent_subscribers_share_one_call() {
    let server = FakeServer::new(vec![script(
        vec![progress(10.0), progress(50.0), success()],
        Tail::Hang,
    )]);
    let calibration = adapter(&server);

    let first = calibration.subscribe();
    let second = calibration.subscribe();
    assert_eq!(calibration.subscriber_count(), 2);

    let ((a, _), (b, _)) = tokio::join!(drain(first), drain(second));

    assert_eq!(a, vec![10.0, 50.0]);
    assert_eq!(b, vec![10.0, 50.0]);
    assert_eq!(server.calls(), 1);
}

#[tokio::test]
async fn late_subscriber_replays_latest_only() {
    let server = FakeServer::new(vec![script(
        vec![progress(10.0), progress(50.0)],
        Tail::Hang,
    )]);
    let calibration = adapter(&server);

    let mut first = calibration.subscribe();
    assert_eq!(next_item(&mut first).await, 10.0);
    assert_eq!(next_item(&mut first).await, 50.0);

    let mut late = calibration.subscribe();
    assert_eq!(next_item(&mut late).await, 50.0);
    assert!(stays_quiet(&mut late).await);
    assert_eq!(server.calls(), 1);
}

#[tokio::test]
async fn lagging_subscriber_skips_to_retained_items() {
    let server = FakeServer::new(vec![script(
        vec![
            progress(1.0),
            progress(2.0),
            progress(3.0),
            progress(4.0),
            progress(5.0),
            success(),
        ],
        Tail::Hang,
    )]);
    let calibration = adapter_with(&server, SubscriptionBuilder::new("Test/Calibrate").buffer(2));

    let slow = calibration.subscribe();
    // Let the driver publish everything before the subscriber reads.
    tokio::time::sleep(Duration::from_millis(20)).await;

    let (items, error) = drain(slow).await;
    assert_eq!(items, vec![5.0]);
    assert!(error.is_none());
}

// =========================================================================
// Cancellation
// =========================================================================

#[tokio::test]
async fn dropping_last_subscriber_cancels_call() {
    let server = FakeServer::new(vec![script(vec![progress(10.0)], Tail::Hang)]);
    let calibration = adapter(&server);

    let mut sub = calibration.subscribe();
    assert_eq!(next_item(&mut sub).await, 10.0);
    assert_eq!(server.live(), 1);

    drop(sub);
    assert!(!calibration.is_active());
    wait_for_no_live_streams(&server).await;
    assert_eq!(server.calls(), 1);
}

#[tokio::test]
async fn remaining_subscriber_keeps_call_alive() {
    let server = FakeServer::new(vec![script(vec![progress(10.0)], Tail::Hang)]);
    let calibration = adapter(&server);

    let leaving = calibration.subscribe();
    let mut staying = calibration.subscribe();
    drop(leaving);

    assert_eq!(next_item(&mut staying).await, 10.0);
    assert!(calibration.is_active());
    assert_eq!(calibration.subscriber_count(), 1);
    assert_eq!(server.live(), 1);
}

#[tokio::test]
async fn resubscribing_after_cancel_reissues_call() {
    let server = FakeServer::new(vec![
        script(vec![progress(10.0)], Tail::Hang),
        script(vec![progress(20.0)], Tail::Hang),
    ]);
    let calibration = adapter(&server);

    let mut sub = calibration.subscribe();
    assert_eq!(next_item(&mut sub).await, 10.0);
    drop(sub);
    wait_for_no_live_streams(&server).await;

    let mut again = calibration.subscribe();
    assert_eq!(next_item(&mut again).await, 20.0);
    assert_eq!(server.calls(), 2);
}

#[tokio::test]
async fn completed_stream_restarts_on_next_subscribe() {
    let server = FakeServer::new(vec![
        script(vec![progress(10.0), success()], Tail::Hang),
        script(vec![progress(20.0), success()], Tail::Hang),
    ]);
    let calibration = adapter(&server);

    let (first, _) = drain(calibration.subscribe()).await;
    let (second, _) = drain(calibration.subscribe()).await;

    assert_eq!(first, vec![10.0]);
    assert_eq!(second, vec![20.0]);
    assert_eq!(server.calls(), 2);
}

// =========================================================================
// Retry
// =========================================================================

#[tokio::test]
async fn transport_fault_reissues_call() {
    let server = FakeServer::new(vec![
        script(
            vec![progress(10.0), Err(Status::unavailable("connection reset"))],
            Tail::End,
        ),
        script(vec![progress(50.0), success()], Tail::Hang),
    ]);

    let (items, error) = drain(adapter(&server).subscribe()).await;

    assert_eq!(items, vec![10.0, 50.0]);
    assert!(error.is_none());
    assert_eq!(server.calls(), 2);
}

#[tokio::test]
async fn protocol_failure_is_not_retried() {
    let server = FakeServer::new(vec![
        script(vec![failed(9, "cancelled by user")], Tail::Hang),
        script(vec![success()], Tail::Hang),
    ]);

    let (_, error) = drain(adapter(&server).subscribe()).await;

    assert_eq!(error.and_then(|e| e.result()), Some(CalResult::Cancelled));
    assert_eq!(server.calls(), 1);
}

#[tokio::test]
async fn rejected_call_ends_stream_under_default_policy() {
    let server = FakeServer::new(vec![
        script(vec![Err(Status::unimplemented("no magnetometer"))], Tail::End),
        script(vec![success()], Tail::Hang),
    ]);
    let calibration = adapter_with(&server, SubscriptionBuilder::new("Test/Calibrate"));

    let (items, error) = drain(calibration.subscribe()).await;

    assert!(items.is_empty());
    match error {
        Some(Error::Rejected(status)) => assert_eq!(status.code(), tonic::Code::Unimplemented),
        other => panic!("expected rejected call, got {other:?}"),
    }
    assert_eq!(server.calls(), 1);
    assert!(!calibration.is_active());
}

#[tokio::test]
async fn undecodable_frame_is_internal_error_under_default_policy() {
    let server = FakeServer::new(vec![
        script(
            vec![
                progress(10.0),
                Err(Status::internal("failed to decode Protobuf message")),
            ],
            Tail::Hang,
        ),
        script(vec![success()], Tail::Hang),
    ]);
    let calibration = adapter_with(&server, SubscriptionBuilder::new("Test/Calibrate"));

    let (items, error) = drain(calibration.subscribe()).await;

    assert_eq!(items, vec![10.0]);
    assert!(matches!(error, Some(Error::Internal(_))), "{error:?}");
    assert_eq!(server.calls(), 1);
    wait_for_no_live_streams(&server).await;
}

#[tokio::test]
async fn retry_gives_up_after_max_attempts() {
    let unavailable = || script(vec![Err(Status::unavailable("no route"))], Tail::End);
    let server = FakeServer::new(vec![unavailable(), unavailable(), unavailable()]);
    let calibration = adapter_with(
        &server,
        SubscriptionBuilder::new("Test/Calibrate").retry(RetryPolicy {
            max_attempts: Some(2),
            ..fast_retry()
        }),
    );

    let (items, error) = drain(calibration.subscribe()).await;

    assert!(items.is_empty());
    assert!(error.is_some_and(|e| e.is_retryable()));
    assert_eq!(server.calls(), 3);
}

#[test]
#[should_panic]
fn subscribing_outside_runtime_panics() {
    let server = FakeServer::new(vec![script(vec![success()], Tail::Hang)]);
    let _sub = adapter(&server).subscribe();
}

#[test]
fn runtime_handle_allows_subscribing_outside_runtime() {
    let runtime = tokio::runtime::Runtime::new().unwrap();
    let server = FakeServer::new(vec![script(
        vec![progress(10.0), success()],
        Tail::Hang,
    )]);
    let calibration = adapter_with(
        &server,
        SubscriptionBuilder::new("Test/Calibrate").runtime(runtime.handle().clone()),
    );

    let sub = calibration.subscribe();
    let (items, error) = runtime.block_on(drain(sub));

    assert_eq!(items, vec![10.0]);
    assert!(error.is_none());
}

#[tokio::test]
async fn oversized_buffer_is_clamped() {
    let server = FakeServer::new(vec![script(
        vec![progress(10.0), success()],
        Tail::Hang,
    )]);
    let calibration = adapter_with(
        &server,
        SubscriptionBuilder::new("Test/Calibrate").buffer(usize::MAX),
    );

    let (items, error) = drain(calibration.subscribe()).await;

    assert_eq!(items, vec![10.0]);
    assert!(error.is_none());
}

#[tokio::test]
async fn debug_shows_method_and_subscribers() {
    let server = FakeServer::new(vec![script(vec![progress(10.0)], Tail::Hang)]);
    let calibration = adapter(&server);
    let _sub = calibration.subscribe();

    let debug = format!("{calibration:?}");
    assert!(debug.contains("Test/Calibrate"), "{debug}");
    assert!(debug.contains("subscribers: 1"), "{debug}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn runs_on_supplied_runtime_handle() {
    let server = FakeServer::new(vec![script(
        vec![progress(10.0), progress(90.0), success()],
        Tail::Hang,
    )]);
    let calibration = adapter_with(
        &server,
        SubscriptionBuilder::new("Test/Calibrate").runtime(tokio::runtime::Handle::current()),
    );

    let (items, error) = drain(calibration.subscribe()).await;

    assert_eq!(items, vec![10.0, 90.0]);
    assert!(error.is_none());
}
