//! RPC subscription adapter.
//!
//! Turns a server-streaming RPC into a shared stream:
//!
//! - the call is issued when the first subscriber attaches;
//! - every subscriber sees the frames of that single call, and a subscriber
//!   attaching mid-stream first receives the most recent item (replay of 1);
//! - a `success` frame completes the stream, a failure code ends it with
//!   [`Error::Protocol`], `next` frames are re-emitted as items;
//! - transport faults re-issue the call according to the [`RetryPolicy`];
//!   a rejected call or an undecodable frame ends the stream at once;
//! - dropping the last [`Subscription`] aborts the call, and the next
//!   subscriber starts a fresh one.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::task::{Context, Poll, ready};

use futures::stream::{self, BoxStream, Stream, StreamExt, TryStreamExt};
use tokio::runtime::Handle;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tracing::{debug, info, warn};

use crate::error::Error;
use crate::result::{Outcome, ReportedResult, ResultCode};
use crate::retry::RetryPolicy;

/// Default per-stream broadcast buffer.
pub const DEFAULT_STREAM_BUFFER: usize = 64;

/// Largest accepted per-stream broadcast buffer.
pub const MAX_STREAM_BUFFER: usize = 1 << 16;

/// A classified stream frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step<T> {
    /// Progress item; more frames follow.
    Next(T),
    /// Terminal success.
    Done,
}

impl<T> Step<T> {
    /// Classify a frame by its embedded result.
    ///
    /// `payload` is only evaluated for `next` frames.
    pub fn classify<R: ResultCode>(
        method: &str,
        reported: Option<ReportedResult>,
        payload: impl FnOnce() -> Result<T, Error<R>>,
    ) -> Result<Self, Error<R>> {
        let reported = reported
            .ok_or_else(|| Error::Internal(format!("{method} frame carried no result")))?;
        match R::from_code(reported.code).outcome() {
            Outcome::Success => Ok(Self::Done),
            Outcome::Next => payload().map(Self::Next),
            Outcome::Failure => Err(Error::protocol(reported)),
        }
    }
}

#[derive(Debug, Clone)]
enum Event<T, R: ResultCode> {
    Item(T),
    Completed,
    Failed(Error<R>),
}

type FrameStream<T, R> = BoxStream<'static, Result<Step<T>, Error<R>>>;
type Upstream<T, R> = Box<dyn Fn() -> FrameStream<T, R> + Send + Sync>;

/// Builder for [`SharedSubscription`].
pub struct SubscriptionBuilder {
    method: &'static str,
    retry: RetryPolicy,
    buffer: usize,
    completes_on_end: bool,
    runtime: Option<Handle>,
}

impl SubscriptionBuilder {
    /// Start building an adapter for `method`.
    pub fn new(method: &'static str) -> Self {
        Self {
            method,
            retry: RetryPolicy::default(),
            buffer: DEFAULT_STREAM_BUFFER,
            completes_on_end: false,
            runtime: None,
        }
    }

    /// Backoff used when the call fails at the transport level.
    #[must_use]
    pub fn retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// Broadcast buffer size, clamped to `1..=MAX_STREAM_BUFFER`.
    /// Subscribers falling further behind skip items.
    #[must_use]
    pub fn buffer(mut self, buffer: usize) -> Self {
        self.buffer = buffer.clamp(1, MAX_STREAM_BUFFER);
        self
    }

    /// Treat the server closing the stream as completion.
    ///
    /// Telemetry streams carry no result code and never send a terminal
    /// frame; for result-coded streams an early close is an internal error.
    #[must_use]
    pub const fn completes_on_end(mut self, completes: bool) -> Self {
        self.completes_on_end = completes;
        self
    }

    /// Spawn the call on this runtime instead of the ambient one.
    #[must_use]
    pub fn runtime(mut self, runtime: Handle) -> Self {
        self.runtime = Some(runtime);
        self
    }

    /// Finish the adapter.
    ///
    /// `open` issues the streaming call and `classify` turns each received
    /// message into a [`Step`] or an error.
    pub fn build<T, R, M, S, F, Fut, C>(self, open: F, classify: C) -> SharedSubscription<T, R>
    where
        T: Clone + Send + 'static,
        R: ResultCode,
        M: Send + 'static,
        S: Stream<Item = Result<M, tonic::Status>> + Send + 'static,
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<tonic::Response<S>, tonic::Status>> + Send + 'static,
        C: Fn(M) -> Result<Step<T>, Error<R>> + Send + Sync + 'static,
    {
        let classify = Arc::new(classify);
        let upstream: Upstream<T, R> = Box::new(move || {
            let classify = Arc::clone(&classify);
            stream::once(open())
                .map_ok(tonic::Response::into_inner)
                .try_flatten()
                .map(move |frame| match frame {
                    Ok(message) => classify(message),
                    Err(status) => Err(status.into()),
                })
                .boxed()
        });

        SharedSubscription {
            shared: Arc::new(Shared {
                method: self.method,
                upstream,
                retry: self.retry,
                buffer: self.buffer,
                completes_on_end: self.completes_on_end,
                runtime: self.runtime,
                slot: Mutex::new(Slot {
                    next_generation: 0,
                    run: None,
                }),
            }),
        }
    }
}

/// A lazily started, multicast, replay-latest-1 streaming call.
pub struct SharedSubscription<T, R: ResultCode> {
    shared: Arc<Shared<T, R>>,
}

impl<T, R: ResultCode> Clone for SharedSubscription<T, R> {
    fn clone(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
        }
    }
}

impl<T: Clone, R: ResultCode> fmt::Debug for SharedSubscription<T, R> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let subscribers = self
            .shared
            .lock()
            .run
            .as_ref()
            .map_or(0, |run| run.subscribers);
        f.debug_struct("SharedSubscription")
            .field("method", &self.shared.method)
            .field("subscribers", &subscribers)
            .finish_non_exhaustive()
    }
}

impl<T, R> SharedSubscription<T, R>
where
    T: Clone + Send + 'static,
    R: ResultCode,
{
    /// Attach a subscriber, issuing the call if none is in flight.
    ///
    /// # Panics
    ///
    /// Panics when no call is in flight and it is invoked outside a tokio
    /// runtime, unless a runtime handle was supplied to the builder.
    pub fn subscribe(&self) -> Subscription<T, R> {
        let mut slot = self.shared.lock();

        if let Some(run) = slot.run.as_mut() {
            run.subscribers += 1;
            debug!(
                method = self.shared.method,
                subscribers = run.subscribers,
                "Joined shared stream"
            );
            return Subscription {
                replay: run.latest.clone(),
                events: BroadcastStream::new(run.events.subscribe()),
                finished: false,
                method: self.shared.method,
                _attachment: Attachment {
                    shared: Arc::clone(&self.shared),
                    generation: run.generation,
                },
            };
        }

        let generation = slot.next_generation;
        slot.next_generation += 1;
        let (events, receiver) = broadcast::channel(self.shared.buffer);
        let driver = drive(Arc::clone(&self.shared), generation);
        let task = match &self.shared.runtime {
            Some(runtime) => runtime.spawn(driver),
            None => tokio::spawn(driver),
        };
        slot.run = Some(Run {
            generation,
            events,
            latest: None,
            subscribers: 1,
            task,
        });
        drop(slot);

        info!(method = self.shared.method, generation, "Starting stream");
        Subscription {
            replay: None,
            events: BroadcastStream::new(receiver),
            finished: false,
            method: self.shared.method,
            _attachment: Attachment {
                shared: Arc::clone(&self.shared),
                generation,
            },
        }
    }

    /// Whether a call is currently in flight.
    pub fn is_active(&self) -> bool {
        self.shared.lock().run.is_some()
    }

    /// Number of attached subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.shared.lock().run.as_ref().map_or(0, |run| run.subscribers)
    }
}

struct Shared<T, R: ResultCode> {
    method: &'static str,
    upstream: Upstream<T, R>,
    retry: RetryPolicy,
    buffer: usize,
    completes_on_end: bool,
    runtime: Option<Handle>,
    slot: Mutex<Slot<T, R>>,
}

struct Slot<T, R: ResultCode> {
    next_generation: u64,
    run: Option<Run<T, R>>,
}

/// One issued call and the subscribers attached to it.
struct Run<T, R: ResultCode> {
    generation: u64,
    events: broadcast::Sender<Event<T, R>>,
    latest: Option<T>,
    subscribers: usize,
    task: JoinHandle<()>,
}

impl<T: Clone, R: ResultCode> Shared<T, R> {
    fn lock(&self) -> MutexGuard<'_, Slot<T, R>> {
        self.slot.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Record and broadcast a progress item. Returns `false` if the run was
    /// cancelled underneath the driver.
    fn publish(&self, generation: u64, item: T) -> bool {
        let mut slot = self.lock();
        match slot.run.as_mut() {
            Some(run) if run.generation == generation => {
                run.latest = Some(item.clone());
                let _ = run.events.send(Event::Item(item));
                true
            }
            _ => false,
        }
    }

    /// Broadcast the terminal event and return to idle.
    fn finish(&self, generation: u64, event: Event<T, R>) {
        let mut slot = self.lock();
        if slot
            .run
            .as_ref()
            .is_some_and(|run| run.generation == generation)
            && let Some(run) = slot.run.take()
        {
            let _ = run.events.send(event);
        }
    }

    fn detach(&self, generation: u64) {
        let mut slot = self.lock();
        let remaining = match slot.run.as_mut() {
            Some(run) if run.generation == generation => {
                run.subscribers = run.subscribers.saturating_sub(1);
                run.subscribers
            }
            _ => return,
        };
        if remaining == 0
            && let Some(run) = slot.run.take()
        {
            run.task.abort();
            debug!(
                method = self.method,
                generation, "Last subscriber detached, cancelled stream"
            );
        }
    }
}

/// Drive one generation of the call until a terminal event.
async fn drive<T, R>(shared: Arc<Shared<T, R>>, generation: u64)
where
    T: Clone + Send + 'static,
    R: ResultCode,
{
    let method = shared.method;
    let mut attempt: u32 = 0;

    loop {
        let mut frames = (shared.upstream)();
        let fault = loop {
            match frames.next().await {
                Some(Ok(Step::Next(item))) => {
                    attempt = 0;
                    if !shared.publish(generation, item) {
                        return;
                    }
                }
                Some(Ok(Step::Done)) => {
                    debug!(method, generation, "Stream completed");
                    shared.finish(generation, Event::Completed);
                    return;
                }
                Some(Err(error)) => break error,
                None if shared.completes_on_end => {
                    debug!(method, generation, "Stream closed by server");
                    shared.finish(generation, Event::Completed);
                    return;
                }
                None => {
                    break Error::Internal(format!(
                        "{method} stream closed before a terminal result"
                    ));
                }
            }
        };
        drop(frames);

        if !fault.is_retryable() || !shared.retry.should_retry(attempt) {
            warn!(method, generation, error = %fault, "Stream failed");
            shared.finish(generation, Event::Failed(fault));
            return;
        }

        let delay = shared.retry.delay_for_attempt(attempt);
        warn!(
            method,
            error = %fault,
            attempt,
            delay_ms = delay.as_millis(),
            "Re-issuing stream after transport fault"
        );
        tokio::time::sleep(delay).await;
        attempt = attempt.saturating_add(1);
    }
}

/// Keeps a run alive while a subscriber holds it.
struct Attachment<T: Clone, R: ResultCode> {
    shared: Arc<Shared<T, R>>,
    generation: u64,
}

impl<T: Clone, R: ResultCode> Drop for Attachment<T, R> {
    fn drop(&mut self) {
        self.shared.detach(self.generation);
    }
}

/// One subscriber's view of a [`SharedSubscription`].
///
/// Yields progress items, then ends: cleanly on success, after one `Err` on
/// failure. Dropping it detaches.
pub struct Subscription<T: Clone, R: ResultCode> {
    replay: Option<T>,
    events: BroadcastStream<Event<T, R>>,
    finished: bool,
    method: &'static str,
    _attachment: Attachment<T, R>,
}

// Fields are never structurally pinned.
impl<T: Clone, R: ResultCode> Unpin for Subscription<T, R> {}

impl<T, R> Stream for Subscription<T, R>
where
    T: Clone + Send + 'static,
    R: ResultCode,
{
    type Item = Result<T, Error<R>>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        if this.finished {
            return Poll::Ready(None);
        }
        if let Some(item) = this.replay.take() {
            return Poll::Ready(Some(Ok(item)));
        }
        loop {
            match ready!(Pin::new(&mut this.events).poll_next(cx)) {
                Some(Ok(Event::Item(item))) => return Poll::Ready(Some(Ok(item))),
                Some(Ok(Event::Failed(error))) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(error)));
                }
                Some(Ok(Event::Completed)) | None => {
                    this.finished = true;
                    return Poll::Ready(None);
                }
                Some(Err(BroadcastStreamRecvError::Lagged(skipped))) => {
                    warn!(method = this.method, skipped, "Subscriber lagged, items skipped");
                }
            }
        }
    }
}
