//! Live notification stream over server-sent events.
//!
//! One [`NotificationCenter`] owns one notification list and at most one live
//! subscription at a time:
//! 1. `open` spawns a background worker and returns a [`Subscription`]
//! 2. The worker GETs `/events?user_id=..&role=..` and parses the SSE body
//! 3. Each `message` event is ingested: parsed, given a local id, prepended,
//!    announced with an alert and forwarded to the subscription
//! 4. On transport errors the worker reconnects with backoff; events already
//!    in the list are kept
//! 5. `close` (or dropping the subscription) cancels the worker

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::task::{Context, Poll};
use std::time::Duration;

use futures::Stream;
use futures_util::StreamExt;
use reqwest::header::ACCEPT;
use serde_json::Value;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};
use url::Url;

use super::alert::AlertGate;
use super::feed::{NotificationFeed, ReadAcknowledger};
use super::list::NotificationList;
use super::normalize::{EMPTY_MESSAGE, text_of};
use super::NotificationError;
use crate::api::{ApiClient, ApiError, AuthMode};
use crate::models::{NotificationEvent, NotificationId, OrderReference};
use crate::session::{GUEST, SessionIdentity};

/// First reconnect delay without a server `retry` hint.
const INITIAL_RETRY: Duration = Duration::from_secs(1);
/// Upper bound for the reconnect delay.
const MAX_RETRY: Duration = Duration::from_secs(30);
/// Events a subscription holds for a caller that is not reading them.
const EVENT_BUFFER: usize = 64;

/// Lifecycle of the live subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamState {
    Unsubscribed,
    Connecting,
    Open,
    Closed,
}

struct Inner {
    feed: NotificationFeed,
    alert: AlertGate,
    state: watch::Sender<StreamState>,
    /// Generation and token of the live subscription, if any.
    active: Mutex<Option<(u64, CancellationToken)>>,
    generation: AtomicU64,
}

impl Inner {
    /// Update the state on behalf of subscription `generation`, unless a
    /// newer subscription has taken over.
    fn set_state(&self, generation: u64, state: StreamState) {
        let active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|(g, _)| *g == generation) {
            self.state.send_replace(state);
        }
    }

    fn release(&self, generation: u64) {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|(g, _)| *g == generation) {
            if let Some((_, token)) = active.take() {
                token.cancel();
            }
            self.state.send_replace(StreamState::Closed);
        }
    }
}

/// Owner of the live notification list and its subscription.
#[derive(Clone)]
pub struct NotificationCenter {
    api: ApiClient,
    inner: Arc<Inner>,
}

impl NotificationCenter {
    /// A center whose read acknowledgements go to the backend through `api`.
    pub fn new(api: ApiClient, alert: AlertGate) -> Self {
        let ack: Arc<dyn ReadAcknowledger> = Arc::new(api.clone());
        Self::with_acknowledger(api, ack, alert)
    }

    pub fn with_acknowledger(
        api: ApiClient,
        ack: Arc<dyn ReadAcknowledger>,
        alert: AlertGate,
    ) -> Self {
        let (state, _) = watch::channel(StreamState::Unsubscribed);
        Self {
            api,
            inner: Arc::new(Inner {
                feed: NotificationFeed::new(NotificationList::new(), ack),
                alert,
                state,
                active: Mutex::new(None),
                generation: AtomicU64::new(0),
            }),
        }
    }

    /// The list fed by the stream.
    pub fn feed(&self) -> &NotificationFeed {
        &self.inner.feed
    }

    pub fn notifications(&self) -> NotificationList {
        self.inner.feed.snapshot()
    }

    pub fn unread_count(&self) -> usize {
        self.inner.feed.unread_count()
    }

    pub fn mark_all_as_read(&self) {
        self.inner.feed.mark_all_as_read();
    }

    pub async fn mark_as_read(&self, id: &NotificationId) -> Result<(), NotificationError> {
        self.inner.feed.mark_as_read(id).await
    }

    pub fn state(&self) -> StreamState {
        *self.inner.state.borrow()
    }

    pub fn watch_state(&self) -> watch::Receiver<StreamState> {
        self.inner.state.subscribe()
    }

    /// Forward a user interaction to the alert gate.
    pub fn user_interacted(&self) {
        self.inner.alert.user_interacted();
    }

    /// Subscribe with the identity in the session store (`guest` if none).
    pub fn open_for_session(&self) -> Result<Subscription, NotificationError> {
        let identity = self.api.session().identity();
        self.open(&identity.user_id, &identity.role)
    }

    /// Open the live subscription for `user_id` and `role`.
    ///
    /// Must be called inside a Tokio runtime. Fails with
    /// [`NotificationError::AlreadySubscribed`] while another subscription of
    /// this center is live.
    pub fn open(&self, user_id: &str, role: &str) -> Result<Subscription, NotificationError> {
        let or_guest = |s: &str| (if s.is_empty() { GUEST } else { s }).to_string();
        let identity = SessionIdentity {
            user_id: or_guest(user_id),
            role: or_guest(role),
        };
        let mut url = Url::parse(&self.api.config().events_url()).map_err(ApiError::from)?;
        url.query_pairs_mut()
            .append_pair("user_id", &identity.user_id)
            .append_pair("role", &identity.role);

        let mut active = self
            .inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if active.as_ref().is_some_and(|(_, t)| !t.is_cancelled()) {
            return Err(NotificationError::AlreadySubscribed);
        }
        let generation = self.inner.generation.fetch_add(1, Ordering::Relaxed) + 1;
        let cancel = CancellationToken::new();
        *active = Some((generation, cancel.clone()));
        self.inner.state.send_replace(StreamState::Connecting);
        drop(active);

        debug!(user_id = %identity.user_id, role = %identity.role, "opening notification stream");

        let (tx, rx) = mpsc::channel(EVENT_BUFFER);
        let worker = Worker {
            center: self.clone(),
            url,
            tx,
            cancel: cancel.clone(),
            generation,
        };
        let handle = tokio::spawn(worker.run());

        Ok(Subscription {
            inner: Arc::clone(&self.inner),
            rx,
            cancel,
            handle: Some(handle),
            generation,
        })
    }

    /// React to one pushed message.
    ///
    /// Payloads that are not JSON are dropped. Any JSON value yields a new
    /// unread event with a local id and the receipt time; `message` and
    /// `order` are read from objects only. The event is prepended and the
    /// alert fires once.
    pub fn ingest(&self, data: &str) -> Option<NotificationEvent> {
        let push: Value = match serde_json::from_str(data) {
            Ok(push) => push,
            Err(e) => {
                warn!("dropping malformed notification push: {e}");
                return None;
            }
        };
        let obj = push.as_object();
        let message = obj
            .and_then(|o| o.get("message"))
            .and_then(text_of)
            .unwrap_or_else(|| EMPTY_MESSAGE.to_string());
        let order = obj
            .and_then(|o| o.get("order"))
            .and_then(OrderReference::from_value);
        let event = NotificationEvent::received(message, order);

        self.inner.feed.prepend(event.clone());
        self.inner.alert.fire();
        Some(event)
    }
}

/// Handle to a live subscription; a stream of the events it ingests.
///
/// Up to 64 unread events are held for the reader; later ones
/// are still added to the center's list but not queued here. Dropping the
/// handle closes the subscription.
pub struct Subscription {
    inner: Arc<Inner>,
    rx: mpsc::Receiver<NotificationEvent>,
    cancel: CancellationToken,
    handle: Option<JoinHandle<()>>,
    generation: u64,
}

impl Subscription {
    /// Next ingested event; `None` once closed.
    pub async fn next_event(&mut self) -> Option<NotificationEvent> {
        self.rx.recv().await
    }

    /// Release the connection. Safe to call any number of times.
    pub fn close(&mut self) {
        self.cancel.cancel();
        self.rx.close();
        if let Some(handle) = self.handle.take() {
            handle.abort();
            debug!("notification stream closed");
        }
        self.inner.release(self.generation);
    }

    pub fn is_closed(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Stream for Subscription {
    type Item = NotificationEvent;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        self.rx.poll_recv(cx)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.close();
    }
}

/// Reconnect delay policy: the server's `retry` hint if it sent one,
/// otherwise exponential from [`INITIAL_RETRY`] up to [`MAX_RETRY`].
#[derive(Debug)]
struct Backoff {
    next: Duration,
    hint: Option<Duration>,
}

impl Backoff {
    fn new() -> Self {
        Self {
            next: INITIAL_RETRY,
            hint: None,
        }
    }

    fn reset(&mut self) {
        self.next = INITIAL_RETRY;
    }

    fn set_hint(&mut self, millis: u64) {
        self.hint = Some(Duration::from_millis(millis));
    }

    fn next_delay(&mut self) -> Duration {
        if let Some(hint) = self.hint {
            return hint;
        }
        let delay = self.next;
        self.next = (self.next * 2).min(MAX_RETRY);
        delay
    }
}

/// How one connection's event stream ended.
#[derive(Debug, PartialEq, Eq)]
enum PumpEnd {
    Cancelled,
    Ended,
    Failed(String),
}

struct Worker {
    center: NotificationCenter,
    url: Url,
    tx: mpsc::Sender<NotificationEvent>,
    cancel: CancellationToken,
    generation: u64,
}

impl Worker {
    async fn run(self) {
        let mut backoff = Backoff::new();
        loop {
            self.set_state(StreamState::Connecting);
            let connected = tokio::select! {
                r = self.connect() => r,
                _ = self.cancel.cancelled() => break,
            };

            match connected {
                Ok(response) => {
                    self.set_state(StreamState::Open);
                    backoff.reset();
                    let mut events =
                        sse_stream::SseStream::from_bytes_stream(response.bytes_stream());
                    let end = pump(&mut events, &self.cancel, &mut backoff, |data| {
                        self.deliver(data)
                    })
                    .await;
                    match end {
                        PumpEnd::Cancelled => break,
                        PumpEnd::Ended => debug!("notification stream ended by server"),
                        PumpEnd::Failed(e) => warn!("notification stream error: {e}"),
                    }
                }
                Err(e) => warn!(url = %self.url, "notification stream connect failed: {e}"),
            }

            self.set_state(StreamState::Connecting);
            let delay = backoff.next_delay();
            debug!(?delay, "reconnecting notification stream");
            tokio::select! {
                _ = tokio::time::sleep(delay) => {}
                _ = self.cancel.cancelled() => break,
            }
        }
        debug!("notification stream worker stopped");
    }

    async fn connect(&self) -> Result<reqwest::Response, ApiError> {
        let builder = self
            .center
            .api
            .http()
            .get(self.url.clone())
            .header(ACCEPT, "text/event-stream");
        let response = self
            .center
            .api
            .authorize(builder, AuthMode::Optional)?
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Backend {
                status: status.as_u16(),
                message: "event stream refused".into(),
            });
        }
        Ok(response)
    }

    fn deliver(&self, data: &str) {
        let Some(event) = self.center.ingest(data) else {
            return;
        };
        match self.tx.try_send(event) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(event)) => {
                debug!(id = %event.id, "subscription not being read, event kept in list only");
            }
            // The receiver is gone only when the subscription is being dropped.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }

    fn set_state(&self, state: StreamState) {
        if !self.cancel.is_cancelled() {
            self.center.inner.set_state(self.generation, state);
        }
    }
}

/// Feed `message` events from one connection to `on_message` until the
/// stream ends, fails or is cancelled. `retry` fields update `backoff`.
async fn pump<S, E>(
    events: &mut S,
    cancel: &CancellationToken,
    backoff: &mut Backoff,
    mut on_message: impl FnMut(&str),
) -> PumpEnd
where
    S: Stream<Item = Result<sse_stream::Sse, E>> + Unpin,
    E: std::fmt::Display,
{
    loop {
        tokio::select! {
            event = events.next() => match event {
                Some(Ok(sse)) => {
                    if let Some(retry) = sse.retry {
                        backoff.set_hint(retry);
                    }
                    if let Some(data) = message_data(&sse) {
                        on_message(data);
                    }
                }
                Some(Err(e)) => return PumpEnd::Failed(e.to_string()),
                None => return PumpEnd::Ended,
            },
            _ = cancel.cancelled() => return PumpEnd::Cancelled,
        }
    }
}

/// Data of a `message` event (no event name, or `message`).
fn message_data(sse: &sse_stream::Sse) -> Option<&str> {
    match sse.event.as_deref() {
        None | Some("message") => sse.data.as_deref(),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientConfig;
    use crate::notifications::alert::tests::CountingSink;
    use crate::session::SessionStore;

    struct NoopAck;

    #[async_trait::async_trait]
    impl ReadAcknowledger for NoopAck {
        async fn acknowledge(&self, _id: &NotificationId) -> Result<(), ApiError> {
            Ok(())
        }
    }

    fn center_with(alert: AlertGate) -> NotificationCenter {
        let session = Arc::new(SessionStore::in_memory("k"));
        // Nothing listens on port 9: connection attempts fail and retry.
        let api = ApiClient::new(ClientConfig::new("http://127.0.0.1:9", "k"), session);
        NotificationCenter::with_acknowledger(api, Arc::new(NoopAck), alert)
    }

    fn sse(event: Option<&str>, data: Option<&str>, retry: Option<u64>) -> sse_stream::Sse {
        sse_stream::Sse {
            event: event.map(str::to_string),
            data: data.map(str::to_string),
            id: None,
            retry,
        }
    }

    #[test]
    fn ingest_is_newest_first_and_unread() {
        let center = center_with(AlertGate::silent());
        for body in [r#"{"message":"A"}"#, r#"{"message":"B"}"#, r#"{"message":"C"}"#] {
            assert!(center.ingest(body).is_some());
        }
        let list = center.notifications();
        let messages: Vec<_> = list.iter().map(|e| e.message.as_str()).collect();
        assert_eq!(messages, ["C", "B", "A"]);
        assert!(list.iter().all(|e| !e.read && e.id.is_local()));
        assert_eq!(center.unread_count(), 3);
    }

    #[test]
    fn ingest_assigns_distinct_increasing_ids() {
        let center = center_with(AlertGate::silent());
        let a = center.ingest(r#"{"message":"A"}"#).unwrap();
        let b = center.ingest(r#"{"message":"A"}"#).unwrap();
        match (a.id, b.id) {
            (NotificationId::Local(a), NotificationId::Local(b)) => assert!(b > a),
            other => panic!("expected local ids, got {other:?}"),
        }
        assert!(b.created_at >= a.created_at);
    }

    #[test]
    fn malformed_push_is_dropped() {
        let center = center_with(AlertGate::silent());
        center.ingest(r#"{"message":"kept"}"#);
        assert!(center.ingest("not json").is_none());
        assert!(center.ingest("").is_none());
        assert!(center.ingest("{\"message\":").is_none());
        assert_eq!(center.notifications().len(), 1);
    }

    #[test]
    fn non_object_push_gets_defaults() {
        let center = center_with(AlertGate::silent());
        for body in [r#"["hi"]"#, "5", r#""x""#, "null"] {
            let event = center.ingest(body).expect("valid JSON is ingested");
            assert_eq!(event.message, EMPTY_MESSAGE, "payload {body}");
            assert!(event.order_reference.is_none());
        }
        assert_eq!(center.notifications().len(), 4);
    }

    #[test]
    fn unread_subscription_queue_is_bounded() {
        let center = center_with(AlertGate::silent());
        let (tx, mut rx) = mpsc::channel(EVENT_BUFFER);
        let worker = Worker {
            center: center.clone(),
            url: Url::parse("http://127.0.0.1:9/events").unwrap(),
            tx,
            cancel: CancellationToken::new(),
            generation: 0,
        };

        for i in 0..EVENT_BUFFER * 3 {
            worker.deliver(&format!(r#"{{"message":"n{i}"}}"#));
        }

        assert_eq!(center.notifications().len(), EVENT_BUFFER * 3);
        let mut queued = Vec::new();
        while let Ok(event) = rx.try_recv() {
            queued.push(event.message);
        }
        assert_eq!(queued.len(), EVENT_BUFFER);
        assert_eq!(queued.first().map(String::as_str), Some("n0"));
    }

    #[test]
    fn push_with_order_reference() {
        let center = center_with(AlertGate::silent());
        let event = center
            .ingest(r#"{"message":"Pesanan dibuat","order":{"order_code":"ORD-1","qty":3}}"#)
            .unwrap();
        let order = event.order_reference.unwrap();
        assert_eq!(order.order_code.as_deref(), Some("ORD-1"));
        assert_eq!(order.quantity.as_deref(), Some("3"));
    }

    #[test]
    fn push_without_message_gets_placeholder() {
        let center = center_with(AlertGate::silent());
        let event = center.ingest("{}").unwrap();
        assert_eq!(event.message, EMPTY_MESSAGE);
    }

    #[test]
    fn alert_fires_once_per_ingested_event() {
        let sink = CountingSink::default();
        let plays = sink.plays.clone();
        let center = center_with(AlertGate::new(sink));
        center.ingest(r#"{"message":"A"}"#);
        center.ingest("garbage");
        center.ingest(r#"{"message":"B"}"#);
        assert_eq!(plays.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn mark_as_read_after_stream_events() {
        let center = center_with(AlertGate::silent());
        center.ingest(r#"{"message":"A"}"#);
        let b = center.ingest(r#"{"message":"B"}"#).unwrap();
        center.ingest(r#"{"message":"C"}"#);

        center.mark_as_read(&b.id).await.unwrap();

        let list = center.notifications();
        let flags: Vec<_> = list.iter().map(|e| (e.message.as_str(), e.read)).collect();
        assert_eq!(flags, [("C", false), ("B", true), ("A", false)]);
        assert_eq!(center.unread_count(), 2);

        center.mark_all_as_read();
        assert_eq!(center.unread_count(), 0);
    }

    #[test]
    fn message_data_only_for_message_events() {
        assert_eq!(message_data(&sse(None, Some("{}"), None)), Some("{}"));
        assert_eq!(message_data(&sse(Some("message"), Some("x"), None)), Some("x"));
        assert_eq!(message_data(&sse(Some("ping"), Some("x"), None)), None);
        assert_eq!(message_data(&sse(None, None, None)), None);
    }

    #[test]
    fn backoff_doubles_up_to_cap_and_resets() {
        let mut backoff = Backoff::new();
        let delays: Vec<_> = (0..7).map(|_| backoff.next_delay().as_secs()).collect();
        assert_eq!(delays, [1, 2, 4, 8, 16, 30, 30]);
        backoff.reset();
        assert_eq!(backoff.next_delay(), INITIAL_RETRY);
    }

    #[test]
    fn backoff_prefers_server_hint() {
        let mut backoff = Backoff::new();
        backoff.set_hint(2500);
        assert_eq!(backoff.next_delay(), Duration::from_millis(2500));
        assert_eq!(backoff.next_delay(), Duration::from_millis(2500));
    }

    #[tokio::test]
    async fn pump_delivers_messages_in_order() {
        let events = vec![
            Ok(sse(None, Some("one"), None)),
            Ok(sse(Some("ping"), Some("skip"), None)),
            Ok(sse(Some("message"), Some("two"), Some(5000))),
        ];
        let mut stream = futures_util::stream::iter(events);
        let cancel = CancellationToken::new();
        let mut backoff = Backoff::new();
        let mut seen = Vec::new();

        let end = pump::<_, std::io::Error>(&mut stream, &cancel, &mut backoff, |d| {
            seen.push(d.to_string())
        })
        .await;

        assert_eq!(end, PumpEnd::Ended);
        assert_eq!(seen, ["one", "two"]);
        assert_eq!(backoff.next_delay(), Duration::from_millis(5000));
    }

    #[tokio::test]
    async fn pump_reports_transport_errors() {
        let events: Vec<Result<sse_stream::Sse, std::io::Error>> = vec![
            Ok(sse(None, Some("one"), None)),
            Err(std::io::Error::other("connection reset")),
            Ok(sse(None, Some("never"), None)),
        ];
        let mut stream = futures_util::stream::iter(events);
        let cancel = CancellationToken::new();
        let mut seen = 0;
        let end = pump(&mut stream, &cancel, &mut Backoff::new(), |_| seen += 1).await;
        assert_eq!(end, PumpEnd::Failed("connection reset".into()));
        assert_eq!(seen, 1);
    }

    #[tokio::test]
    async fn pump_stops_when_cancelled() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut stream = futures_util::stream::pending::<Result<sse_stream::Sse, std::io::Error>>();
        let end = pump(&mut stream, &cancel, &mut Backoff::new(), |_| {}).await;
        assert_eq!(end, PumpEnd::Cancelled);
    }

    #[tokio::test]
    async fn only_one_subscription_at_a_time() {
        let center = center_with(AlertGate::silent());
        assert_eq!(center.state(), StreamState::Unsubscribed);

        let mut first = center.open("7", "user").unwrap();
        assert_ne!(center.state(), StreamState::Unsubscribed);
        assert!(matches!(
            center.open("7", "user"),
            Err(NotificationError::AlreadySubscribed)
        ));

        first.close();
        first.close();
        assert!(first.is_closed());
        assert_eq!(center.state(), StreamState::Closed);
        assert!(first.next_event().await.is_none());

        let second = center.open_for_session().unwrap();
        assert!(!second.is_closed());
        drop(second);
        assert_eq!(center.state(), StreamState::Closed);
    }

    #[tokio::test]
    async fn closing_keeps_received_events() {
        let center = center_with(AlertGate::silent());
        let mut sub = center.open("guest", "guest").unwrap();
        center.ingest(r#"{"message":"A"}"#);
        sub.close();
        assert_eq!(center.notifications().len(), 1);
    }
}
