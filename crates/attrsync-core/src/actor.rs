//! Thread-per-actor message processing.
//!
//! Each actor owns its state and runs on a dedicated thread with a single
//! mailbox. Messages are handled one at a time, in the order they were sent
//! by any given sender, so an actor's state is never touched concurrently.
//!
//! # Addresses
//!
//! - [`Addr<M>`] is a cloneable handle used to send `M` messages to one actor.
//! - [`Recipient<E>`] hides the actor's message type: any actor whose message
//!   type can be built from `E` can be a recipient of `E`. Recipients compare
//!   equal when they point at the same actor.
//!
//! # Request / Response
//!
//! [`Addr::request`] sends a message carrying a one-shot [`Reply`] and blocks
//! the calling thread until the actor answers or the timeout elapses. Never
//! issue a blocking request to the actor you are running in.
//!
//! # Deadlines
//!
//! An actor may expose a deadline through [`Actor::next_deadline`]. The actor
//! loop waits for mail no longer than that deadline and then calls
//! [`Actor::deadline_reached`], which must clear or move the deadline.
//!
//! # Example
//!
//! ```no_run
//! use attrsync_core::actor::{spawn, Actor, ActorConfig, Context, Reply, RequestTimeout};
//!
//! struct Counter(u32);
//!
//! enum CounterMsg {
//!     Add(u32),
//!     Get(Reply<u32>),
//! }
//!
//! impl Actor for Counter {
//!     type Message = CounterMsg;
//!
//!     fn handle(&mut self, msg: CounterMsg, _ctx: &mut Context<CounterMsg>) {
//!         match msg {
//!             CounterMsg::Add(n) => self.0 += n,
//!             CounterMsg::Get(reply) => reply.send(self.0),
//!         }
//!     }
//! }
//!
//! let handle = spawn(Counter(0), ActorConfig::with_name("counter")).unwrap();
//! let addr = handle.address();
//! addr.tell(CounterMsg::Add(2));
//! let total = addr.request(CounterMsg::Get, RequestTimeout::Infinite).unwrap();
//! assert_eq!(total, 2);
//! handle.stop_and_join();
//! ```

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TrySendError, bounded, unbounded};
use parking_lot::Mutex;

use crate::error::{ActorError, ActorResult};
use crate::logging::targets;

/// Upper bound on how long the actor loop blocks before re-checking for a stop request.
const POLL_INTERVAL: Duration = Duration::from_millis(100);

static NEXT_ACTOR_ID: AtomicU64 = AtomicU64::new(1);

/// A process-unique actor identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ActorId(u64);

impl ActorId {
    fn next() -> Self {
        Self(NEXT_ACTOR_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "actor#{}", self.0)
    }
}

/// Behaviour of a message-driven actor.
pub trait Actor: Send + 'static {
    /// The messages this actor accepts.
    type Message: Send + 'static;

    /// Called on the actor thread before the first message.
    fn started(&mut self, _ctx: &mut Context<Self::Message>) {}

    /// Handle one message.
    fn handle(&mut self, msg: Self::Message, ctx: &mut Context<Self::Message>);

    /// The next instant at which [`deadline_reached`](Self::deadline_reached) should run.
    fn next_deadline(&self) -> Option<Instant> {
        None
    }

    /// Called once the deadline returned by `next_deadline` has passed.
    fn deadline_reached(&mut self, _ctx: &mut Context<Self::Message>) {}

    /// Called on the actor thread after the mailbox is closed.
    fn stopped(&mut self) {}
}

enum Envelope<M> {
    Message(M),
    Stop,
}

/// Per-actor execution context handed to every callback.
pub struct Context<M: Send + 'static> {
    addr: Addr<M>,
    stop_requested: bool,
}

impl<M: Send + 'static> Context<M> {
    /// Address of the running actor.
    pub fn address(&self) -> Addr<M> {
        self.addr.clone()
    }

    pub fn id(&self) -> ActorId {
        self.addr.id
    }

    /// Stop the actor after the current message.
    pub fn stop(&mut self) {
        self.stop_requested = true;
    }
}

/// Timeout policy for blocking requests.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestTimeout {
    /// Wait until the actor replies or stops.
    Infinite,
    /// Give up after the given duration.
    After(Duration),
}

impl From<Duration> for RequestTimeout {
    fn from(duration: Duration) -> Self {
        Self::After(duration)
    }
}

/// One-shot reply channel carried inside request messages.
pub struct Reply<T> {
    sender: Sender<T>,
}

impl<T> Reply<T> {
    /// Create a reply handle and the receiver that waits on it.
    pub fn channel() -> (Self, Receiver<T>) {
        let (sender, receiver) = bounded(1);
        (Self { sender }, receiver)
    }

    /// Send the reply. A requester that already gave up is ignored.
    pub fn send(self, value: T) {
        let _ = self.sender.try_send(value);
    }
}

impl<T> fmt::Debug for Reply<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Reply")
    }
}

struct Shared {
    name: String,
    alive: AtomicBool,
    stop_requested: AtomicBool,
}

/// Address used to send messages to an actor.
pub struct Addr<M: Send + 'static> {
    id: ActorId,
    sender: Sender<Envelope<M>>,
    shared: Arc<Shared>,
}

impl<M: Send + 'static> Clone for Addr<M> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            sender: self.sender.clone(),
            shared: self.shared.clone(),
        }
    }
}

impl<M: Send + 'static> fmt::Debug for Addr<M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Addr")
            .field("id", &self.id)
            .field("name", &self.shared.name)
            .finish()
    }
}

impl<M: Send + 'static> PartialEq for Addr<M> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<M: Send + 'static> Eq for Addr<M> {}

impl<M: Send + 'static> Addr<M> {
    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns true while the actor accepts messages.
    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    /// Queue a message for the actor.
    ///
    /// Blocks while a bounded mailbox is full. Fails only once the actor has
    /// stopped.
    pub fn send(&self, msg: M) -> ActorResult<()> {
        if !self.is_alive() {
            return Err(ActorError::Stopped);
        }
        self.sender
            .send(Envelope::Message(msg))
            .map_err(|_| ActorError::Stopped)
    }

    /// Queue a message without waiting for room in a bounded mailbox.
    pub fn try_send(&self, msg: M) -> ActorResult<()> {
        if !self.is_alive() {
            return Err(ActorError::Stopped);
        }
        match self.sender.try_send(Envelope::Message(msg)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(ActorError::MailboxFull),
            Err(TrySendError::Disconnected(_)) => Err(ActorError::Stopped),
        }
    }

    /// Fire-and-forget send. Only messages to stopped actors are dropped.
    pub fn tell(&self, msg: M) {
        if let Err(err) = self.send(msg) {
            tracing::debug!(
                target: targets::ACTOR,
                actor = %self.id,
                name = %self.shared.name,
                error = %err,
                "dropping message"
            );
        }
    }

    /// Send a request and wait for its reply.
    pub fn request<R, F>(&self, make: F, timeout: RequestTimeout) -> ActorResult<R>
    where
        F: FnOnce(Reply<R>) -> M,
    {
        let (reply, receiver) = Reply::channel();
        self.send(make(reply))?;
        match timeout {
            RequestTimeout::Infinite => receiver.recv().map_err(|_| ActorError::NoReply),
            RequestTimeout::After(duration) => {
                receiver.recv_timeout(duration).map_err(|err| match err {
                    RecvTimeoutError::Timeout => ActorError::Timeout,
                    RecvTimeoutError::Disconnected => ActorError::NoReply,
                })
            }
        }
    }

    /// A type-erased recipient for messages convertible into `M`.
    pub fn recipient<E>(&self) -> Recipient<E>
    where
        E: 'static,
        M: From<E>,
    {
        self.recipient_with(M::from)
    }

    /// A type-erased recipient that wraps each event with `wrap`.
    pub fn recipient_with<E, F>(&self, wrap: F) -> Recipient<E>
    where
        E: 'static,
        F: Fn(E) -> M + Send + Sync + 'static,
    {
        let addr = self.clone();
        Recipient {
            id: self.id,
            shared: self.shared.clone(),
            deliver: Arc::new(move |event| addr.send(wrap(event))),
        }
    }
}

type DeliverFn<E> = dyn Fn(E) -> ActorResult<()> + Send + Sync;

/// An actor address that accepts `E` regardless of the actor's own message type.
pub struct Recipient<E> {
    id: ActorId,
    shared: Arc<Shared>,
    deliver: Arc<DeliverFn<E>>,
}

impl<E> Clone for Recipient<E> {
    fn clone(&self) -> Self {
        Self {
            id: self.id,
            shared: self.shared.clone(),
            deliver: self.deliver.clone(),
        }
    }
}

impl<E> fmt::Debug for Recipient<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Recipient")
            .field("id", &self.id)
            .field("name", &self.shared.name)
            .finish()
    }
}

impl<E> PartialEq for Recipient<E> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<E> Eq for Recipient<E> {}

impl<E> Recipient<E> {
    pub fn id(&self) -> ActorId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.shared.name
    }

    pub fn is_alive(&self) -> bool {
        self.shared.alive.load(Ordering::Acquire)
    }

    pub fn send(&self, event: E) -> ActorResult<()> {
        if !self.is_alive() {
            return Err(ActorError::Stopped);
        }
        (self.deliver)(event)
    }

    pub fn tell(&self, event: E) {
        if let Err(err) = self.send(event) {
            tracing::debug!(
                target: targets::ACTOR,
                actor = %self.id,
                name = %self.shared.name,
                error = %err,
                "dropping event"
            );
        }
    }
}

impl<E: 'static> Recipient<E> {
    /// A recipient for `E2` that wraps each event into `E` before delivery.
    pub fn map<E2, F>(&self, wrap: F) -> Recipient<E2>
    where
        E2: 'static,
        F: Fn(E2) -> E + Send + Sync + 'static,
    {
        let inner = self.deliver.clone();
        Recipient {
            id: self.id,
            shared: self.shared.clone(),
            deliver: Arc::new(move |event| inner(wrap(event))),
        }
    }
}

/// Configuration for spawning an actor.
#[derive(Debug, Clone)]
pub struct ActorConfig {
    /// Name for the actor thread.
    pub name: String,
    /// Stack size for the actor thread in bytes. `None` uses the default.
    pub stack_size: Option<usize>,
    /// Capacity of the mailbox. `None` means unbounded.
    ///
    /// Senders to a full bounded mailbox wait, so actors that message each
    /// other in a cycle should keep the default.
    pub queue_capacity: Option<usize>,
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            name: "attrsync-actor".to_string(),
            stack_size: None,
            queue_capacity: None,
        }
    }
}

impl ActorConfig {
    /// Create a new configuration with the given thread name.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Bound the mailbox to `capacity` messages.
    pub fn queue_capacity(mut self, capacity: usize) -> Self {
        self.queue_capacity = Some(capacity.max(1));
        self
    }

    /// Set the stack size for the actor thread.
    pub fn stack_size(mut self, size: usize) -> Self {
        self.stack_size = Some(size);
        self
    }
}

/// Owner handle of a running actor.
///
/// Dropping the handle asks the actor to stop without waiting for it.
pub struct ActorHandle<M: Send + 'static> {
    addr: Addr<M>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl<M: Send + 'static> ActorHandle<M> {
    pub fn address(&self) -> Addr<M> {
        self.addr.clone()
    }

    pub fn id(&self) -> ActorId {
        self.addr.id
    }

    pub fn is_running(&self) -> bool {
        self.addr.is_alive()
    }

    /// Request the actor to stop. Messages already queued are still handled.
    pub fn stop(&self) {
        self.addr.shared.stop_requested.store(true, Ordering::Release);
        let _ = self.addr.sender.try_send(Envelope::Stop);
    }

    /// Wait for the actor thread to finish.
    ///
    /// Returns `false` if already joined or the thread panicked.
    pub fn join(&self) -> bool {
        let handle = self.thread.lock().take();
        match handle {
            Some(h) => h.join().is_ok(),
            None => false,
        }
    }

    /// Stop the actor and wait for it to finish.
    pub fn stop_and_join(&self) -> bool {
        self.stop();
        self.join()
    }
}

impl<M: Send + 'static> Drop for ActorHandle<M> {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Spawn `actor` on its own thread.
pub fn spawn<A: Actor>(actor: A, config: ActorConfig) -> ActorResult<ActorHandle<A::Message>> {
    let (sender, receiver) = match config.queue_capacity {
        Some(capacity) => bounded(capacity),
        None => unbounded(),
    };
    let shared = Arc::new(Shared {
        name: config.name.clone(),
        alive: AtomicBool::new(true),
        stop_requested: AtomicBool::new(false),
    });
    let addr = Addr {
        id: ActorId::next(),
        sender,
        shared,
    };

    let mut builder = thread::Builder::new().name(config.name);
    if let Some(stack_size) = config.stack_size {
        builder = builder.stack_size(stack_size);
    }

    let ctx = Context {
        addr: addr.clone(),
        stop_requested: false,
    };
    let thread = builder
        .spawn(move || actor_loop(actor, receiver, ctx))
        .map_err(|err| ActorError::Spawn(err.to_string()))?;

    tracing::debug!(target: targets::ACTOR, actor = %addr.id, name = %addr.name(), "actor spawned");

    Ok(ActorHandle {
        addr,
        thread: Mutex::new(Some(thread)),
    })
}

/// The main actor loop.
fn actor_loop<A: Actor>(
    mut actor: A,
    receiver: Receiver<Envelope<A::Message>>,
    mut ctx: Context<A::Message>,
) {
    actor.started(&mut ctx);

    loop {
        if ctx.stop_requested || ctx.addr.shared.stop_requested.load(Ordering::Acquire) {
            break;
        }

        let poll_until = Instant::now() + POLL_INTERVAL;
        let wait_until = actor
            .next_deadline()
            .map_or(poll_until, |deadline| deadline.min(poll_until));

        match receiver.recv_deadline(wait_until) {
            Ok(Envelope::Message(msg)) => actor.handle(msg, &mut ctx),
            Ok(Envelope::Stop) => break,
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }

        if actor
            .next_deadline()
            .is_some_and(|deadline| deadline <= Instant::now())
        {
            actor.deadline_reached(&mut ctx);
        }
    }

    ctx.addr.shared.alive.store(false, Ordering::Release);

    // Handle what was queued before the stop request.
    while let Ok(envelope) = receiver.try_recv() {
        if let Envelope::Message(msg) = envelope {
            actor.handle(msg, &mut ctx);
        }
    }

    actor.stopped();
    tracing::debug!(target: targets::ACTOR, actor = %ctx.addr.id, name = %ctx.addr.name(), "actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    struct Echo {
        seen: Arc<Mutex<Vec<u32>>>,
        stopped: Arc<AtomicBool>,
    }

    enum EchoMsg {
        Push(u32),
        Sum(Reply<u32>),
        Ignore(Reply<u32>),
        Quit,
    }

    impl From<u32> for EchoMsg {
        fn from(value: u32) -> Self {
            EchoMsg::Push(value)
        }
    }

    impl Actor for Echo {
        type Message = EchoMsg;

        fn handle(&mut self, msg: EchoMsg, ctx: &mut Context<EchoMsg>) {
            match msg {
                EchoMsg::Push(v) => self.seen.lock().push(v),
                EchoMsg::Sum(reply) => reply.send(self.seen.lock().iter().sum()),
                EchoMsg::Ignore(_) => {}
                EchoMsg::Quit => ctx.stop(),
            }
        }

        fn stopped(&mut self) {
            self.stopped.store(true, Ordering::SeqCst);
        }
    }

    fn echo() -> (ActorHandle<EchoMsg>, Arc<Mutex<Vec<u32>>>, Arc<AtomicBool>) {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let stopped = Arc::new(AtomicBool::new(false));
        let handle = spawn(
            Echo {
                seen: seen.clone(),
                stopped: stopped.clone(),
            },
            ActorConfig::with_name("echo"),
        )
        .unwrap();
        (handle, seen, stopped)
    }

    #[test]
    fn test_messages_in_order() {
        let (handle, seen, _) = echo();
        let addr = handle.address();
        for i in 0..50 {
            addr.send(EchoMsg::Push(i)).unwrap();
        }
        let sum = addr.request(EchoMsg::Sum, RequestTimeout::Infinite).unwrap();
        assert_eq!(sum, (0..50).sum::<u32>());
        assert_eq!(*seen.lock(), (0..50).collect::<Vec<_>>());
        handle.stop_and_join();
    }

    #[test]
    fn test_request_timeout_and_no_reply() {
        let (handle, _, _) = echo();
        let addr = handle.address();
        let result: ActorResult<u32> =
            addr.request(EchoMsg::Ignore, RequestTimeout::After(Duration::from_millis(50)));
        assert_eq!(result, Err(ActorError::NoReply));
        handle.stop_and_join();
    }

    #[test]
    fn test_stop_rejects_new_messages() {
        let (handle, _, stopped) = echo();
        let addr = handle.address();
        assert!(handle.stop_and_join());
        assert!(!addr.is_alive());
        assert_eq!(addr.send(EchoMsg::Push(1)), Err(ActorError::Stopped));
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_stop_from_inside() {
        let (handle, _, stopped) = echo();
        handle.address().tell(EchoMsg::Quit);
        assert!(handle.join());
        assert!(stopped.load(Ordering::SeqCst));
    }

    #[test]
    fn test_recipient_identity() {
        let (handle, seen, _) = echo();
        let addr = handle.address();
        let a: Recipient<u32> = addr.recipient();
        let b: Recipient<u32> = addr.recipient_with(|v| EchoMsg::Push(v * 10));
        assert_eq!(a, b);
        assert_eq!(a.id(), handle.id());

        let c: Recipient<u8> = a.map(|v: u8| u32::from(v) + 100);
        assert_eq!(c.id(), a.id());

        a.send(1).unwrap();
        b.send(2).unwrap();
        c.send(3).unwrap();
        addr.request(EchoMsg::Sum, RequestTimeout::Infinite).unwrap();
        assert_eq!(*seen.lock(), vec![1, 20, 103]);
        handle.stop_and_join();
    }

    struct Ticker {
        deadline: Option<Instant>,
        fired: Arc<AtomicUsize>,
    }

    impl Actor for Ticker {
        type Message = ();

        fn started(&mut self, _ctx: &mut Context<()>) {
            self.deadline = Some(Instant::now() + Duration::from_millis(20));
        }

        fn handle(&mut self, _msg: (), _ctx: &mut Context<()>) {}

        fn next_deadline(&self) -> Option<Instant> {
            self.deadline
        }

        fn deadline_reached(&mut self, _ctx: &mut Context<()>) {
            self.deadline = None;
            self.fired.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_deadline_fires_once() {
        let fired = Arc::new(AtomicUsize::new(0));
        let handle = spawn(
            Ticker {
                deadline: None,
                fired: fired.clone(),
            },
            ActorConfig::with_name("ticker"),
        )
        .unwrap();
        thread::sleep(Duration::from_millis(250));
        assert_eq!(fired.load(Ordering::SeqCst), 1);
        handle.stop_and_join();
    }

    struct Slow {
        handled: Arc<AtomicUsize>,
    }

    impl Actor for Slow {
        type Message = u32;

        fn handle(&mut self, _msg: u32, _ctx: &mut Context<u32>) {
            thread::sleep(Duration::from_micros(200));
            self.handled.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn slow(config: ActorConfig) -> (ActorHandle<u32>, Arc<AtomicUsize>) {
        let handled = Arc::new(AtomicUsize::new(0));
        let handle = spawn(
            Slow {
                handled: handled.clone(),
            },
            config,
        )
        .unwrap();
        (handle, handled)
    }

    #[test]
    fn test_burst_larger_than_mailbox_is_delivered() {
        let (handle, handled) = slow(ActorConfig::with_name("slow"));
        let addr = handle.address();
        for i in 0..3000 {
            addr.tell(i);
        }
        assert!(handle.stop_and_join());
        assert_eq!(handled.load(Ordering::SeqCst), 3000);
    }

    #[test]
    fn test_bounded_mailbox_waits_for_room() {
        let (handle, handled) = slow(ActorConfig::with_name("slow-bounded").queue_capacity(8));
        let addr = handle.address();
        for i in 0..200 {
            addr.tell(i);
        }
        assert!(handle.stop_and_join());
        assert_eq!(handled.load(Ordering::SeqCst), 200);
    }

    #[test]
    fn test_try_send_reports_full_mailbox() {
        let (handle, _) = slow(ActorConfig::with_name("slow-try").queue_capacity(1));
        let addr = handle.address();
        let results: Vec<_> = (0..50).map(|i| addr.try_send(i)).collect();
        assert!(results.contains(&Err(ActorError::MailboxFull)));
        handle.stop_and_join();
    }

    #[test]
    fn test_ids_are_unique() {
        let (h1, _, _) = echo();
        let (h2, _, _) = echo();
        assert_ne!(h1.id(), h2.id());
        h1.stop_and_join();
        h2.stop_and_join();
    }
}
