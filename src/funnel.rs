use std::{
    collections::VecDeque,
    fmt::Debug,
    sync::{Arc, Mutex, MutexGuard, PoisonError},
};

use conv::ConvAsUtil;
use tokio::{sync::mpsc, time::timeout};
use tracing::{debug, trace};

use crate::{call::AsyncCall, config::Config, error::Error, event::Event};

type Completion = Box<dyn FnOnce(Result<(), Error>) + Send + 'static>;

/// Admits at most `capacity` calls to run concurrently, holding the rest in a
/// strict FIFO backlog.
///
/// Submit work with [push](Self::push) or [push_with](Self::push_with); both
/// return immediately. Whenever a running call completes, the oldest queued
/// call is advanced into the freed slot. Optional policies reject new calls
/// when the backlog is full, put a deadline on each call, and clear the
/// backlog on failure. See [Config].
///
/// Cheaply cloneable; clones share the same state.
#[derive(Clone)]
pub struct Funnel {
    shared: Arc<Shared>,
}

/// A snapshot of the state of a [Funnel].
///
/// Not guaranteed to be consistent under high concurrency.
#[derive(Debug, Clone, Copy)]
pub struct FunnelState {
    capacity: usize,
    queue_limit: usize,
    in_flight: usize,
    queued: usize,
}

struct Shared {
    capacity: usize,
    queue_limit: usize,
    config: Config,

    state: Mutex<State>,
    subscribers: Mutex<Vec<mpsc::UnboundedSender<Event>>>,
}

struct State {
    in_flight: usize,
    backlog: VecDeque<Item>,
}

struct Item {
    call: Box<dyn AsyncCall>,
    completion: Completion,
}

impl Funnel {
    /// Create a funnel admitting at most `capacity` concurrent calls.
    ///
    /// `capacity == 0` disables limiting entirely, as does
    /// [Config::disabled]: every call is dispatched immediately and the
    /// in-flight counter stays at zero.
    pub fn new(capacity: usize, config: Config) -> Self {
        let queue_limit = queue_limit(capacity, config.ratio);
        Self {
            shared: Arc::new(Shared {
                capacity,
                queue_limit,
                config,
                state: Mutex::new(State {
                    in_flight: 0,
                    backlog: VecDeque::new(),
                }),
                subscribers: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Submit a call, discarding its result.
    ///
    /// Equivalent to [push_with](Self::push_with) with a no-op completion
    /// callback.
    pub fn push(&self, call: impl AsyncCall) -> &Self {
        self.push_with(call, |_| {})
    }

    /// Submit a call, delivering its result to `completion`.
    ///
    /// Never blocks: admission and scheduling are synchronous, only the call
    /// itself is asynchronous. If the backlog is full under
    /// [refuse_when_full](Config::refuse_when_full), `completion` is invoked
    /// with [Error::Refused] before this returns and the call never runs.
    ///
    /// Must be called from within a tokio runtime.
    pub fn push_with(
        &self,
        call: impl AsyncCall,
        completion: impl FnOnce(Result<(), Error>) + Send + 'static,
    ) -> &Self {
        self.shared.submit(Box::new(call), Box::new(completion));
        self
    }

    /// Subscribe to [Event] notifications.
    ///
    /// Every subscriber receives every event published after it subscribed.
    /// Dropped receivers are pruned on the next publish.
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<Event> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.shared
            .subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(tx);
        rx
    }

    /// The current state of the funnel.
    pub fn state(&self) -> FunnelState {
        let state = self.shared.lock_state();
        FunnelState {
            capacity: self.shared.capacity,
            queue_limit: self.shared.queue_limit,
            in_flight: state.in_flight,
            queued: state.backlog.len(),
        }
    }

    /// Number of calls currently executing.
    pub fn in_flight(&self) -> usize {
        self.shared.lock_state().in_flight
    }

    /// Number of calls waiting in the backlog.
    pub fn queued(&self) -> usize {
        self.shared.lock_state().backlog.len()
    }
}

impl Debug for Funnel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state();
        f.debug_struct("Funnel")
            .field("capacity", &state.capacity)
            .field("in_flight", &state.in_flight)
            .field("queued", &state.queued)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn submit(self: &Arc<Self>, call: Box<dyn AsyncCall>, completion: Completion) {
        if self.config.disabled || self.capacity == 0 {
            trace!(call = call.label(), "limiting disabled, dispatching");
            tokio::spawn(async move {
                let result = call.call().await.map_err(Error::from);
                completion(result);
            });
            return;
        }

        let (refused, queued) = {
            let mut state = self.lock_state();
            let refused = if state.backlog.len() < self.queue_limit || !self.config.refuse {
                state.backlog.push_back(Item { call, completion });
                None
            } else {
                Some(completion)
            };
            (refused, state.backlog.len())
        };

        if let Some(completion) = refused {
            debug!(queue_limit = self.queue_limit, "backlog full, refusing call");
            completion(Err(Error::Refused));
        }

        if queued > 1 {
            self.publish(Event::Saturated { queued });
        }

        self.advance();
    }

    /// Move the head of the backlog into a free slot, if there is one.
    ///
    /// Advances at most one call: each completion re-triggers exactly one
    /// more advance.
    fn advance(self: &Arc<Self>) {
        let item = {
            let mut state = self.lock_state();
            if state.in_flight >= self.capacity {
                return;
            }
            let Some(item) = state.backlog.pop_front() else {
                return;
            };
            state.in_flight += 1;
            item
        };

        trace!(call = item.call.label(), "call running");
        let shared = Arc::clone(self);
        tokio::spawn(async move {
            shared.run(item).await;
        });
    }

    async fn run(self: Arc<Self>, item: Item) {
        let Item { call, completion } = item;
        let label = call.label().to_owned();

        // The call gets its own task so that a deadline or a panic resolves
        // the caller without taking the bookkeeping down with it.
        let mut task = tokio::spawn(call.call());

        let joined = match self.config.timeout {
            Some(limit) => match timeout(limit, &mut task).await {
                Ok(joined) => joined,
                Err(_elapsed) => {
                    debug!(call = %label, ?limit, "deadline elapsed, resolving caller");
                    self.finish(Err(Error::Timeout { limit, label }), completion);

                    // The work keeps running. A late failure goes to
                    // subscribers; a late success has nobody left to tell.
                    match task.await {
                        Ok(Err(source)) => {
                            self.publish(Event::Outdated(Arc::new(Error::Call(source))));
                        }
                        Ok(Ok(())) => {}
                        Err(panicked) => {
                            self.publish(Event::Outdated(Arc::new(Error::Call(
                                Box::new(panicked),
                            ))));
                        }
                    }
                    return;
                }
            },
            None => (&mut task).await,
        };

        let result = match joined {
            Ok(result) => result.map_err(Error::from),
            Err(panicked) => Err(Error::Call(Box::new(panicked))),
        };
        self.finish(result, completion);
    }

    /// Resolve a slot: run the failure policy, release capacity, advance the
    /// backlog, then deliver the result.
    ///
    /// The slot must be released and the next call advanced before the
    /// caller's callback runs, so a synchronous callback chain sees
    /// consistent state.
    fn finish(self: &Arc<Self>, result: Result<(), Error>, completion: Completion) {
        {
            let mut state = self.lock_state();
            if result.is_err() && self.config.clear_on_error {
                let dropped = state.backlog.len();
                if dropped > 0 {
                    debug!(dropped, "call failed, clearing backlog");
                }
                state.backlog.clear();
            }
            state.in_flight -= 1;
        }

        self.advance();
        completion(result);
    }

    fn publish(&self, event: Event) {
        self.subscribers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn lock_state(&self) -> MutexGuard<'_, State> {
        // User code never runs under this lock, so a poisoned state is still
        // internally consistent.
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl FunnelState {
    /// The concurrency ceiling.
    pub fn capacity(&self) -> usize {
        self.capacity
    }
    /// The admissible backlog length under the refuse policy.
    pub fn queue_limit(&self) -> usize {
        self.queue_limit
    }
    /// The number of calls currently executing.
    pub fn in_flight(&self) -> usize {
        self.in_flight
    }
    /// The number of calls waiting in the backlog.
    pub fn queued(&self) -> usize {
        self.queued
    }
}

fn queue_limit(capacity: usize, ratio: f64) -> usize {
    let limit = capacity as f64 * ratio;

    limit
        .round()
        .approx()
        .expect("queue limit should be within usize bounds")
}
