//! Connection lifecycle
//!
//! Owns the feed stream for the life of the process: connect, detect
//! loss, back off, retry, forever. There is no give-up state; a feed
//! that stays down just keeps the core in its connect/backoff cycle
//! until shutdown.
//!
//! The core runs in a dedicated thread (like the proxy core it is
//! modeled on) and reports everything it sees on a single event channel:
//! decoded frames while connected, status transitions otherwise. The
//! backoff wait is a `select!` over a one-shot timer and the shutdown
//! channel, so teardown never leaves a reconnect attempt dangling.

use std::cmp;
use std::thread;
use std::time::Duration;

use crossbeam::channel;
use rand::Rng;

use super::proto::{self, Frame};
use super::ws;

/// Connection states. `Disconnected` exists only before the first
/// connect call; after that the core cycles through the other three.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
}

/// Status changes reported on the event channel.
#[derive(Debug)]
pub enum Status {
    Connected,
    /// The stream died after being established.
    Disconnected,
    /// A connect attempt failed outright.
    FailedToConnect,
    /// A reconnect is scheduled after the given delay.
    Retrying { attempt: u32, delay: Duration },
    /// A frame failed to decode and was dropped. State is untouched.
    FrameError(proto::Error),
    Exiting,
}

/// Everything a feed consumer receives, in receipt order.
#[derive(Debug)]
pub enum FeedEvent {
    Frame(Frame),
    Status(Status),
}

/// Retry delays never exceed this, no matter the attempt count.
pub static MAX_RETRY_DELAY: Duration = Duration::from_secs(60);

/// Backoff for the given attempt (1-based): one second per attempt so
/// far, scaled by a jitter factor drawn from `[0.5, 1.5)`, capped at
/// `MAX_RETRY_DELAY`.
pub fn retry_delay(attempt: u32, jitter: f64) -> Duration {
    let uncapped = Duration::from_secs(1).mul_f64(attempt as f64 * jitter);
    cmp::min(MAX_RETRY_DELAY, uncapped)
}

/// Handle to a running connection core. Dropping it (or calling
/// `shutdown`) terminates the core thread, cancelling any pending
/// reconnect timer.
pub struct Conn {
    events: channel::Receiver<FeedEvent>,
    _shutdown: channel::Sender<()>,
}

impl Conn {
    /// Spawn a connection core for the feed at `origin` (see
    /// `ws::feed_url` for accepted forms). Fails only if the origin
    /// cannot be turned into a url; connect failures after that are
    /// handled by the retry cycle.
    pub fn new(origin: &str) -> Result<Conn, ws::ConnectError> {
        let url = ws::feed_url(origin)?;
        let (event_tx, event_rx) = channel::bounded(256);
        let (shutdown_tx, shutdown_rx) = channel::bounded(0);
        thread::spawn(move || {
            ConnCore::new(url, event_tx, shutdown_rx).run();
        });
        Ok(Conn {
            events: event_rx,
            _shutdown: shutdown_tx,
        })
    }

    /// To use with `crossbeam::select!`.
    pub fn receiver(&self) -> &channel::Receiver<FeedEvent> {
        &self.events
    }

    /// Iterate over events until shutdown or core exit.
    pub fn iter(&self) -> channel::Iter<'_, FeedEvent> {
        self.events.iter()
    }
}

struct ConnCore {
    url: String,
    state: State,
    attempt: u32,
    events: channel::Sender<FeedEvent>,
    shutdown: channel::Receiver<()>,
}

/// Outcome of one connected stretch.
enum PumpEnd {
    StreamLost,
    Shutdown,
}

impl ConnCore {
    fn new(
        url: String,
        events: channel::Sender<FeedEvent>,
        shutdown: channel::Receiver<()>,
    ) -> ConnCore {
        ConnCore {
            url,
            state: State::Disconnected,
            attempt: 0,
            events,
            shutdown,
        }
    }

    /// The transition table. The attempt counter resets when reaching
    /// `Connected` (not per message, which would mask rapid flapping)
    /// and increments when entering `Reconnecting`.
    fn transition(&mut self, next: State) {
        match (self.state, next) {
            (_, State::Connected) => self.attempt = 0,
            (_, State::Reconnecting) => self.attempt += 1,
            _ => {}
        }
        self.state = next;
    }

    fn send(&self, event: FeedEvent) -> bool {
        self.events.send(event).is_ok()
    }

    fn run(&mut self) {
        loop {
            self.transition(State::Connecting);
            match ws::Port::connect(&self.url) {
                Ok(port) => {
                    self.transition(State::Connected);
                    if !self.send(FeedEvent::Status(Status::Connected)) {
                        break;
                    }
                    match self.pump(&port) {
                        PumpEnd::Shutdown => break,
                        PumpEnd::StreamLost => {
                            if !self.send(FeedEvent::Status(Status::Disconnected)) {
                                break;
                            }
                        }
                    }
                }
                Err(_) => {
                    if !self.send(FeedEvent::Status(Status::FailedToConnect)) {
                        break;
                    }
                }
            }

            self.transition(State::Reconnecting);
            let delay = retry_delay(self.attempt, rand::thread_rng().gen_range(0.5..1.5));
            if !self.send(FeedEvent::Status(Status::Retrying {
                attempt: self.attempt,
                delay,
            })) {
                break;
            }
            crossbeam::select! {
                recv(self.shutdown) -> _ => break,
                recv(channel::after(delay)) -> _ => {}
            }
        }
        let _ = self.events.send(FeedEvent::Status(Status::Exiting));
    }

    /// Forward frames while the stream is up. Decode failures are
    /// reported and dropped here; they do not tear the stream down.
    fn pump(&self, port: &ws::Port) -> PumpEnd {
        loop {
            crossbeam::select! {
                recv(self.shutdown) -> _ => return PumpEnd::Shutdown,
                recv(port.receiver()) -> result => {
                    let event = match result {
                        Ok(Ok(text)) => match proto::decode(&text) {
                            Ok(frame) => FeedEvent::Frame(frame),
                            Err(err) => FeedEvent::Status(Status::FrameError(err)),
                        },
                        Ok(Err(_)) | Err(_) => return PumpEnd::StreamLost,
                    };
                    if !self.send(event) {
                        return PumpEnd::Shutdown;
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_delay_is_capped() {
        for attempt in 1..2000 {
            for jitter in [0.5, 1.0, 1.499] {
                let delay = retry_delay(attempt, jitter);
                assert!(delay <= MAX_RETRY_DELAY, "attempt {}: {:?}", attempt, delay);
            }
        }
        assert_eq!(retry_delay(u32::MAX, 1.5), MAX_RETRY_DELAY);
    }

    #[test]
    fn retry_delay_grows_before_cap() {
        assert_eq!(retry_delay(1, 1.0), Duration::from_secs(1));
        assert_eq!(retry_delay(5, 1.0), Duration::from_secs(5));
        assert_eq!(retry_delay(2, 0.5), Duration::from_secs(1));
        assert!(retry_delay(3, 1.4) < retry_delay(30, 1.4));
    }

    fn test_core() -> ConnCore {
        let (event_tx, _) = channel::unbounded();
        let (_, shutdown_rx) = channel::bounded(0);
        ConnCore::new("ws://localhost/ws".to_string(), event_tx, shutdown_rx)
    }

    #[test]
    fn attempt_counter_follows_transitions() {
        let mut core = test_core();
        assert_eq!(core.state, State::Disconnected);

        core.transition(State::Connecting);
        core.transition(State::Reconnecting);
        core.transition(State::Connecting);
        core.transition(State::Reconnecting);
        assert_eq!(core.attempt, 2);

        core.transition(State::Connecting);
        core.transition(State::Connected);
        assert_eq!(core.attempt, 0, "counter resets at the Connected transition");

        core.transition(State::Reconnecting);
        assert_eq!(core.attempt, 1);
    }
}
