//! Alert notification
//!
//! Decides whether an applied update deserves an audio cue, and plays
//! it. The decision is the one place exactly-once alerting is enforced:
//! a redundant re-delivery produces `changed = false` upstream and never
//! reaches the notifier.

use std::io::{self, Write};

use crate::state::Delta;

/// Alert iff the update actually changed the pair's value and the pair
/// has alerts enabled.
pub fn should_alert(delta: &Delta, enabled: bool) -> bool {
    delta.changed && enabled
}

/// An audio cue. Implementations are fire-and-forget: they must swallow
/// playback failures and must not block the caller.
pub trait Notifier {
    fn play(&self);
}

impl<N: Notifier + ?Sized> Notifier for Box<N> {
    fn play(&self) {
        (**self).play()
    }
}

/// Rings the terminal bell. Write errors are dropped.
pub struct Bell;

impl Notifier for Bell {
    fn play(&self) {
        let mut stdout = io::stdout();
        let _ = stdout.write_all(b"\x07");
        let _ = stdout.flush();
    }
}

/// No-op notifier for headless use.
pub struct Silent;

impl Notifier for Silent {
    fn play(&self) {}
}

#[cfg(test)]
pub(crate) mod testutil {
    use super::Notifier;
    use std::cell::Cell;

    /// Counts plays instead of making noise.
    #[derive(Default)]
    pub struct Counter {
        pub plays: Cell<u32>,
    }

    impl Notifier for Counter {
        fn play(&self) {
            self.plays.set(self.plays.get() + 1);
        }
    }

    impl Notifier for &Counter {
        fn play(&self) {
            (**self).play()
        }
    }
}
