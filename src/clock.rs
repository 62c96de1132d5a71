//! Time source shared by the resolver cache and the generation rate gate.

use std::time::Instant;

pub(crate) trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// The process monotonic clock.
#[derive(Debug, Default, Clone, Copy)]
pub(crate) struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::Clock;
    use std::sync::{Arc, Mutex};
    use std::time::{Duration, Instant};

    /// A clock which only moves when told to.
    #[derive(Clone)]
    pub(crate) struct ManualClock {
        now: Arc<Mutex<Instant>>,
    }

    impl ManualClock {
        pub(crate) fn new() -> ManualClock {
            ManualClock {
                now: Arc::new(Mutex::new(Instant::now())),
            }
        }

        pub(crate) fn advance(&self, by: Duration) {
            let mut now = self.now.lock().unwrap();
            *now += by;
        }
    }

    impl Clock for ManualClock {
        fn now(&self) -> Instant {
            *self.now.lock().unwrap()
        }
    }
}
