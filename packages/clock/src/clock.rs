//! The `Working` clock for production and the `Stopped` clock for tests.
use std::time::Duration;

use ghostseed_primitives::DurationSinceUnixEpoch;

/// A clock that gives the current timestamp.
pub trait Time: Sized {
    /// The current time as a duration since the Unix epoch.
    fn now() -> DurationSinceUnixEpoch;

    /// The current time in whole milliseconds since the Unix epoch.
    #[must_use]
    fn now_ms() -> u64 {
        u64::try_from(Self::now().as_millis()).unwrap_or(u64::MAX)
    }

    /// The current time plus `add_time`, unless it overflows.
    fn now_add(add_time: &Duration) -> Option<DurationSinceUnixEpoch> {
        Self::now().checked_add(*add_time)
    }

    /// The current time minus `sub_time`, unless it underflows.
    fn now_sub(sub_time: &Duration) -> Option<DurationSinceUnixEpoch> {
        Self::now().checked_sub(*sub_time)
    }
}

/// The production clock: reads the operating system clock.
#[derive(Debug)]
pub struct Working;

impl Time for Working {
    fn now() -> DurationSinceUnixEpoch {
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("the system clock is set before the Unix epoch")
    }
}

thread_local! {
    static FIXED_TIME: std::cell::Cell<DurationSinceUnixEpoch> = const { std::cell::Cell::new(Duration::ZERO) };
}

/// The test clock: stands still until moved by hand.
///
/// The fixed time is thread-local so parallel tests cannot disturb each
/// other, hence the `local_` prefix on the controls.
#[derive(Debug)]
pub struct Stopped;

impl Time for Stopped {
    fn now() -> DurationSinceUnixEpoch {
        FIXED_TIME.with(std::cell::Cell::get)
    }
}

/// Controls for the [`Stopped`] clock. Only meaningful in tests.
pub trait StoppedTime: Time {
    /// Sets this thread's clock to `timestamp`.
    fn local_set(timestamp: &DurationSinceUnixEpoch);

    /// Resets this thread's clock to the Unix epoch.
    fn local_set_to_unix_epoch() {
        Self::local_set(&Duration::ZERO);
    }

    /// Moves this thread's clock forward by `period`.
    fn local_add(period: &Duration);
}

impl StoppedTime for Stopped {
    fn local_set(timestamp: &DurationSinceUnixEpoch) {
        FIXED_TIME.with(|fixed_time| fixed_time.set(*timestamp));
    }

    fn local_add(period: &Duration) {
        FIXED_TIME.with(|fixed_time| {
            let bumped = fixed_time.get().checked_add(*period).unwrap_or_else(|| fixed_time.get());
            fixed_time.set(bumped);
        });
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{Stopped, StoppedTime, Time, Working};

    #[test]
    fn it_should_give_a_non_zero_time_from_the_working_clock() {
        assert!(Working::now() > Duration::ZERO);
    }

    #[test]
    fn it_should_stand_still_until_moved() {
        Stopped::local_set(&Duration::from_secs(100));

        assert_eq!(Stopped::now(), Duration::from_secs(100));
        assert_eq!(Stopped::now(), Duration::from_secs(100));
    }

    #[test]
    fn it_should_move_forward_by_the_added_period() {
        Stopped::local_set(&Duration::from_secs(100));

        Stopped::local_add(&Duration::from_secs(50));

        assert_eq!(Stopped::now(), Duration::from_secs(150));
        assert_eq!(Stopped::now_ms(), 150_000);
    }
}
