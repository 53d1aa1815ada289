//! # Utshob Testing
//!
//! Testing utilities for Utshob reducers and stores.
//!
//! This crate provides:
//! - A fixed clock for deterministic timestamps
//! - The [`ReducerTest`] Given-When-Then builder
//! - Effect assertions and an effect driver for async reducer tests
//!
//! ## Example
//!
//! ```ignore
//! use utshob_testing::{ReducerTest, test_clock};
//!
//! ReducerTest::new(BookingReducer)
//!     .with_env(env)
//!     .given_state(state)
//!     .when_action(BookingAction::Create { .. })
//!     .then_state(|s| assert!(s.outcome.is_none()))
//!     .run();
//! ```

use chrono::{DateTime, Utc};
use utshob_core::environment::Clock;

/// Ergonomic testing utilities for reducers
pub mod reducer_test;

/// Mock implementations of Environment traits
pub mod mocks {
    use super::{Clock, DateTime, Utc};

    /// Fixed clock for deterministic tests
    ///
    /// Always returns the same time, making tests reproducible.
    ///
    /// # Example
    ///
    /// ```
    /// use utshob_testing::mocks::FixedClock;
    /// use utshob_core::environment::Clock;
    /// use chrono::Utc;
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// assert_eq!(clock.now(), clock.now());
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: DateTime<Utc>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub const fn new(time: DateTime<Utc>) -> Self {
            Self { time }
        }

        /// A clock fixed `duration` later than this one
        #[must_use]
        pub fn advanced(&self, duration: chrono::Duration) -> Self {
            Self::new(self.time + duration)
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            self.time
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

/// Drive effects outside a Store
pub mod effects {
    use utshob_core::effect::Effect;

    /// Execute effects in order and return the actions they produce,
    /// without feeding them back into any reducer.
    pub async fn collect_actions<A, I>(effects: I) -> Vec<A>
    where
        A: Send + 'static,
        I: IntoIterator<Item = Effect<A>>,
    {
        let mut actions = Vec::new();
        for effect in effects {
            if let Effect::Future(fut) = effect {
                actions.extend(fut.await);
            }
        }
        actions
    }
}

// Re-export commonly used items
pub use mocks::{FixedClock, test_clock};
pub use reducer_test::{ReducerTest, assertions};
