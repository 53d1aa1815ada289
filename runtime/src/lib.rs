//! # Utshob Runtime
//!
//! Runtime implementation for Utshob reducers.
//!
//! The [`Store`] drives a reducer through one request: it applies the initial
//! action, executes the effects the reducer returns, feeds every action those
//! effects produce back into the reducer, and returns once no work remains.
//! Callers then read the outcome out of the final state.
//!
//! ## Example
//!
//! ```ignore
//! use utshob_runtime::Store;
//!
//! let store = Store::new(state, BookingReducer, env);
//! store.send(BookingAction::Create { .. }).await?;
//! let outcome = store.state(|s| s.outcome.clone()).await;
//! ```

use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::RwLock;
use utshob_core::{effect::Effect, reducer::Reducer};

/// Prometheus metrics for observability
pub mod metrics;

/// Error types for the Store runtime
pub mod error {
    use thiserror::Error;

    /// Errors that can occur while a Store processes an action
    #[derive(Error, Debug)]
    pub enum StoreError {
        /// A spawned effect panicked or was cancelled
        #[error("Task failed during effect execution: {0}")]
        TaskJoinError(#[from] tokio::task::JoinError),

        /// The feedback loop produced more actions than allowed
        ///
        /// Guards against reducers that keep answering their own effects.
        #[error("Action limit of {0} exceeded while processing feedback")]
        ActionLimitExceeded(usize),
    }
}

pub use error::StoreError;

/// Default ceiling on actions processed by a single `send`
pub const DEFAULT_MAX_ACTIONS: usize = 64;

/// Store module - The runtime for reducers
pub mod store {
    use super::{Arc, DEFAULT_MAX_ACTIONS, Effect, Reducer, RwLock, StoreError, VecDeque};

    /// The Store - runtime coordinator for a reducer
    ///
    /// The Store owns:
    /// 1. State (behind `RwLock` for concurrent reads)
    /// 2. Reducer (business logic)
    /// 3. Environment (injected dependencies)
    ///
    /// Unlike a long-lived actor, a Store here is created per request and
    /// `send` resolves only after every effect has finished. Reducer calls are
    /// serialized by the write lock; effects of one action run before the next
    /// queued action is reduced.
    ///
    /// # Type Parameters
    ///
    /// - `S`: State type
    /// - `A`: Action type
    /// - `E`: Environment type
    /// - `R`: Reducer implementation
    pub struct Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E>,
    {
        state: Arc<RwLock<S>>,
        reducer: R,
        environment: E,
        max_actions: usize,
    }

    impl<S, A, E, R> Store<S, A, E, R>
    where
        R: Reducer<State = S, Action = A, Environment = E> + Send + Sync,
        A: Send + 'static,
        S: Send + Sync,
        E: Send + Sync,
    {
        /// Create a new store with initial state, reducer, and environment
        #[must_use]
        pub fn new(initial_state: S, reducer: R, environment: E) -> Self {
            Self {
                state: Arc::new(RwLock::new(initial_state)),
                reducer,
                environment,
                max_actions: DEFAULT_MAX_ACTIONS,
            }
        }

        /// Override the per-send action ceiling
        #[must_use]
        pub const fn with_max_actions(mut self, max_actions: usize) -> Self {
            self.max_actions = max_actions;
            self
        }

        /// Send an action and run the feedback loop to quiescence
        ///
        /// 1. Reduce the action under the state write lock
        /// 2. Execute the returned effects
        /// 3. Queue every action the effects produce
        /// 4. Repeat until the queue is empty
        ///
        /// Returns the number of actions reduced, including the initial one.
        ///
        /// # Errors
        ///
        /// - [`StoreError::TaskJoinError`] if an effect panicked
        /// - [`StoreError::ActionLimitExceeded`] if the loop does not settle
        #[tracing::instrument(skip(self, action), name = "store_send")]
        pub async fn send(&self, action: A) -> Result<usize, StoreError> {
            let mut queue = VecDeque::from([action]);
            let mut processed = 0;

            while let Some(action) = queue.pop_front() {
                if processed >= self.max_actions {
                    tracing::error!(limit = self.max_actions, "Store feedback loop did not settle");
                    return Err(StoreError::ActionLimitExceeded(self.max_actions));
                }
                processed += 1;

                let effects = {
                    let mut state = self.state.write().await;
                    self.reducer.reduce(&mut state, action, &self.environment)
                };
                metrics::counter!("store.actions.processed").increment(1);

                for effect in effects {
                    queue.extend(execute(effect).await?);
                }
            }

            tracing::trace!(processed, "Store settled");
            Ok(processed)
        }

        /// Read state via a closure
        pub async fn state<F, T>(&self, f: F) -> T
        where
            F: FnOnce(&S) -> T,
        {
            let state = self.state.read().await;
            f(&*state)
        }

        /// Consume the store and return the final state
        ///
        /// Returns `None` if a clone of the inner state handle is still alive.
        #[must_use]
        pub fn into_state(self) -> Option<S> {
            Arc::try_unwrap(self.state).ok().map(RwLock::into_inner)
        }
    }

    /// Execute one effect and return the action it fed back, if any
    async fn execute<A: Send + 'static>(effect: Effect<A>) -> Result<Option<A>, StoreError> {
        match effect {
            Effect::None => {
                metrics::counter!("store.effects.executed", "type" => "none").increment(1);
                Ok(None)
            },
            Effect::Future(fut) => {
                metrics::counter!("store.effects.executed", "type" => "future").increment(1);
                // Spawned so a panicking effect surfaces as a JoinError
                Ok(tokio::spawn(fut).await?)
            },
        }
    }
}

// Re-export for convenience
pub use store::Store;

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use utshob_core::{SmallVec, smallvec};

    #[derive(Debug, Clone, Default)]
    struct TestState {
        value: i32,
    }

    #[derive(Debug, Clone)]
    enum TestAction {
        Increment,
        Decrement,
        ProduceEffect,
        ProduceEmptyEffect,
        Loop,
        ProducePanickingEffect,
    }

    #[derive(Debug, Clone)]
    struct TestEnv;

    #[derive(Debug, Clone)]
    struct TestReducer;

    impl Reducer for TestReducer {
        type State = TestState;
        type Action = TestAction;
        type Environment = TestEnv;

        fn reduce(
            &self,
            state: &mut Self::State,
            action: Self::Action,
            _env: &Self::Environment,
        ) -> SmallVec<[Effect<Self::Action>; 4]> {
            match action {
                TestAction::Increment => {
                    state.value += 1;
                    smallvec![Effect::None]
                },
                TestAction::Decrement => {
                    state.value -= 1;
                    smallvec![Effect::None]
                },
                TestAction::ProduceEffect => {
                    smallvec![Effect::future(async { Some(TestAction::Increment) })]
                },
                TestAction::ProduceEmptyEffect => smallvec![Effect::future(async { None })],
                TestAction::Loop => smallvec![Effect::future(async { Some(TestAction::Loop) })],
                TestAction::ProducePanickingEffect => {
                    #[allow(clippy::panic)] // Intentional panic for testing error handling
                    {
                        smallvec![Effect::future(async {
                            panic!("Intentional panic in effect for testing");
                        })]
                    }
                },
            }
        }
    }

    fn store() -> Store<TestState, TestAction, TestEnv, TestReducer> {
        Store::new(TestState::default(), TestReducer, TestEnv)
    }

    #[tokio::test]
    async fn test_send_action() {
        let store = store();

        let processed = store.send(TestAction::Increment).await.unwrap();
        assert_eq!(processed, 1);
        assert_eq!(store.state(|s| s.value).await, 1);

        store.send(TestAction::Decrement).await.unwrap();
        assert_eq!(store.state(|s| s.value).await, 0);
    }

    #[tokio::test]
    async fn test_future_effect_feeds_back_before_send_returns() {
        let store = store();

        let processed = store.send(TestAction::ProduceEffect).await.unwrap();
        assert_eq!(processed, 2);
        assert_eq!(store.state(|s| s.value).await, 1);
    }

    #[tokio::test]
    async fn test_future_without_action_ends_the_loop() {
        let store = store();

        let processed = store.send(TestAction::ProduceEmptyEffect).await.unwrap();
        assert_eq!(processed, 1);
        assert_eq!(store.state(|s| s.value).await, 0);
    }

    #[tokio::test]
    async fn test_runaway_feedback_is_stopped() {
        let store = store().with_max_actions(5);

        let result = store.send(TestAction::Loop).await;
        assert!(matches!(result, Err(StoreError::ActionLimitExceeded(5))));
    }

    #[tokio::test]
    async fn test_panicking_effect_is_reported() {
        let store = store();

        let result = store.send(TestAction::ProducePanickingEffect).await;
        assert!(matches!(result, Err(StoreError::TaskJoinError(_))));
    }

    #[tokio::test]
    async fn test_into_state() {
        let store = store();
        store.send(TestAction::Increment).await.unwrap();

        let state = store.into_state().unwrap();
        assert_eq!(state.value, 1);
    }
}
