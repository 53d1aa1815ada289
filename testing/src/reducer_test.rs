//! Given-When-Then harness for flow reducers
//!
//! [`ReducerTest::run`] checks a single decision: the state and effects the
//! reducer returns for one command, without executing anything.
//! [`ReducerTest::settle`] goes further and drives the feedback loop the way
//! the runtime does, so the assertions see the state after every event the
//! effects produced has been reduced.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use crate::effects::collect_actions;
use utshob_core::{effect::Effect, reducer::Reducer};

type StateAssertion<S> = Box<dyn FnOnce(&S)>;
type EffectAssertion<A> = Box<dyn FnOnce(&[Effect<A>])>;

/// Fluent reducer test
///
/// # Example
///
/// ```ignore
/// use utshob_testing::{ReducerTest, assertions};
///
/// ReducerTest::new(FeedbackReducer)
///     .with_env(env)
///     .given_state(state_with_existing_review())
///     .when_action(FeedbackAction::SubmitReview { .. })
///     .then_state(|state| {
///         assert!(matches!(state.outcome, Some(Err(MarketplaceError::Duplicate(_)))));
///     })
///     .then_effects(assertions::assert_no_effects)
///     .run();
/// ```
pub struct ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    reducer: R,
    environment: Option<E>,
    initial_state: Option<S>,
    action: Option<A>,
    state_assertions: Vec<StateAssertion<S>>,
    effect_assertions: Vec<EffectAssertion<A>>,
}

impl<R, S, A, E> ReducerTest<R, S, A, E>
where
    R: Reducer<State = S, Action = A, Environment = E>,
{
    /// Start a test for `reducer`
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            environment: None,
            initial_state: None,
            action: None,
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Environment the reducer runs against
    #[must_use]
    pub fn with_env(mut self, env: E) -> Self {
        self.environment = Some(env);
        self
    }

    /// Records loaded before the command (Given)
    #[must_use]
    pub fn given_state(mut self, state: S) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Command under test (When)
    #[must_use]
    pub fn when_action(mut self, action: A) -> Self {
        self.action = Some(action);
        self
    }

    /// Check the resulting state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&S) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Check the effects returned for the command itself (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[Effect<A>]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    #[allow(clippy::expect_used)] // Test code can use expect
    fn decide(self) -> (R, E, S, Vec<Effect<A>>, Vec<StateAssertion<S>>) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");
        let action = self.action.expect("Action must be set with when_action()");
        let env = self
            .environment
            .expect("Environment must be set with with_env()");

        let effects: Vec<_> = self.reducer.reduce(&mut state, action, &env).into_iter().collect();
        for assertion in self.effect_assertions {
            assertion(&effects);
        }
        (self.reducer, env, state, effects, self.state_assertions)
    }

    /// Reduce the command once and run the assertions
    ///
    /// Effects are inspected but never executed.
    ///
    /// # Panics
    ///
    /// Panics if state, action or environment is missing, or if an
    /// assertion fails.
    pub fn run(self) {
        let (_, _, state, _, state_assertions) = self.decide();
        for assertion in state_assertions {
            assertion(&state);
        }
    }

    /// Reduce the command, execute effects and reduce every action they
    /// produce until nothing is left, then run the state assertions
    ///
    /// Effect assertions still see the effects of the command itself.
    /// Returns the settled state for checks that need `await`.
    ///
    /// # Panics
    ///
    /// Panics if state, action or environment is missing, if an assertion
    /// fails, or if an effect panics.
    pub async fn settle(self) -> S
    where
        A: Send + 'static,
    {
        let (reducer, env, mut state, effects, state_assertions) = self.decide();

        let mut pending = collect_actions(effects).await;
        while !pending.is_empty() {
            let mut next = Vec::new();
            for action in pending {
                next.extend(collect_actions(reducer.reduce(&mut state, action, &env)).await);
            }
            pending = next;
        }

        for assertion in state_assertions {
            assertion(&state);
        }
        state
    }
}

/// Effect assertions for [`ReducerTest::then_effects`]
pub mod assertions {
    use utshob_core::effect::Effect;

    /// The reducer asked for no work: either nothing or a single no-op
    ///
    /// # Panics
    ///
    /// Panics otherwise.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_no_effects<A: std::fmt::Debug>(effects: &[Effect<A>]) {
        assert!(
            effects.is_empty() || matches!(effects, [Effect::None]),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// The reducer scheduled storage or other async work
    ///
    /// # Panics
    ///
    /// Panics if no `Effect::Future` was returned.
    #[allow(clippy::panic)] // Test assertion
    pub fn assert_has_future_effect<A>(effects: &[Effect<A>]) {
        assert!(
            effects.iter().any(|e| matches!(e, Effect::Future(_))),
            "Expected at least one Future effect, but none found"
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use utshob_core::{SmallVec, smallvec};

    /// A till that records a deposit through an effect, then confirms it
    #[derive(Clone, Debug, Default)]
    struct Till {
        balance: u64,
        confirmed: Vec<u64>,
    }

    #[derive(Clone, Debug)]
    enum TillAction {
        Deposit(u64),
        Deposited(u64),
        Refuse,
    }

    struct TillReducer;

    impl Reducer for TillReducer {
        type State = Till;
        type Action = TillAction;
        type Environment = ();

        fn reduce(
            &self,
            state: &mut Till,
            action: TillAction,
            _env: &(),
        ) -> SmallVec<[Effect<TillAction>; 4]> {
            match action {
                TillAction::Deposit(amount) => {
                    smallvec![Effect::future(async move { Some(TillAction::Deposited(amount)) })]
                },
                TillAction::Deposited(amount) => {
                    state.balance += amount;
                    state.confirmed.push(amount);
                    smallvec![Effect::None]
                },
                TillAction::Refuse => SmallVec::new(),
            }
        }
    }

    #[test]
    fn test_run_checks_the_decision_only() {
        ReducerTest::new(TillReducer)
            .with_env(())
            .given_state(Till::default())
            .when_action(TillAction::Deposit(500))
            .then_state(|till| assert_eq!(till.balance, 0))
            .then_effects(assertions::assert_has_future_effect)
            .run();
    }

    #[tokio::test]
    async fn test_settle_feeds_events_back() {
        let till = ReducerTest::new(TillReducer)
            .with_env(())
            .given_state(Till { balance: 100, confirmed: Vec::new() })
            .when_action(TillAction::Deposit(500))
            .then_effects(assertions::assert_has_future_effect)
            .then_state(|till| assert_eq!(till.balance, 600))
            .settle()
            .await;

        assert_eq!(till.confirmed, vec![500]);
    }

    #[test]
    fn test_refusal_has_no_effects() {
        ReducerTest::new(TillReducer)
            .with_env(())
            .given_state(Till::default())
            .when_action(TillAction::Refuse)
            .then_effects(assertions::assert_no_effects)
            .run();

        assertions::assert_no_effects::<TillAction>(&[Effect::None]);
    }
}
