//! Given-When-Then harness for reducers.

#![allow(clippy::module_name_repetitions)] // ReducerTest is the natural name

use herald_core::reducer::Reducer;

type StateAssertion<S> = Box<dyn FnOnce(&S)>;
type EffectAssertion<E> = Box<dyn FnOnce(&[E])>;

/// Fluent API for testing reducers with Given-When-Then syntax
///
/// # Example
///
/// ```ignore
/// use herald_testing::ReducerTest;
///
/// ReducerTest::new(PinReducer)
///     .given_state(PinState::default())
///     .when_action(PinAction::Observed { count: 3, threshold: 3 })
///     .then_effects(|effects| assert_eq!(effects.len(), 1))
///     .run();
/// ```
pub struct ReducerTest<R: Reducer> {
    reducer: R,
    initial_state: Option<R::State>,
    actions: Vec<R::Action>,
    state_assertions: Vec<StateAssertion<R::State>>,
    effect_assertions: Vec<EffectAssertion<R::Effect>>,
}

impl<R: Reducer> ReducerTest<R> {
    /// Create a new reducer test with the given reducer
    #[must_use]
    pub const fn new(reducer: R) -> Self {
        Self {
            reducer,
            initial_state: None,
            actions: Vec::new(),
            state_assertions: Vec::new(),
            effect_assertions: Vec::new(),
        }
    }

    /// Set the initial state (Given)
    #[must_use]
    pub fn given_state(mut self, state: R::State) -> Self {
        self.initial_state = Some(state);
        self
    }

    /// Add an action to apply (When); actions run in order.
    #[must_use]
    pub fn when_action(mut self, action: R::Action) -> Self {
        self.actions.push(action);
        self
    }

    /// Add an assertion about the final state (Then)
    #[must_use]
    pub fn then_state<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&R::State) + 'static,
    {
        self.state_assertions.push(Box::new(assertion));
        self
    }

    /// Add an assertion about the effects of the last action (Then)
    #[must_use]
    pub fn then_effects<F>(mut self, assertion: F) -> Self
    where
        F: FnOnce(&[R::Effect]) + 'static,
    {
        self.effect_assertions.push(Box::new(assertion));
        self
    }

    /// Run the test and execute all assertions
    ///
    /// # Panics
    ///
    /// Panics if the initial state or action is not set, or if any assertion
    /// fails.
    #[allow(clippy::panic)] // Test code can panic
    #[allow(clippy::expect_used)] // Test code can use expect
    pub fn run(self) {
        let mut state = self
            .initial_state
            .expect("Initial state must be set with given_state()");
        assert!(!self.actions.is_empty(), "Action must be set with when_action()");

        let mut effects = Vec::new();
        for action in self.actions {
            effects = self.reducer.reduce(&mut state, action).into_vec();
        }

        for assertion in self.state_assertions {
            assertion(&state);
        }
        for assertion in self.effect_assertions {
            assertion(&effects);
        }
    }
}

/// Helper assertions for effects
pub mod assertions {
    use std::fmt::Debug;

    /// Assert that there are no effects
    ///
    /// # Panics
    ///
    /// Panics if effects is not empty.
    pub fn assert_no_effects<E: Debug>(effects: &[E]) {
        assert!(
            effects.is_empty(),
            "Expected no effects, but found {}: {:?}",
            effects.len(),
            effects
        );
    }

    /// Assert that the effects are exactly `expected`, in order
    ///
    /// # Panics
    ///
    /// Panics if the effects differ.
    pub fn assert_effects<E: Debug + PartialEq>(effects: &[E], expected: &[E]) {
        assert_eq!(effects, expected, "Unexpected effects");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use herald_core::reducer::Effects;
    use smallvec::smallvec;

    #[derive(Debug, Default)]
    struct Tally {
        count: u32,
    }

    #[derive(Debug, PartialEq)]
    enum Announce {
        Reached(u32),
    }

    struct TallyReducer;

    impl Reducer for TallyReducer {
        type State = Tally;
        type Action = u32;
        type Effect = Announce;

        fn reduce(&self, state: &mut Tally, action: u32) -> Effects<Announce> {
            state.count += action;
            if state.count >= 3 {
                smallvec![Announce::Reached(state.count)]
            } else {
                Effects::new()
            }
        }
    }

    #[test]
    fn effects_come_from_the_last_action() {
        ReducerTest::new(TallyReducer)
            .given_state(Tally::default())
            .when_action(1)
            .when_action(2)
            .then_state(|state| assert_eq!(state.count, 3))
            .then_effects(|effects| assertions::assert_effects(effects, &[Announce::Reached(3)]))
            .run();
    }

    #[test]
    fn below_threshold_is_silent() {
        ReducerTest::new(TallyReducer)
            .given_state(Tally::default())
            .when_action(1)
            .then_effects(assertions::assert_no_effects)
            .run();
    }
}
