use proptest::prelude::*;
use stepchain_core::state_machine::{StepEvent, StepState};

pub fn step_state_strategy() -> impl Strategy<Value = StepState> {
    prop::sample::select(StepState::ALL.to_vec())
}

pub fn step_event_strategy() -> impl Strategy<Value = StepEvent> {
    prop_oneof![
        Just(StepEvent::Start),
        Just(StepEvent::Complete),
        "[a-z ]{1,20}".prop_map(StepEvent::Fail),
    ]
}

/// Per-step outcome of a generated chain: `true` means the action fails
pub fn chain_outcomes_strategy() -> impl Strategy<Value = Vec<bool>> {
    prop::collection::vec(prop::bool::weighted(0.2), 1..8)
}

/// For each step index `i`, an optional dependency on an earlier index
pub fn forest_strategy() -> impl Strategy<Value = Vec<Option<usize>>> {
    (1usize..10).prop_flat_map(|len| {
        (0..len)
            .map(|i| {
                if i == 0 {
                    Just(None).boxed()
                } else {
                    prop::option::of(0..i).boxed()
                }
            })
            .collect::<Vec<_>>()
    })
}
