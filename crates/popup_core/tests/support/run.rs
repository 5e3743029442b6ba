//! Build-and-run helpers plus event-stream assertions.

use bevy_ecs::prelude::World;

use popup_core::recorder::{EventCategory, EventRecorder, RecordedEvent};
use popup_core::runner::{initialize_simulation, run_until_empty, simulation_schedule};
use popup_core::scenario::{build_scenario, validate, ScenarioParams};

const MAX_STEPS: usize = 1_000_000;

/// Validate, build, and run a scenario to completion. Panics on validation
/// errors so fixture mistakes surface immediately.
pub fn run_scenario(params: &ScenarioParams) -> World {
    let report = validate(params);
    assert!(!report.has_errors(), "fixture failed validation: {report}");

    let mut world = World::new();
    build_scenario(&mut world, params);
    initialize_simulation(&mut world);
    let mut schedule = simulation_schedule();
    let steps = run_until_empty(&mut world, &mut schedule, MAX_STEPS);
    assert!(steps < MAX_STEPS, "simulation did not drain its event queue");
    world
}

/// Clone of one event stream as `(time_ms, kind, subject, payload_json)`.
pub fn stream(world: &World, category: EventCategory) -> Vec<(u64, String, String, String)> {
    world
        .resource::<EventRecorder>()
        .events(category)
        .iter()
        .map(|e| {
            (
                e.time_ms,
                e.kind.to_string(),
                e.subject_id.clone(),
                e.payload.to_string(),
            )
        })
        .collect()
}

/// Events of a kind for one subject, in record order.
pub fn events_of<'a>(
    world: &'a World,
    category: EventCategory,
    subject: &'a str,
    kind: &'a str,
) -> Vec<&'a RecordedEvent> {
    world
        .resource::<EventRecorder>()
        .events(category)
        .iter()
        .filter(|e| e.subject_id == subject && e.kind == kind)
        .collect()
}

/// All events of a kind within a category.
pub fn all_of_kind<'a>(
    world: &'a World,
    category: EventCategory,
    kind: &'a str,
) -> Vec<&'a RecordedEvent> {
    world
        .resource::<EventRecorder>()
        .events(category)
        .iter()
        .filter(|e| e.kind == kind)
        .collect()
}

/// Assert that every subject's timeline within a category is monotone in
/// time.
pub fn assert_monotone_timelines(world: &World, category: EventCategory) {
    use std::collections::HashMap;
    let mut last: HashMap<&str, u64> = HashMap::new();
    for event in world.resource::<EventRecorder>().events(category) {
        let prev = last.insert(event.subject_id.as_str(), event.time_ms);
        if let Some(prev) = prev {
            assert!(
                event.time_ms >= prev,
                "timeline of {} jumps backwards: {} -> {}",
                event.subject_id,
                prev,
                event.time_ms
            );
        }
    }
}
