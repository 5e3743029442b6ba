//! Event-sourced metric collection.
//!
//! Coordinators and resource managers append timestamped records here at
//! every state change; nothing is ever mutated afterwards. Reports are pure
//! functions over these streams, so a run's KPIs are reproducible from its
//! event CSVs alone.

use bevy_ecs::prelude::Resource;
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventCategory {
    Wagon,
    Locomotive,
    Workshop,
    Track,
}

impl EventCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            EventCategory::Wagon => "wagon",
            EventCategory::Locomotive => "locomotive",
            EventCategory::Workshop => "workshop",
            EventCategory::Track => "track",
        }
    }
}

#[derive(Debug, Clone)]
pub struct RecordedEvent {
    pub time_ms: u64,
    pub kind: &'static str,
    pub subject_id: String,
    /// Structured detail; serialised to sorted-key JSON in exports.
    pub payload: Value,
}

#[derive(Debug, Default, Resource)]
pub struct EventRecorder {
    wagon: Vec<RecordedEvent>,
    locomotive: Vec<RecordedEvent>,
    workshop: Vec<RecordedEvent>,
    track: Vec<RecordedEvent>,
}

impl EventRecorder {
    pub fn record(
        &mut self,
        category: EventCategory,
        time_ms: u64,
        kind: &'static str,
        subject_id: impl Into<String>,
        payload: Value,
    ) {
        let event = RecordedEvent {
            time_ms,
            kind,
            subject_id: subject_id.into(),
            payload,
        };
        self.stream_mut(category).push(event);
    }

    pub fn events(&self, category: EventCategory) -> &[RecordedEvent] {
        match category {
            EventCategory::Wagon => &self.wagon,
            EventCategory::Locomotive => &self.locomotive,
            EventCategory::Workshop => &self.workshop,
            EventCategory::Track => &self.track,
        }
    }

    fn stream_mut(&mut self, category: EventCategory) -> &mut Vec<RecordedEvent> {
        match category {
            EventCategory::Wagon => &mut self.wagon,
            EventCategory::Locomotive => &mut self.locomotive,
            EventCategory::Workshop => &mut self.workshop,
            EventCategory::Track => &mut self.track,
        }
    }

    /// Events of one subject within a category, in record order.
    pub fn timeline<'a>(
        &'a self,
        category: EventCategory,
        subject_id: &'a str,
    ) -> impl Iterator<Item = &'a RecordedEvent> {
        self.events(category)
            .iter()
            .filter(move |e| e.subject_id == subject_id)
    }

    /// First event of a kind for a subject, if any (report helper).
    pub fn first_of_kind<'a>(
        &'a self,
        category: EventCategory,
        subject_id: &'a str,
        kind: &str,
    ) -> Option<&'a RecordedEvent> {
        self.timeline(category, subject_id).find(|e| e.kind == kind)
    }
}
