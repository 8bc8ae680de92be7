// Broker change notifications
//
// One variant per entity kind, one closed set of operation tags.
// Wire format: {"entity": "VIOLATION", "op": "UPDATE", "id": "42", "payload": {...}}

use crate::domain::error::DomainError;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ChangeOp {
    Create,
    Update,
    Delete,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Object,
    Participant,
    Work,
    Document,
    Violation,
    Notification,
}

/// Body shared by every entity variant
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Change {
    pub op: ChangeOp,
    pub id: String,
    #[serde(default)]
    pub payload: serde_json::Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "entity", rename_all = "UPPERCASE")]
pub enum ChangeEvent {
    Object(Change),
    Participant(Change),
    Work(Change),
    Document(Change),
    Violation(Change),
    Notification(Change),
}

/// Receiver of routed change events
pub trait ChangeHandler {
    fn on_create(&mut self, entity: EntityKind, id: &str, payload: &serde_json::Value);
    fn on_update(&mut self, entity: EntityKind, id: &str, payload: &serde_json::Value);
    fn on_delete(&mut self, entity: EntityKind, id: &str);
}

impl ChangeEvent {
    /// Parse a broker frame. Unknown entity or op tags are rejected.
    pub fn from_json(raw: &str) -> Result<Self, DomainError> {
        serde_json::from_str(raw).map_err(|e| DomainError::MalformedChangeEvent(e.to_string()))
    }

    pub fn entity(&self) -> EntityKind {
        self.parts().0
    }

    pub fn change(&self) -> &Change {
        self.parts().1
    }

    fn parts(&self) -> (EntityKind, &Change) {
        match self {
            ChangeEvent::Object(c) => (EntityKind::Object, c),
            ChangeEvent::Participant(c) => (EntityKind::Participant, c),
            ChangeEvent::Work(c) => (EntityKind::Work, c),
            ChangeEvent::Document(c) => (EntityKind::Document, c),
            ChangeEvent::Violation(c) => (EntityKind::Violation, c),
            ChangeEvent::Notification(c) => (EntityKind::Notification, c),
        }
    }

    /// Route to the handler method matching the operation tag
    pub fn dispatch<H: ChangeHandler + ?Sized>(&self, handler: &mut H) {
        let (entity, change) = self.parts();
        match change.op {
            ChangeOp::Create => handler.on_create(entity, &change.id, &change.payload),
            ChangeOp::Update => handler.on_update(entity, &change.id, &change.payload),
            ChangeOp::Delete => handler.on_delete(entity, &change.id),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Default)]
    struct Recorder {
        calls: Vec<(ChangeOp, EntityKind, String)>,
    }

    impl ChangeHandler for Recorder {
        fn on_create(&mut self, entity: EntityKind, id: &str, _payload: &serde_json::Value) {
            self.calls.push((ChangeOp::Create, entity, id.to_string()));
        }

        fn on_update(&mut self, entity: EntityKind, id: &str, _payload: &serde_json::Value) {
            self.calls.push((ChangeOp::Update, entity, id.to_string()));
        }

        fn on_delete(&mut self, entity: EntityKind, id: &str) {
            self.calls.push((ChangeOp::Delete, entity, id.to_string()));
        }
    }

    #[test]
    fn test_parse_and_dispatch_update() {
        let event = ChangeEvent::from_json(
            r#"{"entity":"VIOLATION","op":"UPDATE","id":"42","payload":{"status":"closed"}}"#,
        )
        .unwrap();

        assert_eq!(event.entity(), EntityKind::Violation);
        assert_eq!(event.change().payload, json!({"status": "closed"}));

        let mut recorder = Recorder::default();
        event.dispatch(&mut recorder);
        assert_eq!(
            recorder.calls,
            vec![(ChangeOp::Update, EntityKind::Violation, "42".to_string())]
        );
    }

    #[test]
    fn test_delete_without_payload() {
        let event = ChangeEvent::from_json(r#"{"entity":"WORK","op":"DELETE","id":"w-1"}"#).unwrap();

        let mut recorder = Recorder::default();
        event.dispatch(&mut recorder);
        assert_eq!(
            recorder.calls,
            vec![(ChangeOp::Delete, EntityKind::Work, "w-1".to_string())]
        );
    }

    #[test]
    fn test_unknown_tags_are_rejected() {
        assert!(ChangeEvent::from_json(r#"{"entity":"INVOICE","op":"CREATE","id":"1"}"#).is_err());
        assert!(ChangeEvent::from_json(r#"{"entity":"OBJECT","op":"UPSERT","id":"1"}"#).is_err());
    }

    #[test]
    fn test_round_trips_wire_shape() {
        let event = ChangeEvent::Document(Change {
            op: ChangeOp::Create,
            id: "d-9".to_string(),
            payload: json!({"title": "permit"}),
        });
        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["entity"], "DOCUMENT");
        assert_eq!(value["op"], "CREATE");
    }
}
