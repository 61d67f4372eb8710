//! Watch events delivered to local watchers.

use serde::{Deserialize, Serialize};

use super::object::ResourceObject;

/// Event type, serialized the way the Kubernetes watch protocol spells it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WatchEventType {
    Added,
    Modified,
    Deleted,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchEvent {
    #[serde(rename = "type")]
    pub event_type: WatchEventType,
    pub object: ResourceObject,
}

impl WatchEvent {
    pub fn added(object: ResourceObject) -> Self {
        Self { event_type: WatchEventType::Added, object }
    }

    pub fn modified(object: ResourceObject) -> Self {
        Self { event_type: WatchEventType::Modified, object }
    }

    pub fn deleted(object: ResourceObject) -> Self {
        Self { event_type: WatchEventType::Deleted, object }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::models::ResourceKind;

    #[test]
    fn test_wire_shape() {
        let event = WatchEvent::modified(ResourceObject::new(ResourceKind::Pod, Some("a"), "b"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "MODIFIED");
        assert_eq!(json["object"]["metadata"]["name"], "b");
    }
}
