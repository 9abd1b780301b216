//! Typed notifications emitted by scene graph mutations.
//!
//! Mutations never call listeners directly. Each node queues the events it
//! produces, and the owner drains the queue once the mutation is complete, so
//! a listener always observes a consistent graph and may itself mutate it.

use crate::ids::LocalId;
use crate::scene::Scene;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ComponentAdded {
        game_object: LocalId,
        component: LocalId,
        kind: &'static str,
    },
    ComponentRemoved {
        game_object: LocalId,
        component: LocalId,
        kind: &'static str,
    },
    GameObjectAdded {
        scene: LocalId,
        game_object: LocalId,
    },
    GameObjectRemoved {
        scene: LocalId,
        game_object: LocalId,
    },
    GameObjectDestroyed {
        game_object: LocalId,
    },
}

impl Event {
    /// Capability tag for component events, so listeners can subscribe to a
    /// single variant (`"addCamera2D"` in event-name terms).
    pub fn component_kind(&self) -> Option<&'static str> {
        match self {
            Event::ComponentAdded { kind, .. } | Event::ComponentRemoved { kind, .. } => Some(kind),
            _ => None,
        }
    }

    pub fn name(&self) -> String {
        match self {
            Event::ComponentAdded { kind, .. } => format!("add{}", kind),
            Event::ComponentRemoved { kind, .. } => format!("remove{}", kind),
            Event::GameObjectAdded { .. } => "addGameObject".to_string(),
            Event::GameObjectRemoved { .. } => "removeGameObject".to_string(),
            Event::GameObjectDestroyed { .. } => "destroy".to_string(),
        }
    }
}

/// Listener for events drained from a [`Scene`].
///
/// The scene is handed over mutably; any events caused by the listener are
/// delivered in the following dispatch round.
pub trait SceneObserver {
    fn on_event(&mut self, event: &Event, scene: &mut Scene);
}

impl<F> SceneObserver for F
where
    F: FnMut(&Event, &mut Scene),
{
    fn on_event(&mut self, event: &Event, scene: &mut Scene) {
        self(event, scene)
    }
}
