//! Entities of the replicated scene graph.
//!
//! A [`GameObject`] owns an ordered list of [`Component`]s, at most one per
//! capability tag, plus a set of string tags. Components are indexed by tag,
//! by local id and by server id; every index is updated in the same call as
//! the mutation that requires it.

use crate::capability::{Capability, CapabilityRegistry, UpdateContext};
use crate::component::Component;
use crate::components::Transform2D;
use crate::event::Event;
use crate::ids::{LocalId, ServerId};
use crate::sync::{GameObjectJson, GameObjectSync};
use crate::error::CodecError;
use log::{debug, warn};
use std::collections::HashMap;

#[derive(Debug)]
pub struct GameObject {
    local_id: LocalId,
    server_id: Option<ServerId>,
    scene: Option<LocalId>,
    /// Include in full snapshots.
    pub json: bool,
    /// Include in per-tick deltas.
    pub sync: bool,
    tags: Vec<String>,
    components: Vec<Component>,
    by_kind: HashMap<&'static str, LocalId>,
    by_local: HashMap<LocalId, usize>,
    by_server: HashMap<ServerId, LocalId>,
    events: Vec<Event>,
}

impl GameObject {
    pub fn new() -> Self {
        Self {
            local_id: LocalId::next(),
            server_id: None,
            scene: None,
            json: true,
            sync: true,
            tags: Vec::new(),
            components: Vec::new(),
            by_kind: HashMap::new(),
            by_local: HashMap::new(),
            by_server: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn with_server_id(mut self, server_id: ServerId) -> Self {
        self.server_id = Some(server_id);
        self
    }

    pub fn with_component(mut self, component: Component) -> Self {
        self.add_component(component);
        self
    }

    pub fn with_tag(mut self, tag: &str) -> Self {
        self.add_tag(tag);
        self
    }

    pub fn local_id(&self) -> LocalId {
        self.local_id
    }

    pub fn server_id(&self) -> Option<ServerId> {
        self.server_id
    }

    /// Containing scene, if any.
    pub fn scene(&self) -> Option<LocalId> {
        self.scene
    }

    pub(crate) fn attach_scene(&mut self, scene: LocalId) {
        self.scene = Some(scene);
    }

    pub(crate) fn detach_scene(&mut self) {
        self.scene = None;
    }

    pub fn components(&self) -> &[Component] {
        &self.components
    }

    pub fn tags(&self) -> &[String] {
        &self.tags
    }

    // ---- tags ----

    pub fn add_tag(&mut self, tag: &str) {
        if !self.has_tag(tag) {
            self.tags.push(tag.to_string());
        }
    }

    pub fn add_tags<'a>(&mut self, tags: impl IntoIterator<Item = &'a str>) {
        for tag in tags {
            self.add_tag(tag);
        }
    }

    pub fn remove_tag(&mut self, tag: &str) {
        self.tags.retain(|existing| existing != tag);
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|existing| existing == tag)
    }

    // ---- components ----

    /// Attaches `component`. Returns `false` (and logs) if a component with
    /// the same capability tag is already present.
    pub fn add_component(&mut self, mut component: Component) -> bool {
        let kind = component.kind();
        if self.by_kind.contains_key(kind) {
            warn!("GameObject.add_component: GameObject already has a(n) {} Component", kind);
            return false;
        }

        let component_id = component.local_id();
        component.attach(self.local_id);

        self.by_kind.insert(kind, component_id);
        self.by_local.insert(component_id, self.components.len());
        if let Some(server_id) = component.server_id() {
            self.by_server.insert(server_id, component_id);
        }
        self.components.push(component);

        self.events.push(Event::ComponentAdded {
            game_object: self.local_id,
            component: component_id,
            kind,
        });
        true
    }

    /// Resolves `kind` through the registry and attaches a default instance.
    pub fn add_component_kind(&mut self, registry: &CapabilityRegistry, kind: &str) -> bool {
        match Component::from_kind(registry, kind) {
            Some(component) => self.add_component(component),
            None => {
                warn!("GameObject.add_component: {} is not a registered capability", kind);
                false
            }
        }
    }

    /// Detaches and returns the component with capability tag `kind`.
    pub fn remove_component(&mut self, kind: &str) -> Option<Component> {
        match self.by_kind.get(kind).copied() {
            Some(component_id) => self.remove_component_by_id(component_id),
            None => {
                warn!("GameObject.remove_component: GameObject does not have a(n) {} Component", kind);
                None
            }
        }
    }

    pub fn remove_component_by_id(&mut self, component_id: LocalId) -> Option<Component> {
        let Some(index) = self.by_local.get(&component_id).copied() else {
            warn!("GameObject.remove_component: component {} is not attached", component_id);
            return None;
        };

        let mut component = self.components.remove(index);
        self.by_local.remove(&component_id);
        self.by_kind.remove(component.kind());
        if let Some(server_id) = component.server_id() {
            self.by_server.remove(&server_id);
        }
        for position in self.by_local.values_mut() {
            if *position > index {
                *position -= 1;
            }
        }
        component.detach();

        self.events.push(Event::ComponentRemoved {
            game_object: self.local_id,
            component: component_id,
            kind: component.kind(),
        });
        Some(component)
    }

    pub fn get_component(&self, kind: &str) -> Option<&Component> {
        self.by_kind
            .get(kind)
            .and_then(|id| self.find_component_by_id(*id))
    }

    pub fn get_component_mut(&mut self, kind: &str) -> Option<&mut Component> {
        let id = *self.by_kind.get(kind)?;
        self.find_component_by_id_mut(id)
    }

    pub fn has_component(&self, kind: &str) -> bool {
        self.by_kind.contains_key(kind)
    }

    pub fn find_component_by_id(&self, id: LocalId) -> Option<&Component> {
        self.by_local.get(&id).map(|index| &self.components[*index])
    }

    pub fn find_component_by_id_mut(&mut self, id: LocalId) -> Option<&mut Component> {
        let index = *self.by_local.get(&id)?;
        Some(&mut self.components[index])
    }

    pub fn find_component_by_server_id(&self, server_id: ServerId) -> Option<&Component> {
        self.by_server
            .get(&server_id)
            .and_then(|id| self.find_component_by_id(*id))
    }

    pub fn find_component_by_server_id_mut(&mut self, server_id: ServerId) -> Option<&mut Component> {
        let id = *self.by_server.get(&server_id)?;
        self.find_component_by_id_mut(id)
    }

    /// Typed lookup of the first component holding capability `C`.
    pub fn get<C: Capability>(&self) -> Option<&C> {
        self.components.iter().find_map(|component| component.get::<C>())
    }

    pub fn get_mut<C: Capability>(&mut self) -> Option<&mut C> {
        self.components
            .iter_mut()
            .find_map(|component| component.get_mut::<C>())
    }

    // ---- lifecycle ----

    /// Replaces own tags and components with deep copies of `other`'s.
    /// Copied components get fresh local ids and no server id.
    pub fn copy_from(&mut self, other: &GameObject) {
        self.clear();
        self.json = other.json;
        self.sync = other.sync;
        for component in &other.components {
            self.add_component(component.clone_detached());
        }
        for tag in &other.tags {
            self.add_tag(tag);
        }
    }

    /// Removes every tag and component, emitting the usual removal events.
    pub fn clear(&mut self) {
        self.tags.clear();
        let ids: Vec<LocalId> = self.components.iter().rev().map(Component::local_id).collect();
        for id in ids {
            self.remove_component_by_id(id);
        }
    }

    pub(crate) fn push_event(&mut self, event: Event) {
        self.events.push(event);
    }

    /// Takes the events queued since the last drain.
    pub fn drain_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn update(&mut self, delta: f32, frame_count: u64) {
        let ctx = UpdateContext {
            delta,
            frame_count,
            transform: self.get::<Transform2D>().copied(),
        };
        for component in &mut self.components {
            component.capability_mut().update(&ctx);
        }
    }

    // ---- snapshot codec ----

    pub fn to_json(&self) -> Result<GameObjectJson, CodecError> {
        let components = self
            .components
            .iter()
            .map(|component| component.json.then(|| component.to_json()).transpose())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GameObjectJson {
            id: self.server_id,
            json: self.json,
            sync: self.sync,
            components,
            tags: self.tags.clone(),
        })
    }

    /// Builds a new game object carrying the snapshot's server id.
    pub fn from_json(registry: &CapabilityRegistry, json: &GameObjectJson) -> Self {
        let mut game_object = GameObject::new();
        game_object.server_id = json.id;
        game_object.apply_json(registry, json);
        game_object
    }

    /// Merges a snapshot into this object. Components are matched by server
    /// id and updated in place; unmatched entries are constructed through the
    /// registry. Entries with unknown tags or undecodable data are skipped.
    pub fn apply_json(&mut self, registry: &CapabilityRegistry, json: &GameObjectJson) {
        self.json = json.json;
        self.sync = json.sync;

        for entry in json.components.iter().flatten() {
            if !registry.contains(&entry.kind) {
                debug!("GameObject.apply_json: skipping unknown capability {}", entry.kind);
                continue;
            }

            if let Some(existing) = entry.id.and_then(|id| self.find_component_by_server_id_mut(id)) {
                if existing.kind() != entry.kind {
                    warn!(
                        "GameObject.apply_json: server id {:?} is a {}, snapshot says {}",
                        entry.id,
                        existing.kind(),
                        entry.kind
                    );
                    continue;
                }
                if let Err(e) = existing.apply_json(entry) {
                    warn!("GameObject.apply_json: bad {} payload: {}", entry.kind, e);
                }
                continue;
            }

            match Component::from_json(registry, entry) {
                Ok(Some(component)) => {
                    self.add_component(component);
                }
                Ok(None) => {}
                Err(e) => warn!("GameObject.apply_json: bad {} payload: {}", entry.kind, e),
            }
        }

        for tag in &json.tags {
            self.add_tag(tag);
        }
    }

    // ---- delta codec ----

    pub fn to_sync(&self) -> GameObjectSync {
        GameObjectSync {
            id: self.server_id,
            components: self
                .components
                .iter()
                .map(|component| component.sync.then(|| component.to_sync()))
                .collect(),
        }
    }

    /// Merges a delta into this object using the same rule as
    /// [`apply_json`](Self::apply_json). Components seen for the first time
    /// are materialised from the delta alone.
    pub fn apply_sync(&mut self, registry: &CapabilityRegistry, sync: &GameObjectSync) {
        for entry in sync.components.iter().flatten() {
            if let Some(existing) = entry.id.and_then(|id| self.find_component_by_server_id_mut(id)) {
                if existing.kind() != entry.kind {
                    warn!(
                        "GameObject.apply_sync: server id {:?} is a {}, delta says {}",
                        entry.id,
                        existing.kind(),
                        entry.kind
                    );
                    continue;
                }
                if let Err(e) = existing.apply_sync(entry) {
                    warn!("GameObject.apply_sync: {}", e);
                }
                continue;
            }

            match Component::from_sync(registry, entry) {
                Ok(Some(component)) => {
                    self.add_component(component);
                }
                Ok(None) => debug!("GameObject.apply_sync: skipping unknown capability {}", entry.kind),
                Err(e) => warn!("GameObject.apply_sync: {}", e),
            }
        }
    }
}

impl Default for GameObject {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::components::{Camera2D, Sprite2D};
    use crate::sync::{ComponentJson, ComponentSync};

    fn assert_indices_consistent(game_object: &GameObject) {
        assert_eq!(game_object.by_kind.len(), game_object.components.len());
        assert_eq!(game_object.by_local.len(), game_object.components.len());
        let with_server_id = game_object
            .components
            .iter()
            .filter(|component| component.server_id().is_some())
            .count();
        assert_eq!(game_object.by_server.len(), with_server_id);

        for (index, component) in game_object.components.iter().enumerate() {
            assert_eq!(game_object.by_local[&component.local_id()], index);
            assert_eq!(game_object.by_kind[component.kind()], component.local_id());
            assert_eq!(component.game_object(), Some(game_object.local_id()));
            if let Some(server_id) = component.server_id() {
                assert_eq!(game_object.by_server[&server_id], component.local_id());
            }
        }
    }

    #[test]
    fn test_add_remove_keeps_indices_exact() {
        let mut game_object = GameObject::new();
        game_object.add_component(Component::from_capability(Transform2D::default()).with_server_id(1));
        game_object.add_component(Component::from_capability(Camera2D::default()));
        game_object.add_component(Component::from_capability(Sprite2D::default()).with_server_id(3));
        assert_indices_consistent(&game_object);

        let removed = game_object.remove_component("Transform2D").unwrap();
        assert_eq!(removed.game_object(), None);
        assert_indices_consistent(&game_object);
        assert!(game_object.find_component_by_server_id(1).is_none());
        assert!(game_object.find_component_by_server_id(3).is_some());

        game_object.add_component(removed);
        assert_indices_consistent(&game_object);
        assert_eq!(game_object.components().len(), 3);
    }

    #[test]
    fn test_duplicate_kind_is_a_no_op() {
        let mut game_object = GameObject::new();
        let first = Component::from_capability(Camera2D::default());
        let first_id = first.local_id();
        assert!(game_object.add_component(first));
        assert!(!game_object.add_component(Component::from_capability(Camera2D::default())));

        assert_eq!(game_object.components().len(), 1);
        assert_eq!(game_object.get_component("Camera2D").unwrap().local_id(), first_id);
    }

    #[test]
    fn test_remove_missing_component_is_a_no_op() {
        let mut game_object = GameObject::new().with_component(Component::from_capability(Sprite2D::default()));
        assert!(game_object.remove_component("Camera2D").is_none());
        assert_eq!(game_object.components().len(), 1);
    }

    #[test]
    fn test_add_by_kind_uses_registry() {
        let registry = CapabilityRegistry::with_defaults();
        let mut game_object = GameObject::new();

        assert!(game_object.add_component_kind(&registry, "Camera2D"));
        assert!(!game_object.add_component_kind(&registry, "Unknown"));
        assert!(game_object.get::<Camera2D>().is_some());
    }

    #[test]
    fn test_events_are_tag_specific_and_ordered() {
        let mut game_object = GameObject::new();
        game_object.add_component(Component::from_capability(Camera2D::default()));
        game_object.remove_component("Camera2D");

        let names: Vec<String> = game_object.drain_events().iter().map(Event::name).collect();
        assert_eq!(names, vec!["addCamera2D", "removeCamera2D"]);
        assert!(game_object.drain_events().is_empty());
    }

    #[test]
    fn test_tags_have_set_semantics() {
        let mut game_object = GameObject::new();
        game_object.add_tags(["player", "player", "blue"]);
        game_object.remove_tag("missing");

        assert_eq!(game_object.tags().len(), 2);
        assert!(game_object.has_tag("player"));
        game_object.remove_tag("player");
        assert!(!game_object.has_tag("player"));
    }

    #[test]
    fn test_copy_is_isolated_from_source() {
        let source = GameObject::new()
            .with_server_id(4)
            .with_component(Component::from_capability(Transform2D::at(1.0, 1.0)).with_server_id(5))
            .with_tag("enemy");

        let mut copy = GameObject::new();
        copy.copy_from(&source);
        assert_eq!(copy.server_id(), None);
        assert!(copy.has_tag("enemy"));
        let copied = copy.get_component("Transform2D").unwrap();
        assert_eq!(copied.server_id(), None);
        assert_ne!(copied.local_id(), source.components()[0].local_id());

        copy.get_mut::<Transform2D>().unwrap().position = [9.0, 9.0];
        copy.clear();

        assert!(copy.components().is_empty() && copy.tags().is_empty());
        assert_eq!(source.components().len(), 1);
        assert_eq!(source.get::<Transform2D>().unwrap().position, [1.0, 1.0]);
        assert!(source.has_tag("enemy"));
    }

    #[test]
    fn test_snapshot_roundtrip_reproduces_kinds_and_tags() {
        let registry = CapabilityRegistry::with_defaults();
        let source = GameObject::new()
            .with_server_id(7)
            .with_component(Component::from_capability(Transform2D::at(2.0, 3.0)).with_server_id(70))
            .with_component(Component::from_capability(Camera2D::default()).with_server_id(71))
            .with_tag("camera");

        let json = source.to_json().unwrap();
        let decoded = GameObject::from_json(&registry, &json);

        assert_eq!(decoded.server_id(), Some(7));
        let mut kinds: Vec<&str> = decoded.components().iter().map(Component::kind).collect();
        kinds.sort_unstable();
        assert_eq!(kinds, vec!["Camera2D", "Transform2D"]);
        assert_eq!(decoded.tags(), source.tags());
        assert_eq!(decoded.get::<Transform2D>().unwrap().position, [2.0, 3.0]);
    }

    #[test]
    fn test_snapshot_skips_opted_out_components() {
        let mut hidden = Component::from_capability(Sprite2D::default());
        hidden.json = false;
        let source = GameObject::new()
            .with_component(hidden)
            .with_component(Component::from_capability(Transform2D::default()));

        let json = source.to_json().unwrap();
        assert_eq!(json.components.len(), 2);
        assert!(json.components[0].is_none());
        assert!(json.components[1].is_some());
    }

    #[test]
    fn test_snapshot_merge_preserves_identity() {
        let registry = CapabilityRegistry::with_defaults();
        let mut game_object = GameObject::new()
            .with_component(Component::from_capability(Transform2D::default()).with_server_id(5));
        let before = game_object.components()[0].local_id();

        let json = GameObjectJson {
            id: None,
            json: true,
            sync: true,
            components: vec![Some(ComponentJson {
                id: Some(5),
                kind: "Transform2D".to_string(),
                json: true,
                sync: true,
                data: serde_json::json!({ "position": [8.0, 8.0] }),
            })],
            tags: vec!["moved".to_string()],
        };
        game_object.apply_json(&registry, &json);

        assert_eq!(game_object.components().len(), 1);
        assert_eq!(game_object.components()[0].local_id(), before);
        assert_eq!(game_object.get::<Transform2D>().unwrap().position, [8.0, 8.0]);
        assert!(game_object.has_tag("moved"));
    }

    #[test]
    fn test_delta_merges_in_place_and_materialises_new() {
        let registry = CapabilityRegistry::with_defaults();
        let mut game_object = GameObject::new()
            .with_component(Component::from_capability(Transform2D::default()).with_server_id(5));
        let before = game_object.components()[0].local_id();

        let delta = GameObjectSync {
            id: None,
            components: vec![
                None,
                Some(ComponentSync {
                    id: Some(5),
                    kind: "Transform2D".to_string(),
                    fields: vec![4.0, 5.0, 0.0, 1.0, 1.0],
                }),
                Some(ComponentSync {
                    id: Some(6),
                    kind: "Sprite2D".to_string(),
                    fields: vec![2.0, 1.0, 1.0],
                }),
                Some(ComponentSync {
                    id: Some(8),
                    kind: "Unknown".to_string(),
                    fields: vec![],
                }),
            ],
        };
        game_object.apply_sync(&registry, &delta);

        assert_eq!(game_object.components().len(), 2);
        assert_eq!(game_object.find_component_by_server_id(5).unwrap().local_id(), before);
        assert_eq!(game_object.get::<Transform2D>().unwrap().position, [4.0, 5.0]);
        assert_eq!(game_object.get::<Sprite2D>().unwrap().frame, 2);
        assert_indices_consistent(&game_object);
    }

    #[test]
    fn test_delta_kind_mismatch_is_skipped() {
        let registry = CapabilityRegistry::with_defaults();
        let mut game_object = GameObject::new()
            .with_component(Component::from_capability(Transform2D::at(1.0, 1.0)).with_server_id(5));

        game_object.apply_sync(
            &registry,
            &GameObjectSync {
                id: None,
                components: vec![Some(ComponentSync {
                    id: Some(5),
                    kind: "Sprite2D".to_string(),
                    fields: vec![1.0, 1.0, 1.0],
                })],
            },
        );

        assert_eq!(game_object.components().len(), 1);
        assert_eq!(game_object.get::<Transform2D>().unwrap().position, [1.0, 1.0]);
    }

    #[test]
    fn test_update_feeds_transform_to_camera() {
        let mut camera = Camera2D::default();
        camera.set_active(true);
        let mut game_object = GameObject::new()
            .with_component(Component::from_capability(Transform2D::at(3.0, 0.0)))
            .with_component(Component::from_capability(camera));

        game_object.update(1.0 / 60.0, 1);

        let view = game_object.get::<Camera2D>().unwrap().view();
        assert_eq!(view[4], -3.0);
    }
}
