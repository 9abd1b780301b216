//! Scenes own game objects and keep the id indices replication relies on.
//!
//! Besides its own server-id index, a [`Scene`] keeps an aggregate index from
//! component server id to owning game object, so inbound events that target a
//! component resolve without scanning. Mutable access to a contained game
//! object goes through [`GameObjectMut`], which brings the aggregate index up
//! to date when it is dropped.

use crate::capability::CapabilityRegistry;
use crate::component::Component;
use crate::error::CodecError;
use crate::event::{Event, SceneObserver};
use crate::game_object::GameObject;
use crate::ids::{LocalId, ServerId};
use crate::sync::{SceneJson, SceneSync};
use log::{debug, warn};
use std::collections::HashMap;
use std::ops::{Deref, DerefMut};

/// Upper bound on observer feedback rounds per dispatch.
pub const MAX_DISPATCH_ROUNDS: usize = 32;

#[derive(Debug)]
pub struct Scene {
    local_id: LocalId,
    server_id: Option<ServerId>,
    pub name: String,
    game_objects: Vec<GameObject>,
    positions: HashMap<LocalId, usize>,
    by_server: HashMap<ServerId, LocalId>,
    component_index: HashMap<ServerId, LocalId>,
    events: Vec<Event>,
}

impl Scene {
    pub fn new(name: &str) -> Self {
        Self {
            local_id: LocalId::next(),
            server_id: None,
            name: name.to_string(),
            game_objects: Vec::new(),
            positions: HashMap::new(),
            by_server: HashMap::new(),
            component_index: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn with_server_id(mut self, server_id: ServerId) -> Self {
        self.server_id = Some(server_id);
        self
    }

    pub fn local_id(&self) -> LocalId {
        self.local_id
    }

    pub fn server_id(&self) -> Option<ServerId> {
        self.server_id
    }

    pub fn game_objects(&self) -> &[GameObject] {
        &self.game_objects
    }

    pub fn len(&self) -> usize {
        self.game_objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.game_objects.is_empty()
    }

    pub fn contains(&self, game_object: LocalId) -> bool {
        self.positions.contains_key(&game_object)
    }

    /// Takes ownership of `game_object`. Returns its local id, or `None` if
    /// another object in this scene already carries the same server id.
    pub fn add_game_object(&mut self, mut game_object: GameObject) -> Option<LocalId> {
        if let Some(server_id) = game_object.server_id() {
            if self.by_server.contains_key(&server_id) {
                warn!("Scene.add_game_object: Scene already has a GameObject with server id {}", server_id);
                return None;
            }
            self.by_server.insert(server_id, game_object.local_id());
        }

        let id = game_object.local_id();
        game_object.attach_scene(self.local_id);
        for component in game_object.components() {
            index_component(&mut self.component_index, id, component);
        }
        self.positions.insert(id, self.game_objects.len());
        self.game_objects.push(game_object);

        self.events.push(Event::GameObjectAdded {
            scene: self.local_id,
            game_object: id,
        });
        Some(id)
    }

    /// Detaches and returns a game object. Its components stay attached to it
    /// but are dropped from this scene's aggregate index.
    pub fn remove_game_object(&mut self, id: LocalId) -> Option<GameObject> {
        let Some(index) = self.positions.remove(&id) else {
            warn!("Scene.remove_game_object: GameObject {} is not a member of Scene", id);
            return None;
        };

        let mut game_object = self.game_objects.remove(index);
        for position in self.positions.values_mut() {
            if *position > index {
                *position -= 1;
            }
        }
        if let Some(server_id) = game_object.server_id() {
            self.by_server.remove(&server_id);
        }
        for component in game_object.components() {
            unindex_component(&mut self.component_index, id, component);
        }
        game_object.detach_scene();

        // events queued on the object while it was a member belong to this scene
        self.events.extend(game_object.drain_events());
        self.events.push(Event::GameObjectRemoved {
            scene: self.local_id,
            game_object: id,
        });
        Some(game_object)
    }

    pub fn remove_by_server_id(&mut self, server_id: ServerId) -> Option<GameObject> {
        match self.by_server.get(&server_id).copied() {
            Some(id) => self.remove_game_object(id),
            None => {
                warn!("Scene.remove_by_server_id: no GameObject with server id {}", server_id);
                None
            }
        }
    }

    /// Removes the object, emits `destroy` and clears it.
    pub fn destroy_game_object(&mut self, id: LocalId) -> Option<GameObject> {
        if !self.contains(id) {
            warn!("Scene.destroy_game_object: can't destroy GameObject if it's not added to a Scene");
            return None;
        }
        let mut game_object = self.remove_game_object(id)?;
        game_object.push_event(Event::GameObjectDestroyed { game_object: id });
        game_object.clear();
        self.events.extend(game_object.drain_events());
        Some(game_object)
    }

    /// Inserts a deep copy of a member object into this scene.
    pub fn duplicate_game_object(&mut self, id: LocalId) -> Option<LocalId> {
        let Some(source) = self.game_object(id) else {
            warn!("Scene.duplicate_game_object: GameObject {} is not a member of Scene", id);
            return None;
        };
        let mut copy = GameObject::new();
        copy.copy_from(source);
        self.add_game_object(copy)
    }

    pub fn game_object(&self, id: LocalId) -> Option<&GameObject> {
        self.positions.get(&id).map(|index| &self.game_objects[*index])
    }

    pub fn game_object_mut(&mut self, id: LocalId) -> Option<GameObjectMut<'_>> {
        let index = *self.positions.get(&id)?;
        Some(GameObjectMut::new(self, index))
    }

    pub fn find_by_server_id(&self, server_id: ServerId) -> Option<&GameObject> {
        self.by_server
            .get(&server_id)
            .and_then(|id| self.game_object(*id))
    }

    pub fn find_by_server_id_mut(&mut self, server_id: ServerId) -> Option<GameObjectMut<'_>> {
        let id = *self.by_server.get(&server_id)?;
        self.game_object_mut(id)
    }

    pub fn find_component_by_server_id(&self, server_id: ServerId) -> Option<&Component> {
        let owner = self.component_index.get(&server_id)?;
        self.game_object(*owner)?.find_component_by_server_id(server_id)
    }

    pub fn add_component(&mut self, game_object: LocalId, component: Component) -> bool {
        match self.game_object_mut(game_object) {
            Some(mut target) => target.add_component(component),
            None => {
                warn!("Scene.add_component: GameObject {} is not a member of Scene", game_object);
                false
            }
        }
    }

    pub fn remove_component(&mut self, game_object: LocalId, kind: &str) -> Option<Component> {
        match self.game_object_mut(game_object) {
            Some(mut target) => target.remove_component(kind),
            None => {
                warn!("Scene.remove_component: GameObject {} is not a member of Scene", game_object);
                None
            }
        }
    }

    pub fn update(&mut self, delta: f32, frame_count: u64) {
        for game_object in &mut self.game_objects {
            game_object.update(delta, frame_count);
        }
    }

    /// Takes the scene's queued events followed by those of its members.
    pub fn drain_events(&mut self) -> Vec<Event> {
        let mut events = std::mem::take(&mut self.events);
        for game_object in &mut self.game_objects {
            events.extend(game_object.drain_events());
        }
        events
    }

    /// Delivers queued events to `observers`, in rounds, until the queue stays
    /// empty. Returns the number of events delivered.
    pub fn dispatch(&mut self, observers: &mut [Box<dyn SceneObserver>]) -> usize {
        let mut delivered = 0;
        for _ in 0..MAX_DISPATCH_ROUNDS {
            let events = self.drain_events();
            if events.is_empty() {
                return delivered;
            }
            for event in &events {
                for observer in observers.iter_mut() {
                    observer.on_event(event, self);
                }
            }
            delivered += events.len();
        }
        warn!(
            "Scene.dispatch: observers still producing events after {} rounds",
            MAX_DISPATCH_ROUNDS
        );
        delivered
    }

    // ---- snapshot codec ----

    pub fn to_json(&self) -> Result<SceneJson, CodecError> {
        let game_objects = self
            .game_objects
            .iter()
            .map(|game_object| game_object.json.then(|| game_object.to_json()).transpose())
            .collect::<Result<Vec<_>, _>>()?;

        Ok(SceneJson {
            id: self.server_id,
            name: self.name.clone(),
            game_objects,
        })
    }

    pub fn from_json(registry: &CapabilityRegistry, json: &SceneJson) -> Self {
        let mut scene = Scene::new(&json.name);
        scene.server_id = json.id;
        scene.apply_json(registry, json);
        scene
    }

    /// Merges a snapshot: objects matched by server id are updated in place,
    /// others are constructed and added, in payload order.
    pub fn apply_json(&mut self, registry: &CapabilityRegistry, json: &SceneJson) {
        if !json.name.is_empty() {
            self.name = json.name.clone();
        }
        for entry in json.game_objects.iter().flatten() {
            if let Some(mut existing) = entry.id.and_then(|id| self.find_by_server_id_mut(id)) {
                existing.apply_json(registry, entry);
                continue;
            }
            self.add_game_object(GameObject::from_json(registry, entry));
        }
    }

    // ---- delta codec ----

    pub fn to_sync(&self) -> SceneSync {
        SceneSync {
            id: self.server_id,
            game_objects: self
                .game_objects
                .iter()
                .map(|game_object| game_object.sync.then(|| game_object.to_sync()))
                .collect(),
        }
    }

    /// Applies a per-tick delta. Entries without a server id cannot be
    /// resolved and are skipped; an unknown server id materialises exactly
    /// one new game object.
    pub fn apply_sync(&mut self, registry: &CapabilityRegistry, sync: &SceneSync) {
        for entry in sync.game_objects.iter().flatten() {
            let Some(server_id) = entry.id else {
                debug!("Scene.apply_sync: skipping entry without server id");
                continue;
            };

            if let Some(mut existing) = self.find_by_server_id_mut(server_id) {
                existing.apply_sync(registry, entry);
                continue;
            }

            let mut game_object = GameObject::new().with_server_id(server_id);
            game_object.apply_sync(registry, entry);
            self.add_game_object(game_object);
        }
    }
}

impl Default for Scene {
    fn default() -> Self {
        Self::new("")
    }
}

fn index_component(index: &mut HashMap<ServerId, LocalId>, owner: LocalId, component: &Component) {
    if let Some(server_id) = component.server_id() {
        index.insert(server_id, owner);
    }
}

fn unindex_component(index: &mut HashMap<ServerId, LocalId>, owner: LocalId, component: &Component) {
    if let Some(server_id) = component.server_id() {
        if index.get(&server_id) == Some(&owner) {
            index.remove(&server_id);
        }
    }
}

/// Mutable handle to a game object inside a [`Scene`].
///
/// Component changes made through the handle are reflected in the scene's
/// aggregate component index when the handle is dropped.
pub struct GameObjectMut<'a> {
    scene: &'a mut Scene,
    index: usize,
    indexed: Vec<ServerId>,
}

impl<'a> GameObjectMut<'a> {
    fn new(scene: &'a mut Scene, index: usize) -> Self {
        let indexed = scene.game_objects[index]
            .components()
            .iter()
            .filter_map(Component::server_id)
            .collect();
        Self { scene, index, indexed }
    }
}

impl Deref for GameObjectMut<'_> {
    type Target = GameObject;

    fn deref(&self) -> &GameObject {
        &self.scene.game_objects[self.index]
    }
}

impl DerefMut for GameObjectMut<'_> {
    fn deref_mut(&mut self) -> &mut GameObject {
        &mut self.scene.game_objects[self.index]
    }
}

impl Drop for GameObjectMut<'_> {
    fn drop(&mut self) {
        let scene = &mut *self.scene;
        let game_object = &scene.game_objects[self.index];
        let owner = game_object.local_id();

        for server_id in self.indexed.drain(..) {
            if scene.component_index.get(&server_id) == Some(&owner) {
                scene.component_index.remove(&server_id);
            }
        }
        for component in game_object.components() {
            index_component(&mut scene.component_index, owner, component);
        }
    }
}
