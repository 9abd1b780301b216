//! Client game root: scenes, active camera, renderer selection and the tick loop.

use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::input::{Input, InputSource, NullInput};
use crate::rendering::{RendererSelector, Surface};
use crate::time::{Clock, Time};
use log::{debug, info, warn};
use mirror_shared::components::Camera2D;
use mirror_shared::sync::{ComponentJson, GameJson, GameObjectJson, SceneJson, SceneSync};
use mirror_shared::{
    CapabilityRegistry, Component, DeviceCaps, GameObject, LocalId, Scene, SceneObserver, ServerId,
};

/// Summary handed to tick observers once a tick has finished.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TickInfo {
    pub frame_count: u64,
    pub delta: f32,
    pub fps: u32,
    /// A camera was active and the scene was drawn
    pub rendered: bool,
}

pub trait TickObserver {
    fn on_tick(&mut self, info: &TickInfo);
}

impl<F> TickObserver for F
where
    F: FnMut(&TickInfo),
{
    fn on_tick(&mut self, info: &TickInfo) {
        self(info)
    }
}

/// Location of the active camera inside the active scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CameraRef {
    pub game_object: LocalId,
    pub component: LocalId,
}

pub struct ClientGame {
    pub config: ClientConfig,
    pub registry: CapabilityRegistry,
    pub time: Time,
    pub input: Input,
    pub surface: Surface,
    input_source: Box<dyn InputSource>,
    selector: RendererSelector,
    scenes: Vec<Scene>,
    active_scene: Option<LocalId>,
    camera: Option<CameraRef>,
    scene_observers: Vec<Box<dyn SceneObserver>>,
    tick_observers: Vec<Box<dyn TickObserver>>,
}

impl ClientGame {
    pub fn new(config: ClientConfig, device: DeviceCaps, registry: CapabilityRegistry) -> Self {
        Self {
            time: Time::new(&config),
            input: Input::new(),
            surface: Surface::new(config.width, config.height),
            input_source: Box::new(NullInput),
            selector: RendererSelector::new(device, config.force_canvas),
            scenes: Vec::new(),
            active_scene: None,
            camera: None,
            scene_observers: Vec::new(),
            tick_observers: Vec::new(),
            registry,
            config,
        }
    }

    pub fn selector(&self) -> &RendererSelector {
        &self.selector
    }

    pub fn selector_mut(&mut self) -> &mut RendererSelector {
        &mut self.selector
    }

    pub fn set_input_source(&mut self, source: Box<dyn InputSource>) {
        self.input_source = source;
    }

    pub fn add_scene_observer(&mut self, observer: Box<dyn SceneObserver>) {
        self.scene_observers.push(observer);
    }

    pub fn add_tick_observer(&mut self, observer: Box<dyn TickObserver>) {
        self.tick_observers.push(observer);
    }

    // ---- scenes ----

    pub fn scenes(&self) -> &[Scene] {
        &self.scenes
    }

    pub fn scene(&self, id: LocalId) -> Option<&Scene> {
        self.scenes.iter().find(|scene| scene.local_id() == id)
    }

    pub fn scene_mut(&mut self, id: LocalId) -> Option<&mut Scene> {
        self.scenes.iter_mut().find(|scene| scene.local_id() == id)
    }

    pub fn find_scene_by_server_id(&self, server_id: ServerId) -> Option<&Scene> {
        self.scenes
            .iter()
            .find(|scene| scene.server_id() == Some(server_id))
    }

    fn scene_index_by_server_id(&self, server_id: ServerId) -> Option<usize> {
        self.scenes
            .iter()
            .position(|scene| scene.server_id() == Some(server_id))
    }

    fn active_index(&self) -> Option<usize> {
        let id = self.active_scene?;
        self.scenes.iter().position(|scene| scene.local_id() == id)
    }

    pub fn add_scene(&mut self, scene: Scene) -> Option<LocalId> {
        if let Some(server_id) = scene.server_id() {
            if self.scene_index_by_server_id(server_id).is_some() {
                warn!("ClientGame.add_scene: a Scene with server id {} already exists", server_id);
                return None;
            }
        }
        let id = scene.local_id();
        self.scenes.push(scene);
        Some(id)
    }

    /// Removes a scene; removing the active one also clears the camera.
    pub fn remove_scene(&mut self, id: LocalId) -> Option<Scene> {
        let Some(index) = self.scenes.iter().position(|scene| scene.local_id() == id) else {
            warn!("ClientGame.remove_scene: Scene {} does not exist", id);
            return None;
        };
        if self.active_scene == Some(id) {
            self.active_scene = None;
            self.camera = None;
        }
        Some(self.scenes.remove(index))
    }

    pub fn remove_scene_by_server_id(&mut self, server_id: ServerId) -> Option<Scene> {
        match self.find_scene_by_server_id(server_id).map(Scene::local_id) {
            Some(id) => self.remove_scene(id),
            None => {
                warn!("ClientGame.remove_scene: no Scene with server id {}", server_id);
                None
            }
        }
    }

    pub fn active_scene(&self) -> Option<&Scene> {
        self.active_index().map(|index| &self.scenes[index])
    }

    pub fn active_scene_mut(&mut self) -> Option<&mut Scene> {
        let index = self.active_index()?;
        Some(&mut self.scenes[index])
    }

    /// Activates a scene. The camera is cleared when the scene changes since it
    /// has to live in the active scene.
    pub fn set_scene(&mut self, id: LocalId) -> bool {
        if self.scene(id).is_none() {
            warn!("ClientGame.set_scene: Scene {} does not exist", id);
            return false;
        }
        if self.active_scene != Some(id) {
            self.deactivate_camera();
            self.active_scene = Some(id);
            info!("ClientGame: active scene is now {}", id);
        }
        true
    }

    pub fn set_scene_by_server_id(&mut self, server_id: ServerId) -> bool {
        match self.find_scene_by_server_id(server_id).map(Scene::local_id) {
            Some(id) => self.set_scene(id),
            None => {
                warn!("ClientGame.set_scene: no Scene with server id {}", server_id);
                false
            }
        }
    }

    // ---- camera ----

    pub fn camera(&self) -> Option<CameraRef> {
        self.camera
    }

    pub fn active_camera(&self) -> Option<&Component> {
        let camera = self.camera?;
        self.active_scene()?
            .game_object(camera.game_object)?
            .find_component_by_id(camera.component)
    }

    /// Makes a camera component of the active scene the active camera and
    /// reselects the renderer for it.
    ///
    /// Unresolvable targets are logged and ignored (`Ok(false)`); the only
    /// error is a fatal renderer selection failure.
    pub fn set_camera(&mut self, game_object: LocalId, component: LocalId) -> Result<bool, ClientError> {
        let Some(scene) = self.active_scene() else {
            warn!("ClientGame.set_camera: no active Scene");
            return Ok(false);
        };
        let Some(target) = scene
            .game_object(game_object)
            .and_then(|owner| owner.find_component_by_id(component))
        else {
            warn!("ClientGame.set_camera: component {} is not in the active Scene", component);
            return Ok(false);
        };
        let Some(variant) = target.capability().camera() else {
            warn!("ClientGame.set_camera: {} is not a camera", target.kind());
            return Ok(false);
        };

        let switched = self.selector.select(variant, &mut self.surface)?;

        let next = CameraRef { game_object, component };
        if self.camera != Some(next) {
            self.deactivate_camera();
            self.camera = Some(next);
            self.with_camera(|camera| camera.capability_mut().set_active(true));
        }
        self.fit_camera_to_surface();

        if switched {
            self.input.bind(&self.surface);
        }
        Ok(true)
    }

    /// Activates the camera of the game object with `server_id`, preferring a
    /// `Camera` over a `Camera2D`. Falls back to a camera component carrying
    /// that server id when no game object matches.
    pub fn set_camera_by_server_id(&mut self, server_id: ServerId) -> Result<bool, ClientError> {
        let target = self.active_scene().and_then(|scene| match scene.find_by_server_id(server_id) {
            Some(owner) => {
                let camera = ["Camera", "Camera2D"]
                    .iter()
                    .find_map(|kind| owner.get_component(kind))
                    .or_else(|| owner.components().iter().find(|c| c.capability().camera().is_some()))?;
                Some((owner.local_id(), camera.local_id()))
            }
            None => {
                let component = scene.find_component_by_server_id(server_id)?;
                Some((component.game_object()?, component.local_id()))
            }
        });
        match target {
            Some((game_object, component)) => self.set_camera(game_object, component),
            None => {
                warn!("ClientGame.set_camera: no camera with server id {} in the active Scene", server_id);
                Ok(false)
            }
        }
    }

    fn with_camera(&mut self, apply: impl FnOnce(&mut Component)) {
        let Some(camera) = self.camera else {
            return;
        };
        let Some(scene) = self.active_scene_mut() else {
            return;
        };
        if let Some(mut owner) = scene.game_object_mut(camera.game_object) {
            if let Some(component) = owner.find_component_by_id_mut(camera.component) {
                apply(component);
            }
        }
    }

    fn deactivate_camera(&mut self) {
        self.with_camera(|camera| camera.capability_mut().set_active(false));
        self.camera = None;
    }

    fn fit_camera_to_surface(&mut self) {
        let (width, height) = self.surface.size();
        self.with_camera(|camera| {
            if let Some(camera) = camera.get_mut::<Camera2D>() {
                if camera.auto_resize {
                    camera.set(width as f32, height as f32);
                }
            }
        });
    }

    /// Records a new surface size and resizes an auto-resizing camera.
    pub fn resize(&mut self, width: u32, height: u32) {
        if self.surface.resize(width, height) {
            debug!("ClientGame: surface resized to {}x{}", width, height);
            self.fit_camera_to_surface();
        }
    }

    // ---- replication ----

    /// Merges a whole-game snapshot. Scenes are matched by server id.
    pub fn apply_game_json(&mut self, json: &GameJson) {
        for entry in json.scenes.iter().flatten() {
            self.apply_scene_json(entry);
        }
    }

    pub fn apply_scene_json(&mut self, json: &SceneJson) -> Option<LocalId> {
        if let Some(index) = json.id.and_then(|id| self.scene_index_by_server_id(id)) {
            let scene = &mut self.scenes[index];
            scene.apply_json(&self.registry, json);
            return Some(scene.local_id());
        }
        let scene = Scene::from_json(&self.registry, json);
        self.add_scene(scene)
    }

    /// Adds a game object from a snapshot, or merges into the existing one
    /// with the same server id.
    pub fn apply_game_object_json(&mut self, scene: ServerId, json: &GameObjectJson) -> Option<LocalId> {
        let Some(index) = self.scene_index_by_server_id(scene) else {
            warn!("ClientGame.add_game_object: no Scene with server id {}", scene);
            return None;
        };
        let registry = &self.registry;
        let scene = &mut self.scenes[index];

        if let Some(mut existing) = json.id.and_then(|id| scene.find_by_server_id_mut(id)) {
            existing.apply_json(registry, json);
            return Some(existing.local_id());
        }
        scene.add_game_object(GameObject::from_json(registry, json))
    }

    pub fn apply_component_json(
        &mut self,
        scene: ServerId,
        game_object: ServerId,
        json: &ComponentJson,
    ) -> Option<LocalId> {
        let Some(index) = self.scene_index_by_server_id(scene) else {
            warn!("ClientGame.add_component: no Scene with server id {}", scene);
            return None;
        };
        let registry = &self.registry;
        let Some(mut owner) = self.scenes[index].find_by_server_id_mut(game_object) else {
            warn!("ClientGame.add_component: no GameObject with server id {}", game_object);
            return None;
        };

        if let Some(existing) = json.id.and_then(|id| owner.find_component_by_server_id_mut(id)) {
            if let Err(e) = existing.apply_json(json) {
                warn!("ClientGame.add_component: bad {} payload: {}", json.kind, e);
            }
            return Some(existing.local_id());
        }
        match Component::from_json(registry, json) {
            Ok(Some(component)) => {
                let id = component.local_id();
                owner.add_component(component).then_some(id)
            }
            Ok(None) => {
                warn!("ClientGame.add_component: {} is not a registered capability", json.kind);
                None
            }
            Err(e) => {
                warn!("ClientGame.add_component: bad {} payload: {}", json.kind, e);
                None
            }
        }
    }

    pub fn remove_game_object(&mut self, scene: ServerId, game_object: ServerId) -> Option<GameObject> {
        let Some(index) = self.scene_index_by_server_id(scene) else {
            warn!("ClientGame.remove_game_object: no Scene with server id {}", scene);
            return None;
        };
        let target = self.scenes[index].find_by_server_id(game_object).map(GameObject::local_id);
        let Some(id) = target else {
            warn!("ClientGame.remove_game_object: no GameObject with server id {}", game_object);
            return None;
        };
        if self.camera.map(|camera| camera.game_object) == Some(id) {
            self.camera = None;
        }
        self.scenes[index].destroy_game_object(id)
    }

    pub fn remove_component(&mut self, scene: ServerId, game_object: ServerId, kind: &str) -> Option<Component> {
        let Some(index) = self.scene_index_by_server_id(scene) else {
            warn!("ClientGame.remove_component: no Scene with server id {}", scene);
            return None;
        };
        let removed = {
            let Some(mut owner) = self.scenes[index].find_by_server_id_mut(game_object) else {
                warn!("ClientGame.remove_component: no GameObject with server id {}", game_object);
                return None;
            };
            owner.remove_component(kind)?
        };
        if self.camera.map(|camera| camera.component) == Some(removed.local_id()) {
            self.camera = None;
        }
        Some(removed)
    }

    /// Applies a per-tick delta to the active scene.
    pub fn apply_scene_sync(&mut self, sync: &SceneSync) -> bool {
        let Some(index) = self.active_index() else {
            warn!("ClientGame.apply_scene_sync: no active Scene");
            return false;
        };
        let scene = &mut self.scenes[index];
        if let (Some(expected), Some(actual)) = (sync.id, scene.server_id()) {
            if expected != actual {
                warn!("ClientGame.apply_scene_sync: delta for Scene {} while {} is active", expected, actual);
                return false;
            }
        }
        scene.apply_sync(&self.registry, sync);
        true
    }

    /// Delivers queued scene events to observers.
    pub fn dispatch_events(&mut self) -> usize {
        let mut delivered = 0;
        for scene in &mut self.scenes {
            delivered += scene.dispatch(&mut self.scene_observers);
        }
        delivered
    }

    // ---- tick ----

    /// Runs one frame: timing, input, scene update, render, observers.
    pub fn tick(&mut self, clock: &dyn Clock) -> TickInfo {
        self.time.advance(clock.now());
        let frame_count = self.time.frame_count;
        let delta = self.time.delta;

        self.input.begin_frame(frame_count);
        self.input_source.sample(&mut self.input);
        self.input.update(delta);

        let mut rendered = false;
        if let Some(index) = self.active_index() {
            self.scenes[index].update(delta, frame_count);
            self.dispatch_events();

            if self.camera.is_some() && self.active_camera().is_none() {
                warn!("ClientGame.tick: active camera left the Scene");
                self.camera = None;
            }

            let scene = &self.scenes[index];
            let camera = self.camera.and_then(|camera| {
                scene
                    .game_object(camera.game_object)?
                    .find_component_by_id(camera.component)
            });
            if let Some(camera) = camera {
                self.selector.render(scene, camera);
                rendered = true;
            }
        }

        let info = TickInfo {
            frame_count,
            delta,
            fps: self.time.fps,
            rendered,
        };
        for observer in &mut self.tick_observers {
            observer.on_tick(&info);
        }
        info
    }

    pub fn shutdown(&mut self) {
        self.deactivate_camera();
        self.selector.shutdown();
    }
}
