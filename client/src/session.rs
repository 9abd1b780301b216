//! Connection session: handshake, ready bootstrap and replication commands.
//!
//! ```text
//! Disconnected --connect--> Connecting --Connected--> AwaitingReady --Ready--> Active
//!       ^                                                                        |
//!       +------------------- disconnect / Disconnected ------------------------+
//! ```
//!
//! Inbound events are applied to the [`ClientGame`] as soon as they are
//! polled, in arrival order. Commands that name a target the client can't
//! resolve are logged and dropped.

use crate::assets::{AssetLoader, AssetManifest};
use crate::error::ClientError;
use crate::game::ClientGame;
use crate::transport::{Transport, TransportEvent};
use log::{debug, error, info, warn};
use mirror_shared::sync::{from_json_text, ComponentJson, GameJson, GameObjectJson, SceneJson};
use mirror_shared::{DeviceCaps, Packet, Scene, SessionId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    AwaitingReady,
    Active,
}

pub struct Session {
    state: SessionState,
    session_id: Option<SessionId>,
    transport: Option<Box<dyn Transport>>,
    loader: Box<dyn AssetLoader>,
    device: DeviceCaps,
    report_resize: bool,
}

impl Session {
    pub fn new(device: DeviceCaps, loader: Box<dyn AssetLoader>) -> Self {
        Self {
            state: SessionState::Disconnected,
            session_id: None,
            transport: None,
            loader,
            device,
            report_resize: false,
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn session_id(&self) -> Option<SessionId> {
        self.session_id
    }

    pub fn is_active(&self) -> bool {
        self.state == SessionState::Active
    }

    /// Starts using `transport`. Any previous transport is closed first.
    pub fn connect(&mut self, transport: Box<dyn Transport>) {
        if let Some(mut previous) = self.transport.take() {
            previous.close();
        }
        self.transport = Some(transport);
        self.state = SessionState::Connecting;
        info!("Session: connecting");
    }

    /// Closes the transport and forgets the session id. Partially applied
    /// replication is left as it is.
    pub fn disconnect(&mut self) {
        if let Some(mut transport) = self.transport.take() {
            transport.close();
        }
        if self.state != SessionState::Disconnected {
            info!("Session: disconnected");
        }
        self.session_id = None;
        self.report_resize = false;
        self.state = SessionState::Disconnected;
    }

    /// Applies everything the transport received since the last call.
    pub fn poll(&mut self, game: &mut ClientGame) -> Result<(), ClientError> {
        let events = match self.transport.as_mut() {
            Some(transport) => transport.poll(),
            None => return Ok(()),
        };
        for event in events {
            self.handle_event(game, event)?;
            if self.transport.is_none() {
                break;
            }
        }
        game.dispatch_events();
        Ok(())
    }

    pub fn handle_event(&mut self, game: &mut ClientGame, event: TransportEvent) -> Result<(), ClientError> {
        match event {
            TransportEvent::Connected { session_id } => self.on_connected(session_id),
            TransportEvent::Packet(packet) => self.handle_packet(game, packet),
            TransportEvent::Disconnected { reason } => {
                warn!("Session: link lost: {}", reason);
                self.disconnect();
                Ok(())
            }
        }
    }

    fn on_connected(&mut self, session_id: SessionId) -> Result<(), ClientError> {
        match self.session_id {
            Some(pinned) if pinned != session_id => {
                error!("Session: server reports session {} but {} is pinned", session_id, pinned);
                return Err(ClientError::SessionChanged {
                    pinned,
                    reported: session_id,
                });
            }
            Some(_) => {
                debug!("Session: connect acknowledged again for {}", session_id);
            }
            None => {
                self.session_id = Some(session_id);
                info!("Session: connected as {}", session_id);
            }
        }

        if self.state == SessionState::Connecting {
            self.send(&Packet::DeviceInfo(self.device.clone()));
            self.state = SessionState::AwaitingReady;
        }
        Ok(())
    }

    pub fn handle_packet(&mut self, game: &mut ClientGame, packet: Packet) -> Result<(), ClientError> {
        match packet {
            Packet::Connected { session_id } => return self.on_connected(session_id),
            Packet::Disconnected { reason } => {
                info!("Session: server closed the session: {}", reason);
                self.disconnect();
                return Ok(());
            }
            Packet::Ready { game: snapshot, assets } => {
                self.on_ready(game, &snapshot, &assets);
                return Ok(());
            }
            _ => {}
        }

        if self.state != SessionState::Active {
            warn!("Session: ignoring {} while {:?}", packet.name(), self.state);
            return Ok(());
        }

        match packet {
            Packet::InputSyncRequest => {
                self.send(&Packet::InputSync(game.input.to_sync()));
            }
            Packet::SceneSync(sync) => {
                game.apply_scene_sync(&sync);
            }
            Packet::SetScene { scene } => {
                game.set_scene_by_server_id(scene);
            }
            Packet::SetCamera { camera } => {
                if game.set_camera_by_server_id(camera)? {
                    self.report_resize = true;
                    game.surface.take_resized();
                    let (width, height) = game.surface.size();
                    self.send(&Packet::Resize { width, height });
                }
            }
            Packet::AddScene { scene } => {
                if let Some(json) = parse::<SceneJson>("add-scene", &scene) {
                    let scene = Scene::from_json(&game.registry, &json);
                    game.add_scene(scene);
                }
            }
            Packet::AddGameObject { scene, game_object } => {
                if let Some(json) = parse::<GameObjectJson>("add-game-object", &game_object) {
                    game.apply_game_object_json(scene, &json);
                }
            }
            Packet::AddComponent {
                scene,
                game_object,
                component,
            } => {
                if let Some(json) = parse::<ComponentJson>("add-component", &component) {
                    game.apply_component_json(scene, game_object, &json);
                }
            }
            Packet::RemoveScene { scene } => {
                game.remove_scene_by_server_id(scene);
            }
            Packet::RemoveGameObject { scene, game_object } => {
                game.remove_game_object(scene, game_object);
            }
            Packet::RemoveComponent {
                scene,
                game_object,
                kind,
            } => {
                game.remove_component(scene, game_object, &kind);
            }
            other => {
                warn!("Session: unexpected {} packet from server", other.name());
            }
        }
        Ok(())
    }

    /// Bootstraps the game from the ready snapshot. Any failure leaves the
    /// session waiting for another ready.
    fn on_ready(&mut self, game: &mut ClientGame, snapshot: &str, assets: &str) {
        if self.state != SessionState::AwaitingReady {
            warn!("Session: ignoring ready while {:?}", self.state);
            return;
        }

        let manifest = match AssetManifest::parse(assets) {
            Ok(manifest) => manifest,
            Err(e) => {
                error!("Session: {}", e);
                return;
            }
        };
        if let Err(e) = self.loader.load(&manifest) {
            error!("Session: asset loading failed: {}", e);
            return;
        }
        let Some(json) = parse::<GameJson>("ready", snapshot) else {
            return;
        };

        game.apply_game_json(&json);
        self.send(&Packet::ReadyAck);
        self.state = SessionState::Active;
        info!("Session: ready with {} scene(s)", game.scenes().len());
    }

    /// Outbound traffic that follows a tick: input state and surface size.
    pub fn on_tick(&mut self, game: &mut ClientGame) {
        if self.state != SessionState::Active {
            return;
        }
        if game.config.input_sync_every_tick {
            self.send(&Packet::InputSync(game.input.to_sync()));
        }
        if self.report_resize && game.active_camera().is_some() {
            if let Some((width, height)) = game.surface.take_resized() {
                self.send(&Packet::Resize { width, height });
            }
        }
    }

    fn send(&mut self, packet: &Packet) {
        let Some(transport) = self.transport.as_mut() else {
            debug!("Session: no transport for {}", packet.name());
            return;
        };
        if let Err(e) = transport.send(packet) {
            error!("Session: error sending {}: {}", packet.name(), e);
        }
    }
}

fn parse<T: serde::de::DeserializeOwned>(event: &str, text: &str) -> Option<T> {
    match from_json_text(text) {
        Ok(json) => Some(json),
        Err(e) => {
            warn!("Session: malformed {} payload: {}", event, e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::assets::AssetStore;
    use crate::config::ClientConfig;
    use crate::rendering::tests::probe_factory;
    use crate::rendering::RendererKind;
    use crate::transport::{MemoryPeer, MemoryTransport};
    use mirror_shared::sync::{ComponentSync, GameObjectSync, SceneSync};
    use mirror_shared::CapabilityRegistry;
    use std::cell::RefCell;
    use std::rc::Rc;

    const READY: &str = r#"{
        "scenes": [{
            "_id": 1,
            "name": "main",
            "game_objects": [{
                "_id": 7,
                "components": [
                    { "_id": 70, "_type": "Transform2D", "data": { "position": [1.0, 2.0] } },
                    { "_id": 71, "_type": "Camera2D" }
                ],
                "tags": ["camera"]
            }]
        }]
    }"#;

    fn setup() -> (Session, ClientGame, MemoryPeer) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut game = ClientGame::new(
            ClientConfig::default(),
            DeviceCaps::default(),
            CapabilityRegistry::with_defaults(),
        );
        game.selector_mut().register(RendererKind::Gpu, probe_factory("gpu", &log));
        let mut session = Session::new(DeviceCaps::default(), Box::new(AssetStore::new()));
        let (transport, peer) = MemoryTransport::pair();
        session.connect(Box::new(transport));
        (session, game, peer)
    }

    fn activate(session: &mut Session, game: &mut ClientGame, peer: &MemoryPeer) {
        peer.connect(11);
        peer.send(Packet::Ready {
            game: READY.to_string(),
            assets: String::new(),
        });
        session.poll(game).unwrap();
        peer.send(Packet::SetScene { scene: 1 });
        session.poll(game).unwrap();
        peer.received();
    }

    #[test]
    fn test_handshake_sends_device_info() {
        let (mut session, mut game, peer) = setup();
        assert_eq!(session.state(), SessionState::Connecting);

        peer.connect(11);
        session.poll(&mut game).unwrap();

        assert_eq!(session.state(), SessionState::AwaitingReady);
        assert_eq!(session.session_id(), Some(11));
        assert_eq!(peer.received(), vec![Packet::DeviceInfo(DeviceCaps::default())]);
    }

    #[test]
    fn test_changed_session_id_is_fatal() {
        let (mut session, mut game, peer) = setup();
        peer.connect(11);
        session.poll(&mut game).unwrap();

        peer.connect(12);
        let err = session.poll(&mut game).unwrap_err();
        assert!(err.requires_reload());
        assert_eq!(session.session_id(), Some(11));
    }

    #[test]
    fn test_same_session_id_is_accepted_again() {
        let (mut session, mut game, peer) = setup();
        peer.connect(11);
        peer.connect(11);
        session.poll(&mut game).unwrap();
        assert_eq!(peer.received().len(), 1);
    }

    #[test]
    fn test_commands_before_ready_are_dropped() {
        let (mut session, mut game, peer) = setup();
        peer.connect(11);
        peer.send(Packet::AddScene {
            scene: r#"{ "_id": 5, "name": "early" }"#.to_string(),
        });
        session.poll(&mut game).unwrap();

        assert!(game.scenes().is_empty());
        assert_eq!(session.state(), SessionState::AwaitingReady);
    }

    #[test]
    fn test_bad_manifest_keeps_waiting_for_ready() {
        let (mut session, mut game, peer) = setup();
        peer.connect(11);
        session.poll(&mut game).unwrap();
        peer.received();

        peer.send(Packet::Ready {
            game: READY.to_string(),
            assets: r#"[{ "name": "broken", "kind": "Texture" }]"#.to_string(),
        });
        session.poll(&mut game).unwrap();

        assert_eq!(session.state(), SessionState::AwaitingReady);
        assert!(game.scenes().is_empty());
        assert!(peer.received().is_empty());
    }

    #[test]
    fn test_input_sync_request_is_answered() {
        let (mut session, mut game, peer) = setup();
        activate(&mut session, &mut game, &peer);

        game.input.press("left");
        peer.send(Packet::InputSyncRequest);
        session.poll(&mut game).unwrap();

        match peer.received().as_slice() {
            [Packet::InputSync(input)] => assert_eq!(input.buttons.get("left"), Some(&true)),
            other => panic!("unexpected packets {:?}", other),
        }
    }

    #[test]
    fn test_set_camera_starts_resize_reporting() {
        let (mut session, mut game, peer) = setup();
        activate(&mut session, &mut game, &peer);

        peer.send(Packet::SetCamera { camera: 7 });
        session.poll(&mut game).unwrap();
        assert_eq!(peer.received(), vec![Packet::Resize { width: 960, height: 640 }]);

        game.config.input_sync_every_tick = false;
        session.on_tick(&mut game);
        assert!(peer.received().is_empty());

        game.resize(800, 600);
        session.on_tick(&mut game);
        assert_eq!(peer.received(), vec![Packet::Resize { width: 800, height: 600 }]);
    }

    #[test]
    fn test_link_loss_while_active() {
        let (mut session, mut game, peer) = setup();
        activate(&mut session, &mut game, &peer);

        peer.drop_link("timed out");
        peer.send(Packet::SetCamera { camera: 7 });
        session.poll(&mut game).unwrap();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.session_id(), None);
        assert!(peer.is_closed());
        assert_eq!(game.camera(), None);
        assert!(peer.received().is_empty());

        // replicated state is left as it was
        assert!(game.find_scene_by_server_id(1).is_some());
    }

    #[test]
    fn test_link_loss_while_awaiting_ready() {
        let (mut session, mut game, peer) = setup();
        peer.connect(11);
        session.poll(&mut game).unwrap();
        peer.received();

        peer.drop_link("reset");
        peer.send(Packet::Ready {
            game: READY.to_string(),
            assets: String::new(),
        });
        session.poll(&mut game).unwrap();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.session_id(), None);
        assert!(peer.is_closed());
        assert!(game.scenes().is_empty());
        assert!(peer.received().is_empty());
    }

    #[test]
    fn test_every_tick_input_sync() {
        let (mut session, mut game, peer) = setup();
        session.on_tick(&mut game);
        assert!(peer.received().is_empty());

        activate(&mut session, &mut game, &peer);
        session.on_tick(&mut game);
        assert!(matches!(peer.received().as_slice(), [Packet::InputSync(_)]));
    }

    #[test]
    fn test_replication_commands() {
        let (mut session, mut game, peer) = setup();
        activate(&mut session, &mut game, &peer);

        peer.send(Packet::AddGameObject {
            scene: 1,
            game_object: r#"{ "_id": 8, "components": [{ "_id": 80, "_type": "Sprite2D" }] }"#.to_string(),
        });
        peer.send(Packet::SceneSync(SceneSync {
            id: Some(1),
            game_objects: vec![Some(GameObjectSync {
                id: Some(7),
                components: vec![Some(ComponentSync {
                    id: Some(70),
                    kind: "Transform2D".to_string(),
                    fields: vec![5.0, 6.0, 0.0, 1.0, 1.0],
                })],
            })],
        }));
        peer.send(Packet::RemoveComponent {
            scene: 1,
            game_object: 8,
            kind: "Sprite2D".to_string(),
        });
        session.poll(&mut game).unwrap();

        let scene = game.active_scene().unwrap();
        assert!(scene.find_by_server_id(8).unwrap().components().is_empty());
        assert!(scene.find_component_by_server_id(80).is_none());
        let transform = scene.find_component_by_server_id(70).unwrap();
        assert_eq!(transform.get::<mirror_shared::components::Transform2D>().unwrap().position, [5.0, 6.0]);

        peer.send(Packet::RemoveGameObject { scene: 1, game_object: 8 });
        peer.send(Packet::RemoveScene { scene: 1 });
        session.poll(&mut game).unwrap();
        assert!(game.scenes().is_empty());
        assert!(game.active_scene().is_none());
    }

    #[test]
    fn test_remove_then_add_in_one_batch_creates_fresh_node() {
        let (mut session, mut game, peer) = setup();
        activate(&mut session, &mut game, &peer);
        let before = game.active_scene().unwrap().find_by_server_id(7).unwrap().local_id();

        peer.send(Packet::RemoveGameObject { scene: 1, game_object: 7 });
        peer.send(Packet::AddGameObject {
            scene: 1,
            game_object: r#"{ "_id": 7, "tags": ["respawned"] }"#.to_string(),
        });
        session.poll(&mut game).unwrap();

        let respawned = game.active_scene().unwrap().find_by_server_id(7).unwrap();
        assert_ne!(respawned.local_id(), before);
        assert!(respawned.has_tag("respawned"));
    }

    #[test]
    fn test_server_disconnect_tears_down() {
        let (mut session, mut game, peer) = setup();
        activate(&mut session, &mut game, &peer);

        peer.send(Packet::Disconnected {
            reason: "kicked".to_string(),
        });
        peer.send(Packet::SetScene { scene: 1 });
        session.poll(&mut game).unwrap();

        assert_eq!(session.state(), SessionState::Disconnected);
        assert_eq!(session.session_id(), None);
        assert!(peer.is_closed());
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let (mut session, mut game, peer) = setup();
        activate(&mut session, &mut game, &peer);

        peer.send(Packet::AddGameObject {
            scene: 1,
            game_object: "not json".to_string(),
        });
        session.poll(&mut game).unwrap();
        assert_eq!(game.active_scene().unwrap().len(), 1);
        assert!(session.is_active());
    }
}
