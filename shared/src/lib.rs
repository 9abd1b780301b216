pub mod capability;
pub mod component;
pub mod components;
pub mod error;
pub mod event;
pub mod game_object;
pub mod ids;
pub mod scene;
pub mod sync;

pub use capability::{Capability, CameraVariant, CapabilityRegistry, UpdateContext};
pub use component::Component;
pub use error::CodecError;
pub use event::{Event, SceneObserver};
pub use game_object::GameObject;
pub use ids::{LocalId, ServerId, SessionId};
pub use scene::{GameObjectMut, Scene};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

pub const PROTOCOL_VERSION: u32 = 1;

/// Capability flags a client reports after connecting.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DeviceCaps {
    /// Hardware accelerated drawing is available.
    pub gpu: bool,
    pub canvas: bool,
    pub mobile: bool,
    pub pixel_ratio: f32,
    pub width: u32,
    pub height: u32,
}

impl Default for DeviceCaps {
    fn default() -> Self {
        Self {
            gpu: true,
            canvas: true,
            mobile: false,
            pixel_ratio: 1.0,
            width: 960,
            height: 640,
        }
    }
}

/// Client input state sent to the server every tick.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq)]
pub struct InputSync {
    pub buttons: BTreeMap<String, bool>,
    pub axes: BTreeMap<String, f32>,
    pub mouse_position: [f32; 2],
    pub mouse_delta: [f32; 2],
    pub mouse_wheel: f32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Packet {
    // client -> server
    Connect {
        client_version: u32,
    },
    DeviceInfo(DeviceCaps),
    ReadyAck,
    InputSync(InputSync),
    Resize {
        width: u32,
        height: u32,
    },
    Disconnect,

    // server -> client
    Connected {
        session_id: SessionId,
    },
    /// Game snapshot and asset manifest, both JSON text.
    Ready {
        game: String,
        assets: String,
    },
    InputSyncRequest,
    SceneSync(sync::SceneSync),
    SetScene {
        scene: ServerId,
    },
    SetCamera {
        camera: ServerId,
    },
    AddScene {
        scene: String,
    },
    AddGameObject {
        scene: ServerId,
        game_object: String,
    },
    AddComponent {
        scene: ServerId,
        game_object: ServerId,
        component: String,
    },
    RemoveScene {
        scene: ServerId,
    },
    RemoveGameObject {
        scene: ServerId,
        game_object: ServerId,
    },
    RemoveComponent {
        scene: ServerId,
        game_object: ServerId,
        kind: String,
    },
    Disconnected {
        reason: String,
    },
}

impl Packet {
    /// Event name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Packet::Connect { .. } => "connect",
            Packet::DeviceInfo(_) => "device-info",
            Packet::ReadyAck => "ready-ack",
            Packet::InputSync(_) => "input-sync",
            Packet::Resize { .. } => "resize",
            Packet::Disconnect => "disconnect",
            Packet::Connected { .. } => "connected",
            Packet::Ready { .. } => "ready",
            Packet::InputSyncRequest => "input-sync-request",
            Packet::SceneSync(_) => "scene-sync",
            Packet::SetScene { .. } => "set-scene",
            Packet::SetCamera { .. } => "set-camera",
            Packet::AddScene { .. } => "add-scene",
            Packet::AddGameObject { .. } => "add-game-object",
            Packet::AddComponent { .. } => "add-component",
            Packet::RemoveScene { .. } => "remove-scene",
            Packet::RemoveGameObject { .. } => "remove-game-object",
            Packet::RemoveComponent { .. } => "remove-component",
            Packet::Disconnected { .. } => "disconnected",
        }
    }
}

pub fn encode_packet(packet: &Packet) -> Result<Vec<u8>, CodecError> {
    Ok(bincode::serialize(packet)?)
}

pub fn decode_packet(bytes: &[u8]) -> Result<Packet, CodecError> {
    Ok(bincode::deserialize(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sync::{ComponentSync, GameObjectSync, SceneSync};
    use assert_approx_eq::assert_approx_eq;

    #[test]
    fn test_packet_serialization_connect() {
        let packet = Packet::Connect { client_version: 42 };
        let serialized = encode_packet(&packet).unwrap();
        let deserialized = decode_packet(&serialized).unwrap();

        match deserialized {
            Packet::Connect { client_version } => assert_eq!(client_version, 42),
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_input_sync() {
        let mut input = InputSync::default();
        input.buttons.insert("jump".to_string(), true);
        input.axes.insert("horizontal".to_string(), -0.5);
        input.mouse_position = [12.0, 34.0];

        let serialized = encode_packet(&Packet::InputSync(input)).unwrap();
        let deserialized = decode_packet(&serialized).unwrap();

        match deserialized {
            Packet::InputSync(input) => {
                assert_eq!(input.buttons.get("jump"), Some(&true));
                assert_approx_eq!(input.axes["horizontal"], -0.5, 1e-6);
                assert_eq!(input.mouse_position, [12.0, 34.0]);
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_packet_serialization_scene_sync() {
        let packet = Packet::SceneSync(SceneSync {
            id: Some(1),
            game_objects: vec![Some(GameObjectSync {
                id: Some(7),
                components: vec![
                    None,
                    Some(ComponentSync {
                        id: Some(70),
                        kind: "Transform2D".to_string(),
                        fields: vec![1.0, 2.0, 0.0, 1.0, 1.0],
                    }),
                ],
            })],
        });

        let serialized = encode_packet(&packet).unwrap();
        assert_eq!(decode_packet(&serialized).unwrap(), packet);
    }

    #[test]
    fn test_ready_carries_snapshot_text() {
        let packet = Packet::Ready {
            game: r#"{"scenes":[]}"#.to_string(),
            assets: "[]".to_string(),
        };
        let serialized = encode_packet(&packet).unwrap();

        match decode_packet(&serialized).unwrap() {
            Packet::Ready { game, assets } => {
                let game: sync::GameJson = sync::from_json_text(&game).unwrap();
                assert!(game.scenes.is_empty());
                assert_eq!(assets, "[]");
            }
            _ => panic!("Wrong packet type after deserialization"),
        }
    }

    #[test]
    fn test_garbage_does_not_decode() {
        assert!(decode_packet(&[0xff, 0xff, 0xff, 0xff, 0x01]).is_err());
    }

    #[test]
    fn test_packet_names() {
        assert_eq!(Packet::ReadyAck.name(), "ready-ack");
        assert_eq!(Packet::SetCamera { camera: 1 }.name(), "set-camera");
    }
}
