//! Wire shapes of the two replication encodings.
//!
//! The snapshot encoding (`*Json`) is full fidelity: every node that opted in
//! with its `json` flag is written with all of its fields, and the result
//! travels as JSON text. It is sent when a connection becomes ready and when
//! a new subtree becomes visible.
//!
//! The delta encoding (`*Sync`) is sent every tick. Only nodes that opted in
//! with their `sync` flag are written, and each capability contributes a
//! short list of packed `f32` fields.
//!
//! Both encodings keep list positions of the sender, writing `None` for nodes
//! that did not opt in. Receivers treat a `None` slot as "no update" and match
//! the remaining entries by server id, never by position.

use crate::error::CodecError;
use crate::ids::ServerId;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

fn yes() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentJson {
    #[serde(rename = "_id", default)]
    pub id: Option<ServerId>,
    #[serde(rename = "_type")]
    pub kind: String,
    #[serde(default = "yes")]
    pub json: bool,
    #[serde(default = "yes")]
    pub sync: bool,
    #[serde(default)]
    pub data: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObjectJson {
    #[serde(rename = "_id", default)]
    pub id: Option<ServerId>,
    #[serde(default = "yes")]
    pub json: bool,
    #[serde(default = "yes")]
    pub sync: bool,
    #[serde(default)]
    pub components: Vec<Option<ComponentJson>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneJson {
    #[serde(rename = "_id", default)]
    pub id: Option<ServerId>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub game_objects: Vec<Option<GameObjectJson>>,
}

/// Whole-game snapshot delivered with the `ready` event.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct GameJson {
    #[serde(default)]
    pub scenes: Vec<Option<SceneJson>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComponentSync {
    pub id: Option<ServerId>,
    pub kind: String,
    pub fields: Vec<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameObjectSync {
    pub id: Option<ServerId>,
    pub components: Vec<Option<ComponentSync>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SceneSync {
    pub id: Option<ServerId>,
    pub game_objects: Vec<Option<GameObjectSync>>,
}

pub fn to_json_text<T: Serialize>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string(value)?)
}

pub fn from_json_text<T: DeserializeOwned>(text: &str) -> Result<T, CodecError> {
    Ok(serde_json::from_str(text)?)
}
