use super::erased_capability;
use crate::capability::{expect_fields, Capability};
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Textured quad drawn at the owning game object's transform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Sprite2D {
    /// Asset name of the texture, resolved by the renderer.
    pub texture: Option<String>,
    pub width: f32,
    pub height: f32,
    pub color: [f32; 4],
    pub frame: u32,
    pub layer: i32,
    pub visible: bool,
}

impl Default for Sprite2D {
    fn default() -> Self {
        Self {
            texture: None,
            width: 1.0,
            height: 1.0,
            color: [1.0, 1.0, 1.0, 1.0],
            frame: 0,
            layer: 0,
            visible: true,
        }
    }
}

impl Capability for Sprite2D {
    fn kind(&self) -> &'static str {
        "Sprite2D"
    }

    fn to_json(&self) -> Result<Value, CodecError> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_json(&mut self, value: &Value) -> Result<(), CodecError> {
        *self = Sprite2D::deserialize(value)?;
        Ok(())
    }

    fn to_sync(&self, out: &mut Vec<f32>) {
        let visible = if self.visible { 1.0 } else { 0.0 };
        out.extend_from_slice(&[self.frame as f32, self.color[3], visible]);
    }

    fn from_sync(&mut self, fields: &[f32]) -> Result<(), CodecError> {
        expect_fields(self.kind(), fields, 3)?;
        self.frame = fields[0].max(0.0) as u32;
        self.color[3] = fields[1];
        self.visible = fields[2] != 0.0;
        Ok(())
    }

    erased_capability!();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sync_carries_animation_state_only() {
        let source = Sprite2D {
            texture: Some("hero".to_string()),
            frame: 7,
            visible: false,
            ..Sprite2D::default()
        };
        let mut fields = Vec::new();
        source.to_sync(&mut fields);

        let mut target = Sprite2D::default();
        target.from_sync(&fields).unwrap();

        assert_eq!(target.frame, 7);
        assert!(!target.visible);
        assert_eq!(target.texture, None);
    }
}
