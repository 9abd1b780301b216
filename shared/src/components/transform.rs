use super::erased_capability;
use crate::capability::{expect_fields, Capability};
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// 2x3 affine matrices stored as `[a, b, c, d, tx, ty]`, mapping
/// `(x, y)` to `(a*x + c*y + tx, b*x + d*y + ty)`.
pub mod mat32 {
    pub type Mat32 = [f32; 6];

    pub const IDENTITY: Mat32 = [1.0, 0.0, 0.0, 1.0, 0.0, 0.0];

    /// `m * n`: applies `n` first, then `m`.
    pub fn mul(m: &Mat32, n: &Mat32) -> Mat32 {
        [
            m[0] * n[0] + m[2] * n[1],
            m[1] * n[0] + m[3] * n[1],
            m[0] * n[2] + m[2] * n[3],
            m[1] * n[2] + m[3] * n[3],
            m[0] * n[4] + m[2] * n[5] + m[4],
            m[1] * n[4] + m[3] * n[5] + m[5],
        ]
    }

    pub fn inverse(m: &Mat32) -> Option<Mat32> {
        let det = m[0] * m[3] - m[1] * m[2];
        if det.abs() < f32::EPSILON {
            return None;
        }
        let inv = 1.0 / det;
        Some([
            m[3] * inv,
            -m[1] * inv,
            -m[2] * inv,
            m[0] * inv,
            (m[2] * m[5] - m[3] * m[4]) * inv,
            (m[1] * m[4] - m[0] * m[5]) * inv,
        ])
    }

    pub fn transform(m: &Mat32, p: [f32; 2]) -> [f32; 2] {
        [
            m[0] * p[0] + m[2] * p[1] + m[4],
            m[1] * p[0] + m[3] * p[1] + m[5],
        ]
    }
}

/// Position, rotation (radians) and scale in the plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform2D {
    pub position: [f32; 2],
    pub rotation: f32,
    pub scale: [f32; 2],
}

impl Transform2D {
    pub fn at(x: f32, y: f32) -> Self {
        Self {
            position: [x, y],
            ..Self::default()
        }
    }

    /// Local-to-world matrix.
    pub fn matrix(&self) -> mat32::Mat32 {
        let (sin, cos) = self.rotation.sin_cos();
        [
            cos * self.scale[0],
            sin * self.scale[0],
            -sin * self.scale[1],
            cos * self.scale[1],
            self.position[0],
            self.position[1],
        ]
    }
}

impl Default for Transform2D {
    fn default() -> Self {
        Self {
            position: [0.0, 0.0],
            rotation: 0.0,
            scale: [1.0, 1.0],
        }
    }
}

impl Capability for Transform2D {
    fn kind(&self) -> &'static str {
        "Transform2D"
    }

    fn to_json(&self) -> Result<Value, CodecError> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_json(&mut self, value: &Value) -> Result<(), CodecError> {
        *self = Transform2D::deserialize(value)?;
        Ok(())
    }

    fn to_sync(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&[
            self.position[0],
            self.position[1],
            self.rotation,
            self.scale[0],
            self.scale[1],
        ]);
    }

    fn from_sync(&mut self, fields: &[f32]) -> Result<(), CodecError> {
        expect_fields(self.kind(), fields, 5)?;
        self.position = [fields[0], fields[1]];
        self.rotation = fields[2];
        self.scale = [fields[3], fields[4]];
        Ok(())
    }

    erased_capability!();
}

/// Position, rotation quaternion `[x, y, z, w]` and scale in space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Transform {
    pub position: [f32; 3],
    pub rotation: [f32; 4],
    pub scale: [f32; 3],
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: [0.0; 3],
            rotation: [0.0, 0.0, 0.0, 1.0],
            scale: [1.0; 3],
        }
    }
}

impl Capability for Transform {
    fn kind(&self) -> &'static str {
        "Transform"
    }

    fn to_json(&self) -> Result<Value, CodecError> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_json(&mut self, value: &Value) -> Result<(), CodecError> {
        *self = Transform::deserialize(value)?;
        Ok(())
    }

    fn to_sync(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&self.position);
        out.extend_from_slice(&self.rotation);
        out.extend_from_slice(&self.scale);
    }

    fn from_sync(&mut self, fields: &[f32]) -> Result<(), CodecError> {
        expect_fields(self.kind(), fields, 10)?;
        self.position.copy_from_slice(&fields[0..3]);
        self.rotation.copy_from_slice(&fields[3..7]);
        self.scale.copy_from_slice(&fields[7..10]);
        Ok(())
    }

    erased_capability!();
}
