use super::erased_capability;
use super::mat32::{self, Mat32, IDENTITY};
use crate::capability::{expect_fields, CameraVariant, Capability, UpdateContext};
use crate::error::CodecError;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Orthographic camera for 2D scenes.
///
/// Projection and view are derived state: they are recomputed during
/// [`Capability::update`] while the camera is active and are never replicated.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera2D {
    pub width: f32,
    pub height: f32,
    pub auto_resize: bool,
    pub background: [f32; 4],
    pub orthographic_size: f32,
    pub min_orthographic_size: f32,
    pub max_orthographic_size: f32,

    #[serde(skip)]
    projection: Mat32,
    #[serde(skip)]
    view: Mat32,
    #[serde(skip)]
    needs_update: bool,
    #[serde(skip)]
    active: bool,
}

impl Default for Camera2D {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 640.0,
            auto_resize: true,
            background: [0.5, 0.5, 0.5, 1.0],
            orthographic_size: 2.0,
            min_orthographic_size: f32::EPSILON,
            max_orthographic_size: 1024.0,
            projection: IDENTITY,
            view: IDENTITY,
            needs_update: true,
            active: false,
        }
    }
}

impl Camera2D {
    pub fn aspect(&self) -> f32 {
        self.width / self.height
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn set(&mut self, width: f32, height: f32) {
        self.width = width;
        self.height = height;
        self.needs_update = true;
    }

    pub fn set_width(&mut self, width: f32) {
        self.width = width;
        self.needs_update = true;
    }

    pub fn set_height(&mut self, height: f32) {
        self.height = height;
        self.needs_update = true;
    }

    pub fn set_orthographic_size(&mut self, size: f32) {
        self.orthographic_size = size.clamp(self.min_orthographic_size, self.max_orthographic_size);
        self.needs_update = true;
    }

    pub fn projection(&self) -> &Mat32 {
        &self.projection
    }

    pub fn view(&self) -> &Mat32 {
        &self.view
    }

    /// Maps a world-space point to pixel coordinates (origin top-left).
    pub fn to_screen(&self, point: [f32; 2]) -> [f32; 2] {
        let clip = mat32::transform(&mat32::mul(&self.projection, &self.view), point);
        [
            (clip[0] + 1.0) * 0.5 * self.width,
            (1.0 - clip[1]) * 0.5 * self.height,
        ]
    }

    /// Maps pixel coordinates back into world space.
    pub fn to_world(&self, screen: [f32; 2]) -> [f32; 2] {
        let clip = [
            2.0 * (screen[0] / self.width) - 1.0,
            -2.0 * (screen[1] / self.height) + 1.0,
        ];
        let inverse = mat32::inverse(&mat32::mul(&self.projection, &self.view)).unwrap_or(IDENTITY);
        mat32::transform(&inverse, clip)
    }

    fn update_projection(&mut self) {
        let top = self.orthographic_size;
        let right = top * self.aspect();
        // orthographic(-right, right, top, -top) reduced to 2x3
        self.projection = [1.0 / right, 0.0, 0.0, 1.0 / top, 0.0, 0.0];
        self.needs_update = false;
    }
}

impl Capability for Camera2D {
    fn kind(&self) -> &'static str {
        "Camera2D"
    }

    fn update(&mut self, ctx: &UpdateContext) {
        if !self.active {
            return;
        }
        if self.needs_update {
            self.update_projection();
        }
        self.view = ctx
            .transform
            .and_then(|transform| mat32::inverse(&transform.matrix()))
            .unwrap_or(IDENTITY);
    }

    fn to_json(&self) -> Result<Value, CodecError> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_json(&mut self, value: &Value) -> Result<(), CodecError> {
        let mut next = Camera2D::deserialize(value)?;
        next.active = self.active;
        next.needs_update = true;
        *self = next;
        Ok(())
    }

    fn to_sync(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&[self.width, self.height, self.orthographic_size]);
    }

    fn from_sync(&mut self, fields: &[f32]) -> Result<(), CodecError> {
        expect_fields(self.kind(), fields, 3)?;
        self.set(fields[0], fields[1]);
        self.set_orthographic_size(fields[2]);
        Ok(())
    }

    erased_capability!();

    fn camera(&self) -> Option<CameraVariant> {
        Some(CameraVariant::Orthographic2D)
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
        self.needs_update = true;
    }
}

/// Perspective camera for 3D scenes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Camera {
    pub width: f32,
    pub height: f32,
    pub fov: f32,
    pub near: f32,
    pub far: f32,
    pub orthographic: bool,
    pub orthographic_size: f32,
    #[serde(skip)]
    active: bool,
}

impl Default for Camera {
    fn default() -> Self {
        Self {
            width: 960.0,
            height: 640.0,
            fov: 35.0,
            near: 0.3,
            far: 1024.0,
            orthographic: false,
            orthographic_size: 2.0,
            active: false,
        }
    }
}

impl Camera {
    pub fn is_active(&self) -> bool {
        self.active
    }
}

impl Capability for Camera {
    fn kind(&self) -> &'static str {
        "Camera"
    }

    fn to_json(&self) -> Result<Value, CodecError> {
        Ok(serde_json::to_value(self)?)
    }

    fn from_json(&mut self, value: &Value) -> Result<(), CodecError> {
        let active = self.active;
        *self = Camera::deserialize(value)?;
        self.active = active;
        Ok(())
    }

    fn to_sync(&self, out: &mut Vec<f32>) {
        out.extend_from_slice(&[self.width, self.height, self.fov]);
    }

    fn from_sync(&mut self, fields: &[f32]) -> Result<(), CodecError> {
        expect_fields(self.kind(), fields, 3)?;
        self.width = fields[0];
        self.height = fields[1];
        self.fov = fields[2];
        Ok(())
    }

    erased_capability!();

    fn camera(&self) -> Option<CameraVariant> {
        Some(CameraVariant::Perspective)
    }

    fn set_active(&mut self, active: bool) {
        self.active = active;
    }
}
