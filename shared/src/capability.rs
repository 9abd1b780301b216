//! Capability interface and the type registry used to materialise components
//! from replication payloads.
//!
//! A capability is the typed state carried by a [`Component`](crate::Component).
//! Inbound snapshots and deltas only name a capability by its tag, so the
//! receiver looks the tag up in a [`CapabilityRegistry`] to obtain a fresh,
//! default-initialised instance before decoding into it.

use crate::components::{Camera, Camera2D, Sprite2D, Transform, Transform2D};
use crate::error::CodecError;
use serde_json::Value;
use std::any::Any;
use std::collections::HashMap;
use std::fmt::Debug;

/// Which kind of camera a capability provides, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CameraVariant {
    Perspective,
    Orthographic2D,
}

/// Per-frame inputs handed to [`Capability::update`].
#[derive(Debug, Clone, Copy, Default)]
pub struct UpdateContext {
    pub delta: f32,
    pub frame_count: u64,
    /// The owning game object's 2D transform, looked up when the update starts.
    pub transform: Option<Transform2D>,
}

/// Shared interface implemented by every component variant.
pub trait Capability: Any + Debug {
    /// Tag identifying this variant on the wire and in the registry.
    fn kind(&self) -> &'static str;

    fn update(&mut self, _ctx: &UpdateContext) {}

    /// Full-fidelity state for snapshots.
    fn to_json(&self) -> Result<Value, CodecError>;

    fn from_json(&mut self, value: &Value) -> Result<(), CodecError>;

    /// Appends the packed per-tick fields of this variant.
    fn to_sync(&self, out: &mut Vec<f32>);

    fn from_sync(&mut self, fields: &[f32]) -> Result<(), CodecError>;

    fn clone_box(&self) -> Box<dyn Capability>;

    fn as_any(&self) -> &dyn Any;

    fn as_any_mut(&mut self) -> &mut dyn Any;

    fn camera(&self) -> Option<CameraVariant> {
        None
    }

    /// Cameras track whether they drive the current frame.
    fn set_active(&mut self, _active: bool) {}
}

/// Checks that a delta carries at least `expected` packed fields.
pub fn expect_fields(kind: &'static str, fields: &[f32], expected: usize) -> Result<(), CodecError> {
    if fields.len() < expected {
        return Err(CodecError::ShortDelta {
            kind,
            expected,
            actual: fields.len(),
        });
    }
    Ok(())
}

pub type Factory = fn() -> Box<dyn Capability>;

/// Maps capability tags to constructors.
///
/// Unknown tags are not an error anywhere in the codec: callers skip the
/// payload entry and move on.
#[derive(Clone)]
pub struct CapabilityRegistry {
    factories: HashMap<String, Factory>,
}

impl CapabilityRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            factories: HashMap::new(),
        }
    }

    /// A registry with every capability shipped by this crate.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register_type::<Transform>();
        registry.register_type::<Transform2D>();
        registry.register_type::<Camera>();
        registry.register_type::<Camera2D>();
        registry.register_type::<Sprite2D>();
        registry
    }

    pub fn register(&mut self, kind: &str, factory: Factory) {
        if self.factories.insert(kind.to_string(), factory).is_some() {
            log::debug!("CapabilityRegistry: replaced factory for {}", kind);
        }
    }

    pub fn register_type<C: Capability + Default>(&mut self) {
        let kind = C::default().kind();
        self.register(kind, || Box::new(C::default()));
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.factories.contains_key(kind)
    }

    pub fn create(&self, kind: &str) -> Option<Box<dyn Capability>> {
        self.factories.get(kind).map(|factory| factory())
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.factories.keys().map(|kind| kind.as_str())
    }
}

impl Default for CapabilityRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

impl Debug for CapabilityRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut kinds: Vec<&str> = self.kinds().collect();
        kinds.sort_unstable();
        f.debug_struct("CapabilityRegistry").field("kinds", &kinds).finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_cover_shipped_capabilities() {
        let registry = CapabilityRegistry::with_defaults();
        for kind in ["Transform", "Transform2D", "Camera", "Camera2D", "Sprite2D"] {
            assert!(registry.contains(kind), "missing {}", kind);
            assert_eq!(registry.create(kind).unwrap().kind(), kind);
        }
    }

    #[test]
    fn test_unknown_kind_is_absent() {
        let registry = CapabilityRegistry::with_defaults();
        assert!(registry.create("ParticleSystem").is_none());
        assert!(!registry.contains("ParticleSystem"));
    }

    #[test]
    fn test_custom_registration() {
        let mut registry = CapabilityRegistry::new();
        assert!(registry.create("Camera2D").is_none());

        registry.register("Camera2D", || Box::new(Camera2D::default()));
        let camera = registry.create("Camera2D").unwrap();
        assert_eq!(camera.camera(), Some(CameraVariant::Orthographic2D));
    }

    #[test]
    fn test_expect_fields() {
        assert!(expect_fields("Transform2D", &[0.0; 5], 5).is_ok());
        assert!(matches!(
            expect_fields("Transform2D", &[0.0; 2], 5),
            Err(CodecError::ShortDelta { expected: 5, actual: 2, .. })
        ));
    }
}
