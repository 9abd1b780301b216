//! Capabilities shipped with the default registry

/// Implements the type-erasure plumbing of [`Capability`](crate::Capability)
/// for a `Clone + 'static` capability.
macro_rules! erased_capability {
    () => {
        fn clone_box(&self) -> Box<dyn $crate::Capability> {
            Box::new(self.clone())
        }

        fn as_any(&self) -> &dyn std::any::Any {
            self
        }

        fn as_any_mut(&mut self) -> &mut dyn std::any::Any {
            self
        }
    };
}

pub(crate) use erased_capability;

mod camera;
mod sprite;
mod transform;

pub use camera::{Camera, Camera2D};
pub use sprite::Sprite2D;
pub use transform::{mat32, Transform, Transform2D};
