//! Renderer contract and the strategy selector that picks one per camera.

use crate::error::ClientError;
use log::{debug, error, info, warn};
use mirror_shared::{CameraVariant, Component, DeviceCaps, Scene};
use std::collections::HashMap;

/// Drawing target handed to renderers and input sources.
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
    pub pixel_ratio: f32,
    binding: u64,
    resized: bool,
}

impl Surface {
    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width,
            height,
            pixel_ratio: 1.0,
            binding: 0,
            resized: false,
        }
    }

    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    /// Records a new pixel size. Returns `true` if it differs from the old one.
    pub fn resize(&mut self, width: u32, height: u32) -> bool {
        if (width, height) == (self.width, self.height) {
            return false;
        }
        self.width = width;
        self.height = height;
        self.resized = true;
        true
    }

    /// Takes the pending resize notification, if any.
    pub fn take_resized(&mut self) -> Option<(u32, u32)> {
        std::mem::take(&mut self.resized).then_some((self.width, self.height))
    }

    /// Incremented every time a renderer is initialised on this surface.
    pub fn binding(&self) -> u64 {
        self.binding
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RendererKind {
    /// Hardware accelerated path
    Gpu,
    /// Software path for devices without acceleration
    Canvas,
    /// User-installed override
    Custom,
}

pub trait Renderer {
    fn name(&self) -> &str;

    fn init(&mut self, surface: &mut Surface) -> Result<(), ClientError>;

    /// Draws `scene` as seen from `camera`, a component of one of its game objects.
    fn render(&mut self, scene: &Scene, camera: &Component);

    fn destroy(&mut self);
}

pub type RendererFactory = Box<dyn Fn() -> Box<dyn Renderer>>;

/// Chooses, creates and switches renderers.
///
/// Renderers are constructed on first use and cached per kind. A custom
/// renderer, once installed, is always chosen.
pub struct RendererSelector {
    device: DeviceCaps,
    force_canvas: bool,
    factories: HashMap<RendererKind, RendererFactory>,
    cache: HashMap<RendererKind, Box<dyn Renderer>>,
    active: Option<RendererKind>,
}

impl RendererSelector {
    pub fn new(device: DeviceCaps, force_canvas: bool) -> Self {
        Self {
            device,
            force_canvas,
            factories: HashMap::new(),
            cache: HashMap::new(),
            active: None,
        }
    }

    pub fn register(&mut self, kind: RendererKind, factory: RendererFactory) {
        self.factories.insert(kind, factory);
    }

    /// Installs an override renderer. It replaces any previous override and is
    /// picked on the next selection.
    pub fn set_custom(&mut self, renderer: Box<dyn Renderer>) {
        if self.active == Some(RendererKind::Custom) {
            if let Some(mut previous) = self.cache.remove(&RendererKind::Custom) {
                previous.destroy();
            }
            self.active = None;
        }
        self.cache.insert(RendererKind::Custom, renderer);
    }

    pub fn device(&self) -> &DeviceCaps {
        &self.device
    }

    pub fn active(&self) -> Option<RendererKind> {
        self.active
    }

    pub fn active_renderer(&self) -> Option<&dyn Renderer> {
        let kind = self.active?;
        self.cache.get(&kind).map(|renderer| renderer.as_ref())
    }

    /// Picks the renderer kind for the current device.
    pub fn choose(&self) -> Result<RendererKind, ClientError> {
        if self.cache.contains_key(&RendererKind::Custom) {
            return Ok(RendererKind::Custom);
        }
        if !self.force_canvas && self.device.gpu && self.has(RendererKind::Gpu) {
            return Ok(RendererKind::Gpu);
        }
        if self.device.canvas && self.has(RendererKind::Canvas) {
            return Ok(RendererKind::Canvas);
        }
        Err(self.no_renderer())
    }

    fn has(&self, kind: RendererKind) -> bool {
        self.factories.contains_key(&kind) || self.cache.contains_key(&kind)
    }

    /// Makes sure the right renderer is active for a camera of `variant`.
    ///
    /// Returns `Ok(true)` if a different renderer was initialised, `Ok(false)`
    /// if the current one was kept.
    pub fn select(&mut self, variant: CameraVariant, surface: &mut Surface) -> Result<bool, ClientError> {
        let custom = self.cache.contains_key(&RendererKind::Custom);
        if variant == CameraVariant::Perspective && !custom {
            warn!("RendererSelector: no renderer draws {:?} cameras, keeping current renderer", variant);
            return Ok(false);
        }

        let kind = self.choose().map_err(|e| {
            error!("RendererSelector: {}", e);
            e
        })?;
        if self.active == Some(kind) {
            return Ok(false);
        }

        // the new renderer must exist before the current one is torn down
        if !self.cache.contains_key(&kind) {
            let Some(factory) = self.factories.get(&kind) else {
                return Err(self.no_renderer());
            };
            self.cache.insert(kind, factory());
        }

        let previous = self.active.take();
        if let Some(renderer) = previous.and_then(|previous| self.cache.get_mut(&previous)) {
            debug!("RendererSelector: destroying {}", renderer.name());
            renderer.destroy();
        }

        let Some(renderer) = self.cache.get_mut(&kind) else {
            return Err(self.no_renderer());
        };
        if let Err(e) = renderer.init(surface) {
            error!("RendererSelector: {} failed to start: {}", renderer.name(), e);
            self.restore(previous, surface);
            return Err(e);
        }
        surface.binding += 1;
        info!("RendererSelector: using {} renderer", renderer.name());

        self.active = Some(kind);
        Ok(true)
    }

    fn no_renderer(&self) -> ClientError {
        ClientError::NoRenderer {
            gpu: self.device.gpu,
            canvas: self.device.canvas,
            force_canvas: self.force_canvas,
        }
    }

    /// Brings a destroyed renderer back after its replacement failed.
    fn restore(&mut self, previous: Option<RendererKind>, surface: &mut Surface) {
        let Some(kind) = previous else {
            return;
        };
        let Some(renderer) = self.cache.get_mut(&kind) else {
            return;
        };
        match renderer.init(surface) {
            Ok(()) => {
                surface.binding += 1;
                warn!("RendererSelector: keeping {} renderer", renderer.name());
                self.active = Some(kind);
            }
            Err(e) => error!("RendererSelector: {} failed to restart: {}", renderer.name(), e),
        }
    }

    pub fn render(&mut self, scene: &Scene, camera: &Component) {
        let Some(kind) = self.active else {
            return;
        };
        if let Some(renderer) = self.cache.get_mut(&kind) {
            renderer.render(scene, camera);
        }
    }

    /// Destroys the active renderer, leaving none selected.
    pub fn shutdown(&mut self) {
        if let Some(kind) = self.active.take() {
            if let Some(renderer) = self.cache.get_mut(&kind) {
                renderer.destroy();
            }
        }
    }
}
