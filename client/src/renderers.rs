use crate::error::ClientError;
use crate::rendering::{Renderer, Surface};
use macroquad::prelude::{
    clear_background, draw_rectangle, set_camera, set_default_camera, vec2, Camera2D as ViewCamera, Color,
};
use mirror_shared::components::{Camera2D, Sprite2D, Transform2D};
use mirror_shared::{Component, Scene};

/// A sprite ready to draw, in world units.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpriteDraw {
    pub center: [f32; 2],
    pub size: [f32; 2],
    pub color: [f32; 4],
    pub layer: i32,
}

/// Visible sprites of `scene`, back to front.
pub fn collect_sprites(scene: &Scene) -> Vec<SpriteDraw> {
    let mut sprites: Vec<SpriteDraw> = scene
        .game_objects()
        .iter()
        .filter_map(|game_object| {
            let sprite = game_object.get::<Sprite2D>()?;
            if !sprite.visible {
                return None;
            }
            let transform = game_object.get::<Transform2D>().copied().unwrap_or_default();
            Some(SpriteDraw {
                center: transform.position,
                size: [sprite.width * transform.scale[0], sprite.height * transform.scale[1]],
                color: sprite.color,
                layer: sprite.layer,
            })
        })
        .collect();
    sprites.sort_by_key(|sprite| sprite.layer);
    sprites
}

fn color(rgba: [f32; 4]) -> Color {
    Color::new(rgba[0], rgba[1], rgba[2], rgba[3])
}

/// Draws in world space through a macroquad camera built from the scene camera.
#[derive(Debug, Default)]
pub struct GpuRenderer {
    size: (u32, u32),
}

impl GpuRenderer {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Renderer for GpuRenderer {
    fn name(&self) -> &str {
        "gpu"
    }

    fn init(&mut self, surface: &mut Surface) -> Result<(), ClientError> {
        self.size = surface.size();
        Ok(())
    }

    fn render(&mut self, scene: &Scene, camera: &Component) {
        let Some(camera) = camera.get::<Camera2D>() else {
            return;
        };
        clear_background(color(camera.background));

        // rotation is not carried over
        let projection = camera.projection();
        let view = camera.view();
        let zoom = vec2(projection[0], projection[3]);
        set_camera(&ViewCamera {
            zoom,
            target: vec2(-view[4], -view[5]),
            ..Default::default()
        });

        for sprite in collect_sprites(scene) {
            draw_rectangle(
                sprite.center[0] - sprite.size[0] / 2.0,
                sprite.center[1] - sprite.size[1] / 2.0,
                sprite.size[0],
                sprite.size[1],
                color(sprite.color),
            );
        }

        set_default_camera();
    }

    fn destroy(&mut self) {
        set_default_camera();
    }
}

/// Projects every sprite to pixels on the CPU and draws in screen space.
#[derive(Debug, Default)]
pub struct CanvasRenderer;

impl CanvasRenderer {
    pub fn new() -> Self {
        Self
    }
}

impl Renderer for CanvasRenderer {
    fn name(&self) -> &str {
        "canvas"
    }

    fn init(&mut self, _surface: &mut Surface) -> Result<(), ClientError> {
        Ok(())
    }

    fn render(&mut self, scene: &Scene, camera: &Component) {
        let Some(camera) = camera.get::<Camera2D>() else {
            return;
        };
        clear_background(color(camera.background));

        for sprite in collect_sprites(scene) {
            let half = [sprite.size[0] / 2.0, sprite.size[1] / 2.0];
            let a = camera.to_screen([sprite.center[0] - half[0], sprite.center[1] - half[1]]);
            let b = camera.to_screen([sprite.center[0] + half[0], sprite.center[1] + half[1]]);
            let x = a[0].min(b[0]);
            let y = a[1].min(b[1]);
            let w = (a[0] - b[0]).abs();
            let h = (a[1] - b[1]).abs();

            draw_rectangle(x, y, w, h, color(sprite.color));
        }
    }

    fn destroy(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use mirror_shared::GameObject;

    fn sprite(layer: i32, visible: bool) -> Component {
        Component::from_capability(Sprite2D {
            layer,
            visible,
            ..Sprite2D::default()
        })
    }

    #[test]
    fn test_sprites_sorted_back_to_front() {
        let mut scene = Scene::new("main");
        scene.add_game_object(GameObject::new().with_component(sprite(2, true)));
        scene.add_game_object(
            GameObject::new()
                .with_component(sprite(-1, true))
                .with_component(Component::from_capability(Transform2D {
                    position: [4.0, 5.0],
                    rotation: 0.0,
                    scale: [2.0, 3.0],
                })),
        );
        scene.add_game_object(GameObject::new().with_component(sprite(0, false)));
        scene.add_game_object(GameObject::new());

        let sprites = collect_sprites(&scene);
        assert_eq!(sprites.len(), 2);
        assert_eq!(sprites[0].layer, -1);
        assert_eq!(sprites[0].center, [4.0, 5.0]);
        let base = Sprite2D::default();
        assert_eq!(sprites[0].size, [base.width * 2.0, base.height * 3.0]);
        assert_eq!(sprites[1].layer, 2);
    }
}
