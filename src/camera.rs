//! Orbit camera and mouse navigation.
//!
//! The [`Camera`] orbits a target point. [`OrbitController`] collects winit
//! events and applies them once per frame in [`OrbitController::update`]:
//! left-button drags rotate the eye around the target, the wheel zooms.
//! [`Projection`] wraps the perspective matrix and is only recomputed when the
//! surface is resized.

use std::f32::consts::PI;

use cgmath::{InnerSpace, Matrix3, Matrix4, Point3, Rad, Vector3, perspective};
use winit::event::{ElementState, MouseButton, MouseScrollDelta, WindowEvent};

/// cgmath produces OpenGL clip space (z in -1..1), wgpu expects z in 0..1.
#[rustfmt::skip]
pub const OPENGL_TO_WGPU_MATRIX: Matrix4<f32> = Matrix4::new(
    1.0, 0.0, 0.0, 0.0,
    0.0, 1.0, 0.0, 0.0,
    0.0, 0.0, 0.5, 0.0,
    0.0, 0.0, 0.5, 1.0,
);

/// Rotation applied per pixel of cursor travel while dragging.
pub const RADIANS_PER_PIXEL: f32 = 2.0 * PI / 1080.0;
/// Scale of the eye-target distance per wheel step towards the scene.
pub const ZOOM_IN: f32 = 0.8;
/// Scale of the eye-target distance per wheel step away from the scene.
pub const ZOOM_OUT: f32 = 1.25;
/// Touchpads report pixels; this many make up one wheel step.
const PIXELS_PER_STEP: f64 = 40.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Camera {
    pub eye: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
}

impl Camera {
    pub fn new<P: Into<Point3<f32>>, V: Into<Vector3<f32>>>(eye: P, target: P, up: V) -> Self {
        Self {
            eye: eye.into(),
            target: target.into(),
            up: up.into(),
        }
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(self.eye, self.target, self.up)
    }
}

impl Default for Camera {
    fn default() -> Self {
        Self::new((0.0, 10.0, 10.0), (0.0, 0.0, 0.0), (0.0, 1.0, -1.0))
    }
}

/// Scales the eye-target distance once per wheel step. Positive steps move
/// towards the target.
pub fn zoom(camera: &mut Camera, steps: i32) {
    let factor = if steps > 0 { ZOOM_IN } else { ZOOM_OUT };
    for _ in 0..steps.unsigned_abs() {
        camera.eye = camera.target + (camera.eye - camera.target) * factor;
    }
}

/// Rotates eye and up vector around the target by a cursor delta in pixels.
///
/// Horizontal travel turns around world +Y. The direction flips when the
/// camera is upside down so dragging keeps following the cursor. Vertical
/// travel tilts around the camera's right axis.
pub fn orbit(camera: &mut Camera, dx: f32, dy: f32) {
    let world_up = Vector3::unit_y();
    let mut offset = camera.eye - camera.target;

    if dx != 0.0 {
        let mut angle = -RADIANS_PER_PIXEL * dx;
        if camera.up.dot(world_up) < 0.0 {
            angle = -angle;
        }
        let yaw = Matrix3::from_axis_angle(world_up, Rad(angle));
        offset = yaw * offset;
        camera.up = yaw * camera.up;
    }

    if dy != 0.0 {
        let axis = offset.cross(camera.up);
        if axis.magnitude2() > f32::EPSILON {
            let pitch = Matrix3::from_axis_angle(axis.normalize(), Rad(RADIANS_PER_PIXEL * dy));
            offset = pitch * offset;
            camera.up = pitch * camera.up;
        }
    }

    camera.eye = camera.target + offset;
}

#[derive(Clone, Debug)]
pub struct Projection {
    aspect: f32,
    fovy: Rad<f32>,
    znear: f32,
    zfar: f32,
    matrix: Matrix4<f32>,
}

impl Projection {
    pub fn new<F: Into<Rad<f32>>>(width: u32, height: u32, fovy: F, znear: f32, zfar: f32) -> Self {
        let mut projection = Self {
            aspect: 1.0,
            fovy: fovy.into(),
            znear,
            zfar,
            matrix: Matrix4::from_scale(1.0),
        };
        projection.resize(width, height);
        projection.matrix = projection.compute();
        projection
    }

    /// Zero-sized surfaces (minimised windows) keep the previous aspect.
    pub fn resize(&mut self, width: u32, height: u32) {
        if width == 0 || height == 0 {
            return;
        }
        self.aspect = width as f32 / height as f32;
        self.matrix = self.compute();
    }

    pub fn aspect(&self) -> f32 {
        self.aspect
    }

    pub fn calc_matrix(&self) -> Matrix4<f32> {
        self.matrix
    }

    fn compute(&self) -> Matrix4<f32> {
        OPENGL_TO_WGPU_MATRIX * perspective(self.fovy, self.aspect, self.znear, self.zfar)
    }
}

impl Default for Projection {
    fn default() -> Self {
        Self::new(1920, 1080, Rad(1.0472), 0.1, 1000.0)
    }
}

/// Mouse navigation state of one window.
#[derive(Debug, Default)]
pub struct OrbitController {
    dragging: bool,
    cursor: Option<(f64, f64)>,
    last_cursor: Option<(f64, f64)>,
    scroll_steps: i32,
    pixel_scroll: f64,
}

impl OrbitController {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns whether the event was consumed for navigation.
    pub fn handle_window_event(&mut self, event: &WindowEvent) -> bool {
        match event {
            WindowEvent::MouseInput {
                state,
                button: MouseButton::Left,
                ..
            } => {
                self.set_dragging(*state == ElementState::Pressed);
                true
            }
            WindowEvent::CursorMoved { position, .. } => {
                self.cursor_moved(position.x, position.y);
                true
            }
            WindowEvent::MouseWheel { delta, .. } => {
                match delta {
                    MouseScrollDelta::LineDelta(_, y) => self.scroll(*y as i32),
                    MouseScrollDelta::PixelDelta(position) => {
                        self.pixel_scroll += position.y;
                        let steps = (self.pixel_scroll / PIXELS_PER_STEP) as i32;
                        self.pixel_scroll -= steps as f64 * PIXELS_PER_STEP;
                        self.scroll(steps);
                    }
                }
                true
            }
            _ => false,
        }
    }

    pub fn set_dragging(&mut self, dragging: bool) {
        self.dragging = dragging;
    }

    pub fn cursor_moved(&mut self, x: f64, y: f64) {
        self.cursor = Some((x, y));
    }

    pub fn scroll(&mut self, steps: i32) {
        self.scroll_steps += steps;
    }

    /// Applies pending zoom steps and the cursor travel since the previous
    /// frame. The reference cursor position advances every frame, dragging or not.
    pub fn update(&mut self, camera: &mut Camera) {
        if self.scroll_steps != 0 {
            zoom(camera, self.scroll_steps);
            self.scroll_steps = 0;
        }

        if self.dragging {
            if let (Some((x, y)), Some((last_x, last_y))) = (self.cursor, self.last_cursor) {
                let (dx, dy) = ((x - last_x) as f32, (y - last_y) as f32);
                if dx != 0.0 || dy != 0.0 {
                    orbit(camera, dx, dy);
                }
            }
        }
        self.last_cursor = self.cursor;
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use cgmath::{EuclideanSpace, Vector4};

    use super::*;

    fn distance(camera: &Camera) -> f32 {
        (camera.eye - camera.target).magnitude()
    }

    #[test]
    fn defaults_match_the_initial_view() {
        let camera = Camera::default();
        assert_eq!(camera.eye, Point3::new(0.0, 10.0, 10.0));
        assert_eq!(camera.target, Point3::origin());
        assert_eq!(camera.up, Vector3::new(0.0, 1.0, -1.0));
    }

    #[test]
    fn wheel_steps_scale_the_eye_distance() {
        let mut camera = Camera::default();
        let start = distance(&camera);

        zoom(&mut camera, 1);
        assert_relative_eq!(distance(&camera), start * 0.8, epsilon = 1e-4);

        zoom(&mut camera, -2);
        assert_relative_eq!(distance(&camera), start * 0.8 * 1.25 * 1.25, epsilon = 1e-4);
    }

    #[test]
    fn zoom_keeps_the_target() {
        let mut camera = Camera::new((3.0, 4.0, 5.0), (1.0, 1.0, 1.0), (0.0, 1.0, 0.0));
        zoom(&mut camera, 3);
        assert_eq!(camera.target, Point3::new(1.0, 1.0, 1.0));
    }

    #[test]
    fn horizontal_drag_turns_around_world_y() {
        let mut camera = Camera::default();
        // a quarter turn
        orbit(&mut camera, 270.0, 0.0);
        assert_relative_eq!(camera.eye.x, -10.0, epsilon = 1e-4);
        assert_relative_eq!(camera.eye.y, 10.0, epsilon = 1e-4);
        assert_relative_eq!(camera.eye.z, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn horizontal_drag_flips_when_upside_down() {
        let mut upright = Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0), (0.0, 1.0, 0.0));
        let mut flipped = Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0), (0.0, -1.0, 0.0));
        orbit(&mut upright, 100.0, 0.0);
        orbit(&mut flipped, 100.0, 0.0);
        assert_relative_eq!(upright.eye.x, -flipped.eye.x, epsilon = 1e-4);
        assert!(upright.eye.x.abs() > 1.0);
    }

    #[test]
    fn vertical_drag_keeps_distance_and_up_orthogonality() {
        let mut camera = Camera::new((0.0, 0.0, 10.0), (0.0, 0.0, 0.0), (0.0, 1.0, 0.0));
        orbit(&mut camera, 0.0, 135.0);
        assert_relative_eq!(distance(&camera), 10.0, epsilon = 1e-4);
        assert_relative_eq!((camera.eye - camera.target).dot(camera.up), 0.0, epsilon = 1e-4);
        assert_relative_eq!(camera.eye.x, 0.0, epsilon = 1e-4);
        assert!(camera.eye.y.abs() > 1.0);
    }

    #[test]
    fn controller_only_rotates_while_dragging() {
        let mut camera = Camera::default();
        let mut controller = OrbitController::new();

        controller.cursor_moved(100.0, 100.0);
        controller.update(&mut camera);
        controller.cursor_moved(200.0, 100.0);
        controller.update(&mut camera);
        assert_eq!(camera, Camera::default());

        controller.set_dragging(true);
        controller.cursor_moved(300.0, 100.0);
        controller.update(&mut camera);
        assert_ne!(camera.eye, Camera::default().eye);

        let after_drag = camera;
        controller.update(&mut camera);
        assert_eq!(camera, after_drag);
    }

    #[test]
    fn controller_applies_scroll_once() {
        let mut camera = Camera::default();
        let mut controller = OrbitController::new();
        controller.scroll(1);
        controller.update(&mut camera);
        controller.update(&mut camera);
        assert_relative_eq!(distance(&camera), distance(&Camera::default()) * 0.8, epsilon = 1e-4);
    }

    #[test]
    fn projection_ignores_zero_sizes() {
        let mut projection = Projection::new(800, 400, Rad(1.0472), 0.1, 1000.0);
        let before = projection.calc_matrix();
        projection.resize(0, 300);
        assert_eq!(projection.calc_matrix(), before);
        assert_relative_eq!(projection.aspect(), 2.0);

        projection.resize(300, 300);
        assert_relative_eq!(projection.aspect(), 1.0);
    }

    #[test]
    fn projection_maps_near_plane_to_zero_depth() {
        let projection = Projection::new(100, 100, Rad(1.0472), 0.1, 1000.0);
        let clip = projection.calc_matrix() * Vector4::new(0.0, 0.0, -0.1, 1.0);
        assert_relative_eq!(clip.z / clip.w, 0.0, epsilon = 1e-5);
    }
}
