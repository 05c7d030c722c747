//! Camera parameters, the named camera library and the camera resolver.
//!
//! A camera is a plain record of numbers (position, focal point, view-up,
//! distance, clipping range) so that it can be serialised and interpolated
//! field by field. Named cameras are framed for a mouse-sized brain in
//! display coordinates (micrometres).

use brainrender_core::{BrainrenderError, Result};
use glam::{DMat4, DQuat, DVec3};
use serde::{Deserialize, Serialize};

/// Numeric camera description.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraParams {
    /// Camera position.
    #[serde(alias = "pos")]
    pub position: DVec3,
    /// Point the camera is looking at.
    #[serde(alias = "focal_point", alias = "focalPoint")]
    pub focal: DVec3,
    /// Up direction of the view.
    #[serde(alias = "view_up", alias = "viewUp")]
    pub viewup: DVec3,
    /// Distance between position and focal point.
    pub distance: f64,
    /// Near and far clipping distances.
    #[serde(alias = "clipping_range", alias = "clippingRange")]
    pub clipping: [f64; 2],
    /// Optional orientation angles in degrees.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub orientation: Option<DVec3>,
}

/// Focal point shared by the named cameras: the centre of a mouse brain.
pub const BRAIN_CENTER: DVec3 = DVec3::new(6600.0, 4000.0, -5700.0);

/// Names accepted by [`named_camera`].
pub const CAMERA_NAMES: [&str; 6] = [
    "sagittal",
    "sagittal2",
    "frontal",
    "top",
    "top_side",
    "three_quarters",
];

fn preset(position: [f64; 3], viewup: [f64; 3], clipping: [f64; 2]) -> CameraParams {
    let position = DVec3::from_array(position);
    CameraParams {
        position,
        focal: BRAIN_CENTER,
        viewup: DVec3::from_array(viewup),
        distance: position.distance(BRAIN_CENTER),
        clipping,
        orientation: None,
    }
}

/// Looks up a camera from the named library.
pub fn named_camera(name: &str) -> Option<CameraParams> {
    Some(match name {
        "sagittal" => preset([6514.0, -34.0, 36854.0], [0.0, -1.0, 0.0], [24098.0, 49971.0]),
        "sagittal2" => preset([9782.0, 1795.0, -40999.0], [0.0, -1.0, 0.0], [23256.0, 51031.0]),
        "frontal" => preset([-19199.0, -1428.0, -5763.0], [0.0, -1.0, 0.0], [19531.0, 40903.0]),
        "top" => preset([7760.0, -31645.0, -5943.0], [-1.0, 0.0, 0.0], [27262.0, 45988.0]),
        "top_side" => preset([4405.0, -31597.0, -5411.0], [0.0, 0.0, -1.0], [26892.0, 46454.0]),
        "three_quarters" => {
            preset([-20169.0, -7298.0, 14832.0], [0.0, -1.0, 0.0], [16955.0, 58963.0])
        }
        _ => return None,
    })
}

/// Any value accepted where a camera is expected.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum CameraArg {
    /// Fall back to the caller-supplied default name.
    #[default]
    Default,
    /// A camera from the named library.
    Name(String),
    /// A parameter dictionary (JSON object with the [`CameraParams`] fields).
    Dict(serde_json::Value),
    /// Explicit parameters.
    Params(CameraParams),
}

impl CameraArg {
    /// Interprets a JSON value: `null`, a camera name or a parameter object.
    pub fn from_json(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Default,
            serde_json::Value::String(name) => Self::Name(name),
            other => Self::Dict(other),
        }
    }
}

impl From<&str> for CameraArg {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for CameraArg {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<CameraParams> for CameraArg {
    fn from(params: CameraParams) -> Self {
        Self::Params(params)
    }
}

impl<T: Into<CameraArg>> From<Option<T>> for CameraArg {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Default, Into::into)
    }
}

/// Resolves a camera argument to parameters.
///
/// [`CameraArg::Default`] resolves `default_name` through the same rules.
pub fn resolve_camera(camera: &CameraArg, default_name: &str) -> Result<CameraParams> {
    match camera {
        CameraArg::Default => resolve_camera(&CameraArg::Name(default_name.to_string()), default_name),
        CameraArg::Name(name) => named_camera(name)
            .ok_or_else(|| BrainrenderError::invalid(format!("unrecognised camera '{name}'"))),
        CameraArg::Dict(value @ serde_json::Value::Object(_)) => {
            let params: CameraParams = serde_json::from_value(value.clone())
                .map_err(|err| BrainrenderError::invalid(format!("invalid camera params: {err}")))?;
            params.validated()
        }
        CameraArg::Dict(other) => Err(BrainrenderError::invalid(format!(
            "unsupported camera argument: {other}"
        ))),
        CameraArg::Params(params) => params.validated(),
    }
}

fn rotate_about(v: DVec3, axis: DVec3, degrees: f64) -> DVec3 {
    match axis.try_normalize() {
        Some(axis) => DQuat::from_axis_angle(axis, degrees.to_radians()) * v,
        None => v,
    }
}

fn mix(a: DVec3, b: DVec3, u: f64) -> DVec3 {
    a * (1.0 - u) + b * u
}

impl CameraParams {
    /// A camera at `distance` from `focal`, looking along `direction`.
    pub fn looking_along(focal: DVec3, direction: DVec3, distance: f64, viewup: DVec3) -> Self {
        let direction = direction.try_normalize().unwrap_or(DVec3::Z);
        Self {
            position: focal - direction * distance,
            focal,
            viewup,
            distance,
            clipping: [distance * 0.6, distance * 1.4],
            orientation: None,
        }
    }

    fn validated(self) -> Result<Self> {
        let finite = self.position.is_finite()
            && self.focal.is_finite()
            && self.viewup.is_finite()
            && self.distance.is_finite()
            && self.clipping.iter().all(|c| c.is_finite())
            && self.orientation.map_or(true, DVec3::is_finite);
        if !finite {
            return Err(BrainrenderError::invalid("invalid camera params: non-finite value"));
        }
        if self.viewup.length_squared() == 0.0 {
            return Err(BrainrenderError::invalid("invalid camera params: zero view-up"));
        }
        Ok(self)
    }

    /// Unit vector from position toward the focal point.
    pub fn direction(&self) -> DVec3 {
        (self.focal - self.position).try_normalize().unwrap_or(DVec3::NEG_Z)
    }

    /// View-up made orthogonal to the viewing direction.
    pub fn orthogonal_viewup(&self) -> DVec3 {
        let d = self.direction();
        let up = self.viewup - d * d.dot(self.viewup);
        up.try_normalize()
            .unwrap_or_else(|| d.any_orthonormal_vector())
    }

    /// Right-handed view matrix.
    pub fn view_matrix(&self) -> DMat4 {
        DMat4::look_at_rh(self.position, self.focal, self.orthogonal_viewup())
    }

    /// Rotates the position about the view-up axis through the focal point.
    #[must_use]
    pub fn azimuth(mut self, degrees: f64) -> Self {
        let offset = rotate_about(self.position - self.focal, self.orthogonal_viewup(), degrees);
        self.position = self.focal + offset;
        self
    }

    /// Rotates the position about the horizontal axis through the focal point.
    #[must_use]
    pub fn elevation(mut self, degrees: f64) -> Self {
        let up = self.orthogonal_viewup();
        let axis = (-self.direction()).cross(up);
        let offset = rotate_about(self.position - self.focal, axis, degrees);
        self.position = self.focal + offset;
        self.viewup = rotate_about(up, axis, degrees);
        self
    }

    /// Rotates the view-up about the viewing direction.
    #[must_use]
    pub fn roll(mut self, degrees: f64) -> Self {
        self.viewup = rotate_about(self.orthogonal_viewup(), self.direction(), degrees);
        self
    }

    /// Moves the camera toward the focal point by `zoom` (2 halves the distance).
    #[must_use]
    pub fn zoomed(mut self, zoom: f64) -> Self {
        if zoom > 0.0 && zoom.is_finite() {
            self.position = self.focal + (self.position - self.focal) / zoom;
            self.distance /= zoom;
        }
        self
    }

    /// Field-wise linear interpolation; exact at `u == 0` and `u == 1`.
    #[must_use]
    pub fn lerp(&self, other: &Self, u: f64) -> Self {
        let s = |a: f64, b: f64| a * (1.0 - u) + b * u;
        Self {
            position: mix(self.position, other.position, u),
            focal: mix(self.focal, other.focal, u),
            viewup: mix(self.viewup, other.viewup, u),
            distance: s(self.distance, other.distance),
            clipping: [
                s(self.clipping[0], other.clipping[0]),
                s(self.clipping[1], other.clipping[1]),
            ],
            orientation: match (self.orientation, other.orientation) {
                (Some(a), Some(b)) => Some(mix(a, b, u)),
                (a, b) => {
                    if u >= 1.0 {
                        b
                    } else {
                        a
                    }
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_library_is_complete() {
        for name in CAMERA_NAMES {
            let cam = named_camera(name).expect("named camera");
            assert!((cam.distance - cam.position.distance(cam.focal)).abs() < 1e-9);
            assert!(cam.clipping[0] < cam.clipping[1]);
        }
        assert!(named_camera("fisheye").is_none());
    }

    #[test]
    fn test_resolver_errors() {
        let err = resolve_camera(&"fisheye".into(), "sagittal").expect_err("unknown name");
        assert!(err.to_string().contains("unrecognised camera"));

        let partial = serde_json::json!({"pos": [0.0, 0.0, 1.0]});
        let err = resolve_camera(&CameraArg::Dict(partial), "sagittal").expect_err("missing keys");
        assert!(err.to_string().contains("invalid camera params"));

        let err = resolve_camera(&CameraArg::Dict(serde_json::json!(42)), "sagittal")
            .expect_err("number");
        assert!(err.to_string().contains("unsupported camera argument"));
    }

    #[test]
    fn test_default_uses_fallback_name() {
        let cam = resolve_camera(&CameraArg::Default, "top").expect("default");
        assert_eq!(cam, named_camera("top").expect("top"));
        assert!(resolve_camera(&CameraArg::Default, "nope").is_err());
    }

    #[test]
    fn test_dict_aliases() {
        let dict = serde_json::json!({
            "pos": [1.0, 2.0, 3.0],
            "focalPoint": [0.0, 0.0, 0.0],
            "viewup": [0.0, -1.0, 0.0],
            "distance": 3.7,
            "clippingRange": [1.0, 10.0],
        });
        let cam = resolve_camera(&CameraArg::from_json(dict), "sagittal").expect("valid dict");
        assert_eq!(cam.position, DVec3::new(1.0, 2.0, 3.0));
        assert_eq!(cam.clipping, [1.0, 10.0]);
        assert!(cam.orientation.is_none());
    }

    #[test]
    fn test_rotations_keep_distance() {
        let cam = named_camera("three_quarters").expect("camera");
        for moved in [cam.azimuth(37.0), cam.elevation(-20.0), cam.roll(90.0)] {
            assert!((moved.position.distance(moved.focal) - cam.distance).abs() < 1e-6);
        }
        let full_turn = cam.azimuth(360.0);
        assert!(full_turn.position.distance(cam.position) < 1e-6);
        assert_eq!(cam.roll(45.0).position, cam.position);
    }

    #[test]
    fn test_zoomed() {
        let cam = named_camera("frontal").expect("camera");
        let zoomed = cam.zoomed(2.0);
        assert!((zoomed.distance * 2.0 - cam.distance).abs() < 1e-9);
        assert!((zoomed.position.distance(zoomed.focal) - zoomed.distance).abs() < 1e-6);
        assert_eq!(cam.zoomed(0.0), cam);
    }

    fn vec3() -> impl Strategy<Value = DVec3> {
        (-1e5..1e5_f64, -1e5..1e5_f64, -1e5..1e5_f64).prop_map(|(x, y, z)| DVec3::new(x, y, z))
    }

    prop_compose! {
        fn camera()(
            position in vec3(),
            focal in vec3(),
            up in (0.1..1.0_f64, -1.0..1.0_f64, -1.0..1.0_f64),
            distance in 1.0..1e5_f64,
            near in 1.0..1e4_f64,
            orientation in proptest::option::of(vec3()),
        ) -> CameraParams {
            CameraParams {
                position,
                focal,
                viewup: DVec3::new(up.0, up.1, up.2),
                distance,
                clipping: [near, near * 4.0],
                orientation,
            }
        }
    }

    proptest! {
        #[test]
        fn prop_valid_dict_resolves_to_itself(cam in camera()) {
            let dict = serde_json::to_value(cam).expect("serialise camera");
            let resolved = resolve_camera(&CameraArg::Dict(dict), "sagittal").expect("valid");
            prop_assert_eq!(resolved, cam);
        }

        #[test]
        fn prop_lerp_endpoints_are_exact(a in camera(), b in camera()) {
            prop_assert_eq!(a.lerp(&b, 0.0), a);
            prop_assert_eq!(a.lerp(&b, 1.0), b);
        }

        #[test]
        fn prop_lerp_midpoint_is_mean(a in camera(), b in camera()) {
            let mid = a.lerp(&b, 0.5);
            prop_assert!((mid.position - (a.position + b.position) * 0.5).length() < 1e-6);
            prop_assert!((mid.distance - (a.distance + b.distance) * 0.5).abs() < 1e-6);
        }
    }
}
