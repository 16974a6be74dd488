use glam::{DVec3, Vec3};
use serde::{Deserialize, Serialize};

/// Orthonormal orientation basis: the world-space images of the local
/// X/Y/Z axes. Delta rotations between ticks are expressed as
/// `current * transpose(last)` applied through [`Basis::rotate`] and
/// [`Basis::rotate_inverse`].
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Basis {
    pub x_axis: Vec3,
    pub y_axis: Vec3,
    pub z_axis: Vec3,
}

impl Basis {
    pub const IDENTITY: Basis = Basis {
        x_axis: Vec3::X,
        y_axis: Vec3::Y,
        z_axis: Vec3::Z,
    };

    /// Basis for a rotation of `yaw` degrees about the world Y axis
    pub fn from_yaw_degrees(yaw: f32) -> Self {
        let rad = yaw.to_radians();
        let (sin, cos) = rad.sin_cos();
        Basis {
            x_axis: Vec3::new(cos, 0.0, -sin),
            y_axis: Vec3::Y,
            z_axis: Vec3::new(sin, 0.0, cos),
        }
    }

    /// Rotate a local-space vector into world space
    pub fn rotate(&self, v: Vec3) -> Vec3 {
        self.x_axis * v.x + self.y_axis * v.y + self.z_axis * v.z
    }

    /// Rotate a world-space vector back into local space (transpose)
    pub fn rotate_inverse(&self, v: Vec3) -> Vec3 {
        Vec3::new(v.dot(self.x_axis), v.dot(self.y_axis), v.dot(self.z_axis))
    }

    /// f64 variant of [`Basis::rotate`] for world positions
    pub fn rotate_dvec(&self, v: DVec3) -> DVec3 {
        self.x_axis.as_dvec3() * v.x + self.y_axis.as_dvec3() * v.y + self.z_axis.as_dvec3() * v.z
    }

    /// f64 variant of [`Basis::rotate_inverse`]
    pub fn rotate_inverse_dvec(&self, v: DVec3) -> DVec3 {
        DVec3::new(
            v.dot(self.x_axis.as_dvec3()),
            v.dot(self.y_axis.as_dvec3()),
            v.dot(self.z_axis.as_dvec3()),
        )
    }
}

impl Default for Basis {
    fn default() -> Self {
        Basis::IDENTITY
    }
}

/// Wrap an angle in degrees to [-180, 180)
pub fn wrap_degrees(mut deg: f32) -> f32 {
    deg %= 360.0;
    if deg >= 180.0 {
        deg -= 360.0;
    }
    if deg < -180.0 {
        deg += 360.0;
    }
    deg
}

/// Sign of `v` with zero mapping to zero (unlike `f64::signum`, which
/// maps +0.0 to 1.0). Plane-crossing tests rely on the zero case.
pub fn signum(v: f64) -> f64 {
    if v > 0.0 {
        1.0
    } else if v < 0.0 {
        -1.0
    } else {
        0.0
    }
}

/// Axis-aligned box in world coordinates
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: DVec3,
    pub max: DVec3,
}

impl Aabb {
    pub fn new(min: DVec3, max: DVec3) -> Self {
        Aabb { min, max }
    }

    /// Cube of half-size `radius` centered on `center`
    pub fn from_center_radius(center: DVec3, radius: f64) -> Self {
        Aabb {
            min: center - DVec3::splat(radius),
            max: center + DVec3::splat(radius),
        }
    }

    pub fn offset(&self, by: DVec3) -> Self {
        Aabb {
            min: self.min + by,
            max: self.max + by,
        }
    }

    /// Grow the box toward a displacement: negative components extend the
    /// min face, positive components extend the max face. Used to gather
    /// every volume a moving box could touch this tick.
    pub fn expand_towards(&self, d: DVec3) -> Self {
        let mut min = self.min;
        let mut max = self.max;
        if d.x < 0.0 {
            min.x += d.x;
        } else {
            max.x += d.x;
        }
        if d.y < 0.0 {
            min.y += d.y;
        } else {
            max.y += d.y;
        }
        if d.z < 0.0 {
            min.z += d.z;
        } else {
            max.z += d.z;
        }
        Aabb { min, max }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x < other.max.x
            && self.max.x > other.min.x
            && self.min.y < other.max.y
            && self.max.y > other.min.y
            && self.min.z < other.max.z
            && self.max.z > other.min.z
    }

    /// Clip a proposed Y displacement of `moving` so it cannot penetrate
    /// this solid box. Only clips when the boxes overlap on the other two
    /// axes; contact at exactly the proposed distance is not a clip.
    pub fn clip_y_offset(&self, moving: &Aabb, mut dy: f64) -> f64 {
        if moving.max.x > self.min.x
            && moving.min.x < self.max.x
            && moving.max.z > self.min.z
            && moving.min.z < self.max.z
        {
            if dy > 0.0 && moving.max.y <= self.min.y {
                let gap = self.min.y - moving.max.y;
                if gap < dy {
                    dy = gap;
                }
            } else if dy < 0.0 && moving.min.y >= self.max.y {
                let gap = self.max.y - moving.min.y;
                if gap > dy {
                    dy = gap;
                }
            }
        }
        dy
    }

    /// Clip a proposed X displacement of `moving` against this solid box
    pub fn clip_x_offset(&self, moving: &Aabb, mut dx: f64) -> f64 {
        if moving.max.y > self.min.y
            && moving.min.y < self.max.y
            && moving.max.z > self.min.z
            && moving.min.z < self.max.z
        {
            if dx > 0.0 && moving.max.x <= self.min.x {
                let gap = self.min.x - moving.max.x;
                if gap < dx {
                    dx = gap;
                }
            } else if dx < 0.0 && moving.min.x >= self.max.x {
                let gap = self.max.x - moving.min.x;
                if gap > dx {
                    dx = gap;
                }
            }
        }
        dx
    }

    /// Clip a proposed Z displacement of `moving` against this solid box
    pub fn clip_z_offset(&self, moving: &Aabb, mut dz: f64) -> f64 {
        if moving.max.x > self.min.x
            && moving.min.x < self.max.x
            && moving.max.y > self.min.y
            && moving.min.y < self.max.y
        {
            if dz > 0.0 && moving.max.z <= self.min.z {
                let gap = self.min.z - moving.max.z;
                if gap < dz {
                    dz = gap;
                }
            } else if dz < 0.0 && moving.min.z >= self.max.z {
                let gap = self.max.z - moving.min.z;
                if gap > dz {
                    dz = gap;
                }
            }
        }
        dz
    }
}
