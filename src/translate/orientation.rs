use std::f64::consts::PI;

/// Rotation as sent to the session: vector part `(x, y, z)`, scalar part `w`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Quaternion {
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub w: f32,
}

impl Quaternion {
    /// The rest orientation, (0, 0, 0, 1).
    pub const IDENTITY: Quaternion = Quaternion {
        x: 0.0,
        y: 0.0,
        z: 0.0,
        w: 1.0,
    };

    pub fn norm(&self) -> f32 {
        (self.x * self.x + self.y * self.y + self.z * self.z + self.w * self.w).sqrt()
    }
}

impl Default for Quaternion {
    fn default() -> Self {
        Self::IDENTITY
    }
}

/// Converts yaw/pitch/roll in degrees (intrinsic Tait-Bryan, aerospace order)
/// into a quaternion.
///
/// The result is not renormalized. Non-finite input produces non-finite output.
pub fn encode_orientation(yaw: f32, pitch: f32, roll: f32) -> Quaternion {
    let half = |degrees: f32| f64::from(degrees) * PI / 360.0;

    let (sy, cy) = half(yaw).sin_cos();
    let (sp, cp) = half(pitch).sin_cos();
    let (sr, cr) = half(roll).sin_cos();

    let w = cr * cp * cy + sr * sp * sy;
    let x = sr * cp * cy - cr * sp * sy;
    let y = cr * sp * cy + sr * cp * sy;
    let z = cr * cp * sy - sr * sp * cy;

    Quaternion {
        x: x as f32,
        y: y as f32,
        z: z as f32,
        w: w as f32,
    }
}
