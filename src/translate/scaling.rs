/// Factor applied to a normalized stick axis.
///
/// The signed axis is multiplied directly, without an offset into the
/// unsigned range, so a full left deflection arrives as -1023.
pub const STICK_SCALE: f32 = 1023.0;

/// Factor applied to a normalized trigger value.
pub const TRIGGER_SCALE: f32 = 255.0;

/// Scales a stick axis in [-1, 1] to the session's stick range.
///
/// Input is clamped first and the product truncated toward zero.
/// NaN maps to 0.
pub fn scale_stick(value: f32) -> i16 {
    (value.clamp(-1.0, 1.0) * STICK_SCALE) as i16
}

pub fn scale_stick_pair(x: f32, y: f32) -> (i16, i16) {
    (scale_stick(x), scale_stick(y))
}

/// Scales a trigger in [0, 1] to 0..=255, clamping and truncating like [`scale_stick`].
pub fn scale_trigger(value: f32) -> u8 {
    (value.clamp(0.0, 1.0) * TRIGGER_SCALE) as u8
}
