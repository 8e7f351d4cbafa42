use crate::translate::Quaternion;
use std::fmt;

/// Discrete buttons understood by the session protocol.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionButton {
    Cross,
    Circle,
    Square,
    Triangle,
    DpadLeft,
    DpadRight,
    DpadUp,
    DpadDown,
    L1,
    R1,
    L3,
    R3,
    Options,
    Create,
    Touchpad,
    Ps,
}

impl SessionButton {
    pub const ALL: [SessionButton; 16] = [
        SessionButton::Cross,
        SessionButton::Circle,
        SessionButton::Square,
        SessionButton::Triangle,
        SessionButton::DpadLeft,
        SessionButton::DpadRight,
        SessionButton::DpadUp,
        SessionButton::DpadDown,
        SessionButton::L1,
        SessionButton::R1,
        SessionButton::L3,
        SessionButton::R3,
        SessionButton::Options,
        SessionButton::Create,
        SessionButton::Touchpad,
        SessionButton::Ps,
    ];

    /// Bit of this button in [`ControllerState::buttons`].
    pub fn mask(self) -> u32 {
        let bit = match self {
            SessionButton::Cross => 0,
            SessionButton::Circle => 1,
            SessionButton::Square => 2,
            SessionButton::Triangle => 3,
            SessionButton::DpadLeft => 4,
            SessionButton::DpadRight => 5,
            SessionButton::DpadUp => 6,
            SessionButton::DpadDown => 7,
            SessionButton::L1 => 8,
            SessionButton::R1 => 9,
            SessionButton::L3 => 10,
            SessionButton::R3 => 11,
            SessionButton::Options => 12,
            SessionButton::Create => 13,
            SessionButton::Touchpad => 14,
            SessionButton::Ps => 15,
        };
        1 << bit
    }
}

/// Full input state as pushed to the remote side on every feedback update.
#[derive(Debug, Clone, PartialEq)]
pub struct ControllerState {
    pub buttons: u32,
    pub l2: u8,
    pub r2: u8,
    pub left: (i16, i16),
    pub right: (i16, i16),
    pub accel: [f32; 3],
    pub gyro: [f32; 3],
    pub orientation: Quaternion,
}

impl ControllerState {
    /// Rest state: nothing pressed, sticks centered, gravity on +y, identity orientation.
    pub fn idle() -> Self {
        Self {
            buttons: 0,
            l2: 0,
            r2: 0,
            left: (0, 0),
            right: (0, 0),
            accel: [0.0, 1.0, 0.0],
            gyro: [0.0; 3],
            orientation: Quaternion::IDENTITY,
        }
    }

    pub fn press(&mut self, button: SessionButton) {
        self.buttons |= button.mask();
    }

    pub fn release(&mut self, button: SessionButton) {
        self.buttons &= !button.mask();
    }

    pub fn is_pressed(&self, button: SessionButton) -> bool {
        self.buttons & button.mask() != 0
    }

    pub fn pressed(&self) -> Vec<SessionButton> {
        SessionButton::ALL
            .into_iter()
            .filter(|b| self.is_pressed(*b))
            .collect()
    }
}

impl Default for ControllerState {
    fn default() -> Self {
        Self::idle()
    }
}

impl fmt::Display for ControllerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "buttons:{:#06x} L:({},{}) R:({},{}) L2:{} R2:{}",
            self.buttons, self.left.0, self.left.1, self.right.0, self.right.1, self.l2, self.r2
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn masks_are_distinct_bits() {
        let combined = SessionButton::ALL
            .iter()
            .fold(0u32, |acc, b| {
                assert_eq!(acc & b.mask(), 0, "{b:?} overlaps another button");
                acc | b.mask()
            });
        assert_eq!(combined, 0xffff);
    }

    #[test]
    fn press_and_release_toggle_only_their_bit() {
        let mut state = ControllerState::idle();
        state.press(SessionButton::Cross);
        state.press(SessionButton::Ps);
        assert_eq!(state.pressed(), vec![SessionButton::Cross, SessionButton::Ps]);

        state.release(SessionButton::Cross);
        assert!(!state.is_pressed(SessionButton::Cross));
        assert!(state.is_pressed(SessionButton::Ps));
    }

    #[test]
    fn idle_state_rests_on_gravity() {
        let state = ControllerState::idle();
        assert_eq!(state.accel, [0.0, 1.0, 0.0]);
        assert_eq!(state.orientation, Quaternion::IDENTITY);
        assert!(state.pressed().is_empty());
    }
}
