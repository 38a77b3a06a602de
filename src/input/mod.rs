//! Input routing policy
//!
//! Input devices are decoded elsewhere; this module only decides what the
//! compositor does with already-decoded events.

use log::debug;

/// evdev `BTN_RIGHT`
pub const BTN_RIGHT: u32 = 0x111;
/// evdev `KEY_BACK`
pub const KEY_BACK: u32 = 158;

/// Decoded pointer button event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PointerButton {
    pub button: u32,
    pub pressed: bool,
}

/// Outcome of routing one input event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputAction {
    /// Deliver the event to the focused client unchanged.
    Forward,
    /// Swallow the event and emit a synthetic key instead.
    SyntheticKey { key: u32, pressed: bool },
}

/// Whether the caller still has to deliver the event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputDisposition {
    Consumed,
    Forward,
}

#[derive(Debug, Clone, Default)]
pub struct InputRouter {
    synthesize_back_event: bool,
}

impl InputRouter {
    pub fn new(synthesize_back_event: bool) -> Self {
        Self {
            synthesize_back_event,
        }
    }

    pub fn synthesize_back_event(&self) -> bool {
        self.synthesize_back_event
    }

    pub fn set_synthesize_back_event(&mut self, enabled: bool) {
        self.synthesize_back_event = enabled;
    }

    pub fn route_pointer_button(&self, event: PointerButton) -> InputAction {
        if self.synthesize_back_event && event.button == BTN_RIGHT {
            debug!(
                "Right button {} remapped to back key",
                if event.pressed { "press" } else { "release" }
            );
            return InputAction::SyntheticKey {
                key: KEY_BACK,
                pressed: event.pressed,
            };
        }
        InputAction::Forward
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn right_button_becomes_back_key() {
        let router = InputRouter::new(true);
        assert_eq!(
            router.route_pointer_button(PointerButton {
                button: BTN_RIGHT,
                pressed: true
            }),
            InputAction::SyntheticKey {
                key: KEY_BACK,
                pressed: true
            }
        );
        assert_eq!(
            router.route_pointer_button(PointerButton {
                button: BTN_RIGHT,
                pressed: false
            }),
            InputAction::SyntheticKey {
                key: KEY_BACK,
                pressed: false
            }
        );
    }

    #[test]
    fn other_buttons_are_forwarded() {
        let router = InputRouter::new(true);
        assert_eq!(
            router.route_pointer_button(PointerButton {
                button: 0x110,
                pressed: true
            }),
            InputAction::Forward
        );
    }

    #[test]
    fn disabled_router_forwards_right_button() {
        let mut router = InputRouter::new(false);
        let event = PointerButton {
            button: BTN_RIGHT,
            pressed: true,
        };
        assert_eq!(router.route_pointer_button(event), InputAction::Forward);

        router.set_synthesize_back_event(true);
        assert_ne!(router.route_pointer_button(event), InputAction::Forward);
    }
}
