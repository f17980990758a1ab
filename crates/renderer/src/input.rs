use engine::NavigationInput;
use winit::keyboard::{Key, NamedKey};

/// Held keys that feed continuous navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Control {
    Forward,
    Back,
    Left,
    Right,
    Up,
    Down,
    PitchUp,
    PitchDown,
    YawLeft,
    YawRight,
}

const CONTROL_COUNT: usize = 10;

impl Control {
    fn index(self) -> usize {
        self as usize
    }

    fn from_key(key: &Key) -> Option<Self> {
        match key {
            Key::Named(NamedKey::Space) => Some(Self::Up),
            Key::Named(NamedKey::Shift) => Some(Self::Down),
            Key::Named(NamedKey::ArrowUp) => Some(Self::PitchUp),
            Key::Named(NamedKey::ArrowDown) => Some(Self::PitchDown),
            Key::Named(NamedKey::ArrowLeft) => Some(Self::YawLeft),
            Key::Named(NamedKey::ArrowRight) => Some(Self::YawRight),
            Key::Character(value) => match single_char(value)? {
                'w' => Some(Self::Forward),
                's' => Some(Self::Back),
                'a' => Some(Self::Left),
                'd' => Some(Self::Right),
                ' ' => Some(Self::Up),
                _ => None,
            },
            _ => None,
        }
    }
}

/// One-shot actions bound to key presses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ViewerCommand {
    CycleFractal,
    CycleMode,
    CycleMaterial,
    ToggleGround,
    ToggleAutoSpeed,
    ToggleAutoFocus,
    StartRender,
    StartPreview,
    /// Stops a running capture, or closes the viewer when idle.
    StopOrExit,
}

pub(crate) fn command_for(key: &Key) -> Option<ViewerCommand> {
    match key {
        Key::Named(NamedKey::Tab) => Some(ViewerCommand::CycleFractal),
        Key::Named(NamedKey::Escape) => Some(ViewerCommand::StopOrExit),
        Key::Character(value) => match single_char(value)? {
            'f' => Some(ViewerCommand::CycleFractal),
            'm' => Some(ViewerCommand::CycleMode),
            'n' => Some(ViewerCommand::CycleMaterial),
            'g' => Some(ViewerCommand::ToggleGround),
            'v' => Some(ViewerCommand::ToggleAutoSpeed),
            'c' => Some(ViewerCommand::ToggleAutoFocus),
            'r' => Some(ViewerCommand::StartRender),
            'p' => Some(ViewerCommand::StartPreview),
            _ => None,
        },
        _ => None,
    }
}

fn single_char(value: &str) -> Option<char> {
    let mut chars = value.chars();
    let ch = chars.next()?;
    if chars.next().is_some() {
        return None;
    }
    Some(ch.to_ascii_lowercase())
}

#[derive(Debug, Default)]
pub(crate) struct NavigationKeys {
    held: [bool; CONTROL_COUNT],
}

impl NavigationKeys {
    /// Records a press or release; returns whether the key is a navigation key.
    pub(crate) fn handle(&mut self, key: &Key, pressed: bool) -> bool {
        let Some(control) = Control::from_key(key) else {
            return false;
        };
        self.held[control.index()] = pressed;
        true
    }

    /// Releases everything, e.g. when the window loses focus.
    pub(crate) fn clear(&mut self) {
        self.held = [false; CONTROL_COUNT];
    }

    pub(crate) fn input(&self) -> NavigationInput {
        let axis = |positive: Control, negative: Control| {
            let mut value = 0.0;
            if self.held[positive.index()] {
                value += 1.0;
            }
            if self.held[negative.index()] {
                value -= 1.0;
            }
            value
        };
        NavigationInput {
            forward: axis(Control::Forward, Control::Back),
            right: axis(Control::Right, Control::Left),
            up: axis(Control::Up, Control::Down),
            pitch: axis(Control::PitchUp, Control::PitchDown),
            yaw: axis(Control::YawRight, Control::YawLeft),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn character(value: &str) -> Key {
        Key::Character(value.into())
    }

    #[test]
    fn held_keys_combine_into_axes() {
        let mut keys = NavigationKeys::default();
        assert!(keys.input().is_idle());

        assert!(keys.handle(&character("w"), true));
        assert!(keys.handle(&character("D"), true));
        assert!(keys.handle(&Key::Named(NamedKey::Shift), true));
        assert!(keys.handle(&Key::Named(NamedKey::ArrowLeft), true));
        let input = keys.input();
        assert_eq!(input.forward, 1.0);
        assert_eq!(input.right, 1.0);
        assert_eq!(input.up, -1.0);
        assert_eq!(input.yaw, -1.0);
        assert_eq!(input.pitch, 0.0);

        keys.handle(&character("s"), true);
        assert_eq!(keys.input().forward, 0.0);
        keys.handle(&character("w"), false);
        assert_eq!(keys.input().forward, -1.0);

        keys.clear();
        assert!(keys.input().is_idle());
    }

    #[test]
    fn non_navigation_keys_are_ignored() {
        let mut keys = NavigationKeys::default();
        assert!(!keys.handle(&character("m"), true));
        assert!(!keys.handle(&character("wa"), true));
        assert!(keys.input().is_idle());
    }

    #[test]
    fn hotkeys_map_to_commands() {
        assert_eq!(command_for(&character("r")), Some(ViewerCommand::StartRender));
        assert_eq!(command_for(&character("P")), Some(ViewerCommand::StartPreview));
        assert_eq!(command_for(&Key::Named(NamedKey::Tab)), Some(ViewerCommand::CycleFractal));
        assert_eq!(
            command_for(&Key::Named(NamedKey::Escape)),
            Some(ViewerCommand::StopOrExit)
        );
        assert_eq!(command_for(&character("w")), None);
    }
}
