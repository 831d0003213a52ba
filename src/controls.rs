//! Interactive controls.
//!
//! Keys and mouse buttons map to `Control` values; the session applies them
//! and reports whether the owning loop has anything to do.

/// A user command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Control {
    NextCamera,
    PreviousCamera,
    Quit,
    ToggleDynamicLighting,
    ToggleVideoPlayback,
    ToggleFullscreen,
    NextOverlay,
    ResetOverlay,
    SelectOverlay(usize),
    /// Label overlay shown while held.
    ShowLabel(bool),
    ToggleAugmentation,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MouseButton {
    Left,
    Right,
}

/// What the owning loop must do after a control was applied.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ControlOutcome {
    Continue,
    Fullscreen(bool),
    Quit,
}

impl Control {
    /// Keyboard mapping. Digits `1`-`9` select an overlay directly, `0` resets.
    pub fn from_key(key: char) -> Option<Self> {
        let control = match key {
            '+' => Self::NextCamera,
            '-' => Self::PreviousCamera,
            'q' | 'Q' | '\u{1b}' => Self::Quit,
            'd' => Self::ToggleDynamicLighting,
            'a' => Self::ToggleVideoPlayback,
            'f' => Self::ToggleFullscreen,
            'i' => Self::NextOverlay,
            'n' => Self::ToggleAugmentation,
            '0' => Self::ResetOverlay,
            '1'..='9' => Self::SelectOverlay(key as usize - '1' as usize),
            _ => return None,
        };
        Some(control)
    }

    /// Mouse mapping: left click advances the overlay, right button held
    /// shows the label.
    pub fn from_mouse(button: MouseButton, pressed: bool) -> Option<Self> {
        match (button, pressed) {
            (MouseButton::Left, true) => Some(Self::NextOverlay),
            (MouseButton::Left, false) => None,
            (MouseButton::Right, pressed) => Some(Self::ShowLabel(pressed)),
        }
    }

    /// Parse a line of typed input: every recognised key, in order.
    ///
    /// The words `label` and `unlabel` stand in for the right mouse button on
    /// terminals.
    pub fn parse_line(line: &str) -> Vec<Self> {
        match line.trim() {
            "label" => return vec![Self::ShowLabel(true)],
            "unlabel" => return vec![Self::ShowLabel(false)],
            _ => {}
        }
        line.chars().filter_map(Self::from_key).collect()
    }
}
