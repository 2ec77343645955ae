/// Keyboard key understood by the game
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct KeyCode(pub u32);

impl KeyCode {
    /// The `w` key, bound to flapping
    pub const W: KeyCode = KeyCode(119);
}

/// Input applied during one tick. `None` means no key is pressed.
pub type NativeAction = Option<KeyCode>;

/// Keys the game reacts to, in the order the game advertises them
pub const ACTION_SET: [NativeAction; 2] = [Some(KeyCode::W), None];

/// Returns true if the input makes the bird flap
pub fn is_flap(action: NativeAction) -> bool {
    action == Some(KeyCode::W)
}
