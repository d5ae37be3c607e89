//! Static US QWERTY layout table.

/// Ordered rows of canonical key labels, top row first.
pub type Layout = &'static [&'static [&'static str]];

const ROW_FUNCTION: &[&str] = &[
    "Esc", "F1", "F2", "F3", "F4", "F5", "F6", "F7", "F8", "F9", "F10", "F11", "F12",
];
const ROW_NUMBER: &[&str] = &[
    "`", "1", "2", "3", "4", "5", "6", "7", "8", "9", "0", "-", "=", "Backspace",
];
const ROW_TOP: &[&str] = &[
    "Tab", "Q", "W", "E", "R", "T", "Y", "U", "I", "O", "P", "[", "]", "\\",
];
const ROW_HOME: &[&str] = &[
    "CapsLock", "A", "S", "D", "F", "G", "H", "J", "K", "L", ";", "'", "Enter",
];
const ROW_SHIFT: &[&str] = &[
    "Shift", "Z", "X", "C", "V", "B", "N", "M", ",", ".", "/", "Shift",
];
const ROW_BOTTOM: &[&str] = &[
    "Ctrl", "Meta", "Alt", "Space", "Alt", "Meta", "Menu", "Ctrl",
];

/// The six-row keyboard drawn on screen.
pub const KEYBOARD_LAYOUT: Layout = &[
    ROW_FUNCTION,
    ROW_NUMBER,
    ROW_TOP,
    ROW_HOME,
    ROW_SHIFT,
    ROW_BOTTOM,
];

/// Whether `label` appears anywhere in the layout.
pub fn is_in_layout(label: &str) -> bool {
    KEYBOARD_LAYOUT.iter().any(|row| row.contains(&label))
}

/// Display width of a key in key units (1.0 = a letter key).
pub fn key_units(label: &str) -> f32 {
    match label {
        "Space" => 6.25,
        "Enter" | "Shift" => 2.25,
        "Backspace" => 2.0,
        "CapsLock" => 1.75,
        "Tab" | "\\" | "Ctrl" => 1.5,
        _ if label.chars().count() > 1 => 1.25,
        _ => 1.0,
    }
}

/// Total width of a row in key units.
pub fn row_units(row: &[&str]) -> f32 {
    row.iter().map(|label| key_units(label)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn six_rows() {
        assert_eq!(KEYBOARD_LAYOUT.len(), 6);
        assert_eq!(KEYBOARD_LAYOUT[0][0], "Esc");
        assert_eq!(KEYBOARD_LAYOUT[5][3], "Space");
    }

    #[test]
    fn membership() {
        assert!(is_in_layout("Backspace"));
        assert!(is_in_layout("\\"));
        assert!(is_in_layout("Menu"));
        assert!(!is_in_layout("Up"));
        assert!(!is_in_layout("Escape"));
        assert!(!is_in_layout("a"));
    }

    #[test]
    fn widths() {
        assert_eq!(key_units("A"), 1.0);
        assert_eq!(key_units("F1"), 1.25);
        assert_eq!(key_units("Space"), 6.25);
        assert_eq!(row_units(ROW_BOTTOM), 15.5);
    }
}
