//! Key name normalization.
//!
//! Input sources report keys using the browser `KeyboardEvent.key` vocabulary
//! (`" "`, `"Control"`, `"ArrowUp"`, `"a"`). The layout table uses shorter
//! display labels (`"Space"`, `"Ctrl"`, `"A"`). `normalize` bridges the two.

/// Map a raw key identifier to the label used by the layout table.
///
/// Total and side-effect free. Identifiers with no special rule are returned
/// unchanged, so keys outside the modeled layout simply never highlight.
pub fn normalize(raw: &str) -> String {
    match raw {
        " " => "Space".to_string(),
        "Control" => "Ctrl".to_string(),
        "Meta" | "OS" => "Meta".to_string(),
        "ContextMenu" => "Menu".to_string(),
        "ArrowUp" | "ArrowDown" | "ArrowLeft" | "ArrowRight" => raw["Arrow".len()..].to_string(),
        // The layout labels this key "Esc"; passing "Escape" through would never match.
        "Escape" => "Esc".to_string(),
        _ if is_single_char(raw) => raw.to_uppercase(),
        _ => raw.to_string(),
    }
}

fn is_single_char(s: &str) -> bool {
    let mut chars = s.chars();
    chars.next().is_some() && chars.next().is_none()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn space_and_modifiers() {
        assert_eq!(normalize(" "), "Space");
        assert_eq!(normalize("Control"), "Ctrl");
        assert_eq!(normalize("Meta"), "Meta");
        assert_eq!(normalize("OS"), "Meta");
        assert_eq!(normalize("ContextMenu"), "Menu");
    }

    #[test]
    fn arrows_drop_prefix() {
        assert_eq!(normalize("ArrowUp"), "Up");
        assert_eq!(normalize("ArrowDown"), "Down");
        assert_eq!(normalize("ArrowLeft"), "Left");
        assert_eq!(normalize("ArrowRight"), "Right");
    }

    #[test]
    fn single_chars_uppercase() {
        assert_eq!(normalize("a"), "A");
        assert_eq!(normalize("Z"), "Z");
        assert_eq!(normalize("1"), "1");
        assert_eq!(normalize("-"), "-");
        assert_eq!(normalize("\\"), "\\");
        assert_eq!(normalize("é"), "É");
    }

    #[test]
    fn named_keys_pass_through() {
        assert_eq!(normalize("Tab"), "Tab");
        assert_eq!(normalize("Enter"), "Enter");
        assert_eq!(normalize("Backspace"), "Backspace");
        assert_eq!(normalize("CapsLock"), "CapsLock");
        assert_eq!(normalize("F11"), "F11");
        assert_eq!(normalize("Arrow"), "Arrow");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn escape_matches_layout_label() {
        assert_eq!(normalize("Escape"), "Esc");
    }
}
