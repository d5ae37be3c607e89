use keytest::keys::normalize;
use keytest::layout::is_in_layout;
use proptest::prelude::*;
use rstest::rstest;

#[rstest]
#[case(" ", "Space")]
#[case("Control", "Ctrl")]
#[case("Meta", "Meta")]
#[case("OS", "Meta")]
#[case("ContextMenu", "Menu")]
#[case("ArrowUp", "Up")]
#[case("ArrowDown", "Down")]
#[case("ArrowLeft", "Left")]
#[case("ArrowRight", "Right")]
#[case("Escape", "Esc")]
#[case("a", "A")]
#[case("1", "1")]
#[case("-", "-")]
#[case("Tab", "Tab")]
#[case("Enter", "Enter")]
#[case("PageDown", "PageDown")]
fn named_rules(#[case] raw: &str, #[case] expected: &str) {
    assert_eq!(normalize(raw), expected);
}

// Browser names for every key the layout draws
#[rstest]
#[case("Escape")]
#[case("F5")]
#[case("`")]
#[case("=")]
#[case("Backspace")]
#[case("Tab")]
#[case("[")]
#[case("\\")]
#[case("CapsLock")]
#[case(";")]
#[case("'")]
#[case("Enter")]
#[case("Shift")]
#[case(",")]
#[case("/")]
#[case("Control")]
#[case("OS")]
#[case("Alt")]
#[case(" ")]
#[case("ContextMenu")]
#[case("m")]
fn layout_keys_highlight(#[case] raw: &str) {
    assert!(is_in_layout(&normalize(raw)), "{raw:?} -> {:?}", normalize(raw));
}

#[rstest]
#[case("ArrowUp")]
#[case("NumLock")]
#[case("Home")]
fn keys_outside_layout_are_silent(#[case] raw: &str) {
    assert!(!is_in_layout(&normalize(raw)));
}

proptest! {
    #[test]
    fn single_chars_uppercase(c in any::<char>().prop_filter("space has its own rule", |c| *c != ' ')) {
        let raw = c.to_string();
        prop_assert_eq!(normalize(&raw), raw.to_uppercase());
    }

    #[test]
    fn deterministic(raw in ".{0,12}") {
        prop_assert_eq!(normalize(&raw), normalize(&raw));
    }

    #[test]
    fn long_unknown_names_pass_through(raw in "[B-Z][a-z]{2,10}") {
        prop_assume!(!matches!(raw.as_str(), "Control" | "Meta" | "ContextMenu" | "Escape"));
        prop_assert_eq!(normalize(&raw), raw);
    }
}
