//! Session state and the interactive event loop.

use crate::error::Result;
use crate::input::{InputMode, KeyDirection, KeyEvent, Subscription, TerminalKeys};
use crate::prefs::{Preferences, PreferencesStore};
use crate::render::{self, View};
use crate::sound::{self, ClickSound};
use crate::terminal::Terminal;
use crate::tracker::PressedKeys;
use crossterm::event::{Event, KeyCode, KeyEvent as TermKeyEvent, KeyEventKind, KeyModifiers};
use std::time::{Duration, Instant};
use tracing::{debug, info, trace, warn};

const FRAME_TIME: Duration = Duration::from_millis(16);
const VOLUME_STEP: f32 = 0.05;

/// Sound settings captured when preferences last changed.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClickPolicy {
    pub enabled: bool,
    pub volume: f32,
}

impl From<&Preferences> for ClickPolicy {
    fn from(prefs: &Preferences) -> Self {
        Self {
            enabled: prefs.sound_enabled,
            volume: prefs.volume,
        }
    }
}

impl ClickPolicy {
    fn on_press(&self, click: &dyn ClickSound) {
        if !self.enabled {
            return;
        }
        if let Err(e) = click.play(self.volume) {
            debug!(error = %e, "click playback failed");
        }
    }
}

/// Everything the visualizer owns: held keys, preferences, and the click.
pub struct Session {
    pressed: PressedKeys,
    prefs: Preferences,
    store: Box<dyn PreferencesStore>,
    click: Box<dyn ClickSound>,
    policy: ClickPolicy,
}

impl Session {
    /// Start a session with preferences loaded from `store`.
    pub fn new(store: Box<dyn PreferencesStore>, click: Box<dyn ClickSound>) -> Self {
        let prefs = store.load();
        info!(?prefs, store = %store.describe(), "loaded preferences");
        Self {
            pressed: PressedKeys::new(),
            policy: ClickPolicy::from(&prefs),
            prefs,
            store,
            click,
        }
    }

    /// Apply one key event. Returns true if the pressed set changed.
    pub fn handle(&mut self, event: &KeyEvent) -> bool {
        let changed = match event.direction {
            KeyDirection::Down => {
                let new_press = self.pressed.key_down(&event.key);
                if new_press {
                    self.policy.on_press(self.click.as_ref());
                }
                new_press
            }
            KeyDirection::Up => self.pressed.key_up(&event.key),
        };
        trace!(key = %event.key, direction = ?event.direction, changed, "key event");
        changed
    }

    /// Change preferences, persist them, and rebuild the click policy.
    pub fn update_preferences(&mut self, change: impl FnOnce(&mut Preferences)) {
        let before = self.prefs;
        change(&mut self.prefs);
        if self.prefs == before {
            return;
        }

        if let Err(e) = self.store.save(&self.prefs) {
            warn!(error = %e, "could not save preferences");
        }
        self.policy = ClickPolicy::from(&self.prefs);
        info!(prefs = ?self.prefs, "preferences changed");
    }

    /// Forget every held key, as if the view had been reopened.
    pub fn reset(&mut self) {
        debug!(held = self.pressed.len(), "resetting pressed keys");
        self.pressed.clear();
    }

    pub fn pressed(&self) -> &PressedKeys {
        &self.pressed
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn click_policy(&self) -> ClickPolicy {
        self.policy
    }
}

/// Keyboard commands for the visualizer itself
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    Quit,
    ToggleSettings,
    ToggleSound,
    VolumeUp,
    VolumeDown,
    ToggleTheme,
    Reset,
}

/// Map a terminal key press to a control, if it is one.
///
/// Outside the settings box only Ctrl chords act, so every plain key stays
/// free for testing.
pub fn control_for(key: &TermKeyEvent, settings_open: bool) -> Option<Control> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    if key.modifiers.contains(KeyModifiers::CONTROL) {
        return match key.code {
            KeyCode::Char('c') | KeyCode::Char('C') => Some(Control::Quit),
            KeyCode::Char('o') | KeyCode::Char('O') => Some(Control::ToggleSettings),
            _ => None,
        };
    }
    if !settings_open {
        return None;
    }
    match key.code {
        KeyCode::Char('s') | KeyCode::Char('S') => Some(Control::ToggleSound),
        KeyCode::Char('+') | KeyCode::Char('=') => Some(Control::VolumeUp),
        KeyCode::Char('-') | KeyCode::Char('_') => Some(Control::VolumeDown),
        KeyCode::Char('t') | KeyCode::Char('T') => Some(Control::ToggleTheme),
        KeyCode::Char('r') | KeyCode::Char('R') => Some(Control::Reset),
        KeyCode::Esc | KeyCode::Enter => Some(Control::ToggleSettings),
        _ => None,
    }
}

/// Options for an interactive run
pub struct RunConfig {
    pub input: InputMode,
    pub store: Box<dyn PreferencesStore>,
    pub mute: bool,
}

fn subscribe(mode: InputMode) -> Result<Option<Subscription>> {
    match mode {
        InputMode::Terminal => Ok(None),
        InputMode::Evdev => Subscription::evdev().map(Some),
        InputMode::Auto => match Subscription::evdev() {
            Ok(sub) => Ok(Some(sub)),
            Err(e) => {
                info!(reason = %e, "falling back to terminal key events");
                Ok(None)
            }
        },
    }
}

/// Run the keyboard tester until the user quits.
pub fn run(config: RunConfig) -> Result<()> {
    let click = sound::open_click(config.mute);
    let mut session = Session::new(config.store, click);

    // Input readers live exactly as long as the view
    let subscription = subscribe(config.input)?;
    let mut term = Terminal::new()?;
    let mut term_keys = TerminalKeys::new(term.reports_key_release());

    let mode = match (&subscription, term_keys.reports_release()) {
        (Some(_), _) => "[GLOBAL]",
        (None, true) => "[TERMINAL]",
        (None, false) => "[TERMINAL tap]",
    };
    info!(mode, "keyboard tester started");

    let mut show_settings = false;
    let mut dirty = true;

    loop {
        if let Some(sub) = &subscription {
            for event in sub.drain() {
                dirty |= session.handle(&event);
            }
        }

        match term.next_event(FRAME_TIME)? {
            Some(Event::Key(key)) => {
                if let Some(control) = control_for(&key, show_settings) {
                    debug!(?control, "control key");
                    dirty = true;
                    match control {
                        Control::Quit => break,
                        Control::ToggleSettings => show_settings = !show_settings,
                        Control::ToggleSound => session.update_preferences(Preferences::toggle_sound),
                        Control::VolumeUp => session.update_preferences(|p| p.step_volume(VOLUME_STEP)),
                        Control::VolumeDown => session.update_preferences(|p| p.step_volume(-VOLUME_STEP)),
                        Control::ToggleTheme => session.update_preferences(Preferences::toggle_theme),
                        Control::Reset => session.reset(),
                    }
                }
                // Evdev already sees every key; the terminal copy would double up
                if subscription.is_none() {
                    for event in term_keys.translate(&key, Instant::now()) {
                        dirty |= session.handle(&event);
                    }
                }
            }
            Some(Event::Resize(width, height)) => {
                term.resize(width, height)?;
                dirty = true;
            }
            _ => {}
        }

        for event in term_keys.expire(Instant::now()) {
            dirty |= session.handle(&event);
        }

        if dirty {
            let view = View {
                pressed: session.pressed(),
                prefs: session.preferences(),
                mode,
                show_settings,
            };
            render::draw(term.canvas(), &view);
            term.present()?;
            dirty = false;
        }
    }

    drop(term);
    drop(subscription);
    info!("keyboard tester stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::prefs::{MemoryStore, PrefsError, Theme};
    use crate::sound::SoundError;
    use crossterm::event::KeyEventState;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default, Clone)]
    struct RecordingClick {
        volumes: Rc<RefCell<Vec<f32>>>,
    }

    impl ClickSound for RecordingClick {
        fn play(&self, volume: f32) -> std::result::Result<(), SoundError> {
            self.volumes.borrow_mut().push(volume);
            Ok(())
        }
    }

    struct BrokenClick;

    impl ClickSound for BrokenClick {
        fn play(&self, _volume: f32) -> std::result::Result<(), SoundError> {
            Err(SoundError::NoDevice)
        }
    }

    #[derive(Default, Clone)]
    struct SharedStore {
        saved: Rc<RefCell<Vec<Preferences>>>,
    }

    impl PreferencesStore for SharedStore {
        fn load(&self) -> Preferences {
            self.saved.borrow().last().copied().unwrap_or_default()
        }

        fn save(&mut self, prefs: &Preferences) -> std::result::Result<(), PrefsError> {
            self.saved.borrow_mut().push(*prefs);
            Ok(())
        }

        fn describe(&self) -> String {
            "shared".to_string()
        }
    }

    fn session_with(prefs: Preferences, click: RecordingClick) -> Session {
        Session::new(Box::new(MemoryStore::with(prefs)), Box::new(click))
    }

    fn press(code: KeyCode, modifiers: KeyModifiers) -> TermKeyEvent {
        TermKeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            state: KeyEventState::NONE,
        }
    }

    #[test]
    fn new_press_clicks_at_volume() {
        let click = RecordingClick::default();
        let prefs = Preferences {
            volume: 0.25,
            ..Preferences::default()
        };
        let mut session = session_with(prefs, click.clone());

        assert!(session.handle(&KeyEvent::down("a")));
        assert_eq!(*click.volumes.borrow(), vec![0.25]);
    }

    #[test]
    fn shifted_repeat_keeps_one_tap_held() {
        let click = RecordingClick::default();
        let mut session = session_with(Preferences::default(), click.clone());
        let mut term_keys = TerminalKeys::new(false);
        let start = Instant::now();
        let later = start + Duration::from_millis(100);

        for event in term_keys.translate(&press(KeyCode::Char('a'), KeyModifiers::NONE), start) {
            session.handle(&event);
        }
        for event in term_keys.translate(&press(KeyCode::Char('A'), KeyModifiers::NONE), later) {
            session.handle(&event);
        }
        for event in term_keys.expire(start + Duration::from_millis(150)) {
            session.handle(&event);
        }
        assert!(session.pressed().contains("A"));

        for event in term_keys.translate(&press(KeyCode::Char('A'), KeyModifiers::NONE), start + Duration::from_millis(180)) {
            session.handle(&event);
        }
        assert_eq!(click.volumes.borrow().len(), 1);
    }

    #[test]
    fn repeat_does_not_click_again() {
        let click = RecordingClick::default();
        let mut session = session_with(Preferences::default(), click.clone());

        session.handle(&KeyEvent::down("a"));
        assert!(!session.handle(&KeyEvent::down("a")));
        assert_eq!(click.volumes.borrow().len(), 1);

        session.handle(&KeyEvent::up("a"));
        session.handle(&KeyEvent::down("a"));
        assert_eq!(click.volumes.borrow().len(), 2);
    }

    #[test]
    fn muted_preferences_never_click() {
        let click = RecordingClick::default();
        let prefs = Preferences {
            sound_enabled: false,
            volume: 1.0,
            ..Preferences::default()
        };
        let mut session = session_with(prefs, click.clone());

        for key in ["a", "b", " ", "Control", "ArrowUp"] {
            session.handle(&KeyEvent::down(key));
        }
        assert!(click.volumes.borrow().is_empty());
        assert_eq!(session.pressed().len(), 5);
    }

    #[test]
    fn playback_failure_does_not_block_tracking() {
        let mut session = Session::new(Box::new(MemoryStore::new()), Box::new(BrokenClick));
        assert!(session.handle(&KeyEvent::down("q")));
        assert!(session.pressed().contains("Q"));
    }

    #[test]
    fn preference_changes_persist_and_refresh_policy() {
        let store = SharedStore::default();
        let click = RecordingClick::default();
        let mut session = Session::new(Box::new(store.clone()), Box::new(click.clone()));

        session.update_preferences(Preferences::toggle_sound);
        assert!(!session.click_policy().enabled);
        session.handle(&KeyEvent::down("z"));
        assert!(click.volumes.borrow().is_empty());

        session.update_preferences(Preferences::toggle_theme);
        let saved = store.saved.borrow();
        assert_eq!(saved.len(), 2);
        assert_eq!(saved[1].theme, Theme::Dark);
        assert!(!saved[1].sound_enabled);
    }

    #[test]
    fn unchanged_preferences_are_not_saved() {
        let store = SharedStore::default();
        let mut session = Session::new(Box::new(store.clone()), Box::new(RecordingClick::default()));
        session.update_preferences(|p| p.set_volume(0.5));
        assert!(store.saved.borrow().is_empty());
    }

    #[test]
    fn reset_clears_held_keys() {
        let mut session = session_with(Preferences::default(), RecordingClick::default());
        session.handle(&KeyEvent::down("Shift"));
        session.reset();
        assert!(session.pressed().is_empty());
    }

    #[test]
    fn controls_need_ctrl_outside_settings() {
        assert_eq!(control_for(&press(KeyCode::Char('s'), KeyModifiers::NONE), false), None);
        assert_eq!(control_for(&press(KeyCode::Esc, KeyModifiers::NONE), false), None);
        assert_eq!(
            control_for(&press(KeyCode::Char('c'), KeyModifiers::CONTROL), false),
            Some(Control::Quit)
        );
        assert_eq!(
            control_for(&press(KeyCode::Char('o'), KeyModifiers::CONTROL), false),
            Some(Control::ToggleSettings)
        );
    }

    #[test]
    fn settings_keys() {
        let none = KeyModifiers::NONE;
        assert_eq!(control_for(&press(KeyCode::Char('s'), none), true), Some(Control::ToggleSound));
        assert_eq!(control_for(&press(KeyCode::Char('+'), none), true), Some(Control::VolumeUp));
        assert_eq!(control_for(&press(KeyCode::Char('-'), none), true), Some(Control::VolumeDown));
        assert_eq!(control_for(&press(KeyCode::Char('t'), none), true), Some(Control::ToggleTheme));
        assert_eq!(control_for(&press(KeyCode::Char('r'), none), true), Some(Control::Reset));
        assert_eq!(control_for(&press(KeyCode::Esc, none), true), Some(Control::ToggleSettings));

        let mut release = press(KeyCode::Char('s'), none);
        release.kind = KeyEventKind::Release;
        assert_eq!(control_for(&release, true), None);
    }
}
