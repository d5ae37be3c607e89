//! Key event sources.
//!
//! Every source reports keys as browser-style key names (see
//! [`crate::keys::normalize`]) so the rest of the program has a single
//! vocabulary regardless of where the event came from.

use crate::evdev_util::{self, ReconnectingDevice};
use crate::error::Error;
use crate::keys;
use crossterm::event::{KeyCode, KeyEvent as TermKeyEvent, KeyEventKind, KeyModifiers, ModifierKeyCode};
use evdev::Key;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// How long a press from a terminal without release reporting stays lit.
pub const TAP_HOLD: Duration = Duration::from_millis(150);

const EVDEV_POLL_INTERVAL: Duration = Duration::from_millis(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyDirection {
    Down,
    Up,
}

/// A physical key going down or up, named in the browser key vocabulary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyEvent {
    pub direction: KeyDirection,
    pub key: String,
}

impl KeyEvent {
    pub fn down(key: impl Into<String>) -> Self {
        Self {
            direction: KeyDirection::Down,
            key: key.into(),
        }
    }

    pub fn up(key: impl Into<String>) -> Self {
        Self {
            direction: KeyDirection::Up,
            key: key.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum InputMode {
    /// Global evdev capture when a keyboard device is readable, else the terminal
    #[default]
    Auto,
    /// Read keyboards directly from /dev/input (needs the input group or root)
    Evdev,
    /// Use the key events the terminal delivers
    Terminal,
}

/// Live subscription to evdev keyboards.
///
/// Reader threads run until the subscription is dropped, which stops and
/// joins them.
pub struct Subscription {
    events: Receiver<KeyEvent>,
    running: Arc<AtomicBool>,
    handles: Vec<JoinHandle<()>>,
}

impl Subscription {
    /// Start one reader thread per keyboard device.
    pub fn evdev() -> Result<Self, Error> {
        let keyboards = evdev_util::find_keyboard_devices();
        if keyboards.is_empty() {
            return Err(Error::NoInputDevices);
        }

        let (tx, events) = mpsc::channel();
        let running = Arc::new(AtomicBool::new(true));
        let handles = keyboards
            .into_iter()
            .map(|device| {
                let tx = tx.clone();
                let running = Arc::clone(&running);
                thread::spawn(move || read_device(ReconnectingDevice::new(device), &tx, &running))
            })
            .collect::<Vec<_>>();

        info!(devices = handles.len(), "listening to evdev keyboards");
        Ok(Self {
            events,
            running,
            handles,
        })
    }

    /// Events received since the last call, oldest first.
    pub fn drain(&self) -> impl Iterator<Item = KeyEvent> + '_ {
        self.events.try_iter()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        for handle in self.handles.drain(..) {
            let _ = handle.join();
        }
        debug!("evdev readers stopped");
    }
}

fn read_device(mut reader: ReconnectingDevice, tx: &Sender<KeyEvent>, running: &AtomicBool) {
    while running.load(Ordering::Relaxed) {
        reader.poll_keys(|key, value| {
            if let Some(event) = evdev_key_event(key, value) {
                // Receiver gone means the view is tearing down
                let _ = tx.send(event);
            }
        });
        thread::sleep(EVDEV_POLL_INTERVAL);
    }
}

/// Key event for an evdev key value: 1 press, 2 auto-repeat, 0 release.
/// Keys without a browser name are dropped.
pub fn evdev_key_event(key: Key, value: i32) -> Option<KeyEvent> {
    let name = evdev_util::key_name(key)?;
    match value {
        0 => Some(KeyEvent::up(name)),
        1 | 2 => Some(KeyEvent::down(name)),
        _ => None,
    }
}

/// Browser key name for a crossterm key code.
pub fn key_code_name(code: KeyCode) -> Option<String> {
    let name = match code {
        KeyCode::Char(c) => return Some(c.to_string()),
        KeyCode::F(n) => return Some(format!("F{n}")),
        KeyCode::Backspace => "Backspace",
        KeyCode::Enter => "Enter",
        KeyCode::Tab | KeyCode::BackTab => "Tab",
        KeyCode::Esc => "Escape",
        KeyCode::Up => "ArrowUp",
        KeyCode::Down => "ArrowDown",
        KeyCode::Left => "ArrowLeft",
        KeyCode::Right => "ArrowRight",
        KeyCode::Home => "Home",
        KeyCode::End => "End",
        KeyCode::PageUp => "PageUp",
        KeyCode::PageDown => "PageDown",
        KeyCode::Insert => "Insert",
        KeyCode::Delete => "Delete",
        KeyCode::CapsLock => "CapsLock",
        KeyCode::Menu => "ContextMenu",
        KeyCode::Modifier(m) => match m {
            ModifierKeyCode::LeftShift | ModifierKeyCode::RightShift => "Shift",
            ModifierKeyCode::LeftControl | ModifierKeyCode::RightControl => "Control",
            ModifierKeyCode::LeftAlt | ModifierKeyCode::RightAlt => "Alt",
            ModifierKeyCode::LeftMeta | ModifierKeyCode::RightMeta => "Meta",
            ModifierKeyCode::LeftSuper | ModifierKeyCode::RightSuper => "OS",
            _ => return None,
        },
        _ => return None,
    };
    Some(name.to_string())
}

/// Names of the modifier keys implied by a modifier mask.
fn modifier_names(mods: KeyModifiers) -> impl Iterator<Item = &'static str> {
    [
        (KeyModifiers::SHIFT, "Shift"),
        (KeyModifiers::CONTROL, "Control"),
        (KeyModifiers::ALT, "Alt"),
        (KeyModifiers::SUPER, "OS"),
        (KeyModifiers::META, "Meta"),
    ]
    .into_iter()
    .filter(move |(flag, _)| mods.contains(*flag))
    .map(|(_, name)| name)
}

/// Turns terminal key events into key-down/key-up events.
///
/// With release reporting, events pass straight through. Without it each
/// press is latched for [`TAP_HOLD`] and then released by `expire`.
/// Latches are kept per layout label, so `a` and `A` share one.
#[derive(Debug)]
pub struct TerminalKeys {
    reports_release: bool,
    latched: HashMap<String, Latch>,
}

#[derive(Debug)]
struct Latch {
    key: String,
    deadline: Instant,
}

impl TerminalKeys {
    pub fn new(reports_release: bool) -> Self {
        Self {
            reports_release,
            latched: HashMap::new(),
        }
    }

    pub fn reports_release(&self) -> bool {
        self.reports_release
    }

    /// Translate one terminal key event.
    pub fn translate(&mut self, event: &TermKeyEvent, now: Instant) -> Vec<KeyEvent> {
        let Some(name) = key_code_name(event.code) else {
            return Vec::new();
        };

        if self.reports_release {
            return vec![match event.kind {
                KeyEventKind::Release => KeyEvent::up(name),
                KeyEventKind::Press | KeyEventKind::Repeat => KeyEvent::down(name),
            }];
        }

        if event.kind == KeyEventKind::Release {
            return Vec::new();
        }
        let mut events: Vec<KeyEvent> = modifier_names(event.modifiers)
            .map(|m| self.latch(m, now))
            .collect();
        events.push(self.latch(&name, now));
        events
    }

    /// Release latched keys whose hold window has passed.
    pub fn expire(&mut self, now: Instant) -> Vec<KeyEvent> {
        let mut released = Vec::new();
        self.latched.retain(|_, latch| {
            if latch.deadline <= now {
                released.push(KeyEvent::up(latch.key.clone()));
                false
            } else {
                true
            }
        });
        released
    }

    fn latch(&mut self, name: &str, now: Instant) -> KeyEvent {
        self.latched.insert(
            keys::normalize(name),
            Latch {
                key: name.to_string(),
                deadline: now + TAP_HOLD,
            },
        );
        KeyEvent::down(name)
    }
}
