//! Evdev keyboard discovery and reading with automatic device reconnection.

use evdev::{Device, Key};
use std::os::unix::io::AsRawFd;
use std::path::Path;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Read errors in a row before the device is treated as unplugged.
const MAX_CONSECUTIVE_ERRORS: u32 = 50;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Sets a device to non-blocking mode.
fn set_nonblocking(device: &Device) {
    let fd = device.as_raw_fd();
    unsafe {
        let flags = libc::fcntl(fd, libc::F_GETFL);
        libc::fcntl(fd, libc::F_SETFL, flags | libc::O_NONBLOCK);
    }
}

/// Whether a device looks like a keyboard rather than a button or a mouse.
fn is_keyboard(device: &Device) -> bool {
    device
        .supported_keys()
        .is_some_and(|keys| keys.contains(Key::KEY_A) && keys.contains(Key::KEY_SPACE))
}

/// Finds all readable keyboard devices under `/dev/input`.
pub fn find_keyboard_devices() -> Vec<Device> {
    find_keyboards_in(Path::new("/dev/input"))
}

fn find_keyboards_in(dir: &Path) -> Vec<Device> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            debug!(dir = %dir.display(), error = %e, "cannot list input devices");
            return Vec::new();
        }
    };

    let mut keyboards = Vec::new();
    for entry in entries.flatten() {
        let path = entry.path();
        let is_event_node = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with("event"));
        if !is_event_node {
            continue;
        }
        match Device::open(&path) {
            Ok(device) if is_keyboard(&device) => {
                info!(
                    path = %path.display(),
                    name = device.name().unwrap_or("unnamed"),
                    "found keyboard"
                );
                keyboards.push(device);
            }
            Ok(_) => {}
            Err(e) => debug!(path = %path.display(), error = %e, "cannot open input device"),
        }
    }
    keyboards
}

/// Keyboard device that reopens itself after being unplugged.
pub struct ReconnectingDevice {
    device: Device,
    physical_path: Option<String>,
    consecutive_errors: u32,
    needs_reconnect: bool,
}

impl ReconnectingDevice {
    pub fn new(device: Device) -> Self {
        let physical_path = device.physical_path().map(str::to_string);
        set_nonblocking(&device);
        Self {
            device,
            physical_path,
            consecutive_errors: 0,
            needs_reconnect: false,
        }
    }

    /// Deliver pending key events as `(key, value)` pairs, where value is
    /// 0 for release, 1 for press and 2 for auto-repeat. Returns without
    /// calling `on_key` when nothing is pending or the device is gone.
    pub fn poll_keys<F>(&mut self, mut on_key: F)
    where
        F: FnMut(Key, i32),
    {
        if self.needs_reconnect {
            self.needs_reconnect = false;
            self.reconnect();
        }

        match self.device.fetch_events() {
            Ok(events) => {
                self.consecutive_errors = 0;
                for ev in events {
                    if let evdev::InputEventKind::Key(key) = ev.kind() {
                        on_key(key, ev.value());
                    }
                }
            }
            Err(e) => {
                // EAGAIN/EWOULDBLOCK just mean no events on a non-blocking fd
                if e.raw_os_error() != Some(libc::EAGAIN)
                    && e.raw_os_error() != Some(libc::EWOULDBLOCK)
                {
                    self.consecutive_errors += 1;
                    if self.consecutive_errors > MAX_CONSECUTIVE_ERRORS {
                        warn!(error = %e, "keyboard stopped responding, reconnecting");
                        self.needs_reconnect = true;
                    }
                }
            }
        }
    }

    fn reconnect(&mut self) {
        thread::sleep(RECONNECT_DELAY);

        let replacement = match self.physical_path {
            Some(ref path) => find_keyboard_devices()
                .into_iter()
                .find(|dev| dev.physical_path() == Some(path.as_str())),
            None => find_keyboard_devices().into_iter().next(),
        };

        if let Some(device) = replacement {
            set_nonblocking(&device);
            self.device = device;
            self.consecutive_errors = 0;
            info!(physical_path = ?self.physical_path, "keyboard reconnected");
        }
    }
}

/// Translate an evdev key into the browser key name for the same physical key.
///
/// Letters are reported lowercase, as an unshifted browser event would.
pub fn key_name(key: Key) -> Option<&'static str> {
    Some(match key {
        Key::KEY_ESC => "Escape",
        Key::KEY_F1 => "F1", Key::KEY_F2 => "F2", Key::KEY_F3 => "F3", Key::KEY_F4 => "F4",
        Key::KEY_F5 => "F5", Key::KEY_F6 => "F6", Key::KEY_F7 => "F7", Key::KEY_F8 => "F8",
        Key::KEY_F9 => "F9", Key::KEY_F10 => "F10", Key::KEY_F11 => "F11", Key::KEY_F12 => "F12",
        Key::KEY_GRAVE => "`",
        Key::KEY_1 => "1", Key::KEY_2 => "2", Key::KEY_3 => "3", Key::KEY_4 => "4", Key::KEY_5 => "5",
        Key::KEY_6 => "6", Key::KEY_7 => "7", Key::KEY_8 => "8", Key::KEY_9 => "9", Key::KEY_0 => "0",
        Key::KEY_MINUS => "-", Key::KEY_EQUAL => "=", Key::KEY_BACKSPACE => "Backspace",
        Key::KEY_TAB => "Tab",
        Key::KEY_Q => "q", Key::KEY_W => "w", Key::KEY_E => "e", Key::KEY_R => "r", Key::KEY_T => "t",
        Key::KEY_Y => "y", Key::KEY_U => "u", Key::KEY_I => "i", Key::KEY_O => "o", Key::KEY_P => "p",
        Key::KEY_LEFTBRACE => "[", Key::KEY_RIGHTBRACE => "]", Key::KEY_BACKSLASH => "\\",
        Key::KEY_CAPSLOCK => "CapsLock",
        Key::KEY_A => "a", Key::KEY_S => "s", Key::KEY_D => "d", Key::KEY_F => "f", Key::KEY_G => "g",
        Key::KEY_H => "h", Key::KEY_J => "j", Key::KEY_K => "k", Key::KEY_L => "l",
        Key::KEY_SEMICOLON => ";", Key::KEY_APOSTROPHE => "'", Key::KEY_ENTER => "Enter",
        Key::KEY_LEFTSHIFT | Key::KEY_RIGHTSHIFT => "Shift",
        Key::KEY_Z => "z", Key::KEY_X => "x", Key::KEY_C => "c", Key::KEY_V => "v", Key::KEY_B => "b",
        Key::KEY_N => "n", Key::KEY_M => "m",
        Key::KEY_COMMA => ",", Key::KEY_DOT => ".", Key::KEY_SLASH => "/",
        Key::KEY_LEFTCTRL | Key::KEY_RIGHTCTRL => "Control",
        Key::KEY_LEFTMETA | Key::KEY_RIGHTMETA => "Meta",
        Key::KEY_LEFTALT | Key::KEY_RIGHTALT => "Alt",
        Key::KEY_SPACE => " ",
        Key::KEY_COMPOSE => "ContextMenu",
        Key::KEY_UP => "ArrowUp", Key::KEY_DOWN => "ArrowDown",
        Key::KEY_LEFT => "ArrowLeft", Key::KEY_RIGHT => "ArrowRight",
        Key::KEY_HOME => "Home", Key::KEY_END => "End",
        Key::KEY_PAGEUP => "PageUp", Key::KEY_PAGEDOWN => "PageDown",
        Key::KEY_INSERT => "Insert", Key::KEY_DELETE => "Delete",
        _ => return None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::keys::normalize;
    use crate::layout::{is_in_layout, KEYBOARD_LAYOUT};

    const LAYOUT_KEYS: &[Key] = &[
        Key::KEY_ESC, Key::KEY_F1, Key::KEY_F12, Key::KEY_GRAVE, Key::KEY_0, Key::KEY_BACKSPACE,
        Key::KEY_TAB, Key::KEY_BACKSLASH, Key::KEY_CAPSLOCK, Key::KEY_APOSTROPHE, Key::KEY_ENTER,
        Key::KEY_LEFTSHIFT, Key::KEY_RIGHTSHIFT, Key::KEY_SLASH, Key::KEY_LEFTCTRL,
        Key::KEY_RIGHTMETA, Key::KEY_LEFTALT, Key::KEY_SPACE, Key::KEY_COMPOSE, Key::KEY_Q,
    ];

    #[test]
    fn layout_keys_normalize_into_layout() {
        for &key in LAYOUT_KEYS {
            let name = key_name(key).unwrap_or_else(|| panic!("{key:?} has no name"));
            let label = normalize(name);
            assert!(is_in_layout(&label), "{key:?} -> {name:?} -> {label:?}");
        }
    }

    #[test]
    fn every_layout_label_is_reachable() {
        let reachable: Vec<String> = (0..256u16)
            .filter_map(|code| key_name(Key::new(code)))
            .map(normalize)
            .collect();
        for row in KEYBOARD_LAYOUT {
            for label in *row {
                assert!(reachable.iter().any(|l| l == label), "{label} unreachable");
            }
        }
    }

    #[test]
    fn arrows_and_unknown_keys() {
        assert_eq!(key_name(Key::KEY_UP), Some("ArrowUp"));
        assert_eq!(key_name(Key::KEY_KP1), None);
    }

    #[test]
    fn missing_directory_finds_nothing() {
        assert!(find_keyboards_in(Path::new("/nonexistent/input")).is_empty());
    }
}
