//! Drawing the on-screen keyboard.
//!
//! Everything here is a function of the state passed in; nothing is read
//! from anywhere else.

use crate::layout::{key_units, row_units, KEYBOARD_LAYOUT};
use crate::prefs::{Preferences, Theme};
use crate::terminal::Canvas;
use crate::tracker::PressedKeys;
use crossterm::style::Color;

const TITLE: &str = "Keyboard Tester";
const INSTRUCTIONS: &str =
    "Press any key on your keyboard to start testing - it turns green if that key works";
const CONTROLS: &str = "Ctrl+O settings  Ctrl+C quit";

/// Rows used above the keyboard (title, instructions, blank).
const HEADER_ROWS: usize = 3;
/// Columns per key unit when the terminal is wide enough, and when it is not.
const UNIT_COLS_WIDE: f32 = 4.0;
const UNIT_COLS_COMPACT: f32 = 3.0;
/// Key height in rows when there is room for padded keys.
const TALL_KEY_ROWS: usize = 3;

/// Colors for one theme
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub background: Option<Color>,
    pub text: Color,
    pub dim: Color,
    pub key_fg: Color,
    pub key_bg: Color,
    pub pressed_fg: Color,
    pub pressed_bg: Color,
}

impl Palette {
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Light => Self {
                background: Some(Color::White),
                text: Color::Black,
                dim: Color::DarkGrey,
                key_fg: Color::Black,
                key_bg: Color::Grey,
                pressed_fg: Color::Black,
                pressed_bg: Color::Green,
            },
            Theme::Dark => Self {
                background: Some(Color::Black),
                text: Color::Grey,
                dim: Color::DarkGrey,
                key_fg: Color::White,
                key_bg: Color::DarkGrey,
                pressed_fg: Color::Black,
                pressed_bg: Color::Green,
            },
        }
    }
}

/// Screen position of one key
#[derive(Debug, Clone, PartialEq)]
pub struct KeyRect {
    pub label: &'static str,
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
}

/// What the screen shows, borrowed from the session for one frame
pub struct View<'a> {
    pub pressed: &'a PressedKeys,
    pub prefs: &'a Preferences,
    pub mode: &'a str,
    pub show_settings: bool,
}

/// Place every layout key on a screen of the given size, centered.
pub fn key_rects(width: u16, height: u16) -> Vec<KeyRect> {
    let w = width as usize;
    let h = height as usize;
    let rows = KEYBOARD_LAYOUT.len();

    let widest = KEYBOARD_LAYOUT
        .iter()
        .map(|row| (row_units(row) * UNIT_COLS_WIDE) as usize + row.len().saturating_sub(1))
        .max()
        .unwrap_or(0);
    let unit_cols = if widest <= w { UNIT_COLS_WIDE } else { UNIT_COLS_COMPACT };

    // Title, keyboard, and the status line must all fit
    let tall_height = rows * TALL_KEY_ROWS + rows - 1;
    let key_h = if tall_height + HEADER_ROWS + 1 <= h { TALL_KEY_ROWS } else { 1 };
    let total_height = rows * key_h + rows - 1;
    let free = h.saturating_sub(HEADER_ROWS + 1 + total_height);
    let start_y = HEADER_ROWS + free / 2;

    let mut rects = Vec::new();
    for (row_idx, row) in KEYBOARD_LAYOUT.iter().enumerate() {
        let y = start_y + row_idx * (key_h + 1);
        let row_width = row
            .iter()
            .map(|label| (key_units(label) * unit_cols) as usize)
            .sum::<usize>()
            + row.len().saturating_sub(1);
        let mut x = w.saturating_sub(row_width) / 2;

        for &label in *row {
            let key_w = (key_units(label) * unit_cols) as usize;
            rects.push(KeyRect {
                label,
                x,
                y,
                width: key_w,
                height: key_h,
            });
            x += key_w + 1;
        }
    }
    rects
}

/// Draw a full frame.
pub fn draw(canvas: &mut Canvas, view: &View) {
    let palette = Palette::for_theme(view.prefs.theme);
    let (width, height) = canvas.size();
    canvas.fill_bg(palette.background);

    draw_centered(canvas, 0, TITLE, palette.text, palette.background, true);
    draw_centered(canvas, 1, INSTRUCTIONS, palette.dim, palette.background, false);

    for rect in key_rects(width, height) {
        draw_key(canvas, &rect, view.pressed.contains(rect.label), &palette);
    }

    draw_status(canvas, view, &palette);

    if view.show_settings {
        draw_overlay(canvas, &settings_text(view.prefs), &palette);
    }
}

fn draw_key(canvas: &mut Canvas, rect: &KeyRect, active: bool, palette: &Palette) {
    let (fg, bg) = if active {
        (palette.pressed_fg, palette.pressed_bg)
    } else {
        (palette.key_fg, palette.key_bg)
    };

    for dy in 0..rect.height {
        for dx in 0..rect.width {
            canvas.set((rect.x + dx) as i32, (rect.y + dy) as i32, ' ', Some(fg), Some(bg), active);
        }
    }

    let label: String = rect.label.chars().take(rect.width).collect();
    let label_x = rect.x + rect.width.saturating_sub(label.chars().count()) / 2;
    let label_y = rect.y + rect.height / 2;
    canvas.set_str(label_x as i32, label_y as i32, &label, Some(fg), Some(bg), active);
}

fn draw_status(canvas: &mut Canvas, view: &View, palette: &Palette) {
    let (_, height) = canvas.size();
    if height == 0 {
        return;
    }
    let sound = if view.prefs.sound_enabled {
        format!("sound {}%", view.prefs.volume_percent())
    } else {
        "sound off".to_string()
    };
    let status = format!(
        "{}  {}  {} theme  |  {}",
        view.mode,
        sound,
        view.prefs.theme.as_str(),
        CONTROLS
    );
    draw_centered(canvas, height - 1, &status, palette.dim, palette.background, false);
}

fn draw_centered(canvas: &mut Canvas, y: u16, text: &str, fg: Color, bg: Option<Color>, bold: bool) {
    let (width, _) = canvas.size();
    let x = (width as usize).saturating_sub(text.chars().count()) / 2;
    canvas.set_str(x as i32, y as i32, text, Some(fg), bg, bold);
}

/// Body of the settings box.
pub fn settings_text(prefs: &Preferences) -> String {
    let sound = if prefs.sound_enabled { "on" } else { "off" };
    format!(
        "Settings\n\
         \n\
         s     Sound    {sound}\n\
         + -   Volume   {}%\n\
         t     Theme    {}\n\
         r     Reset pressed keys\n\
         \n\
         Esc   Close",
        prefs.volume_percent(),
        prefs.theme.as_str()
    )
}

/// Centered bordered box with the given text.
fn draw_overlay(canvas: &mut Canvas, text: &str, palette: &Palette) {
    let (width, height) = canvas.size();
    let lines: Vec<&str> = text.lines().collect();
    let max_width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0);
    let box_width = max_width + 4; // 2 chars padding each side
    let box_height = lines.len() + 2;

    let start_x = (width as usize).saturating_sub(box_width) / 2;
    let start_y = (height as usize).saturating_sub(box_height) / 2;
    let border = Some(palette.text);
    let fill = palette.background;

    let right = box_width - 1;
    let bottom = box_height - 1;
    for dy in 0..box_height {
        for dx in 0..box_width {
            let ch = match (dx, dy) {
                (0, 0) => '┌',
                (x, 0) if x == right => '┐',
                (0, y) if y == bottom => '└',
                (x, y) if x == right && y == bottom => '┘',
                (_, 0) => '─',
                (_, y) if y == bottom => '─',
                (0, _) => '│',
                (x, _) if x == right => '│',
                _ => ' ',
            };
            canvas.set((start_x + dx) as i32, (start_y + dy) as i32, ch, border, fill, false);
        }
    }

    for (i, line) in lines.iter().enumerate() {
        let y = start_y + 1 + i;
        canvas.set_str((start_x + 2) as i32, y as i32, line, Some(palette.text), fill, i == 0);
    }
}
