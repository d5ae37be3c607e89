use crossterm::{
    cursor::{Hide, MoveTo, Show},
    event::{
        poll, read, Event, KeyboardEnhancementFlags, PopKeyboardEnhancementFlags,
        PushKeyboardEnhancementFlags,
    },
    execute, queue,
    style::{
        Attribute, Color, Print, ResetColor, SetAttribute, SetBackgroundColor, SetForegroundColor,
    },
    terminal::{
        disable_raw_mode, enable_raw_mode, size, supports_keyboard_enhancement, Clear, ClearType,
        EnterAlternateScreen, LeaveAlternateScreen,
    },
};
use std::io::{self, stdout, Write};
use std::time::Duration;
use tracing::debug;

/// A single cell in the frame buffer
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Cell {
    pub ch: char,
    pub fg: Option<Color>,
    pub bg: Option<Color>,
    pub bold: bool,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            ch: ' ',
            fg: None,
            bg: None,
            bold: false,
        }
    }
}

/// Off-screen frame buffer that drawing code writes into
#[derive(Clone, Debug)]
pub struct Canvas {
    width: u16,
    height: u16,
    cells: Vec<Vec<Cell>>,
}

impl Canvas {
    pub fn new(width: u16, height: u16) -> Self {
        Self {
            width,
            height,
            cells: vec![vec![Cell::default(); width as usize]; height as usize],
        }
    }

    pub fn size(&self) -> (u16, u16) {
        (self.width, self.height)
    }

    pub fn resize(&mut self, width: u16, height: u16) {
        *self = Self::new(width, height);
    }

    /// Fill the whole buffer with a background color
    pub fn fill_bg(&mut self, bg: Option<Color>) {
        for row in &mut self.cells {
            row.fill(Cell { bg, ..Cell::default() });
        }
    }

    /// Set a character at position; out-of-bounds writes are dropped
    pub fn set(&mut self, x: i32, y: i32, ch: char, fg: Option<Color>, bg: Option<Color>, bold: bool) {
        if x >= 0 && x < self.width as i32 && y >= 0 && y < self.height as i32 {
            self.cells[y as usize][x as usize] = Cell { ch, fg, bg, bold };
        }
    }

    /// Set a string starting at position
    pub fn set_str(&mut self, x: i32, y: i32, s: &str, fg: Option<Color>, bg: Option<Color>, bold: bool) {
        for (i, ch) in s.chars().enumerate() {
            self.set(x + i as i32, y, ch, fg, bg, bold);
        }
    }

    pub fn get(&self, x: u16, y: u16) -> Option<&Cell> {
        self.cells.get(y as usize)?.get(x as usize)
    }

    /// Text of one row with trailing blanks trimmed
    pub fn row_text(&self, y: u16) -> String {
        self.cells
            .get(y as usize)
            .map(|row| row.iter().map(|c| c.ch).collect::<String>().trim_end().to_string())
            .unwrap_or_default()
    }
}

/// Raw-mode terminal session drawing a [`Canvas`]
pub struct Terminal {
    canvas: Canvas,
    keyboard_enhanced: bool,
}

impl Terminal {
    /// Enter raw mode and the alternate screen.
    ///
    /// Requests key release events when the terminal supports the keyboard
    /// enhancement protocol.
    pub fn new() -> io::Result<Self> {
        let (width, height) = size()?;

        enable_raw_mode()?;
        let mut out = stdout();
        execute!(out, EnterAlternateScreen, Hide)?;

        let keyboard_enhanced = supports_keyboard_enhancement().unwrap_or(false);
        if keyboard_enhanced {
            execute!(
                out,
                PushKeyboardEnhancementFlags(
                    KeyboardEnhancementFlags::DISAMBIGUATE_ESCAPE_CODES
                        | KeyboardEnhancementFlags::REPORT_EVENT_TYPES
                        | KeyboardEnhancementFlags::REPORT_ALL_KEYS_AS_ESCAPE_CODES
                )
            )?;
        }
        debug!(width, height, keyboard_enhanced, "terminal ready");

        Ok(Self {
            canvas: Canvas::new(width, height),
            keyboard_enhanced,
        })
    }

    /// Whether the terminal reports key releases
    pub fn reports_key_release(&self) -> bool {
        self.keyboard_enhanced
    }

    pub fn canvas(&mut self) -> &mut Canvas {
        &mut self.canvas
    }

    /// Adopt a new terminal size and clear the screen
    pub fn resize(&mut self, width: u16, height: u16) -> io::Result<()> {
        self.canvas.resize(width, height);
        execute!(stdout(), Clear(ClearType::All))?;
        Ok(())
    }

    /// Write the canvas to the screen
    pub fn present(&self) -> io::Result<()> {
        let mut out = stdout();
        let mut fg: Option<Color> = None;
        let mut bg: Option<Color> = None;
        let mut bold = false;
        queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;

        for (y, row) in self.canvas.cells.iter().enumerate() {
            queue!(out, MoveTo(0, y as u16))?;
            for cell in row {
                if cell.bold != bold {
                    // Resetting attributes also drops colors
                    if cell.bold {
                        queue!(out, SetAttribute(Attribute::Bold))?;
                    } else {
                        queue!(out, SetAttribute(Attribute::Reset))?;
                        fg = None;
                        bg = None;
                    }
                    bold = cell.bold;
                }
                if cell.fg != fg {
                    queue!(out, SetForegroundColor(cell.fg.unwrap_or(Color::Reset)))?;
                    fg = cell.fg;
                }
                if cell.bg != bg {
                    queue!(out, SetBackgroundColor(cell.bg.unwrap_or(Color::Reset)))?;
                    bg = cell.bg;
                }
                queue!(out, Print(cell.ch))?;
            }
        }

        queue!(out, ResetColor, SetAttribute(Attribute::Reset))?;
        out.flush()
    }

    /// Wait up to `timeout` for the next terminal event
    pub fn next_event(&self, timeout: Duration) -> io::Result<Option<Event>> {
        if poll(timeout)? {
            return Ok(Some(read()?));
        }
        Ok(None)
    }
}

impl Drop for Terminal {
    fn drop(&mut self) {
        let mut out = stdout();
        if self.keyboard_enhanced {
            let _ = execute!(out, PopKeyboardEnhancementFlags);
        }
        let _ = execute!(out, ResetColor, Show, LeaveAlternateScreen);
        let _ = disable_raw_mode();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn out_of_bounds_writes_are_ignored() {
        let mut canvas = Canvas::new(4, 2);
        canvas.set(-1, 0, 'x', None, None, false);
        canvas.set(4, 0, 'x', None, None, false);
        canvas.set(0, 2, 'x', None, None, false);
        canvas.set_str(2, 1, "abc", Some(Color::Red), None, true);
        assert_eq!(canvas.row_text(0), "");
        assert_eq!(canvas.row_text(1), "  ab");
        assert_eq!(canvas.get(3, 1).map(|c| c.fg), Some(Some(Color::Red)));
        assert!(canvas.get(4, 1).is_none());
    }

    #[test]
    fn fill_replaces_old_cells() {
        let mut canvas = Canvas::new(3, 1);
        canvas.set(1, 0, 'x', Some(Color::Red), None, true);
        canvas.fill_bg(Some(Color::White));
        assert_eq!(
            canvas.get(1, 0),
            Some(&Cell { bg: Some(Color::White), ..Cell::default() })
        );
    }
}
