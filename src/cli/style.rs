use std::io::IsTerminal;

use colored::{Color, Colorize};

/// Terminal presentation settings resolved once per invocation.
#[derive(Debug, Clone)]
pub struct UiStyle {
    pub header_prefix: String,
    pub horizontal: char,
    pub use_color: bool,
    pub color_header: Option<Color>,
    pub color_warning: Option<Color>,
}

impl UiStyle {
    /// Colors only when stdout is a terminal, `NO_COLOR` is unset and config allows it.
    pub fn detect(color_enabled: bool) -> Self {
        let stdout_tty = std::io::stdout().is_terminal();
        let no_color = std::env::var_os("NO_COLOR").is_some();
        Self::new(stdout_tty && color_enabled && !no_color)
    }

    pub fn plain() -> Self {
        Self::new(false)
    }

    fn new(use_color: bool) -> Self {
        Self {
            header_prefix: "> ".into(),
            horizontal: '-',
            use_color,
            color_header: use_color.then_some(Color::BrightBlue),
            color_warning: use_color.then_some(Color::Yellow),
        }
    }

    pub fn horizontal_line(&self, width: usize) -> String {
        self.horizontal.to_string().repeat(width.max(20))
    }

    pub fn apply_header_style(&self, text: &str) -> String {
        match self.color_header {
            Some(color) => text.color(color).bold().to_string(),
            None => text.to_string(),
        }
    }

    pub fn apply_warning_style(&self, text: &str) -> String {
        match self.color_warning {
            Some(color) => text.color(color).to_string(),
            None => text.to_string(),
        }
    }

    pub fn format_header(&self, title: &str) -> String {
        self.apply_header_style(&format!("{}{}", self.header_prefix, title))
    }
}
