//! Color palettes for the terminal UI, one per [`Theme`].

use ratatui::style::{Color, Modifier, Style};

use tty_radio_proto::config::Theme;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Palette {
    pub primary: Color,
    pub secondary: Color,
    pub accent: Color,
    pub playing: Color,
    pub paused: Color,
    pub error: Color,
    pub border: Color,
    pub selection_bg: Color,
}

// ── Palettes ──────────────────────────────────────────────────────────────────

const MIAMI_VICE: Palette = Palette {
    primary: Color::Rgb(210, 210, 225),
    secondary: Color::Rgb(115, 115, 138),
    accent: Color::Rgb(255, 95, 175),
    playing: Color::Rgb(80, 220, 220),
    paused: Color::Rgb(255, 184, 80),
    error: Color::Rgb(255, 80, 80),
    border: Color::Rgb(120, 100, 200),
    selection_bg: Color::Rgb(40, 28, 56),
};

const LIGHT: Palette = Palette {
    primary: Color::Rgb(30, 30, 40),
    secondary: Color::Rgb(100, 100, 120),
    accent: Color::Rgb(180, 40, 110),
    playing: Color::Rgb(20, 130, 70),
    paused: Color::Rgb(170, 100, 0),
    error: Color::Rgb(190, 30, 30),
    border: Color::Rgb(150, 150, 170),
    selection_bg: Color::Rgb(220, 220, 235),
};

const NO_COLOR: Palette = Palette {
    primary: Color::Reset,
    secondary: Color::Reset,
    accent: Color::Reset,
    playing: Color::Reset,
    paused: Color::Reset,
    error: Color::Reset,
    border: Color::Reset,
    selection_bg: Color::Reset,
};

impl Palette {
    /// `Auto` should be resolved before it gets here; it falls back to the
    /// dark palette.
    pub fn for_theme(theme: Theme) -> Self {
        match theme {
            Theme::Auto | Theme::MiamiVice => MIAMI_VICE,
            Theme::Light => LIGHT,
            Theme::NoColor => NO_COLOR,
        }
    }

    fn is_plain(&self) -> bool {
        *self == NO_COLOR
    }

    // ── Styles ────────────────────────────────────────────────────────────────

    pub fn default_style(&self) -> Style {
        Style::default().fg(self.primary)
    }

    pub fn secondary(&self) -> Style {
        Style::default().fg(self.secondary)
    }

    pub fn accent(&self) -> Style {
        Style::default().fg(self.accent).add_modifier(Modifier::BOLD)
    }

    pub fn border(&self) -> Style {
        Style::default().fg(self.border)
    }

    pub fn playing(&self) -> Style {
        Style::default().fg(self.playing).add_modifier(Modifier::BOLD)
    }

    pub fn paused(&self) -> Style {
        Style::default().fg(self.paused)
    }

    pub fn error(&self) -> Style {
        Style::default().fg(self.error)
    }

    /// Highlighted list row.  Without colors the row is reversed instead.
    pub fn selected(&self) -> Style {
        if self.is_plain() {
            Style::default().add_modifier(Modifier::REVERSED)
        } else {
            Style::default()
                .bg(self.selection_bg)
                .fg(self.primary)
                .add_modifier(Modifier::BOLD)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nocolor_uses_terminal_defaults() {
        let p = Palette::for_theme(Theme::NoColor);
        assert_eq!(p.default_style().fg, Some(Color::Reset));
        assert!(p.selected().add_modifier.contains(Modifier::REVERSED));
        assert_ne!(Palette::for_theme(Theme::Light), Palette::for_theme(Theme::MiamiVice));
    }
}
