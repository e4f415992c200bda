use clap::ValueEnum;
use ratatui::style::Color;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ThemeKind {
    #[default]
    Dark,
    Light,
}

impl ThemeKind {
    pub fn toggle(self) -> Self {
        match self {
            ThemeKind::Dark => ThemeKind::Light,
            ThemeKind::Light => ThemeKind::Dark,
        }
    }

    pub fn palette(self) -> Palette {
        match self {
            ThemeKind::Dark => DARK,
            ThemeKind::Light => LIGHT,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Palette {
    pub background: Color,
    pub title: Color,
    pub accent: Color,
    pub download: Color,
    pub download_dim: Color,
    pub upload: Color,
    pub upload_dim: Color,
    pub ping: Color,
    pub network: Color,
    pub error: Color,
    pub text_primary: Color,
    pub text_secondary: Color,
    pub text_muted: Color,
    pub border: Color,
    pub border_active: Color,
}

const DARK: Palette = Palette {
    background: Color::Rgb(24, 24, 27),
    title: Color::Rgb(255, 215, 0),
    accent: Color::Rgb(100, 149, 237),
    download: Color::Rgb(134, 194, 156),
    download_dim: Color::Rgb(80, 120, 90),
    upload: Color::Rgb(147, 180, 220),
    upload_dim: Color::Rgb(90, 110, 140),
    ping: Color::Rgb(220, 180, 130),
    network: Color::Rgb(187, 143, 206),
    error: Color::Rgb(231, 111, 81),
    text_primary: Color::Rgb(230, 230, 230),
    text_secondary: Color::Rgb(160, 160, 160),
    text_muted: Color::Rgb(100, 100, 100),
    border: Color::Rgb(60, 60, 65),
    border_active: Color::Rgb(100, 100, 110),
};

const LIGHT: Palette = Palette {
    background: Color::Rgb(245, 246, 247),
    title: Color::Rgb(184, 134, 11),
    accent: Color::Rgb(41, 98, 255),
    download: Color::Rgb(76, 175, 80),
    download_dim: Color::Rgb(200, 230, 201),
    upload: Color::Rgb(33, 150, 243),
    upload_dim: Color::Rgb(187, 222, 251),
    ping: Color::Rgb(255, 87, 34),
    network: Color::Rgb(142, 68, 173),
    error: Color::Rgb(198, 40, 40),
    text_primary: Color::Rgb(33, 33, 33),
    text_secondary: Color::Rgb(90, 90, 90),
    text_muted: Color::Rgb(150, 150, 150),
    border: Color::Rgb(200, 200, 205),
    border_active: Color::Rgb(120, 120, 130),
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toggle_flips_between_themes() {
        assert_eq!(ThemeKind::Dark.toggle(), ThemeKind::Light);
        assert_eq!(ThemeKind::Light.toggle().toggle(), ThemeKind::Light);
    }
}
