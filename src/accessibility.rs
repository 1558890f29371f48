//! Accessibility preferences.
//!
//! State transitions are pure (`Preferences::apply`); persisting the result is
//! done by the caller once per command.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Theme {
    #[default]
    Standard,
    EasyRead,
    HighContrast,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TextSize {
    Small,
    #[default]
    Medium,
    Large,
    ExtraLarge,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LineSpacing {
    #[default]
    Normal,
    Relaxed,
    Loose,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LetterSpacing {
    #[default]
    Normal,
    Wide,
    Wider,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Preferences {
    pub dark_mode: bool,
    pub theme: Theme,
    pub text_size: TextSize,
    pub dyslexic_font: bool,
    pub line_spacing: LineSpacing,
    pub letter_spacing: LetterSpacing,
    /// Text-to-speech.
    pub audio_enabled: bool,
    pub captions_enabled: bool,
    pub reduce_motion: bool,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            dark_mode: false,
            theme: Theme::Standard,
            text_size: TextSize::Medium,
            dyslexic_font: false,
            line_spacing: LineSpacing::Normal,
            letter_spacing: LetterSpacing::Normal,
            audio_enabled: true,
            captions_enabled: true,
            reduce_motion: false,
        }
    }
}

/// One change requested from the accessibility toolbar or settings page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "command", content = "value", rename_all = "snake_case")]
pub enum PreferenceCommand {
    ToggleDarkMode,
    SetTheme(Theme),
    SetTextSize(TextSize),
    ToggleDyslexicFont,
    SetLineSpacing(LineSpacing),
    SetLetterSpacing(LetterSpacing),
    ToggleAudio,
    ToggleCaptions,
    ToggleReduceMotion,
}

impl Preferences {
    pub fn apply(mut self, command: &PreferenceCommand) -> Self {
        match *command {
            PreferenceCommand::ToggleDarkMode => self.dark_mode = !self.dark_mode,
            PreferenceCommand::SetTheme(theme) => self.theme = theme,
            PreferenceCommand::SetTextSize(size) => self.text_size = size,
            PreferenceCommand::ToggleDyslexicFont => self.dyslexic_font = !self.dyslexic_font,
            PreferenceCommand::SetLineSpacing(spacing) => self.line_spacing = spacing,
            PreferenceCommand::SetLetterSpacing(spacing) => self.letter_spacing = spacing,
            PreferenceCommand::ToggleAudio => self.audio_enabled = !self.audio_enabled,
            PreferenceCommand::ToggleCaptions => self.captions_enabled = !self.captions_enabled,
            PreferenceCommand::ToggleReduceMotion => self.reduce_motion = !self.reduce_motion,
        }
        self
    }
}
