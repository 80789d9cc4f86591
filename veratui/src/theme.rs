//! Colour theme for the terminal.

use ratatui::style::{Color, Style};
use veracode_api::Severity;

use crate::view::CellTone;

/// Colour theme for the TUI
#[derive(Debug, Clone)]
pub struct Theme {
    /// Accent colour for titles, headers and focus
    pub accent: Color,
    pub muted: Color,
    pub success: Color,
    pub warning: Color,
    pub error: Color,

    /// Severity colours, 5 down to 0
    pub severity_very_high: Color,
    pub severity_high: Color,
    pub severity_medium: Color,
    pub severity_low: Color,
    pub severity_very_low: Color,
    pub severity_info: Color,

    /// Policy compliance colours
    pub policy_pass: Color,
    pub policy_fail: Color,
    pub policy_neutral: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self::dark()
    }
}

impl Theme {
    /// Dark theme (default)
    #[must_use]
    pub fn dark() -> Self {
        Self {
            accent: Color::Rgb(86, 156, 214),
            muted: Color::Rgb(128, 128, 128),
            success: Color::Rgb(78, 201, 176),
            warning: Color::Rgb(220, 180, 50),
            error: Color::Rgb(244, 71, 71),

            severity_very_high: Color::Rgb(180, 0, 0),
            severity_high: Color::Rgb(244, 71, 71),
            severity_medium: Color::Rgb(220, 180, 50),
            severity_low: Color::Rgb(86, 156, 214),
            severity_very_low: Color::Rgb(128, 128, 128),
            severity_info: Color::Rgb(100, 100, 100),

            policy_pass: Color::Rgb(78, 201, 176),
            policy_fail: Color::Rgb(244, 71, 71),
            policy_neutral: Color::Reset,
        }
    }

    /// Get colour for a finding severity
    #[must_use]
    pub fn severity_color(&self, severity: Severity) -> Color {
        match severity.0 {
            5 => self.severity_very_high,
            4 => self.severity_high,
            3 => self.severity_medium,
            2 => self.severity_low,
            1 => self.severity_very_low,
            0 => self.severity_info,
            _ => self.muted,
        }
    }

    /// Style of one table cell.
    #[must_use]
    pub fn cell_style(&self, tone: CellTone) -> Style {
        let color = match tone {
            CellTone::Plain => return Style::default(),
            CellTone::Severity(severity) => self.severity_color(severity),
            CellTone::PolicyPass => self.policy_pass,
            CellTone::PolicyFail => self.policy_fail,
            CellTone::PolicyNeutral => self.policy_neutral,
        };
        Style::default().fg(color)
    }
}
