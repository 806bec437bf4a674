//! Site theme: the export's colours and names, derived once from settings.

use campaign_state::SiteSettings;
use tracing::warn;

/// An sRGB colour with components in `0.0..=1.0`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rgb {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

impl Rgb {
    pub const BLACK: Rgb = Rgb::new(0.0, 0.0, 0.0);
    pub const WHITE: Rgb = Rgb::new(1.0, 1.0, 1.0);

    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` or `#rgb` (leading `#` optional).
    pub fn from_hex(hex: &str) -> Option<Rgb> {
        let digits = hex.trim().trim_start_matches('#');
        let channel = |s: &str| u8::from_str_radix(s, 16).ok().map(|v| f32::from(v) / 255.0);
        match digits.len() {
            6 if digits.is_ascii() => Some(Rgb::new(
                channel(&digits[0..2])?,
                channel(&digits[2..4])?,
                channel(&digits[4..6])?,
            )),
            3 if digits.is_ascii() => {
                let double = |i: usize| {
                    let c = &digits[i..i + 1];
                    channel(&format!("{c}{c}"))
                };
                Some(Rgb::new(double(0)?, double(1)?, double(2)?))
            }
            _ => None,
        }
    }

    /// Mix towards white; `amount` 0 keeps the colour, 1 gives white.
    pub fn tint(self, amount: f32) -> Rgb {
        let t = amount.clamp(0.0, 1.0);
        Rgb::new(
            self.r + (1.0 - self.r) * t,
            self.g + (1.0 - self.g) * t,
            self.b + (1.0 - self.b) * t,
        )
    }
}

/// Everything the renderer needs from the site settings.
#[derive(Debug, Clone, PartialEq)]
pub struct SiteTheme {
    pub organization_name: String,
    pub document_title: String,
    pub slogan: Option<String>,
    /// Cover band and section headings.
    pub primary: Rgb,
    /// Sub-item headings.
    pub secondary: Rgb,
    /// Rules and list markers.
    pub accent: Rgb,
    pub text: Rgb,
    pub muted: Rgb,
}

impl Default for SiteTheme {
    fn default() -> Self {
        Self::from_settings(&SiteSettings::default())
    }
}

impl SiteTheme {
    /// Build the theme; an unparsable colour falls back to the default one.
    pub fn from_settings(settings: &SiteSettings) -> Self {
        let defaults = SiteSettings::default();
        let colour = |value: &str, fallback: &str, name: &str| {
            Rgb::from_hex(value).unwrap_or_else(|| {
                warn!(setting = name, value = %value, "invalid colour, using default");
                Rgb::from_hex(fallback).unwrap_or(Rgb::BLACK)
            })
        };

        Self {
            organization_name: settings.organization_name.clone(),
            document_title: settings.document_title.clone(),
            slogan: settings.slogan.clone().filter(|s| !s.trim().is_empty()),
            primary: colour(&settings.primary_color, &defaults.primary_color, "primary_color"),
            secondary: colour(
                &settings.secondary_color,
                &defaults.secondary_color,
                "secondary_color",
            ),
            accent: colour(&settings.accent_color, &defaults.accent_color, "accent_color"),
            text: Rgb::new(0.13, 0.13, 0.13),
            muted: Rgb::new(0.45, 0.45, 0.45),
        }
    }

    /// `"<document-title> | <org-name> - Page n/total"`
    pub fn footer_text(&self, page: usize, total: usize) -> String {
        format!(
            "{} | {} - Page {}/{}",
            self.document_title, self.organization_name, page, total
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_long_and_short_hex() {
        assert_eq!(Rgb::from_hex("#ffffff"), Some(Rgb::WHITE));
        assert_eq!(Rgb::from_hex("000"), Some(Rgb::BLACK));
        assert!(Rgb::from_hex("#12345").is_none());
        assert!(Rgb::from_hex("#gggggg").is_none());
        assert!(Rgb::from_hex("#éé").is_none());
    }

    #[test]
    fn invalid_colour_falls_back() {
        let settings = SiteSettings {
            primary_color: "not-a-colour".into(),
            ..SiteSettings::default()
        };
        let theme = SiteTheme::from_settings(&settings);
        assert_eq!(theme.primary, SiteTheme::default().primary);
    }

    #[test]
    fn footer_format() {
        let settings = SiteSettings {
            organization_name: "Ensemble".into(),
            document_title: "Programme 2026".into(),
            ..SiteSettings::default()
        };
        let theme = SiteTheme::from_settings(&settings);
        assert_eq!(theme.footer_text(3, 12), "Programme 2026 | Ensemble - Page 3/12");
    }

    #[test]
    fn blank_slogan_dropped() {
        let settings = SiteSettings {
            slogan: Some("  ".into()),
            ..SiteSettings::default()
        };
        assert!(SiteTheme::from_settings(&settings).slogan.is_none());
    }
}
