//! Render themes
//!
//! Colour palettes used by the formatter, the code panels and the
//! transcript. Colours are CSS hex strings since everything ends up inline
//! in HTML `style` attributes.

use once_cell::sync::Lazy;

/// Registry of built-in render themes
pub static THEMES: Lazy<Vec<RenderTheme>> = Lazy::new(|| vec![midnight(), daylight()]);

/// A complete render palette
#[derive(Debug, Clone)]
pub struct RenderTheme {
    pub name: String,
    pub display_name: String,

    // Page
    pub bg_color: &'static str,
    pub text_color: &'static str,
    pub dim_color: &'static str,
    pub accent_color: &'static str,

    /// h1..h4
    pub heading_colors: [&'static str; 4],

    // Code
    pub code_bg_color: &'static str,
    pub code_fg_color: &'static str,
    pub code_border_color: &'static str,
    pub inline_code_bg_color: &'static str,
    pub inline_code_fg_color: &'static str,

    // Special colors
    pub warning_color: &'static str,
    pub error_color: &'static str,
    pub link_color: &'static str,
    pub rule_color: &'static str,
    pub math_color: &'static str,

    // Message role colors
    pub user_msg_color: &'static str,
    pub assistant_msg_color: &'static str,

    /// Name of the syntect theme used for code panels
    pub syntax_theme: &'static str,
}

impl RenderTheme {
    /// Colour for a heading level (1-based, clamped to 1..=4)
    pub fn heading_color(&self, level: usize) -> &'static str {
        self.heading_colors[level.clamp(1, 4) - 1]
    }

    /// Look up a built-in theme by name
    pub fn find(name: &str) -> Option<&'static RenderTheme> {
        THEMES.iter().find(|t| t.name.eq_ignore_ascii_case(name))
    }

    /// Names of all built-in themes
    pub fn names() -> Vec<&'static str> {
        THEMES.iter().map(|t| t.name.as_str()).collect()
    }
}

impl Default for RenderTheme {
    fn default() -> Self {
        midnight()
    }
}

/// Dark palette, the default
pub fn midnight() -> RenderTheme {
    RenderTheme {
        name: "midnight".to_string(),
        display_name: "Midnight".to_string(),
        bg_color: "#02010A",
        text_color: "#E6E6E6",
        dim_color: "#8A8F98",
        accent_color: "#7C4DFF",
        heading_colors: ["#E040FB", "#B388FF", "#82B1FF", "#80D8FF"],
        code_bg_color: "#1e1e1e",
        code_fg_color: "#d4d4d4",
        code_border_color: "#333333",
        inline_code_bg_color: "#2d2d2d",
        inline_code_fg_color: "#ce9178",
        warning_color: "#FFB300",
        error_color: "#F44336",
        link_color: "#64B5F6",
        rule_color: "#444444",
        math_color: "#F8F8F2",
        user_msg_color: "#2196F3",
        assistant_msg_color: "#4CAF50",
        syntax_theme: "base16-ocean.dark",
    }
}

/// Light palette
pub fn daylight() -> RenderTheme {
    RenderTheme {
        name: "daylight".to_string(),
        display_name: "Daylight".to_string(),
        bg_color: "#FFFFFF",
        text_color: "#24292F",
        dim_color: "#6E7781",
        accent_color: "#8250DF",
        heading_colors: ["#6F42C1", "#8250DF", "#0550AE", "#0969DA"],
        code_bg_color: "#F6F8FA",
        code_fg_color: "#24292F",
        code_border_color: "#D0D7DE",
        inline_code_bg_color: "#EFF1F3",
        inline_code_fg_color: "#CF222E",
        warning_color: "#9A6700",
        error_color: "#CF222E",
        link_color: "#0969DA",
        rule_color: "#D0D7DE",
        math_color: "#24292F",
        user_msg_color: "#0969DA",
        assistant_msg_color: "#1A7F37",
        syntax_theme: "InspiredGitHub",
    }
}
