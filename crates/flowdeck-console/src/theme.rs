use flowdeck_core::TaskBucket;
use ratatui::style::{Color, Modifier, Style};

pub const HEADER_STYLE: Style = Style::new()
    .fg(Color::Rgb(191, 219, 254))
    .add_modifier(Modifier::BOLD);
pub const SELECTED_STYLE: Style = Style::new()
    .bg(Color::Rgb(56, 189, 248))
    .fg(Color::Black)
    .add_modifier(Modifier::BOLD);
pub const MUTED: Color = Color::Rgb(148, 163, 184);
pub const TEXT: Color = Color::Rgb(226, 232, 240);
pub const ACCENT: Color = Color::Rgb(56, 189, 248);
pub const OK: Color = Color::Rgb(34, 197, 94);
pub const WARN: Color = Color::Rgb(245, 158, 11);
pub const CRITICAL: Color = Color::Rgb(239, 68, 68);
pub const BORDER: Color = Color::Rgb(71, 85, 105);
pub const EPHEMERAL: Color = Color::Rgb(250, 189, 47);

pub fn bucket_color(bucket: TaskBucket) -> Color {
    match bucket {
        TaskBucket::Queued => MUTED,
        TaskBucket::InProgress => ACCENT,
        TaskBucket::Done => OK,
        TaskBucket::Stuck => CRITICAL,
    }
}

pub fn role_color(role: &str) -> Color {
    match role {
        "user" => Color::Rgb(184, 187, 38),
        "assistant" => TEXT,
        "system" => MUTED,
        "tool" => Color::Rgb(211, 134, 155),
        _ => MUTED,
    }
}

pub mod icons {
    pub const RUNNING: &str = ">";
    pub const IDLE: &str = ".";
    pub const LOCKED: &str = "#";
    pub const EPHEMERAL: &str = "+";
    pub const EXPANDED: &str = "v";
    pub const COLLAPSED: &str = ">";
}
