use clap::builder::styling::{AnsiColor, Color, Style};
use clap::builder::Styles;
use crossterm::style::{Attribute, Color as CtColor, Stylize};
use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

use notification_center::{NotificationRecord, Severity};

// ═══════════════════════════════════════════════════════════════════════════════
// Clap Styles
// ═══════════════════════════════════════════════════════════════════════════════

pub fn get_styles() -> Styles {
    clap::builder::Styles::styled()
        .usage(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Blue))),
        )
        .header(
            Style::new()
                .bold()
                .underline()
                .fg_color(Some(Color::Ansi(AnsiColor::Blue))),
        )
        .literal(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Green))),
        )
        .invalid(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .error(
            Style::new()
                .bold()
                .fg_color(Some(Color::Ansi(AnsiColor::Red))),
        )
        .placeholder(Style::new().fg_color(Some(Color::Ansi(AnsiColor::BrightBlack))))
}

// ═══════════════════════════════════════════════════════════════════════════════
// Color Palette
// ═══════════════════════════════════════════════════════════════════════════════

pub mod colors {
    use crossterm::style::Color;

    pub const NAVY: Color = Color::Rgb {
        r: 4,
        g: 29,
        b: 118,
    };
    pub const BLUE: Color = Color::Rgb {
        r: 8,
        g: 59,
        b: 249,
    };
    pub const GREEN: Color = Color::Rgb {
        r: 0,
        g: 200,
        b: 120,
    };
    pub const ORANGE: Color = Color::Rgb {
        r: 255,
        g: 165,
        b: 0,
    };
    pub const RED: Color = Color::Rgb {
        r: 255,
        g: 85,
        b: 85,
    };
    pub const DIM: Color = Color::Rgb {
        r: 128,
        g: 128,
        b: 128,
    };
    pub const WHITE: Color = Color::Rgb {
        r: 255,
        g: 255,
        b: 255,
    };
}

mod glyphs {
    pub const BELL: &str = "🔔";
    pub const UNREAD: &str = "●";
    pub const READ: &str = "○";
    pub const CHECK: &str = "✓";
    pub const CROSS_MARK: &str = "✗";
    pub const HORIZONTAL: &str = "─";
}

const LINE_WIDTH: usize = 72;

// ═══════════════════════════════════════════════════════════════════════════════
// Status Indicators
// ═══════════════════════════════════════════════════════════════════════════════

pub fn print_success(message: &str) {
    println!(
        " {} {}",
        glyphs::CHECK.to_string().with(colors::GREEN).bold(),
        message.with(colors::GREEN)
    );
}

pub fn print_error(message: &str) {
    eprintln!(
        " {} {}",
        glyphs::CROSS_MARK.to_string().with(colors::RED).bold(),
        message.with(colors::RED)
    );
}

// ═══════════════════════════════════════════════════════════════════════════════
// Notification List
// ═══════════════════════════════════════════════════════════════════════════════

/// Cut `text` to at most `max_width` columns, adding an ellipsis when cut.
pub fn truncate_to_width(text: &str, max_width: usize) -> String {
    if text.width() <= max_width {
        return text.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for c in text.chars() {
        let char_width = c.width().unwrap_or(0);
        if width + char_width + 1 > max_width {
            break;
        }
        out.push(c);
        width += char_width;
    }
    out.push('…');
    out
}

fn severity_color(severity: Severity) -> CtColor {
    match severity {
        Severity::Success => colors::GREEN,
        Severity::Error => colors::RED,
        Severity::Warning => colors::ORANGE,
        Severity::Info => colors::BLUE,
    }
}

pub fn print_panel_header(unread: usize) {
    print!(
        "{} {}",
        glyphs::BELL,
        "Notifications".with(colors::WHITE).on(colors::NAVY).bold()
    );
    if unread > 0 {
        print!("  {}", format!("{} new", unread).with(colors::ORANGE).bold());
    }
    println!();
    println!("{}", glyphs::HORIZONTAL.repeat(LINE_WIDTH).with(colors::DIM));
}

pub fn print_notification(record: &NotificationRecord, time_label: &str) {
    let (marker, title) = if record.read {
        (
            glyphs::READ.with(colors::DIM),
            truncate_to_width(&record.title, LINE_WIDTH - 4).with(colors::WHITE),
        )
    } else {
        (
            glyphs::UNREAD.with(severity_color(record.severity)),
            truncate_to_width(&record.title, LINE_WIDTH - 4)
                .with(colors::WHITE)
                .bold(),
        )
    };
    println!(" {} {}", marker, title);

    if !record.body.is_empty() {
        println!(
            "   {}",
            truncate_to_width(&record.body, LINE_WIDTH - 3).with(colors::DIM)
        );
    }

    let mut meta = format!("{}  id={}", time_label, record.id);
    if let Some(url) = &record.url {
        meta.push_str(&format!("  url={}", url));
    }
    println!(
        "   {}",
        meta.with(colors::DIM).attribute(Attribute::Italic)
    );
}

pub fn print_empty_list() {
    println!(
        "  {}",
        "No notifications"
            .with(colors::DIM)
            .attribute(Attribute::Italic)
    );
}
