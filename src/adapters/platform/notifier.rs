//! Terminal notifier. Implements NotifierPort by printing a highlighted line.

use crate::domain::DomainError;
use crate::ports::NotifierPort;
use crossterm::ExecutableCommand;
use crossterm::style::{Attribute, Color, Print, ResetColor, SetAttribute, SetForegroundColor};
use std::io::{Write, stdout};

/// Title color.
const ACCENT: Color = Color::Rgb {
    r: 0x00,
    g: 0xb3,
    b: 0xc8,
};

/// Shows notifications inline on stdout.
#[derive(Default)]
pub struct TerminalNotifier;

impl TerminalNotifier {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait::async_trait]
impl NotifierPort for TerminalNotifier {
    async fn schedule(&self, title: &str, body: &str) -> Result<(), DomainError> {
        let mut out = stdout();
        let io = |e: std::io::Error| DomainError::Notification(e.to_string());
        out.execute(SetForegroundColor(ACCENT)).map_err(io)?;
        out.execute(SetAttribute(Attribute::Bold)).map_err(io)?;
        out.execute(Print(format!("\r\n[{}] ", title))).map_err(io)?;
        out.execute(SetAttribute(Attribute::Reset)).map_err(io)?;
        out.execute(Print(body)).map_err(io)?;
        out.execute(Print("\r\n")).map_err(io)?;
        out.execute(ResetColor).map_err(io)?;
        out.flush().map_err(io)
    }
}
