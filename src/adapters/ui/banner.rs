//! Startup banner: "GEO-RELAY" in figlet with a teal-to-green gradient.

use crossterm::ExecutableCommand;
use crossterm::style::{Color, Print, ResetColor, SetForegroundColor};
use figlet_rs::FIGfont;
use std::io::{Write, stdout};

/// Deep teal (#005964).
const DEEP_TEAL: (u8, u8, u8) = (0x00, 0x59, 0x64);
/// Signal green (#2ee59d).
const SIGNAL_GREEN: (u8, u8, u8) = (0x2e, 0xe5, 0x9d);

/// Linear interpolation between two RGB colors. `t` in [0.0, 1.0].
fn lerp_rgb(a: (u8, u8, u8), b: (u8, u8, u8), t: f64) -> (u8, u8, u8) {
    let r = (f64::from(a.0) * (1.0 - t) + f64::from(b.0) * t).round() as u8;
    let g = (f64::from(a.1) * (1.0 - t) + f64::from(b.1) * t).round() as u8;
    let bl = (f64::from(a.2) * (1.0 - t) + f64::from(b.2) * t).round() as u8;
    (r, g, bl)
}

fn banner_art() -> String {
    FIGfont::standard()
        .ok()
        .and_then(|font| font.convert("GEO-RELAY").map(|f| f.to_string()))
        .unwrap_or_else(|| "GEO-RELAY\n".to_string())
}

/// Prints the banner, then version and tagline.
pub fn print_welcome() {
    let mut out = stdout();
    let art = banner_art();
    let lines: Vec<&str> = art.lines().collect();
    let total = lines.len().max(1);

    for (i, line) in lines.iter().enumerate() {
        let t = if total <= 1 {
            1.0
        } else {
            i as f64 / (total - 1) as f64
        };
        let (r, g, b) = lerp_rgb(DEEP_TEAL, SIGNAL_GREEN, t);
        let _ = out.execute(SetForegroundColor(Color::Rgb { r, g, b }));
        let _ = out.execute(Print(line));
        let _ = out.execute(Print("\r\n"));
        let _ = out.execute(ResetColor);
    }

    let version = env!("CARGO_PKG_VERSION");
    let _ = out.execute(SetForegroundColor(Color::Rgb {
        r: SIGNAL_GREEN.0,
        g: SIGNAL_GREEN.1,
        b: SIGNAL_GREEN.2,
    }));
    let _ = out.execute(Print(format!("v{}  User Location Tracking\r\n", version)));
    let _ = out.execute(ResetColor);
    let _ = out.flush();
}
