use std::fs;
use std::io;
use std::path::Path;

use chrono::{SecondsFormat, Utc};
use serde_json::Value;
use tracing::{info, warn};

use crate::config::BuildConfig;
use crate::error::Result;
use crate::fsio::{write_atomic, write_json_atomic};
use crate::models::{BuildSummary, SourceTree};

const CHAR_WIDTH: f64 = 6.8;
const PAD_X: u32 = 10;
const MIN_HALF_WIDTH: u32 = 40;
const HEIGHT: u32 = 20;
const FONT_SIZE: u32 = 11;
const RADIUS: u32 = 4;
const LABEL_BG: &str = "#555";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BadgeLayout {
    pub left_width: u32,
    pub right_width: u32,
    pub text_y: f64,
}

impl BadgeLayout {
    pub fn measure(label: &str, value: &str) -> Self {
        Self {
            left_width: half_width(label),
            right_width: half_width(value),
            text_y: f64::from(HEIGHT) / 2.0 + 4.0,
        }
    }

    pub fn total_width(&self) -> u32 {
        self.left_width + self.right_width
    }

    pub fn label_x(&self) -> f64 {
        f64::from(self.left_width) / 2.0
    }

    pub fn value_x(&self) -> f64 {
        f64::from(self.left_width) + f64::from(self.right_width) / 2.0
    }
}

fn half_width(text: &str) -> u32 {
    let chars = text.chars().count() as f64;
    ((chars * CHAR_WIDTH) as u32 + PAD_X * 2).max(MIN_HALF_WIDTH)
}

fn xml_escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            _ => out.push(c),
        }
    }
    out
}

/// Two-part shields-style badge: grey label on the left, colored value on
/// the right, each half sized from its text length.
pub fn render_badge_svg(label: &str, value: &str, color: &str) -> String {
    let layout = BadgeLayout::measure(label, value);
    let label = xml_escape(label);
    let value = xml_escape(value);
    let color = xml_escape(color);
    let total = layout.total_width();
    let left = layout.left_width;
    let right = layout.right_width;
    let text_y = layout.text_y;
    let label_x = layout.label_x();
    let value_x = layout.value_x();

    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{total}" height="{HEIGHT}" role="img" aria-label="{label}: {value}">
  <title>{label}: {value}</title>
  <linearGradient id="s" x2="0" y2="100%">
    <stop offset="0" stop-color="#fff" stop-opacity=".1"/>
    <stop offset="1" stop-opacity=".05"/>
  </linearGradient>

  <rect rx="{RADIUS}" width="{total}" height="{HEIGHT}" fill="{LABEL_BG}"/>
  <rect rx="{RADIUS}" x="{left}" width="{right}" height="{HEIGHT}" fill="{color}"/>

  <rect rx="{RADIUS}" width="{total}" height="{HEIGHT}" fill="url(#s)"/>

  <rect x="{left}" width="1" height="{HEIGHT}" fill="#000" opacity="0.2"/>

  <g fill="#fff" text-anchor="middle" font-family="Verdana,DejaVu Sans,Segoe UI,Arial,sans-serif" font-size="{FONT_SIZE}">
    <text x="{label_x:.1}" y="{text_y:.1}" fill="#fff" fill-opacity="0.9">{label}</text>
    <text x="{value_x:.1}" y="{text_y:.1}" fill="#fff" font-weight="700">{value}</text>
  </g>
</svg>"##
    )
}

/// Item count of a previously written index document. Missing or malformed
/// documents count as zero.
pub fn read_index_count(path: &Path) -> u64 {
    let raw = match fs::read_to_string(path) {
        Ok(v) => v,
        Err(err) if err.kind() == io::ErrorKind::NotFound => {
            info!(path = %path.display(), "index missing, count = 0");
            return 0;
        }
        Err(err) => {
            warn!(path = %path.display(), %err, "couldn't read index, count = 0");
            return 0;
        }
    };

    let doc: Value = match serde_json::from_str(&raw) {
        Ok(v) => v,
        Err(err) => {
            warn!(path = %path.display(), %err, "failed to parse index, count = 0");
            return 0;
        }
    };

    if let Some(count) = doc.get("count").and_then(Value::as_u64) {
        return count;
    }
    match doc.get("wallpapers").and_then(Value::as_array) {
        Some(list) => list.len() as u64,
        None => {
            warn!(path = %path.display(), "index has neither count nor wallpapers, count = 0");
            0
        }
    }
}

pub fn compute_summary(config: &BuildConfig) -> BuildSummary {
    let desktop = read_index_count(&config.index_path(SourceTree::Desktop));
    let mobile = read_index_count(&config.index_path(SourceTree::Mobile));
    BuildSummary {
        generated_at: Utc::now().to_rfc3339_opts(SecondsFormat::Micros, true),
        desktop,
        mobile,
        total_wallpapers: desktop + mobile,
    }
}

/// Writes `badge.json` and the matching `badge.svg`.
pub fn write_badge(config: &BuildConfig, summary: &BuildSummary) -> Result<()> {
    let json_path = config.badge_json_path();
    write_json_atomic(&json_path, summary)?;
    info!(path = %json_path.display(), total = summary.total_wallpapers, "wrote badge JSON");

    let svg = render_badge_svg(
        &config.badge_label,
        &summary.total_wallpapers.to_string(),
        &config.badge_color,
    );
    let svg_path = config.badge_svg_path();
    write_atomic(&svg_path, svg.as_bytes())?;
    info!(path = %svg_path.display(), "wrote SVG badge");
    Ok(())
}
