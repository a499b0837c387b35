//! Terminal rendering for cache listings and command outcomes.

use std::io::{self, Write};
use std::time::{Duration, SystemTime};

use anyhow::Context;
use clap::ValueEnum;
use owo_colors::{AnsiColors, OwoColorize, Stream};

#[derive(Debug, Clone, Copy, Default, ValueEnum)]
pub enum OutputFormat {
  #[default]
  Text,
  Json,
}

impl OutputFormat {
  pub fn is_json(self) -> bool {
    matches!(self, OutputFormat::Json)
  }
}

/// Outcome of one step of a command, rendered as a colored marker and a line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
  Done,
  Failed,
  Skipped,
  Note,
}

impl Status {
  fn marker(self) -> &'static str {
    match self {
      Status::Done => "✓",
      Status::Failed => "✗",
      Status::Skipped => "!",
      Status::Note => "·",
    }
  }

  fn color(self) -> AnsiColors {
    match self {
      Status::Done => AnsiColors::Green,
      Status::Failed => AnsiColors::Red,
      Status::Skipped => AnsiColors::Yellow,
      Status::Note => AnsiColors::Cyan,
    }
  }

  /// Failures and skipped entries go to stderr.
  fn stream(self) -> Stream {
    match self {
      Status::Failed | Status::Skipped => Stream::Stderr,
      Status::Done | Status::Note => Stream::Stdout,
    }
  }

  pub fn emit(self, message: &str) {
    let stream = self.stream();
    let color = self.color();
    let marker = self.marker();
    let marker = marker.if_supports_color(stream, |marker| marker.color(color));
    match stream {
      Stream::Stderr => eprintln!("{marker} {message}"),
      _ => println!("{marker} {message}"),
    }
  }
}

/// Indented `label: value` line under a heading.
pub fn detail(label: &str, value: &str) {
  let label = format!("{label}:");
  println!("  {} {value}", label.if_supports_color(Stream::Stdout, |label| label.dimmed()));
}

pub fn emit_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
  let mut stdout = io::stdout().lock();
  serde_json::to_writer_pretty(&mut stdout, value).context("could not encode JSON output")?;
  writeln!(stdout).context("could not write to stdout")?;
  Ok(())
}

/// Entry keys are hex digests; twelve digits identify an entry in practice.
pub fn short_key(key: &str) -> &str {
  key.get(..12).unwrap_or(key)
}

const UNITS: [&str; 4] = ["KiB", "MiB", "GiB", "TiB"];

pub fn format_bytes(bytes: u64) -> String {
  if bytes < 1024 {
    return format!("{bytes} B");
  }
  let mut size = bytes as f64 / 1024.0;
  let mut unit = 0;
  while size >= 1024.0 && unit + 1 < UNITS.len() {
    size /= 1024.0;
    unit += 1;
  }
  format!("{size:.1} {}", UNITS[unit])
}

/// Age of `time` relative to now, keeping the two most significant units.
pub fn format_age(time: Option<SystemTime>) -> String {
  match time.and_then(|time| SystemTime::now().duration_since(time).ok()) {
    Some(age) => format_elapsed(age),
    None => "unknown".to_string(),
  }
}

fn format_elapsed(age: Duration) -> String {
  if age.as_secs() == 0 {
    return "just now".to_string();
  }
  let rendered = humantime::format_duration(Duration::from_secs(age.as_secs())).to_string();
  let coarse: Vec<&str> = rendered.split_whitespace().take(2).collect();
  format!("{} ago", coarse.join(" "))
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn keys_are_shortened_to_twelve_digits() {
    assert_eq!(short_key("0123456789abcdef"), "0123456789ab");
    assert_eq!(short_key("abc"), "abc");
    assert_eq!(short_key(""), "");
  }

  #[test]
  fn sizes_use_binary_units() {
    assert_eq!(format_bytes(0), "0 B");
    assert_eq!(format_bytes(1023), "1023 B");
    assert_eq!(format_bytes(1536), "1.5 KiB");
    assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MiB");
    assert_eq!(format_bytes(1 << 30), "1.0 GiB");
    assert_eq!(format_bytes(1 << 50), "1024.0 TiB");
  }

  #[test]
  fn ages_keep_two_units() {
    assert_eq!(format_elapsed(Duration::from_millis(300)), "just now");
    assert_eq!(format_elapsed(Duration::from_secs(42)), "42s ago");
    assert_eq!(format_elapsed(Duration::from_secs(3723)), "1h 2m ago");
    assert_eq!(format_age(None), "unknown");
  }

  #[test]
  fn problems_are_routed_to_stderr() {
    assert!(matches!(Status::Failed.stream(), Stream::Stderr));
    assert!(matches!(Status::Skipped.stream(), Stream::Stderr));
    assert!(matches!(Status::Note.stream(), Stream::Stdout));
  }
}
