use std::io::{self, BufRead, IsTerminal, Write};

use anyhow::{Result, bail};

/// Ask before a bulk deletion. `force` answers yes without asking.
pub fn confirm(message: &str, force: bool) -> Result<bool> {
  if force {
    return Ok(true);
  }

  if !io::stdin().is_terminal() || !io::stderr().is_terminal() {
    bail!("Refusing to delete without confirmation in non-interactive mode. Pass --force to proceed.");
  }

  let mut stderr = io::stderr().lock();
  write!(stderr, "{} [y/N] ", message)?;
  stderr.flush()?;

  let mut answer = String::new();
  io::stdin().lock().read_line(&mut answer)?;

  Ok(is_yes(&answer))
}

fn is_yes(answer: &str) -> bool {
  matches!(answer.trim().to_ascii_lowercase().as_str(), "y" | "yes")
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn force_skips_the_prompt() {
    assert!(confirm("Delete everything?", true).unwrap());
  }

  #[test]
  fn only_yes_confirms() {
    assert!(is_yes("y\n"));
    assert!(is_yes(" YES "));
    assert!(!is_yes(""));
    assert!(!is_yes("no"));
  }
}
