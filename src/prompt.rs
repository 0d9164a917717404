//! Interactive collection of the backup target
//!
//! Only values that flags, environment and config file left open are asked for.

use anyhow::{anyhow, Context, Result};
use crossterm::event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers};
use crossterm::terminal;
use std::io::{self, BufRead, Write};

use crate::config::{BackupTarget, PartialTarget, DEFAULT_BACKUP_DIRECTORY};

/// Prompts on `output` and reads answers from `input`
pub struct Collector<R, W> {
    input: R,
    output: W,
    mask_secrets: bool,
}

impl Collector<io::StdinLock<'static>, io::Stdout> {
    /// Collector on the process terminal, reading the token without echo
    pub fn terminal() -> Self {
        Self {
            input: io::stdin().lock(),
            output: io::stdout(),
            mask_secrets: true,
        }
    }
}

impl<R: BufRead, W: Write> Collector<R, W> {
    /// Collector over arbitrary streams; secrets are read as plain lines
    pub fn new(input: R, output: W) -> Self {
        Self {
            input,
            output,
            mask_secrets: false,
        }
    }

    /// Prompt for whatever `partial` is missing and build the target
    pub fn collect(&mut self, mut partial: PartialTarget) -> Result<BackupTarget> {
        if partial.username.is_none() {
            let username = self.ask("Enter your GitHub username: ")?;
            if username.is_empty() {
                return Err(anyhow!("GitHub username is required"));
            }
            partial.username = Some(username);
        }

        if partial.token.is_none() {
            let token = self.ask_secret("Enter your GitHub token (press Enter to skip): ")?;
            partial.token = Some(token).filter(|t| !t.is_empty());
        }

        if partial.directory.is_none() {
            let directory = self.ask(&format!(
                "Enter backup directory (default: {}): ",
                DEFAULT_BACKUP_DIRECTORY
            ))?;
            partial.directory = Some(directory).filter(|d| !d.is_empty());
        }

        partial.complete()
    }

    fn ask(&mut self, prompt: &str) -> Result<String> {
        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        let mut line = String::new();
        self.input
            .read_line(&mut line)
            .context("Failed to read from stdin")?;
        Ok(line.trim().to_string())
    }

    fn ask_secret(&mut self, prompt: &str) -> Result<String> {
        if !self.mask_secrets {
            return self.ask(prompt);
        }

        write!(self.output, "{}", prompt)?;
        self.output.flush()?;

        terminal::enable_raw_mode().context("Failed to enable raw terminal mode")?;
        let secret = read_masked();
        terminal::disable_raw_mode().context("Failed to restore terminal mode")?;
        writeln!(self.output)?;

        Ok(secret?.trim().to_string())
    }
}

/// Read one line from the terminal in raw mode without echoing it
fn read_masked() -> Result<String> {
    let mut secret = String::new();

    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind,
            ..
        }) = event::read().context("Failed to read terminal input")?
        else {
            continue;
        };

        if kind != KeyEventKind::Press {
            continue;
        }

        match code {
            KeyCode::Enter => return Ok(secret),
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                return Err(anyhow!("Interrupted"));
            }
            KeyCode::Char(c) => secret.push(c),
            KeyCode::Backspace => {
                secret.pop();
            }
            _ => {}
        }
    }
}
