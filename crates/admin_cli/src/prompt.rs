//! Masked password input on the controlling terminal.

use std::{error::Error, io::Write};

use crossterm::{
    cursor,
    event::{self, Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers},
    execute,
    style::Print,
    terminal::{self, ClearType},
};

type PromptResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

const MAX_ATTEMPTS: usize = 3;

struct RawModeGuard;

impl RawModeGuard {
    fn enter() -> PromptResult<Self> {
        terminal::enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawModeGuard {
    fn drop(&mut self) {
        let _ = terminal::disable_raw_mode();
    }
}

fn notice(message: &str) -> PromptResult<()> {
    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(message),
        Print("\r\n")
    )?;
    Ok(())
}

/// Read one line, echoing `*` per character. Ctrl-C and Esc abort.
fn read_masked(prompt: &str) -> PromptResult<String> {
    let _raw = RawModeGuard::enter()?;
    let mut out = std::io::stderr();
    execute!(
        out,
        cursor::MoveToColumn(0),
        terminal::Clear(ClearType::CurrentLine),
        Print(prompt)
    )?;

    let mut input = String::new();
    loop {
        let Event::Key(KeyEvent {
            code,
            modifiers,
            kind: KeyEventKind::Press,
            ..
        }) = event::read()?
        else {
            continue;
        };

        match code {
            KeyCode::Enter => break,
            KeyCode::Esc => {
                execute!(out, Print("\r\n"))?;
                return Err("cancelled".into());
            }
            KeyCode::Char('c') if modifiers.contains(KeyModifiers::CONTROL) => {
                execute!(out, Print("\r\n"))?;
                return Err("interrupted".into());
            }
            KeyCode::Backspace if input.pop().is_some() => {
                execute!(out, cursor::MoveLeft(1), Print(" "), cursor::MoveLeft(1))?;
            }
            KeyCode::Char(ch) if !modifiers.contains(KeyModifiers::CONTROL) => {
                input.push(ch);
                execute!(out, Print("*"))?;
            }
            _ => {}
        }
        out.flush()?;
    }

    execute!(out, Print("\r\n"))?;
    Ok(input)
}

/// Ask for a new password and its confirmation.
pub fn new_password() -> PromptResult<String> {
    for _ in 0..MAX_ATTEMPTS {
        let password = read_masked("Password: ")?;
        if password.is_empty() {
            notice("Password must not be empty.")?;
            continue;
        }
        if read_masked("Confirm password: ")? == password {
            return Ok(password);
        }
        notice("Passwords do not match. Try again.")?;
    }

    Err("too many attempts".into())
}
