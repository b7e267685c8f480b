/*
 *  keyboard.rs
 *
 *  VfdMon - spectrum, metrics and key echo on a PT6315 VFD
 *	(c) 2020-26 Stuart Hunter
 *
 *	Keystroke capture and the bounded mailbox it feeds
 *
 *	This program is free software: you can redistribute it and/or modify
 *	it under the terms of the GNU General Public License as published by
 *	the Free Software Foundation, either version 3 of the License, or
 *	(at your option) any later version.
 *
 *	This program is distributed in the hope that it will be useful,
 *	but WITHOUT ANY WARRANTY; without even the implied warranty of
 *	MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 *	GNU General Public License for more details.
 *
 *	See <http://www.gnu.org/licenses/> to get a copy of the GNU General
 *	Public License.
 *
 */
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use crossterm::event::{self as term, Event, KeyCode, KeyEventKind, KeyModifiers};
use crossterm::terminal::{disable_raw_mode, enable_raw_mode};
use log::{debug, info, warn};
use tokio::sync::mpsc::{self, error::TrySendError};

/// Pending keys held before new ones are dropped
pub const KEY_MAILBOX_DEPTH: usize = 32;
const POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEvent {
    Char(char),
    Enter,
    Cancel,
}

pub type KeySender = mpsc::Sender<KeyEvent>;
pub type KeyReceiver = mpsc::Receiver<KeyEvent>;

pub fn mailbox() -> (KeySender, KeyReceiver) {
    mpsc::channel(KEY_MAILBOX_DEPTH)
}

/// Hand a key to the owning thread without blocking. Returns false once the
/// receiving side is gone; a full mailbox drops the key.
pub fn post(tx: &KeySender, event: KeyEvent) -> bool {
    match tx.try_send(event) {
        Ok(()) => true,
        Err(TrySendError::Full(ev)) => {
            debug!("key mailbox full, dropped {:?}", ev);
            true
        }
        Err(TrySendError::Closed(_)) => false,
    }
}

/// Terminal key to mailbox key. Printable ASCII only; Esc and Ctrl-C cancel.
pub fn classify_key(key: &term::KeyEvent) -> Option<KeyEvent> {
    if key.kind != KeyEventKind::Press {
        return None;
    }
    match key.code {
        KeyCode::Esc => Some(KeyEvent::Cancel),
        KeyCode::Char('c') | KeyCode::Char('C') if key.modifiers.contains(KeyModifiers::CONTROL) => {
            Some(KeyEvent::Cancel)
        }
        KeyCode::Enter => Some(KeyEvent::Enter),
        KeyCode::Char(c) if c.is_ascii() && !c.is_ascii_control() => Some(KeyEvent::Char(c)),
        _ => None,
    }
}

/// Capture collaborator. `run` blocks, posting keys until `stop` is raised,
/// the input ends, or a cancel key is seen.
pub trait KeySource: Send {
    fn run(&mut self, tx: &KeySender, stop: &AtomicBool);
}

/// Raw terminal mode for as long as it is held
struct RawMode;

impl RawMode {
    fn enable() -> std::io::Result<Self> {
        enable_raw_mode()?;
        Ok(Self)
    }
}

impl Drop for RawMode {
    fn drop(&mut self) {
        if let Err(e) = disable_raw_mode() {
            warn!("keys: terminal not restored: {}", e);
        }
    }
}

/// Keys from the controlling terminal.
#[derive(Debug, Default)]
pub struct StdinKeys;

impl StdinKeys {
    pub fn new() -> Self {
        Self
    }
}

impl KeySource for StdinKeys {
    fn run(&mut self, tx: &KeySender, stop: &AtomicBool) {
        let _raw = match RawMode::enable() {
            Ok(raw) => raw,
            Err(e) => {
                warn!("keys: no terminal for raw input: {}", e);
                return;
            }
        };
        info!("keys: reading terminal, ESC to quit");

        while !stop.load(Ordering::Relaxed) {
            match term::poll(POLL) {
                Ok(false) => continue,
                Ok(true) => {}
                Err(e) => {
                    warn!("keys: poll failed: {}", e);
                    return;
                }
            }
            let key = match term::read() {
                Ok(Event::Key(key)) => key,
                Ok(_) => continue,
                Err(e) => {
                    debug!("keys: terminal closed: {}", e);
                    return;
                }
            };
            let Some(event) = classify_key(&key) else { continue };
            if !post(tx, event) || event == KeyEvent::Cancel {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press(code: KeyCode, modifiers: KeyModifiers) -> term::KeyEvent {
        term::KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_classify() {
        let none = KeyModifiers::NONE;
        assert_eq!(classify_key(&press(KeyCode::Char('a'), none)), Some(KeyEvent::Char('a')));
        assert_eq!(classify_key(&press(KeyCode::Char(' '), none)), Some(KeyEvent::Char(' ')));
        assert_eq!(classify_key(&press(KeyCode::Esc, none)), Some(KeyEvent::Cancel));
        assert_eq!(
            classify_key(&press(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyEvent::Cancel)
        );
        assert_eq!(classify_key(&press(KeyCode::Enter, none)), Some(KeyEvent::Enter));
        assert_eq!(classify_key(&press(KeyCode::Backspace, none)), None);
        assert_eq!(classify_key(&press(KeyCode::Char('é'), none)), None);
    }

    #[test]
    fn test_release_is_ignored() {
        let mut key = press(KeyCode::Char('a'), KeyModifiers::NONE);
        key.kind = KeyEventKind::Release;
        assert_eq!(classify_key(&key), None);
    }

    #[test]
    fn test_full_mailbox_drops_without_blocking() {
        let (tx, mut rx) = mailbox();
        for _ in 0..KEY_MAILBOX_DEPTH + 5 {
            assert!(post(&tx, KeyEvent::Char('x')));
        }
        let mut drained = 0;
        while rx.try_recv().is_ok() {
            drained += 1;
        }
        assert_eq!(drained, KEY_MAILBOX_DEPTH);
    }

    #[test]
    fn test_post_after_receiver_dropped() {
        let (tx, rx) = mailbox();
        drop(rx);
        assert!(!post(&tx, KeyEvent::Enter));
    }
}
