use std::{
    future::Future,
    sync::atomic::{AtomicBool, Ordering},
};

use parking_lot::Mutex;

use crate::Error;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum InputMode {
    /// New top-level comment
    Compose,

    /// Reply box, which can be dismissed with Escape
    Reply,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Key {
    Enter,
    Escape,
    Other,
}

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Modifiers {
    pub shift: bool,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum KeyIntent {
    Submit,
    InsertNewline,
    Cancel,
    Ignore,
}

impl KeyIntent {
    pub fn from_key(key: Key, modifiers: Modifiers, mode: InputMode) -> KeyIntent {
        match (key, mode) {
            (Key::Enter, _) if modifiers.shift => KeyIntent::InsertNewline,
            (Key::Enter, _) => KeyIntent::Submit,
            (Key::Escape, InputMode::Reply) => KeyIntent::Cancel,
            _ => KeyIntent::Ignore,
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum SubmitOutcome {
    Sent,

    /// Nothing but whitespace, no call was made
    Empty,

    /// A previous submission of this input is still running, no call was made
    InFlight,
}

/// Single comment text box, agnostic of what its content is submitted as.
///
/// All methods take `&self`, so that the same input can be triggered again
/// while a submission is still awaiting the network.
#[derive(Debug)]
pub struct CommentInput {
    mode: InputMode,
    text: Mutex<String>,
    submitting: AtomicBool,
}

struct ClearOnDrop<'a>(&'a AtomicBool);

impl Drop for ClearOnDrop<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::Release);
    }
}

impl CommentInput {
    pub fn new(mode: InputMode) -> CommentInput {
        CommentInput {
            mode,
            text: Mutex::new(String::new()),
            submitting: AtomicBool::new(false),
        }
    }

    pub fn mode(&self) -> InputMode {
        self.mode
    }

    pub fn text(&self) -> String {
        self.text.lock().clone()
    }

    pub fn set_text(&self, text: impl Into<String>) {
        *self.text.lock() = text.into();
    }

    pub fn push_str(&self, s: &str) {
        self.text.lock().push_str(s);
    }

    pub fn is_submitting(&self) -> bool {
        self.submitting.load(Ordering::Acquire)
    }

    /// Hands the trimmed text to `submit`, clearing the input only if it succeeds
    pub async fn submit<F, Fut>(&self, submit: F) -> Result<SubmitOutcome, Error>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<(), Error>>,
    {
        let content = String::from(self.text.lock().trim());
        if content.is_empty() {
            return Ok(SubmitOutcome::Empty);
        }
        if self
            .submitting
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return Ok(SubmitOutcome::InFlight);
        }
        let _guard = ClearOnDrop(&self.submitting);
        submit(content).await?;
        self.text.lock().clear();
        Ok(SubmitOutcome::Sent)
    }

    /// Applies a keystroke; `on_cancel` runs for Escape in reply mode
    pub async fn handle_key<F, Fut>(
        &self,
        key: Key,
        modifiers: Modifiers,
        submit: F,
        on_cancel: impl FnOnce(),
    ) -> Result<KeyIntent, Error>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = Result<(), Error>>,
    {
        let intent = KeyIntent::from_key(key, modifiers, self.mode);
        match intent {
            KeyIntent::Submit => {
                self.submit(submit).await?;
            }
            KeyIntent::InsertNewline => self.push_str("\n"),
            KeyIntent::Cancel => {
                self.text.lock().clear();
                on_cancel();
            }
            KeyIntent::Ignore => (),
        }
        Ok(intent)
    }
}
