//! Chat input box and its keyboard contract: Enter sends, Shift+Enter inserts
//! a line break.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Key {
    Enter,
    Backspace,
    Char(char),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyPress {
    pub key: Key,
    pub shift: bool,
}

impl KeyPress {
    pub fn new(key: Key) -> Self {
        Self { key, shift: false }
    }

    pub fn with_shift(key: Key) -> Self {
        Self { key, shift: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
pub enum ComposerAction {
    /// Send the current input
    Submit,
    Edited,
    Ignored,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Composer {
    input: String,
}

impl Composer {
    pub fn input(&self) -> &str {
        &self.input
    }

    pub fn set_input(&mut self, input: impl Into<String>) {
        self.input = input.into();
    }

    /// Whitespace-only input counts as empty.
    pub fn is_blank(&self) -> bool {
        self.input.trim().is_empty()
    }

    /// Clear the input, returning it trimmed.
    pub fn take_input(&mut self) -> String {
        let input = std::mem::take(&mut self.input);
        input.trim().to_string()
    }

    pub fn handle_key(&mut self, press: KeyPress) -> ComposerAction {
        match press.key {
            Key::Enter if !press.shift => ComposerAction::Submit,
            Key::Enter => {
                self.input.push('\n');
                ComposerAction::Edited
            }
            Key::Char(c) => {
                self.input.push(c);
                ComposerAction::Edited
            }
            Key::Backspace => match self.input.pop() {
                Some(_) => ComposerAction::Edited,
                None => ComposerAction::Ignored,
            },
        }
    }
}
