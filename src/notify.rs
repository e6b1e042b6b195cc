//! Single-slot notification surface.
//!
//! A new message overwrites the slot. Each post gets a generation; the clear
//! timer for an older generation is a no-op.

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Success,
    Warning,
    Error,
}

impl Severity {
    pub fn css_class(&self) -> &'static str {
        match self {
            Severity::Success => "success-message",
            Severity::Warning => "warning-message",
            Severity::Error => "error-message",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub message: String,
    pub severity: Severity,
}

#[derive(Debug, Default)]
pub struct NotificationSlot {
    current: Option<Notification>,
    generation: u64,
}

impl NotificationSlot {
    /// Replace the slot. Returns the generation the clear timer must carry.
    pub fn post(&mut self, message: impl Into<String>, severity: Severity) -> u64 {
        self.generation += 1;
        self.current = Some(Notification {
            message: message.into(),
            severity,
        });
        self.generation
    }

    /// Clear the slot if `generation` is still the latest post.
    pub fn expire(&mut self, generation: u64) -> bool {
        if generation != self.generation || self.current.is_none() {
            return false;
        }
        self.current = None;
        true
    }

    pub fn current(&self) -> Option<&Notification> {
        self.current.as_ref()
    }
}
