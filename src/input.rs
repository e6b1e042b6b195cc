//! Operator key bindings.

use crate::controller::Request;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Input {
    Skip,
    /// Load the next item without forcing a skip.
    Next,
    ToggleDashboard,
    RefreshStatus,
    Quit,
}

impl Input {
    /// Map a key name (SDL naming: `Space`, `Return`, `D`, ...) to an input.
    pub fn from_key_name(name: &str) -> Option<Self> {
        match name {
            "Space" | "Return" | "Keypad Enter" => Some(Input::Skip),
            "N" | "n" => Some(Input::Next),
            "D" | "d" => Some(Input::ToggleDashboard),
            "R" | "r" => Some(Input::RefreshStatus),
            "Escape" | "Q" | "q" => Some(Input::Quit),
            _ => None,
        }
    }

    /// Map a line typed on the console. A bare Enter skips.
    pub fn from_console_line(line: &str) -> Option<Self> {
        match line.trim() {
            "" => Some(Input::Skip),
            word => Self::from_key_name(word),
        }
    }

    /// Controller request for this input. `None` for quit, which the
    /// frontend handles itself.
    pub fn request(self) -> Option<Request> {
        match self {
            Input::Skip => Some(Request::Skip),
            Input::Next => Some(Request::LoadNext),
            Input::ToggleDashboard => Some(Request::ToggleDashboard),
            Input::RefreshStatus => Some(Request::RefreshStatus),
            Input::Quit => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kiosk_shortcuts() {
        assert_eq!(Input::from_key_name("Space"), Some(Input::Skip));
        assert_eq!(Input::from_key_name("Return"), Some(Input::Skip));
        assert_eq!(Input::from_key_name("d"), Some(Input::ToggleDashboard));
        assert_eq!(Input::from_key_name("D"), Some(Input::ToggleDashboard));
        assert_eq!(Input::from_key_name("R"), Some(Input::RefreshStatus));
        assert_eq!(Input::from_key_name("Escape"), Some(Input::Quit));
        assert_eq!(Input::from_key_name("Tab"), None);
    }

    #[test]
    fn console_lines() {
        assert_eq!(Input::from_console_line("\n"), Some(Input::Skip));
        assert_eq!(Input::from_console_line("  d \n"), Some(Input::ToggleDashboard));
        assert_eq!(Input::from_console_line("n"), Some(Input::Next));
        assert_eq!(Input::from_console_line("q\r\n"), Some(Input::Quit));
        assert_eq!(Input::from_console_line("skip please"), None);
    }

    #[test]
    fn inputs_become_requests() {
        assert_eq!(Input::Skip.request(), Some(Request::Skip));
        assert_eq!(Input::Next.request(), Some(Request::LoadNext));
        assert_eq!(Input::RefreshStatus.request(), Some(Request::RefreshStatus));
        assert_eq!(Input::Quit.request(), None);
    }
}
