/// Errors and warnings collected while starting up.
///
/// Errors are shown in a single dialog before any mode is displayed;
/// warnings are written to stderr before the UI takes over the terminal.
#[derive(Debug, Default)]
pub struct Diagnostics {
    errors: Vec<String>,
    warnings: Vec<String>,
}

/// How many errors the startup dialog spells out before summarising.
const DIALOG_ERROR_LIMIT: usize = 2;

impl Diagnostics {
    pub fn error(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::error!("{message}");
        self.errors.push(message);
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        let message = message.into();
        tracing::warn!("{message}");
        self.warnings.push(message);
    }

    pub fn take_warnings(&mut self) -> Vec<String> {
        std::mem::take(&mut self.warnings)
    }

    /// Text of the startup error dialog, if there is anything to report.
    pub fn startup_dialog(&self) -> Option<String> {
        if self.errors.is_empty() {
            return None;
        }

        let mut text = String::from("The following errors were detected when starting quiver:");
        for error in self.errors.iter().take(DIALOG_ERROR_LIMIT) {
            text.push_str("\n\n");
            text.push_str(error);
        }

        let remaining = self.errors.len().saturating_sub(DIALOG_ERROR_LIMIT);
        if remaining > 0 {
            let noun = if remaining == 1 { "error" } else { "errors" };
            text.push_str(&format!("\n\nThere are {remaining} more {noun}."));
        }

        Some(text)
    }

    pub fn clear(&mut self) {
        self.errors.clear();
        self.warnings.clear();
    }
}
