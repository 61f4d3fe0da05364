pub mod pick;
pub mod scan;
pub mod status;

use serde::Serialize;

#[derive(Debug, Clone, Serialize)]
pub struct CommandReport {
    pub command: String,
    pub ok: bool,
    pub details: Vec<String>,
    pub issues: Vec<String>,
}

impl CommandReport {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            ok: true,
            details: Vec::new(),
            issues: Vec::new(),
        }
    }

    pub fn detail(&mut self, text: impl Into<String>) {
        self.details.push(text.into());
    }

    pub fn issue(&mut self, text: impl Into<String>) {
        self.ok = false;
        self.issues.push(text.into());
    }

    pub fn render_text(&self) -> String {
        let mut out = format!(
            "{}: {}\n",
            self.command,
            if self.ok { "ok" } else { "issues found" }
        );
        for detail in &self.details {
            out.push_str(&format!("  {detail}\n"));
        }
        for issue in &self.issues {
            out.push_str(&format!("  issue: {issue}\n"));
        }
        out
    }
}
