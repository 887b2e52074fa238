use std::io::{self, Write};

use cliptale_core::{AppViewModel, ClipDetailsView, ClipRowView, ClipStatus};
use engine_logging::engine_warn;

use crate::platform::app::Presenter;

pub fn status_label(status: ClipStatus) -> &'static str {
    match status {
        ClipStatus::New => "new",
        ClipStatus::Extracting => "extracting",
        ClipStatus::Transcribing => "transcribing",
        ClipStatus::Labeling => "labeling",
        ClipStatus::Labeled => "labeled",
        ClipStatus::Saving => "saving",
        ClipStatus::Saved => "saved",
        ClipStatus::Reverting => "reverting",
        ClipStatus::Reverted => "reverted",
        ClipStatus::Error => "error",
    }
}

pub fn render_rows(rows: &[ClipRowView]) -> String {
    if rows.is_empty() {
        return "No clips. Use 'add <path>' to add some.\n".to_string();
    }
    let mut out = String::new();
    for (index, row) in rows.iter().enumerate() {
        let marker = if row.selected { '>' } else { ' ' };
        let busy = if row.busy { " *" } else { "" };
        out.push_str(&format!(
            "{marker} {:>2}. {:<40} [{}{busy}]\n",
            index + 1,
            row.file_name,
            status_label(row.status)
        ));
    }
    out
}

pub fn render_details(details: &ClipDetailsView) -> String {
    let mut actions = Vec::new();
    if details.path.is_some() {
        if details.can_generate {
            actions.push("generate");
        }
        if details.can_save {
            actions.push("label");
            actions.push("save");
        }
        if details.can_revert {
            actions.push("revert");
        }
        if details.can_remove {
            actions.push("remove");
        }
    }
    if details.can_add {
        actions.push("add");
    }

    let label = if details.label.is_empty() {
        "-"
    } else {
        details.label.as_str()
    };
    format!(
        "File:    {}\nStatus:  {}\nLabel:   {}\nActions: {}\n",
        details.file_name,
        details.status_text,
        label,
        actions.join(", ")
    )
}

pub fn render(view: &AppViewModel) -> String {
    format!("{}\n{}", render_rows(&view.rows), render_details(&view.details))
}

/// Writes views and notices as plain text.
pub struct TerminalPresenter<W: Write> {
    out: W,
}

impl TerminalPresenter<io::Stdout> {
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }
}

impl<W: Write> TerminalPresenter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    fn write(&mut self, text: &str) {
        let result = self
            .out
            .write_all(text.as_bytes())
            .and_then(|()| self.out.flush());
        if let Err(err) = result {
            engine_warn!("Failed to write to terminal: {}", err);
        }
    }
}

impl<W: Write> Presenter for TerminalPresenter<W> {
    fn present(&mut self, view: &AppViewModel) {
        let text = format!("\n{}", render(view));
        self.write(&text);
    }

    fn notice(&mut self, text: &str) {
        self.write(&format!("{text}\n"));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::path::PathBuf;

    #[test]
    fn rows_mark_selection_and_busy_items() {
        let rows = vec![
            ClipRowView {
                path: PathBuf::from("/clips/clip.mp4"),
                file_name: "clip.mp4".to_string(),
                status: ClipStatus::Transcribing,
                busy: true,
                selected: true,
            },
            ClipRowView {
                path: PathBuf::from("/clips/dog_bark.mov"),
                file_name: "dog_bark.mov".to_string(),
                status: ClipStatus::Saved,
                busy: false,
                selected: false,
            },
        ];
        let text = render_rows(&rows);
        let lines: Vec<&str> = text.lines().collect();
        assert!(lines[0].starts_with(">  1. clip.mp4"));
        assert!(lines[0].ends_with("[transcribing *]"));
        assert!(lines[1].starts_with("   2. dog_bark.mov"));
        assert!(lines[1].ends_with("[saved]"));
    }

    #[test]
    fn empty_selection_shows_placeholders() {
        let details = ClipDetailsView {
            can_add: true,
            ..ClipDetailsView::empty()
        };
        assert_eq!(
            render_details(&details),
            "File:    N/A\nStatus:  N/A\nLabel:   -\nActions: add\n"
        );
    }

    #[test]
    fn presenter_writes_notices() {
        let mut presenter = TerminalPresenter::new(Vec::new());
        presenter.notice("Label saved");
        assert_eq!(String::from_utf8(presenter.out).unwrap(), "Label saved\n");
    }
}
