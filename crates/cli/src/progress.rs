use std::io::IsTerminal;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};

// nothing is drawn when stderr is not a terminal or when progress is
// turned off via the environment
pub(crate) struct Progress {
    bar: Option<ProgressBar>,
}

impl Progress {
    pub(crate) fn new(total: u64, unit: &str) -> Self {
        let bar = if is_interactive() {
            let template = format!(
                "{{pos:>10}}/{{len}} {unit} ({{percent:>3}}%) {{wide_bar}} \
                 {{msg}} eta {{eta_precise}}"
            );
            let pb = ProgressBar::new(total);
            pb.set_style(ProgressStyle::with_template(&template).expect("valid progress template"));
            pb.enable_steady_tick(Duration::from_millis(200));
            Some(pb)
        } else {
            None
        };
        Self { bar }
    }

    pub(crate) fn set_position(&self, pos: u64) {
        if let Some(bar) = &self.bar {
            bar.set_position(pos);
        }
    }

    pub(crate) fn set_message(&self, msg: impl Into<String>) {
        if let Some(bar) = &self.bar {
            bar.set_message(msg.into());
        }
    }

    pub(crate) fn finish_and_clear(&self) {
        if let Some(bar) = &self.bar {
            bar.finish_and_clear();
        }
    }
}

impl Drop for Progress {
    fn drop(&mut self) {
        self.finish_and_clear();
    }
}

fn is_interactive() -> bool {
    if !std::io::stderr().is_terminal() {
        return false;
    }
    if std::env::var("NO_COLOR").is_ok() {
        return false;
    }
    if std::env::var("COPYCATCH_NO_PROGRESS").is_ok() {
        return false;
    }
    true
}
