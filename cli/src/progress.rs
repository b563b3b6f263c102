use crate::logger::Logger;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::io::{stdout, IsTerminal};
use std::time::Duration;

/// Overall bar of a deploy or destroy run, with a spinner per stack above it
pub struct RunProgress {
    multi_progress: &'static MultiProgress,
    total_progress_bar: ProgressBar,
}

impl RunProgress {
    pub fn new(action: &str, total_stacks: u64) -> Self {
        let multi_progress = Logger::multi_progress();
        let total_progress_bar = multi_progress.add(ProgressBar::new(total_stacks));

        let style = ProgressStyle::default_bar()
            .template(&format!(
                "   {} [{{bar:30}}] {{pos}}/{{len}} {{wide_msg:.dim}}",
                console::style(action).cyan().bold()
            ))
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> ");

        total_progress_bar.set_style(style);
        total_progress_bar.set_position(0);

        Self {
            multi_progress,
            total_progress_bar,
        }
    }

    pub fn stack(&self, name: &str) -> StackProgress {
        let progress_bar = self
            .multi_progress
            .insert_before(&self.total_progress_bar, ProgressBar::new_spinner());

        progress_bar.set_style(
            ProgressStyle::with_template("{spinner} {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );

        progress_bar.enable_steady_tick(Duration::from_millis(120));

        StackProgress {
            progress_bar,
            stack_name: name.to_string(),
        }
    }

    pub fn advance(&self) {
        self.total_progress_bar.inc(1);
    }

    pub fn finish(&self) {
        self.total_progress_bar.finish_and_clear();
    }
}

pub enum ProgressStatus {
    Success,
    Warn,
    Error,
}

pub struct StackProgress {
    progress_bar: ProgressBar,
    stack_name: String,
}

impl StackProgress {
    /// Show the latest CloudFormation status next to the spinner
    pub fn set_status(&self, status: &str) {
        self.progress_bar.set_message(format!(
            "{} {}",
            self.stack_name,
            console::style(status).dim()
        ));
    }

    pub fn log_stage(&self, stage: &str) {
        let msg = format!(
            "{} {}",
            console::style(with_padding(stage)).green().bold(),
            self.stack_name,
        );

        // Terminal or CI/CD?
        if stdout().is_terminal() {
            self.progress_bar.println(msg);
        } else {
            self.progress_bar.suspend(|| eprintln!("{msg}"));
        }
    }

    pub fn finish(&self, stage: &str, status: ProgressStatus, message: Option<&str>) {
        let stage = console::style(with_padding(stage)).bold();
        let stage = match status {
            ProgressStatus::Success => stage.green(),
            ProgressStatus::Warn => stage.yellow(),
            ProgressStatus::Error => stage.red(),
        };

        let message = message.map(|m| format!(": {m}")).unwrap_or_default();
        self.progress_bar
            .finish_with_message(format!("{} {}{}", stage, self.stack_name, message));
    }
}

// Required padding to make the message centered in the cargo-like style
fn with_padding(message: &str) -> String {
    format!("{message:>12}")
}
