//! Progress bars driven by engine events

use console::style;
use dirmirror_sync::ProgressEvent;
use dirmirror_types::CanonicalPath;
use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::time::Duration;
use tokio::sync::mpsc;

const BAR_TEMPLATE: &str =
    "{spinner:.green} {prefix:<22.bold} [{wide_bar:.cyan/blue}] {percent:>3}% {pos}/{len} {msg}";

/// Renders one bar per phase, replacing it when the next phase starts
pub struct ProgressRenderer {
    bar: Option<ProgressBar>,
    hidden: bool,
}

impl ProgressRenderer {
    /// Renderer drawing to the terminal
    pub fn new() -> Self {
        Self {
            bar: None,
            hidden: false,
        }
    }

    /// Renderer that tracks state without drawing
    #[cfg(test)]
    pub fn hidden() -> Self {
        Self {
            bar: None,
            hidden: true,
        }
    }

    /// Consume events until every sender is gone
    pub async fn run(mut self, mut event_rx: mpsc::UnboundedReceiver<ProgressEvent>) {
        while let Some(event) = event_rx.recv().await {
            self.handle(&event);
        }
        self.finish();
    }

    /// Apply one event
    pub fn handle(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::TaskStarted {
                source,
                destination,
                ..
            } => {
                self.finish();
                self.println(format!(
                    "{} Sync From: {} To: {}",
                    style("⟲").blue().bold(),
                    style(source).cyan(),
                    style(destination).cyan()
                ));
            }
            ProgressEvent::PhaseStarted { phase, total } => {
                self.finish();
                let bar = self.new_bar(*total);
                bar.set_prefix(phase.label());
                self.bar = Some(bar);
            }
            ProgressEvent::ItemCompleted(progress) => {
                if let Some(bar) = &self.bar {
                    bar.set_length(progress.total);
                    bar.set_position(progress.completed);
                    bar.set_message(file_name(&progress.path));
                }
            }
            ProgressEvent::ItemFailed(failure) => {
                if let Some(bar) = &self.bar {
                    bar.inc(1);
                }
                self.println(format!(
                    "{} {}",
                    style("✗").red().bold(),
                    style(failure).red()
                ));
            }
            ProgressEvent::TaskCompleted { .. } => self.finish(),
        }
    }

    /// Position of the current bar, if any
    #[cfg(test)]
    pub fn position(&self) -> Option<(u64, Option<u64>)> {
        self.bar.as_ref().map(|bar| (bar.position(), bar.length()))
    }

    fn new_bar(&self, total: u64) -> ProgressBar {
        let bar = if self.hidden {
            ProgressBar::with_draw_target(Some(total), ProgressDrawTarget::hidden())
        } else {
            ProgressBar::new(total)
        };
        bar.set_style(
            ProgressStyle::default_bar()
                .template(BAR_TEMPLATE)
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("█▉▊▋▌▍▎▏  "),
        );
        if !self.hidden {
            bar.enable_steady_tick(Duration::from_millis(100));
        }
        bar
    }

    fn println(&self, line: String) {
        if self.hidden {
            return;
        }
        match &self.bar {
            Some(bar) => bar.suspend(|| println!("{}", line)),
            None => println!("{}", line),
        }
    }

    fn finish(&mut self) {
        if let Some(bar) = self.bar.take() {
            bar.finish();
        }
    }
}

impl Default for ProgressRenderer {
    fn default() -> Self {
        Self::new()
    }
}

fn file_name(path: &CanonicalPath) -> String {
    path.as_str()
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
        .to_string()
}
