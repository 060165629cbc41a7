use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};
use weatherwise_core::ProgressObserver;

/// Drives a terminal progress bar from the batch's completed-request counter.
#[derive(Debug)]
pub struct FetchProgressBar {
    bar: ProgressBar,
}

impl FetchProgressBar {
    pub fn new(total: usize) -> Self {
        let bar = ProgressBar::with_draw_target(Some(total as u64), ProgressDrawTarget::stderr());
        bar.set_style(
            ProgressStyle::with_template("{spinner} Fetching weather [{bar:30}] {pos}/{len}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=> "),
        );
        Self { bar }
    }

    pub fn finish(&self) {
        self.bar.finish_and_clear();
    }
}

impl ProgressObserver for FetchProgressBar {
    fn on_progress(&self, completed: usize, _total: usize) {
        self.bar.set_position(completed as u64);
    }
}
