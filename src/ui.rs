// ui.rs

use crate::state::{TransportState, BEATS_PER_BAR};
use crossbeam::channel::{tick, Receiver};
use indicatif::{MultiProgress, ProgressBar, ProgressDrawTarget, ProgressStyle};
use std::cell::Cell;
use std::sync::Arc;
use std::time::Duration;

const REFRESH_INTERVAL: Duration = Duration::from_millis(100);

fn bar_style(template: &str, chars: &str) -> ProgressStyle {
    ProgressStyle::default_bar()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars(chars)
}

fn create_beat_progress(multi_progress: &MultiProgress) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new(u64::from(BEATS_PER_BAR)));
    pb.set_style(bar_style(
        "{prefix:.bold} [{bar:40.cyan}] {pos}/{len}",
        "⣀⣤⣦⣶⣷⣿ ",
    ));
    pb.set_prefix("Beat");
    pb
}

fn create_transport_spinner(multi_progress: &MultiProgress) -> ProgressBar {
    let pb = multi_progress.add(ProgressBar::new_spinner());
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{prefix:.bold.dim} {spinner} {wide_msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix("Transport");
    pb
}

/// One-line summary of the snapshot.
pub fn status_line(state: &TransportState) -> String {
    let source = match (state.is_external(), state.is_synced()) {
        (false, _) => "INT",
        (true, true) => "EXT",
        (true, false) => "EXT (no signal)",
    };
    format!(
        "{:6.1} BPM | {} | {} | bar {} beat {} | pulses {} resets {} | msgs {}",
        state.tempo(),
        source,
        if state.is_running() { "RUN" } else { "STOP" },
        state.bar(),
        state.beat(),
        state.clock_pulses(),
        state.reset_pulses(),
        state.message_count()
    )
}

/// Terminal status display fed from the shared snapshot.
pub struct UI {
    state: Arc<TransportState>,
    #[allow(dead_code)]
    multi_progress: MultiProgress,
    beat_pb: ProgressBar,
    transport_pb: ProgressBar,
    seen_tempo_locks: Cell<u64>,
}

impl UI {
    pub fn new(state: Arc<TransportState>) -> Self {
        let multi_progress = MultiProgress::with_draw_target(ProgressDrawTarget::stderr());
        let beat_pb = create_beat_progress(&multi_progress);
        let transport_pb = create_transport_spinner(&multi_progress);

        UI {
            state,
            multi_progress,
            beat_pb,
            transport_pb,
            seen_tempo_locks: Cell::new(0),
        }
    }

    /// Prints a line above the bars without disturbing them.
    pub fn println(&self, line: &str) {
        self.transport_pb.println(line);
    }

    /// Tempo shown when a new tap or external lock was published.
    pub fn tempo_lock_notice(&self) -> Option<String> {
        let locks = self.state.tempo_locks();
        if locks == self.seen_tempo_locks.replace(locks) {
            return None;
        }
        Some(format!("Tempo locked at {:.1} BPM", self.state.tempo()))
    }

    pub fn refresh(&self) {
        if let Some(notice) = self.tempo_lock_notice() {
            self.println(&notice);
        }
        self.beat_pb.set_position(u64::from(self.state.beat()));
        self.transport_pb.set_message(status_line(&self.state));
        if self.state.is_running() {
            self.transport_pb.tick();
        }
    }

    /// Redraws until `shutdown` fires or its sender is dropped.
    pub fn run(&self, shutdown: Receiver<()>) {
        let ticker = tick(REFRESH_INTERVAL);
        loop {
            crossbeam::channel::select! {
                recv(shutdown) -> _ => break,
                recv(ticker) -> _ => self.refresh(),
            }
        }
        self.transport_pb.finish_and_clear();
        self.beat_pb.finish_and_clear();
    }
}
