use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

use crate::tracker::Snapshot;

/// Terminal progress bar fed from tracker snapshots. When disabled, every
/// method is a no-op so callers never have to branch.
pub struct ProgressReporter {
    bar: Option<ProgressBar>,
    enabled: bool,
}

impl ProgressReporter {
    pub fn new(enabled: bool) -> Self {
        Self { bar: None, enabled }
    }

    pub fn start_scan(&mut self, total: usize) {
        if !self.enabled {
            return;
        }

        let pb = ProgressBar::new(total as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} paths probed ({eta}) {msg}")
                .unwrap()
                .progress_chars("#>-"),
        );
        pb.enable_steady_tick(Duration::from_millis(120));
        self.bar = Some(pb);
    }

    pub fn update(&self, snapshot: &Snapshot) {
        if let Some(ref pb) = self.bar {
            pb.set_position(snapshot.completed as u64);
            pb.set_message(format!(
                "{} found, {} failed",
                snapshot.reported, snapshot.failed
            ));
        }
    }

    /// Print a line above the bar without tearing it.
    pub fn println(&self, line: &str) {
        match self.bar {
            Some(ref pb) => pb.println(line),
            None => println!("{line}"),
        }
    }

    pub fn finish(&self, snapshot: &Snapshot) {
        if let Some(ref pb) = self.bar {
            pb.set_position(snapshot.completed as u64);
            pb.finish_and_clear();
        }
    }
}
