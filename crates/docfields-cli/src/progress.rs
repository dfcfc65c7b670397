//! Per-group progress bars.

use std::collections::HashMap;
use std::sync::Mutex;

use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use docfields_core::ProgressObserver;

/// One `processing: current/total` bar per worker group.
pub struct GroupProgress {
    multi: MultiProgress,
    bars: Mutex<HashMap<usize, ProgressBar>>,
}

impl GroupProgress {
    pub fn new() -> Self {
        Self {
            multi: MultiProgress::new(),
            bars: Mutex::new(HashMap::new()),
        }
    }

    fn style() -> ProgressStyle {
        ProgressStyle::with_template(
            "processing: {pos}/{len} [{bar:40.cyan/blue}] {elapsed_precise}",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("=>-")
    }
}

impl ProgressObserver for GroupProgress {
    fn on_group_start(&self, group: usize, len: usize) {
        let bar = self.multi.add(ProgressBar::new(len as u64));
        bar.set_style(Self::style());
        if let Ok(mut bars) = self.bars.lock() {
            bars.insert(group, bar);
        }
    }

    fn on_item(&self, group: usize, current: usize, _len: usize) {
        if let Ok(bars) = self.bars.lock() {
            if let Some(bar) = bars.get(&group) {
                bar.set_position(current as u64);
            }
        }
    }

    fn on_group_finish(&self, group: usize) {
        if let Ok(bars) = self.bars.lock() {
            if let Some(bar) = bars.get(&group) {
                bar.finish();
            }
        }
    }
}
