//! Step progress on the terminal.
//!
//! Each step prints its label padded to a fixed column, then a colored status
//! tag once the step finishes:
//!
//! ```text
//! Testing Host...                         [FAIL]
//! Checking Jamf...                        [192.168.1.50]
//! Testing Alternate Host...               [PASS]
//! ```

use std::io::{self, Write};

use colored::{ColoredString, Colorize};

use super::traits::{ProgressSink, Step, StepStatus};

/// Column at which status tags start.
pub const STATUS_COLUMN: usize = 40;

fn padded_label(step: Step) -> String {
    format!("{:<width$}", step.label(), width = STATUS_COLUMN)
}

fn colored_tag(status: &StepStatus) -> ColoredString {
    let tag = status.tag();
    if status.is_success() {
        tag.green()
    } else {
        tag.red()
    }
}

/// [`ProgressSink`] writing to stdout.
#[derive(Debug, Default)]
pub struct TerminalProgress;

impl ProgressSink for TerminalProgress {
    fn begin(&self, step: Step) {
        let mut out = io::stdout().lock();
        let _ = write!(out, "{}", padded_label(step));
        let _ = out.flush();
    }

    fn finish(&self, status: StepStatus) {
        println!("{}", colored_tag(&status));
    }

    fn report(&self, message: &str) {
        println!();
        println!("{}", message.red());
        println!();
    }
}
