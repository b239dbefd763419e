//! Helpers for driving the external `ffmpeg` tools.

use std::collections::VecDeque;
use std::io::{BufRead, BufReader};
use std::process::{ChildStderr, Command, Stdio};
use std::sync::Arc;
use std::thread::JoinHandle;

use parking_lot::Mutex;

const TAIL_LINES: usize = 8;

/// Whether `bin -version` runs successfully
pub fn is_available(bin: &str) -> bool {
    Command::new(bin)
        .arg("-version")
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

/// Drains a child's stderr on a helper thread, keeping the last few lines
///
/// An undrained stderr pipe fills up and stalls the child, so the capture
/// must start as soon as the process is spawned.
pub struct StderrTail {
    lines: Arc<Mutex<VecDeque<String>>>,
    thread: Option<JoinHandle<()>>,
}

impl StderrTail {
    pub fn capture(stderr: Option<ChildStderr>) -> Self {
        let lines = Arc::new(Mutex::new(VecDeque::with_capacity(TAIL_LINES)));
        let thread = stderr.map(|stderr| {
            let lines = Arc::clone(&lines);
            std::thread::spawn(move || {
                for line in BufReader::new(stderr).lines().map_while(|l| l.ok()) {
                    let mut lines = lines.lock();
                    if lines.len() == TAIL_LINES {
                        lines.pop_front();
                    }
                    lines.push_back(line);
                }
            })
        });
        Self { lines, thread }
    }

    /// The captured tail joined into one line. Call only after the child has exited.
    pub fn reason(&mut self, fallback: &str) -> String {
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        let lines = self.lines.lock();
        if lines.is_empty() {
            fallback.to_string()
        } else {
            lines.iter().cloned().collect::<Vec<_>>().join("; ")
        }
    }
}
