//! Where progress and the final summary of a run are written

use std::io::Write;

use super::RunSummary;

/// A sink for human-readable progress lines and the final summary
pub trait Report {
    /// One progress line, without its line break
    fn progress(&mut self, line: &str);

    /// The summary, once the run is over
    fn summary(&mut self, summary: &RunSummary);
}

/// Writes the report to a terminal or any other writer
///
/// Write failures are ignored, a broken pipe must not stop the run.
#[derive(Debug)]
pub struct ConsoleReport<W> {
    out: W,
}

impl<W: Write> ConsoleReport<W> {
    /// Creates a report writing to `out`
    pub fn new(out: W) -> Self {
        ConsoleReport { out }
    }

    /// Gives the writer back
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> Report for ConsoleReport<W> {
    fn progress(&mut self, line: &str) {
        let _ = writeln!(self.out, "{line}");
        let _ = self.out.flush();
    }

    fn summary(&mut self, summary: &RunSummary) {
        let _ = writeln!(self.out, "{summary}");
        let _ = self.out.flush();
    }
}

/// Collects every line, the summary rendered as one entry
impl Report for Vec<String> {
    fn progress(&mut self, line: &str) {
        self.push(line.to_owned());
    }

    fn summary(&mut self, summary: &RunSummary) {
        self.push(summary.to_string());
    }
}

impl<R: Report + ?Sized> Report for &mut R {
    fn progress(&mut self, line: &str) {
        (**self).progress(line);
    }

    fn summary(&mut self, summary: &RunSummary) {
        (**self).summary(summary);
    }
}
