//! Job result reporting over a byte stream.

use std::io::Write;
use std::sync::Mutex;

use layercast_protocol::JobOutcome;

use crate::error::ReportError;
use crate::services::JobReporter;

/// Writes each job result as one JSON line.
///
/// The worker binary reports on stdout, which carries nothing else.
pub struct StreamReporter<W: Write + Send> {
    writer: Mutex<W>,
}

impl<W: Write + Send> StreamReporter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: Mutex::new(writer),
        }
    }

    pub fn into_inner(self) -> W {
        match self.writer.into_inner() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl<W: Write + Send> JobReporter for StreamReporter<W> {
    fn report(&self, outcome: &JobOutcome) -> Result<(), ReportError> {
        let line = serde_json::to_string(&outcome.to_result())?;
        let mut writer = match self.writer.lock() {
            Ok(writer) => writer,
            Err(poisoned) => poisoned.into_inner(),
        };
        writeln!(writer, "{}", line)?;
        writer.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use layercast_protocol::{FailureType, JobId, JobResult};
    use std::io;

    #[test]
    fn test_writes_one_line_per_result() {
        let reporter = StreamReporter::new(Vec::new());
        reporter
            .report(&JobOutcome::success(JobId::new("job-a").unwrap()))
            .unwrap();
        reporter
            .report(&JobOutcome::failure(
                JobId::new("job-b").unwrap(),
                "failed",
                FailureType::JobFailed,
            ))
            .unwrap();

        let output = String::from_utf8(reporter.into_inner()).unwrap();
        let results: Vec<JobResult> = output
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(results.len(), 2);
        assert!(results[0].is_success());
        assert_eq!(results[1].job_id.as_str(), "job-b");
        assert_eq!(results[1].failure_details.as_ref().unwrap().kind, FailureType::JobFailed);
    }

    struct Closed;

    impl Write for Closed {
        fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_closed_channel_is_unreachable() {
        let reporter = StreamReporter::new(Closed);
        let err = reporter
            .report(&JobOutcome::success(JobId::new("job-a").unwrap()))
            .unwrap_err();
        assert!(matches!(err, ReportError::Unreachable(_)));
    }
}
