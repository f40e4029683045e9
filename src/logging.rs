use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::Result;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;
use tracing_subscriber::fmt::MakeWriter;

/// Sends every formatted event to stderr and, when a log file is open,
/// appends it there as well.
#[derive(Clone)]
pub(crate) struct LogMakeWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl LogMakeWriter {
    pub(crate) fn new(log_file: Option<&Path>) -> Result<Self> {
        let file = match log_file {
            Some(path) => {
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent)?;
                }
                let file = OpenOptions::new().create(true).append(true).open(path)?;
                Some(Arc::new(Mutex::new(file)))
            }
            None => None,
        };
        Ok(Self { file })
    }
}

impl<'a> MakeWriter<'a> for LogMakeWriter {
    type Writer = LogWriter;

    fn make_writer(&'a self) -> Self::Writer {
        LogWriter {
            file: self.file.clone(),
        }
    }
}

pub(crate) struct LogWriter {
    file: Option<Arc<Mutex<File>>>,
}

impl Write for LogWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        if let Some(file) = &self.file
            && let Ok(mut f) = file.lock()
        {
            let _ = f.write_all(buf); // A full disk must not take the process down
        }
        std::io::stderr().write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        if let Some(file) = &self.file
            && let Ok(mut f) = file.lock()
        {
            let _ = f.flush();
        }
        std::io::stderr().flush()
    }
}

/// Install the global subscriber. Later calls are ignored.
pub(crate) fn init(level: Level, log_file: Option<&Path>) -> Result<()> {
    let make_writer = LogMakeWriter::new(log_file)?;
    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_writer(make_writer)
        .with_ansi(log_file.is_none())
        .finish();
    tracing::subscriber::set_global_default(subscriber).ok();
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_appends_to_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("triage.log");
        let make_writer = LogMakeWriter::new(Some(path.as_path())).unwrap();

        make_writer.make_writer().write_all(b"first\n").unwrap();
        make_writer.make_writer().write_all(b"second\n").unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content, "first\nsecond\n");
    }

    #[test]
    fn writer_without_file_reports_full_length() {
        let make_writer = LogMakeWriter::new(None).unwrap();
        assert_eq!(make_writer.make_writer().write(b"hello").unwrap(), 5);
    }
}
