/// Append-only log file sink
use parking_lot::Mutex;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

pub struct LogFile {
    writer: Mutex<BufWriter<File>>,
}

impl LogFile {
    pub fn open(path: &Path) -> std::io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: Mutex::new(BufWriter::new(file)),
        })
    }

    /// Write errors are swallowed: logging must never take the process down.
    pub fn write_line(&self, line: &str) {
        let mut writer = self.writer.lock();
        let _ = writeln!(writer, "{}", line);
    }

    pub fn flush(&self) {
        let _ = self.writer.lock().flush();
    }
}

impl Drop for LogFile {
    fn drop(&mut self) {
        let _ = self.writer.get_mut().flush();
    }
}
