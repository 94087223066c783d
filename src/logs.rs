use std::path::{Path, PathBuf};

use anyhow::Result;
use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    {ContentLimit, FileRotate},
};
use log::Log;
use simplelog::{ConfigBuilder, LevelFilter, WriteLogger};

/// Writes every record to the rolling log file; warnings and errors are
/// echoed to stderr as well.
pub struct MainLogger {
    write_logger: Box<WriteLogger<FileRotate<AppendTimestamp>>>,
}

impl Log for MainLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        self.write_logger.enabled(metadata)
    }

    fn log(&self, record: &log::Record) {
        self.write_logger.log(record);
        if record.level() <= log::Level::Warn {
            eprintln!("{}:{} -- {}", record.level(), record.target(), record.args());
        }
    }

    fn flush(&self) {
        self.write_logger.flush();
    }
}

pub fn log_file_path(log_dir: &str) -> PathBuf {
    Path::new(log_dir).join("logs/main.log")
}

/// Installs the global logger. Fails if a logger is already installed.
pub fn init(log_dir: &str) -> Result<()> {
    let log = FileRotate::new(
        log_file_path(log_dir),
        AppendTimestamp::default(FileLimit::MaxFiles(3)),
        ContentLimit::Lines(1000),
        Compression::None,
        #[cfg(unix)]
        None,
    );
    let config = ConfigBuilder::new().set_time_format_rfc3339().build();
    let write_logger = WriteLogger::new(LevelFilter::Info, config, log);
    log::set_boxed_logger(Box::new(MainLogger { write_logger }))?;
    log::set_max_level(LevelFilter::Info);
    info!("logging to {}", log_file_path(log_dir).display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempdir::TempDir;

    // the only test in this binary that installs a global logger
    #[test]
    fn init_writes_to_rolling_file() {
        let temp_dir = TempDir::new("logs-init").unwrap();
        let log_dir = temp_dir.path().to_str().unwrap();
        init(log_dir).unwrap();
        info!("hello from the test");
        log::logger().flush();

        let content = std::fs::read_to_string(log_file_path(log_dir)).unwrap();
        assert!(content.contains("hello from the test"));
        assert!(init(log_dir).is_err());
    }
}
