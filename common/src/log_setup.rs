use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, LoggerHandle, Naming};

/// Starts file logging under `logs/` with stdout/stderr duplication.
///
/// The returned handle must be kept alive for the lifetime of the process,
/// dropping it flushes and stops the logger.
pub fn setup_logging(base_level: &str) -> LoggerHandle {
    Logger::try_with_env_or_str(base_level)
        .unwrap_or_else(|e| panic!("Invalid log specification {}: {}", base_level, e))
        .log_to_file(FileSpec::default().directory("logs").basename("lysoquant"))
        .duplicate_to_stderr(Duplicate::Warn)
        .duplicate_to_stdout(Duplicate::All)
        .rotate(
            Criterion::Size(1024 * 1024), //1MB
            Naming::Timestamps,
            Cleanup::KeepLogFiles(5),
        )
        .start()
        .unwrap_or_else(|e| panic!("Logger initialization failed with {}", e))
}
