use super::dirs::get_service_dir;
use flexi_logger::{Cleanup, Criterion, Duplicate, FileSpec, Logger, Naming, detailed_format};

pub struct LogConfig {
    pub service_name: String,
    pub file_name: Option<String>,
    pub level: String,
    pub file: bool,
    pub console: bool,
}

impl LogConfig {
    pub fn new(service_name: &str) -> Self {
        Self {
            service_name: service_name.to_string(),
            file_name: None,
            level: "info".to_string(),
            file: true,
            console: false,
        }
    }

    pub fn with_file_name(mut self, file_name: &str) -> Self {
        self.file_name = Some(file_name.to_string());
        self
    }

    pub fn with_level(mut self, level: &str) -> Self {
        self.level = level.to_string();
        self
    }

    pub fn enable_file(mut self, enable: bool) -> Self {
        self.file = enable;
        self
    }

    pub fn enable_console(mut self, enable: bool) -> Self {
        self.console = enable;
        self
    }
}

pub fn init_log(config: LogConfig) {
    let logger = Logger::try_with_env_or_str(&config.level)
        .unwrap_or_else(|e| {
            println!("Invalid log level {}: {}, fallback to info", config.level, e);
            Logger::try_with_str("info").unwrap()
        })
        .format(detailed_format);

    let logger = if config.file {
        let log_dir = get_service_dir(&config.service_name).join("logs");
        std::fs::create_dir_all(&log_dir).expect("Failed to create log directory");

        let file_name = config.file_name.unwrap_or(config.service_name);
        let logger = logger
            .log_to_file(
                FileSpec::default()
                    .directory(log_dir) // Log files directory
                    .basename(file_name), // Base name of log files
            )
            // --- Enable log rotation ---
            .rotate(
                Criterion::Size(100_000_000), // Rotate when file size reaches 100 MB
                Naming::Timestamps,           // Use timestamps for new file names
                Cleanup::KeepLogFiles(20),    // Keep only the latest 20 log files
            );

        if config.console {
            logger.duplicate_to_stderr(Duplicate::All)
        } else {
            logger
        }
    } else {
        logger.log_to_stderr()
    };

    logger.start().expect("Failed to initialize flexi_logger");
}
