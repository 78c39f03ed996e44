use std::sync::{Arc, Mutex};

use tracing::{subscriber::set_global_default, Level};
use tracing_appender::{non_blocking::WorkerGuard, rolling};
use tracing_subscriber::{filter::DynFilterFn, fmt, layer::SubscriberExt, Layer, Registry};

use signet_bridge_models::LogSettings;
use signet_bridge_sdk::{BridgeError, BridgeResult};

/// Console logger with an optional daily-rolling file layer and a level
/// that can be changed at runtime.
pub struct Logger {
    level: Arc<Mutex<Level>>,
    directory: Option<String>,
    _file_guard: Option<WorkerGuard>,
}

impl Logger {
    pub fn new(settings: &LogSettings) -> Self {
        let level = settings.level.parse().unwrap_or(Level::INFO);
        Logger {
            level: Arc::new(Mutex::new(level)),
            directory: settings.dir.clone(),
            _file_guard: None,
        }
    }

    /// Sets the new logging level.
    pub fn set_level(&self, new_level: Level) {
        if let Ok(mut level) = self.level.lock() {
            *level = new_level;
        }
    }

    pub fn get_level(&self) -> Level {
        self.level.lock().map(|level| *level).unwrap_or(Level::INFO)
    }

    /// Initializes logging output to the console and, when a directory is
    /// configured, to a daily-rolling log file.
    pub fn initialize(&mut self) -> BridgeResult<()> {
        let console_filter = {
            let level = Arc::clone(&self.level);
            DynFilterFn::new(move |metadata, _| {
                let current = level.lock().map(|level| *level).unwrap_or(Level::INFO);
                metadata.level() <= &current
            })
        };
        let file_filter = {
            let level = Arc::clone(&self.level);
            DynFilterFn::new(move |metadata, _| {
                let current = level.lock().map(|level| *level).unwrap_or(Level::INFO);
                metadata.level() <= &current
            })
        };

        let console_layer = {
            #[cfg(debug_assertions)]
            let layer = fmt::layer()
                .pretty()
                .with_writer(std::io::stdout)
                .with_file(true)
                .with_line_number(true);

            #[cfg(not(debug_assertions))]
            let layer = fmt::layer()
                .with_writer(std::io::stdout)
                .with_file(false)
                .with_line_number(false);

            layer.with_filter(console_filter)
        };

        let file_layer = self.directory.clone().map(|directory| {
            let file_appender = rolling::daily(directory, "signet-bridge.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            self._file_guard = Some(guard);
            fmt::layer()
                .with_writer(non_blocking)
                .with_ansi(false)
                .with_filter(file_filter)
        });

        let subscriber = Registry::default().with(console_layer).with(file_layer);
        set_global_default(subscriber)
            .map_err(|_| BridgeError::ConfigurationError("logger already initialized".into()))
    }
}
