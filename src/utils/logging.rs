//! Logging setup and training progress lines
//!
//! Library code logs through `tracing` macros; the binary installs a
//! `tracing-subscriber` formatter once at startup. Log lines go to stderr so
//! they never interleave with session output on stdout.

use std::time::Instant;

use tracing::{error, info, Level};
use tracing_subscriber::FmtSubscriber;

/// Subscriber settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogConfig {
    pub level: Level,
    /// Print the module path of each event
    pub show_target: bool,
    pub ansi: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            show_target: false,
            ansi: true,
        }
    }
}

impl LogConfig {
    /// Debug level with module paths
    pub fn verbose() -> Self {
        Self {
            level: Level::DEBUG,
            show_target: true,
            ..Self::default()
        }
    }

    /// Warnings and errors only
    pub fn quiet() -> Self {
        Self {
            level: Level::WARN,
            ..Self::default()
        }
    }

    /// Pick a preset from the CLI flags; `verbose` wins over `quiet`
    pub fn from_flags(verbose: bool, quiet: bool) -> Self {
        match (verbose, quiet) {
            (true, _) => Self::verbose(),
            (false, true) => Self::quiet(),
            (false, false) => Self::default(),
        }
    }
}

/// Install the global subscriber
///
/// Fails if one is already installed.
pub fn init_logging(config: &LogConfig) -> Result<(), String> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(config.level)
        .with_target(config.show_target)
        .with_ansi(config.ansi)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .map_err(|e| format!("cannot install log subscriber: {e}"))
}

/// Per-epoch progress lines for the trainer
#[derive(Debug)]
pub struct TrainingLogger {
    epoch: usize,
    total_epochs: usize,
    epoch_start: Instant,
    run_start: Instant,
}

impl TrainingLogger {
    pub fn new(total_epochs: usize) -> Self {
        let now = Instant::now();
        Self {
            epoch: 0,
            total_epochs,
            epoch_start: now,
            run_start: now,
        }
    }

    pub fn start_epoch(&mut self, epoch: usize) {
        self.epoch = epoch;
        self.epoch_start = Instant::now();
        info!("Epoch {}/{}", epoch + 1, self.total_epochs);
    }

    /// Seconds left if the remaining epochs take as long as the average so far
    pub fn eta_secs(&self) -> f64 {
        let done = self.epoch + 1;
        let remaining = self.total_epochs.saturating_sub(done);
        self.run_start.elapsed().as_secs_f64() / done as f64 * remaining as f64
    }

    /// `val_accuracy` is a fraction in `[0, 1]`
    pub fn end_epoch(&self, train_loss: f64, val_loss: f64, val_accuracy: f64) {
        info!(
            "Epoch {}/{} done in {:.1}s: loss {:.4}, val_loss {:.4}, val_accuracy {:.2}% (eta {:.0}s)",
            self.epoch + 1,
            self.total_epochs,
            self.epoch_start.elapsed().as_secs_f64(),
            train_loss,
            val_loss,
            val_accuracy * 100.0,
            self.eta_secs()
        );
    }

    pub fn log_failure(&self, completed_epochs: usize, cause: &str) {
        error!(
            "An error occurred during training after {}/{} epoch(s): {}",
            completed_epochs, self.total_epochs, cause
        );
    }

    pub fn log_complete(&self, final_val_accuracy: f64) {
        info!(
            "Finished {} epoch(s) in {:.1}s, final val_accuracy {:.2}%",
            self.total_epochs,
            self.run_start.elapsed().as_secs_f64(),
            final_val_accuracy * 100.0
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets() {
        assert_eq!(LogConfig::default().level, Level::INFO);
        assert_eq!(LogConfig::verbose().level, Level::DEBUG);
        assert!(LogConfig::verbose().show_target);
        assert_eq!(LogConfig::quiet().level, Level::WARN);
    }

    #[test]
    fn test_from_flags() {
        assert_eq!(LogConfig::from_flags(true, true), LogConfig::verbose());
        assert_eq!(LogConfig::from_flags(false, true), LogConfig::quiet());
        assert_eq!(LogConfig::from_flags(false, false), LogConfig::default());
    }

    #[test]
    fn test_second_init_reports_error() {
        let _ = init_logging(&LogConfig::quiet());
        assert!(init_logging(&LogConfig::quiet()).is_err());
    }

    #[test]
    fn test_eta_after_last_epoch_is_zero() {
        let mut logger = TrainingLogger::new(3);
        logger.start_epoch(2);
        assert_eq!(logger.epoch, 2);
        assert_eq!(logger.eta_secs(), 0.0);
    }
}
