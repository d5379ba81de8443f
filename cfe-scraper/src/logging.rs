//! Process-wide tracing setup
//!
//! The subscriber goes in before configuration is resolved, so problems found
//! while loading config are logged. It starts at `RUST_LOG` (or `info`) and
//! switches to the configured level once that is known, unless `RUST_LOG` was
//! set.

use tracing::{debug, warn, Subscriber};
use tracing_subscriber::fmt::MakeWriter;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, reload, EnvFilter, Registry};

/// Level used until the configured one is applied
const BOOT_LEVEL: &str = "info";

/// Handle to the live filter of the installed subscriber
pub struct LogFilter {
    handle: reload::Handle<EnvFilter, Registry>,
    /// `RUST_LOG` chose the filter and wins over configuration
    from_env: bool,
}

impl LogFilter {
    /// Switch to the configured `level` directive
    pub fn apply_config_level(&self, level: &str) {
        if self.from_env {
            debug!(level, "RUST_LOG is set, ignoring configured log level");
            return;
        }

        let filter = match EnvFilter::try_new(level) {
            Ok(filter) => filter,
            Err(e) => {
                warn!("Invalid log level {:?}, staying at {}: {}", level, BOOT_LEVEL, e);
                return;
            }
        };

        if let Err(e) = self.handle.reload(filter) {
            warn!("Failed to apply log level {:?}: {}", level, e);
        }
    }
}

/// Install the global subscriber writing to stdout
pub fn init() -> LogFilter {
    let (subscriber, filter) = subscriber(EnvFilter::try_from_default_env().ok(), std::io::stdout);
    subscriber.init();
    filter
}

fn subscriber<W>(env_filter: Option<EnvFilter>, writer: W) -> (impl Subscriber + Send + Sync, LogFilter)
where
    W: for<'w> MakeWriter<'w> + Send + Sync + 'static,
{
    let from_env = env_filter.is_some();
    let (layer, handle) =
        reload::Layer::new(env_filter.unwrap_or_else(|| EnvFilter::new(BOOT_LEVEL)));

    let subscriber = tracing_subscriber::registry()
        .with(layer)
        .with(fmt::layer().with_writer(writer));

    (subscriber, LogFilter { handle, from_env })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;
    use std::sync::{Arc, Mutex};
    use tracing::info;

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    impl io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn captured_subscriber(
        env_filter: Option<EnvFilter>,
    ) -> (Captured, impl Subscriber + Send + Sync, LogFilter) {
        let captured = Captured::default();
        let writer = captured.clone();
        let (subscriber, filter) = subscriber(env_filter, move || writer.clone());
        (captured, subscriber, filter)
    }

    #[test]
    fn test_boot_level_logs_before_config() {
        let (captured, subscriber, _filter) = captured_subscriber(None);

        tracing::subscriber::with_default(subscriber, || {
            warn!("config file unreadable");
            info!("resolving configuration");
            debug!("candidate paths");
        });

        let text = captured.text();
        assert!(text.contains("config file unreadable"));
        assert!(text.contains("resolving configuration"));
        assert!(!text.contains("candidate paths"));
    }

    #[test]
    fn test_configured_level_replaces_boot_level() {
        let (captured, subscriber, filter) = captured_subscriber(None);

        tracing::subscriber::with_default(subscriber, || {
            debug!("before reload");
            filter.apply_config_level("debug");
            debug!("after reload");
            filter.apply_config_level("warn");
            info!("quiet again");
        });

        let text = captured.text();
        assert!(!text.contains("before reload"));
        assert!(text.contains("after reload"));
        assert!(!text.contains("quiet again"));
    }

    #[test]
    fn test_env_filter_wins_over_configured_level() {
        let (captured, subscriber, filter) = captured_subscriber(Some(EnvFilter::new("warn")));

        tracing::subscriber::with_default(subscriber, || {
            filter.apply_config_level("debug");
            info!("suppressed by env");
            warn!("kept by env");
        });

        let text = captured.text();
        assert!(!text.contains("suppressed by env"));
        assert!(text.contains("kept by env"));
    }

    #[test]
    fn test_invalid_level_keeps_boot_level() {
        let (captured, subscriber, filter) = captured_subscriber(None);

        tracing::subscriber::with_default(subscriber, || {
            filter.apply_config_level("cfe_scraper=loudest");
            info!("still at info");
        });

        let text = captured.text();
        assert!(text.contains("Invalid log level"));
        assert!(text.contains("still at info"));
    }
}
