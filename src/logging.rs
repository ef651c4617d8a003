use crate::config::Config;
use std::fs::{self, File, OpenOptions};
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::time::ChronoLocal;
use tracing_subscriber::{fmt, EnvFilter};

/// Installs the global subscriber. The terminal belongs to the UI, so nothing
/// is written unless logging is switched on.
pub fn init(config: &Config) -> Option<WorkerGuard> {
    if !config.log_enabled {
        return None;
    }

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(directive(&config.log_level)))
        .unwrap_or_else(|_| EnvFilter::new("commute_board=info"));

    let (writer, guard) = match open_log_file(config.log_file.trim()) {
        Some(file) => tracing_appender::non_blocking(file),
        None => tracing_appender::non_blocking(std::io::stderr()),
    };

    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .with_level(true)
        .with_target(false)
        .with_thread_names(true)
        .with_timer(ChronoLocal::new("%Y-%m-%d %H:%M:%S%.3f".to_string()))
        .compact()
        .finish();

    let _ = tracing::subscriber::set_global_default(subscriber);
    Some(guard)
}

/// A bare level applies to this crate only so reqwest/hyper chatter stays out;
/// anything containing `=` or `,` is passed through as a full directive.
fn directive(level: &str) -> String {
    let level = level.trim();
    if level.is_empty() {
        return "commute_board=info".to_string();
    }
    if level.contains('=') || level.contains(',') {
        return level.to_string();
    }
    format!("commute_board={}", level.to_ascii_lowercase())
}

fn open_log_file(path: &str) -> Option<File> {
    if path.is_empty() {
        return None;
    }
    let path = Path::new(path);
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            let _ = fs::create_dir_all(parent);
        }
    }
    OpenOptions::new().create(true).append(true).open(path).ok()
}

#[cfg(test)]
mod tests {
    use super::{directive, open_log_file};
    use std::time::{SystemTime, UNIX_EPOCH};

    #[test]
    fn bare_levels_are_scoped_to_the_crate() {
        assert_eq!(directive(""), "commute_board=info");
        assert_eq!(directive(" DEBUG "), "commute_board=debug");
        assert_eq!(directive("reqwest=warn,commute_board=trace"), "reqwest=warn,commute_board=trace");
    }

    #[test]
    fn log_file_creates_parent_dirs() {
        assert!(open_log_file("").is_none());
        let suffix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_nanos())
            .unwrap_or(0);
        let dir = std::env::temp_dir().join(format!("commute-board-log-test-{suffix}"));
        let path = dir.join("nested").join("board.log");
        assert!(open_log_file(path.to_str().unwrap()).is_some());
        assert!(path.exists());
        let _ = std::fs::remove_dir_all(&dir);
    }
}
