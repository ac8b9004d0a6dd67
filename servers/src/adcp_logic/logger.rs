use anyhow::Result;
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

const LOG_FILE_PREFIX: &str = "server_adcp_";

// Transport crates log every frame at debug level.
const QUIET_TARGETS: [&str; 3] = ["hyper", "tungstenite", "tokio_tungstenite"];

/// Installs the stdout + file logger.
///
/// `keep_files` earlier `server_adcp_*.log` files survive next to the new one.
pub fn setup_logging(log_dir: &Path, log_level: &str, keep_files: usize) -> Result<()> {
    if !log_dir.exists() {
        fs::create_dir_all(log_dir)?;
    }

    let removed = cleanup_old_logs(log_dir, keep_files)?;
    let log_path = log_file_path(log_dir, Local::now());
    let level = parse_level(log_level);

    let mut dispatch = fern::Dispatch::new()
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                Local::now().format("[%Y-%m-%d %H:%M:%S]"),
                record.target(),
                record.level(),
                message
            ))
        })
        .level(level);
    for target in QUIET_TARGETS {
        dispatch = dispatch.level_for(target, level.min(log::LevelFilter::Info));
    }
    dispatch
        .chain(std::io::stdout())
        .chain(fern::log_file(&log_path)?)
        .apply()?;

    log::info!("Logging to {} ({} old log file(s) pruned)", log_path.display(), removed);
    Ok(())
}

fn log_file_path(log_dir: &Path, started: DateTime<Local>) -> PathBuf {
    log_dir.join(format!("{}{}.log", LOG_FILE_PREFIX, started.format("%Y-%m-%d_%H-%M-%S")))
}

fn parse_level(log_level: &str) -> log::LevelFilter {
    log::LevelFilter::from_str(log_level).unwrap_or(log::LevelFilter::Info)
}

/// Deletes all but the newest `keep` hub log files. Returns how many were removed.
fn cleanup_old_logs(log_dir: &Path, keep: usize) -> Result<usize> {
    let mut entries: Vec<PathBuf> = fs::read_dir(log_dir)?
        .filter_map(|res| res.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().is_some_and(|ext| ext == "log"))
        .filter(|p| {
            p.file_name()
                .and_then(|name| name.to_str())
                .is_some_and(|name| name.starts_with(LOG_FILE_PREFIX))
        })
        .collect();

    // File names embed the start time: newest first.
    entries.sort_unstable_by(|a, b| b.cmp(a));

    let mut removed = 0;
    for path in entries.iter().skip(keep) {
        match fs::remove_file(path) {
            Ok(()) => removed += 1,
            Err(e) => eprintln!("Failed to delete old log file {:?}: {}", path, e),
        }
    }

    Ok(removed)
}
