use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};
use std::time::{SystemTime, UNIX_EPOCH};

use tracing_subscriber::EnvFilter;

const LOG_FILE_NAME: &str = "hotbar.log";
const ARCHIVE_PREFIX: &str = "hotbar-";
const MAX_LOG_BYTES: u64 = 1_000_000;
const MAX_ARCHIVES: usize = 5;

static PANIC_HOOK_INSTALLED: OnceLock<()> = OnceLock::new();

/// Routes `tracing` output to `<log_dir>/hotbar.log`, rotating the file once it
/// passes 1 MB and keeping the five newest archives.
///
/// A subscriber installed earlier (by a host application or another test)
/// wins; the file is still rotated and the panic hook still installed.
pub fn init(log_dir: &Path) -> Result<PathBuf, std::io::Error> {
    fs::create_dir_all(log_dir)?;
    let log_path = log_dir.join(LOG_FILE_NAME);
    rotate_if_needed(&log_path, log_dir)?;

    let file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_path)?;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .with_target(false)
        .with_writer(Mutex::new(file))
        .try_init();

    install_panic_hook();
    Ok(log_path)
}

fn now_secs() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}

fn rotate_if_needed(log_path: &Path, log_dir: &Path) -> Result<(), std::io::Error> {
    let meta = match fs::metadata(log_path) {
        Ok(meta) => meta,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(err) => return Err(err),
    };

    if meta.len() < MAX_LOG_BYTES {
        return Ok(());
    }

    let stamp = now_secs();
    let archived = log_dir.join(format!("{ARCHIVE_PREFIX}{stamp}.log"));
    fs::rename(log_path, archived)?;
    prune_old_archives(log_dir)?;
    Ok(())
}

fn prune_old_archives(log_dir: &Path) -> Result<(), std::io::Error> {
    let mut archives = fs::read_dir(log_dir)?
        .filter_map(|entry| entry.ok())
        .map(|entry| entry.path())
        .filter(|path| {
            path.file_name()
                .and_then(|n| n.to_str())
                .map(|n| n.starts_with(ARCHIVE_PREFIX) && n.ends_with(".log"))
                .unwrap_or(false)
        })
        .collect::<Vec<_>>();

    archives.sort();
    while archives.len() > MAX_ARCHIVES {
        let oldest = archives.remove(0);
        let _ = fs::remove_file(oldest);
    }
    Ok(())
}

fn install_panic_hook() {
    let _ = PANIC_HOOK_INSTALLED.get_or_init(|| {
        let prior = std::panic::take_hook();
        std::panic::set_hook(Box::new(move |panic_info| {
            let location = panic_info
                .location()
                .map(|l| format!("{}:{}", l.file(), l.line()))
                .unwrap_or_else(|| "unknown".to_string());
            let payload = panic_info
                .payload()
                .downcast_ref::<&str>()
                .map(|s| (*s).to_string())
                .or_else(|| panic_info.payload().downcast_ref::<String>().cloned())
                .unwrap_or_else(|| "panic payload unavailable".to_string());
            tracing::error!("panic at {location}: {payload}");
            prior(panic_info);
        }));
    });
}
