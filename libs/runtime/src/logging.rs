use crate::config::{LoggingConfig, Section, DEFAULT_SECTION};
use parking_lot::Mutex;
use std::{
    io::{IsTerminal, Write},
    path::{Path, PathBuf},
    sync::Arc,
};
use tracing::{level_filters::LevelFilter, Level};
use tracing_subscriber::{filter::Targets, fmt};

use file_rotate::{
    compression::Compression,
    suffix::{AppendTimestamp, FileLimit},
    ContentLimit, FileRotate,
};

const DEFAULT_MAX_SIZE_MB: u64 = 100;

// -------- level helpers --------

fn parse_tracing_level(s: &str) -> Option<Level> {
    match s.to_ascii_lowercase().as_str() {
        "trace" => Some(Level::TRACE),
        "debug" => Some(Level::DEBUG),
        "info" => Some(Level::INFO),
        "warn" => Some(Level::WARN),
        "error" => Some(Level::ERROR),
        "off" | "none" => None,
        _ => Some(Level::INFO),
    }
}

fn level_filter(s: &str) -> LevelFilter {
    parse_tracing_level(s).map_or(LevelFilter::OFF, LevelFilter::from_level)
}

/// True if target == crate_name or target starts with "crate_name::"
fn matches_crate_prefix(target: &str, crate_name: &str) -> bool {
    target
        .strip_prefix(crate_name)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

fn crate_sections(cfg: &LoggingConfig) -> impl Iterator<Item = (&String, &Section)> {
    cfg.iter().filter(|(name, _)| name.as_str() != DEFAULT_SECTION)
}

// -------- rotating file writers --------

#[derive(Clone)]
struct RotWriter(Arc<Mutex<FileRotate<AppendTimestamp>>>);

impl Write for RotWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().write(buf)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.0.lock().flush()
    }
}

/// Writer for one record; `None` drops the record.
struct RoutedWriter(Option<RotWriter>);

impl Write for RoutedWriter {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match &mut self.0 {
            Some(w) => w.write(buf),
            None => Ok(buf.len()),
        }
    }

    fn flush(&mut self) -> std::io::Result<()> {
        match &mut self.0 {
            Some(w) => w.flush(),
            None => Ok(()),
        }
    }
}

/// Routes records to per-crate files by target prefix, falling back to the
/// default file. The longest matching crate prefix wins.
struct FileRouter {
    default: Option<RotWriter>,
    by_prefix: Vec<(String, RotWriter)>,
}

impl FileRouter {
    fn resolve_for(&self, target: &str) -> Option<RotWriter> {
        self.by_prefix
            .iter()
            .find(|(name, _)| matches_crate_prefix(target, name))
            .map(|(_, w)| w.clone())
            .or_else(|| self.default.clone())
    }

    fn is_empty(&self) -> bool {
        self.default.is_none() && self.by_prefix.is_empty()
    }
}

impl<'a> fmt::MakeWriter<'a> for FileRouter {
    type Writer = RoutedWriter;

    fn make_writer(&'a self) -> Self::Writer {
        RoutedWriter(self.default.clone())
    }

    fn make_writer_for(&'a self, meta: &tracing::Metadata<'_>) -> Self::Writer {
        RoutedWriter(self.resolve_for(meta.target()))
    }
}

/// Absolute paths are kept as-is; relative paths are joined with `base_dir`.
fn resolve_log_path(file: &str, base_dir: &Path) -> PathBuf {
    let p = Path::new(file);
    if p.is_absolute() {
        p.to_path_buf()
    } else {
        base_dir.join(p)
    }
}

fn create_rotating_writer_at_path(
    log_path: &Path,
    max_bytes: usize,
    max_backups: Option<usize>,
) -> std::io::Result<RotWriter> {
    if let Some(parent) = log_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let limit = match max_backups {
        Some(n) => FileLimit::MaxFiles(n),
        None => FileLimit::Age(chrono::Duration::days(1)),
    };

    let rot = FileRotate::new(
        log_path,
        AppendTimestamp::default(limit),
        ContentLimit::BytesSurpassed(max_bytes),
        Compression::None,
        #[cfg(unix)]
        None,
    );

    Ok(RotWriter(Arc::new(Mutex::new(rot))))
}

fn create_file_writer(name: &str, section: &Section, base_dir: &Path) -> Option<RotWriter> {
    if section.file.trim().is_empty() {
        return None;
    }

    let max_mb = section.max_size_mb.unwrap_or(DEFAULT_MAX_SIZE_MB);
    let max_bytes = usize::try_from(max_mb.saturating_mul(1024 * 1024)).unwrap_or(usize::MAX);
    let log_path = resolve_log_path(&section.file, base_dir);

    match create_rotating_writer_at_path(&log_path, max_bytes, section.max_backups) {
        Ok(writer) => Some(writer),
        Err(e) => {
            // The subscriber is not installed yet.
            eprintln!(
                "Failed to init log file for '{}': {} ({})",
                name,
                log_path.display(),
                e
            );
            None
        }
    }
}

fn build_file_router(cfg: &LoggingConfig, base_dir: &Path) -> FileRouter {
    let default = cfg
        .get(DEFAULT_SECTION)
        .and_then(|s| create_file_writer(DEFAULT_SECTION, s, base_dir));

    let mut by_prefix: Vec<(String, RotWriter)> = crate_sections(cfg)
        .filter_map(|(name, s)| create_file_writer(name, s, base_dir).map(|w| (name.clone(), w)))
        .collect();
    by_prefix.sort_by(|a, b| b.0.len().cmp(&a.0.len()));

    FileRouter { default, by_prefix }
}

// -------- filters --------

fn build_console_targets(cfg: &LoggingConfig) -> Targets {
    let default = cfg
        .get(DEFAULT_SECTION)
        .map_or(LevelFilter::INFO, |s| level_filter(&s.console_level));

    crate_sections(cfg).fold(Targets::new().with_default(default), |t, (name, s)| {
        t.with_target(name.clone(), level_filter(&s.console_level))
    })
}

fn build_file_targets(cfg: &LoggingConfig, router: &FileRouter) -> Targets {
    let has_default_file = router.default.is_some();
    let default = match cfg.get(DEFAULT_SECTION) {
        Some(s) if has_default_file => level_filter(&s.file_level),
        _ => LevelFilter::OFF,
    };

    crate_sections(cfg).fold(Targets::new().with_default(default), |t, (name, s)| {
        let has_file = has_default_file || router.by_prefix.iter().any(|(n, _)| n == name);
        let level = if has_file {
            level_filter(&s.file_level)
        } else {
            LevelFilter::OFF
        };
        t.with_target(name.clone(), level)
    })
}

// -------- public init --------

/// Install the global subscriber.
/// - `cfg`: subsystem sections; empty means a plain console subscriber
/// - `base_dir`: resolves relative log file paths (usually `home_dir`)
pub fn init_logging_from_config(cfg: &LoggingConfig, base_dir: &Path) {
    use tracing_subscriber::{prelude::*, Registry};

    // Bridge `log` → `tracing` before installing the subscriber
    let _ = tracing_log::LogTracer::init();

    if cfg.is_empty() {
        init_default_logging();
        return;
    }

    let console_layer = fmt::layer()
        .with_ansi(std::io::stdout().is_terminal())
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_filter(build_console_targets(cfg));

    let router = build_file_router(cfg, base_dir);
    if router.is_empty() {
        let _ = Registry::default().with(console_layer).try_init();
        return;
    }

    let file_targets = build_file_targets(cfg, &router);
    let file_layer = fmt::layer()
        .json()
        .with_ansi(false)
        .with_target(true)
        .with_level(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .with_writer(router)
        .with_filter(file_targets);

    let _ = Registry::default()
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

pub fn init_default_logging() {
    let _ = fmt()
        .with_target(true)
        .with_timer(fmt::time::UtcTime::rfc_3339())
        .try_init();
}
