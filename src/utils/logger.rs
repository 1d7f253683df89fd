use crate::shared::constants;
use lazy_static::lazy_static;
use parking_lot::Mutex;
use std::backtrace::Backtrace;
use std::fs::OpenOptions;
use std::io::Write;
use std::panic;
use std::path::{Path, PathBuf};

#[derive(Clone)]
struct LoggerPaths {
    error_path: PathBuf,
    debug_path: PathBuf,
    echo_stderr: bool,
}

lazy_static! {
    static ref LOGGER: Mutex<Option<LoggerPaths>> = Mutex::new(None);
}

fn append_line(path: &Path, line: &str) {
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(path) {
        let _ = writeln!(file, "{}", line);
    }
}

fn start_file(path: &Path, title: &str) {
    if let Ok(mut file) = OpenOptions::new()
        .create(true)
        .write(true)
        .truncate(true)
        .open(path)
    {
        let _ = writeln!(file, "=== {} Started: {} ===", title, chrono::Local::now());
    }
}

/// Routes log lines to `error.log` / `debug.log` under `dir` (current directory
/// when `None`). Until this is called every log function is a no-op.
pub fn init(dir: Option<&Path>, echo_stderr: bool) {
    let base = match dir {
        Some(d) => d.to_path_buf(),
        None => std::env::current_dir().unwrap_or_default(),
    };
    let _ = std::fs::create_dir_all(&base);
    let error_path = base.join(constants::ERROR_LOG_FILE);
    let debug_path = base.join(constants::DEBUG_LOG_FILE);

    start_file(&error_path, "Error Log");
    start_file(&debug_path, "Debug Log");

    let paths = LoggerPaths {
        error_path,
        debug_path,
        echo_stderr,
    };
    *LOGGER.lock() = Some(paths.clone());

    panic::set_hook(Box::new(move |info| {
        let backtrace = Backtrace::capture();
        let msg = match info.payload().downcast_ref::<&str>() {
            Some(s) => *s,
            None => match info.payload().downcast_ref::<String>() {
                Some(s) => &s[..],
                None => "Box<Any>",
            },
        };

        let location = info
            .location()
            .map(|l| format!("{}:{}", l.file(), l.line()))
            .unwrap_or_else(|| "unknown".to_string());

        let thread = std::thread::current();
        let error_msg = format!(
            "\nCRITICAL PANIC in thread '{}' at {}:\nMessage: {}\nBacktrace:\n{:?}\n",
            thread.name().unwrap_or("<unnamed>"),
            location,
            msg,
            backtrace
        );

        append_line(&paths.error_path, &error_msg);
        append_line(&paths.debug_path, &error_msg);
        eprintln!("panic: {} (see {})", msg, paths.error_path.display());
    }));
}

pub fn log(level: &str, msg: &str) {
    let paths = match LOGGER.lock().as_ref() {
        Some(p) => p.clone(),
        None => return,
    };

    let timestamp = chrono::Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}][{}] {}", timestamp, level, msg);
    append_line(&paths.debug_path, &line);

    if level == "ERROR" {
        append_line(&paths.error_path, &line);
    }
    if paths.echo_stderr && level != "DEBUG" {
        eprintln!("{}", line);
    }
}

pub fn info(msg: &str) {
    log("INFO", msg);
}

pub fn warn(msg: &str) {
    log("WARN", msg);
}

pub fn error(msg: &str) {
    log("ERROR", msg);
}

pub fn debug(msg: &str) {
    log("DEBUG", msg);
}
