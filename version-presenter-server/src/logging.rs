//!
//! Utilities for logging.
//!
use std::time::Instant;

use anyhow::Result;
use flexi_logger::writers::LogWriter;
use flexi_logger::{Cleanup, Criterion, DeferredNow, Duplicate, FileSpec, LogSpecification, Logger, LoggerHandle, Naming};
use log::Record;
use log::{debug, error};
use poem::{Endpoint, Middleware, Request};
use serde::Serialize;

use crate::config::{LogLevel, Logging, SyslogTransport};

/// Middleware for poem http server to add query logging
///
/// Successful queries are logged at the debug level. Errors at the error level.
/// All logs include the time elapsed processing the request.
pub struct LoggerMiddleware;

impl<E: Endpoint> Middleware<E> for LoggerMiddleware {
    type Output = LoggerMiddlewareImpl<E>;

    fn transform(&self, ep: E) -> Self::Output {
        LoggerMiddlewareImpl { ep }
    }
}

/// Endpoint wrapper that implements the details of `LoggerMiddleware`
pub struct LoggerMiddlewareImpl<E> {
    /// Inner endpoint wrapped by this object
    ep: E,
}

impl<E: Endpoint> Endpoint for LoggerMiddlewareImpl<E> {
    type Output = E::Output;

    async fn call(&self, req: Request) -> poem::Result<Self::Output> {
        let start = Instant::now();
        let uri = req.uri().clone();
        debug!("starting request for {uri}");
        match self.ep.call(req).await {
            Ok(resp) => {
                debug!("request for {uri} handled ({} ms)", start.elapsed().as_millis());
                Ok(resp)
            },
            Err(err) => {
                error!("error handling {uri} ({} ms) {err}", start.elapsed().as_millis());
                Err(err)
            },
        }
    }
}


/// Name used for the service in syslog and json log lines
const SERVICE_NAME: &str = "version-presenter";

/// Bytes written to a log file before it is rotated
const ROTATE_SIZE: u64 = 10 * 1024 * 1024;

static INIT_LOGGING: parking_lot::Mutex<bool> = parking_lot::Mutex::new(false);
static HOSTNAME: std::sync::OnceLock<String> = std::sync::OnceLock::new();
static LOCAL_IP: std::sync::OnceLock<String> = std::sync::OnceLock::new();

/// Map the configured level onto the levels of the log crate, `None` if logging is off
fn log_level(level: LogLevel) -> Option<log::Level> {
    match level {
        LogLevel::Debug => Some(log::Level::Debug),
        LogLevel::Info => Some(log::Level::Info),
        LogLevel::Warning => Some(log::Level::Warn),
        LogLevel::Error => Some(log::Level::Error),
        // nothing above error in this framework so we flatten it all to error
        LogLevel::Critical => Some(log::Level::Error),
        LogLevel::Disabled => None,
    }
}

/// Log specification, WARN for everything except our own crates
fn log_spec(level: log::Level) -> String {
    format!("warn, version_presenter={level}, version_presenter_server={level}")
}

/// Writer passing each record on to every inner writer whose level admits it
#[derive(Default)]
struct FanOutWriter {
    writers: Vec<Box<dyn LogWriter>>,
}

impl LogWriter for FanOutWriter {
    fn write(&self, now: &mut DeferredNow, record: &Record) -> std::io::Result<()> {
        for writer in &self.writers {
            if record.level() <= writer.max_log_level() {
                writer.write(now, record)?;
            }
        }
        Ok(())
    }

    fn flush(&self) -> std::io::Result<()> {
        for writer in &self.writers {
            writer.flush()?;
        }
        Ok(())
    }

    fn max_log_level(&self) -> log::LevelFilter {
        self.writers.iter().map(|writer| writer.max_log_level()).max().unwrap_or(log::LevelFilter::Off)
    }

    fn shutdown(&self) {
        for writer in &self.writers {
            writer.shutdown();
        }
    }
}

pub fn configure_logging(config: &Logging) -> Result<LoggerHandle> {
    // make sure we only init logging once
    {
        let mut init = INIT_LOGGING.lock();
        if *init {
            return Err(anyhow::anyhow!("Logger double initalized"))
        }
        *init = true;

        HOSTNAME.get_or_init(|| gethostname::gethostname().to_string_lossy().into_owned());
        LOCAL_IP.get_or_init(|| match local_ip_address::local_ip() {
            Ok(ip) => ip.to_string(),
            Err(_) => "<unknown>".to_owned(),
        });
    }

    Ok(build_logger(config)?.start()?)
}

/// Assemble the logger described by the configuration without installing it
fn build_logger(config: &Logging) -> Result<Logger> {
    use flexi_logger::writers::{FileLogWriter, Syslog, SyslogWriter};

    // if logging is disabled initilize the backend with the filter set to ignore all
    let Some(log_level) = log_level(config.log_level) else {
        return Ok(Logger::with(LogSpecification::off()).do_not_log())
    };

    let spec = LogSpecification::env_or_parse(log_spec(log_level))?;

    let formatter = if config.log_as_json {
        json_format
    } else {
        basic_format
    };

    // files and syslog all hang off one primary writer, console output is duplicated from it
    let mut outputs = FanOutWriter::default();

    if config.log_to_file {
        let log_directory = config.log_directory.clone();
        if !log_directory.exists() {
            println!("Warning: log directory does not exist. Will try to create {}", log_directory.to_string_lossy());
            std::fs::create_dir_all(&log_directory)?;
        }

        // one rotating file per threshold, each holding everything at or above it
        let files = [
            ("dbg", log::LevelFilter::Debug),
            ("log", log::LevelFilter::Info),
            ("err", log::LevelFilter::Error),
        ];
        for (suffix, max_level) in files {
            if log_level.to_level_filter() < max_level {
                continue
            }
            outputs.writers.push(Box::new(FileLogWriter::builder(FileSpec::default().directory(&log_directory).suffix(suffix))
                .append()
                .max_level(max_level)
                .rotate(Criterion::Size(ROTATE_SIZE), Naming::Numbers, Cleanup::KeepLogFiles(5))
                .format(formatter)
                .try_build()?));
        }
    }

    if config.log_to_syslog {
        let connection = match config.syslog_transport {
            SyslogTransport::Udp => Syslog::try_udp(("0.0.0.0", 0), (config.syslog_host.as_str(), config.syslog_port))?,
            SyslogTransport::Tcp => Syslog::try_tcp((config.syslog_host.as_str(), config.syslog_port))?,
        };
        outputs.writers.push(SyslogWriter::try_new(
            flexi_logger::writers::SyslogFacility::SystemDaemons,
            None,
            log_level.to_level_filter(),
            SERVICE_NAME.to_owned(),
            connection
        )?);
    }

    // build our log handler
    let builder = Logger::with(spec).format(formatter);
    let builder = match (outputs.writers.is_empty(), config.log_to_console) {
        (true, true) => builder.log_to_stdout(),
        (true, false) => builder.do_not_log(),
        (false, true) => builder
            .log_to_writer(Box::new(outputs))
            .duplicate_to_stdout(Duplicate::All)
            .format_for_stdout(formatter),
        (false, false) => builder.log_to_writer(Box::new(outputs)),
    };
    Ok(builder)
}

fn basic_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    let time = now.format_rfc3339();
    let level = record.level();
    let name = record.module_path().unwrap_or("<unknown>");
    let message = record.args();
    let process = std::process::id();
    let hostname = HOSTNAME.get().map_or("<unknown>", |row|row.as_str());

    write!(w, "{time:-16} {level:8} {hostname} {process} {name:40} | {message}")
}

#[derive(Serialize)]
struct LogLineEvent<'b> {
    module: &'static str,
    dataset: &'b str,
}

#[derive(Serialize)]
struct LogLineHost<'b> {
    ip: &'b str,
    hostname: &'b str,
}

#[derive(Serialize)]
struct LogLineLevel<'b> {
    level: &'static str,
    logger: &'b str,
}

#[derive(Serialize)]
struct LogLineProcess<'b> {
    pid: &'b str,
}

#[derive(Serialize)]
struct LogLine<'a, 'b> {
    #[serde(rename="@timestamp")]
    timestamp: String,
    event: LogLineEvent<'b>,
    host: LogLineHost<'b>,
    log: LogLineLevel<'b>,
    process: LogLineProcess<'b>,
    message: &'a std::fmt::Arguments<'a>,
}

fn json_format(
    w: &mut dyn std::io::Write,
    now: &mut DeferredNow,
    record: &Record,
) -> Result<(), std::io::Error> {
    let module = record.module_path().unwrap_or("<unknown>");
    let hostname = HOSTNAME.get().map_or("<unknown>", |row|row.as_str());
    let ip = LOCAL_IP.get().map_or("<unknown>", |row|row.as_str());
    let process = std::process::id().to_string();

    let line = LogLine {
        timestamp: now.format_rfc3339(),
        event: LogLineEvent { module: SERVICE_NAME, dataset: module },
        host: LogLineHost { ip, hostname },
        log: LogLineLevel { level: record.level().as_str(), logger: module },
        process: LogLineProcess { pid: &process },
        message: record.args(),
    };

    serde_json::to_writer(w, &line)?;
    Ok(())
}


#[cfg(test)]
mod test {
    use flexi_logger::DeferredNow;
    use log::Log;

    use super::{basic_format, build_logger, json_format, log_level, log_spec};
    use crate::config::{LogLevel, Logging};

    /// Contents of every file in `dir` with the given extension
    fn read_logs(dir: &std::path::Path, extension: &str) -> String {
        let mut body = String::new();
        for entry in std::fs::read_dir(dir).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(extension) {
                body += &std::fs::read_to_string(&path).unwrap();
            }
        }
        body
    }

    #[test]
    fn levels() {
        assert_eq!(log_level(LogLevel::Warning), Some(log::Level::Warn));
        assert_eq!(log_level(LogLevel::Critical), Some(log::Level::Error));
        assert_eq!(log_level(LogLevel::Disabled), None);
        assert_eq!(log_spec(log::Level::Debug), "warn, version_presenter=DEBUG, version_presenter_server=DEBUG");
    }

    #[test]
    fn json_lines() {
        let mut output = vec![];
        let mut now = DeferredNow::new();
        json_format(&mut output, &mut now, &log::Record::builder()
            .args(format_args!("serving \"1.2.0-BLUE\""))
            .level(log::Level::Info)
            .module_path(Some("version_presenter_server::server"))
            .build()
        ).unwrap();

        let line: serde_json::Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(line["message"], "serving \"1.2.0-BLUE\"");
        assert_eq!(line["log"]["level"], "INFO");
        assert_eq!(line["event"]["module"], "version-presenter");
        assert_eq!(line["event"]["dataset"], "version_presenter_server::server");
        assert!(line["@timestamp"].is_string());
        assert!(line["process"]["pid"].is_string());
    }

    #[test]
    fn basic_lines() {
        let mut output = vec![];
        let mut now = DeferredNow::new();
        basic_format(&mut output, &mut now, &log::Record::builder()
            .args(format_args!("resolved color orange"))
            .level(log::Level::Warn)
            .build()
        ).unwrap();

        let line = String::from_utf8(output).unwrap();
        assert!(line.ends_with("| resolved color orange"));
        assert!(line.contains("WARN"));
        assert!(line.contains("<unknown>"));
    }

    #[test]
    fn file_outputs() {
        let dir = tempfile::tempdir().unwrap();
        let config = Logging {
            log_level: LogLevel::Debug,
            log_to_console: false,
            log_to_file: true,
            log_directory: dir.path().to_owned(),
            log_as_json: false,
            ..Default::default()
        };

        // build without installing, other tests own the global logger
        let (logger, handle) = build_logger(&config).unwrap().build().unwrap();
        let module = "version_presenter_server::web";
        for (level, message) in [
            (log::Level::Debug, "resolving version"),
            (log::Level::Info, "page served"),
            (log::Level::Error, "render failed"),
        ] {
            logger.log(&log::Record::builder()
                .args(format_args!("{message}"))
                .level(level)
                .target(module)
                .module_path(Some(module))
                .build());
        }
        handle.flush();

        let debug = read_logs(dir.path(), "dbg");
        assert!(debug.contains("resolving version"));
        assert!(debug.contains("page served"));
        assert!(debug.contains("render failed"));

        let info = read_logs(dir.path(), "log");
        assert!(!info.contains("resolving version"));
        assert!(info.contains("page served"));
        assert!(info.contains("render failed"));

        let errors = read_logs(dir.path(), "err");
        assert!(!errors.contains("page served"));
        assert!(errors.contains("render failed"));
    }

    #[test]
    fn info_level_skips_debug_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = Logging {
            log_level: LogLevel::Info,
            log_to_console: false,
            log_to_file: true,
            log_directory: dir.path().join("nested"),
            ..Default::default()
        };

        let (logger, handle) = build_logger(&config).unwrap().build().unwrap();
        let module = "version_presenter_server::web";
        logger.log(&log::Record::builder()
            .args(format_args!("page served"))
            .level(log::Level::Info)
            .target(module)
            .module_path(Some(module))
            .build());
        handle.flush();

        assert!(dir.path().join("nested").is_dir());
        assert!(read_logs(&dir.path().join("nested"), "dbg").is_empty());
        let line: serde_json::Value = serde_json::from_str(read_logs(&dir.path().join("nested"), "log").trim()).unwrap();
        assert_eq!(line["message"], "page served");
    }
}
