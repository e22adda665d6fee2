use chrono::Local;
use std::fmt;
use std::sync::OnceLock;
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::FmtContext;
use tracing_subscriber::fmt::format::{FormatEvent, FormatFields, Writer};
use tracing_subscriber::prelude::*;
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Registry, reload};

// ANSI 颜色代码
const GRAY: &str = "\x1b[90m";
const RESET: &str = "\x1b[0m";
const CYAN: &str = "\x1b[36m";

/// 统一日志格式
/// 格式: [Time] [LEVEL] [Target      ] Message
pub struct ConsoleFormat;

/// Level 颜色与标签
pub fn level_style(level: &Level) -> (&'static str, &'static str) {
    match *level {
        Level::INFO => ("\x1b[32m", "INFO"),  // Green
        Level::WARN => ("\x1b[33m", "WARN"),  // Yellow
        Level::ERROR => ("\x1b[31m", "ERRO"), // Red
        Level::DEBUG => ("\x1b[34m", "DEBG"), // Blue
        Level::TRACE => ("\x1b[90m", "TRAC"),
    }
}

impl<S, N> FormatEvent<S, N> for ConsoleFormat
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let meta = event.metadata();
        let now = Local::now().format("%H:%M:%S");
        let (color, level_str) = level_style(meta.level());

        write!(
            writer,
            "{}[{}] {}[{}] {} {}[{}]{} ",
            GRAY,
            now,
            color,
            level_str,
            RESET,
            CYAN,
            meta.target(),
            RESET
        )?;
        ctx.field_format().format_fields(writer.by_ref(), event)?;
        writeln!(writer)
    }
}

/// 运行时调整过滤级别
static FILTER: OnceLock<reload::Handle<EnvFilter, Registry>> = OnceLock::new();

fn filter_for(debug: bool) -> EnvFilter {
    let default_level = if debug { "debug" } else { "info" };
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// 初始化全局日志
///
/// 优先读取 `RUST_LOG`，否则按 `debug` 开关选择 `debug` 或 `info`。
/// 重复调用不会报错。
pub fn init(debug: bool) {
    let (filter, handle) = reload::Layer::new(filter_for(debug));
    let installed = tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().event_format(ConsoleFormat))
        .try_init();
    if installed.is_ok() {
        let _ = FILTER.set(handle);
    }
}

/// 切换调试日志，`RUST_LOG` 存在时仍以它为准
pub fn set_debug(debug: bool) {
    if let Some(handle) = FILTER.get() {
        let _ = handle.reload(filter_for(debug));
    }
}
