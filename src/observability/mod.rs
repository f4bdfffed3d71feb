//! 可观测性：tracing 日志初始化

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// 初始化日志：默认 info，可通过 RUST_LOG 覆盖；输出到 stderr，不干扰 REPL 的标准输出
///
/// 重复调用无副作用。
pub fn init() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(LevelFilter::INFO.into()))
        .with(fmt::layer().with_writer(std::io::stderr))
        .try_init();
}
