//! 日志初始化。

use tracing_subscriber::{EnvFilter, fmt};

/// 安装全局 fmt 订阅者，过滤规则取自 `RUST_LOG`，默认 info。
/// 重复调用无副作用。
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt().with_env_filter(filter).try_init();
}
