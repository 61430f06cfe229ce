// 日志工具模块
//
// 封装 flexi_logger 的初始化和关闭操作，确保异步日志正确 flush。
// 库代码只使用 log 门面，这里的初始化由测试与下游二进制调用。

use flexi_logger::{Logger, LoggerHandle, WriteMode};
use std::sync::Mutex;

/// 全局日志句柄，用于程序退出时 flush
static LOGGER_HANDLE: Mutex<Option<LoggerHandle>> = Mutex::new(None);

/// 初始化日志系统，输出到 stderr
///
/// 重复初始化返回错误，由调用方忽略或处理。
pub fn init(spec: &str) -> Result<(), Box<dyn std::error::Error>> {
    let handle = Logger::try_with_str(spec)?
        .log_to_stderr()
        .write_mode(WriteMode::Async)
        .start()?;

    if let Ok(mut guard) = LOGGER_HANDLE.lock() {
        *guard = Some(handle);
    }

    log::debug!("日志系统初始化完成: {}", spec);
    Ok(())
}

/// 刷新并关闭日志系统
///
/// 在程序退出前调用，确保所有异步日志都已写入。
pub fn shutdown() {
    if let Ok(mut guard) = LOGGER_HANDLE.lock() {
        if let Some(handle) = guard.take() {
            handle.flush();
        }
    }
}

/// 检查日志系统是否已初始化
pub fn is_initialized() -> bool {
    LOGGER_HANDLE
        .lock()
        .map(|guard| guard.is_some())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shutdown_without_init_is_noop() {
        shutdown();
        assert!(!is_initialized());
    }
}
