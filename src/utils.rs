use std::io::{self, Write};

use tracing_subscriber::fmt::MakeWriter;

#[cfg(feature = "console_error_panic_hook")]
pub fn set_panic_hook() {
    console_error_panic_hook::set_once();
}

#[cfg(not(feature = "console_error_panic_hook"))]
pub fn set_panic_hook() {}

/// 缓冲一条格式化后的日志，在 drop 时整行输出。
pub struct ConsoleWriter {
    buffer: Vec<u8>,
}

impl Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buffer.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        let line = String::from_utf8_lossy(&self.buffer);
        let line = line.trim_end();
        if line.is_empty() {
            return;
        }
        emit(line);
    }
}

#[cfg(target_arch = "wasm32")]
fn emit(line: &str) {
    web_sys::console::log_1(&line.into());
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(line: &str) {
    eprintln!("{line}");
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MakeConsoleWriter;

impl<'a> MakeWriter<'a> for MakeConsoleWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter { buffer: Vec::new() }
    }
}

/// 把 `tracing` 事件接到浏览器控制台（原生目标下为 stderr）。重复调用返回 false。
pub fn init_logging() -> bool {
    tracing_subscriber::fmt()
        .with_writer(MakeConsoleWriter)
        .with_ansi(false)
        .without_time()
        .with_max_level(tracing::Level::DEBUG)
        .try_init()
        .is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writer_buffers_until_dropped() {
        let mut writer = MakeConsoleWriter.make_writer();
        writer.write_all(b"DEBUG session created\n").expect("buffer write");
        assert_eq!(writer.buffer, b"DEBUG session created\n");
    }

    #[test]
    fn logging_installs_once() {
        let first = init_logging();
        let second = init_logging();
        assert!(!second, "second install must not replace the subscriber");
        if first {
            tracing::debug!(round = 1, "logging installed");
        }
    }
}
