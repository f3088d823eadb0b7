//! Printing facilities.
//!
//! Lines end up in an in-kernel ring buffer that [`dmesg`] snapshots, the
//! way `printk` feeds the kernel log.

use alloc::{collections::VecDeque, string::String, vec::Vec};
use core::{cmp, fmt};

use spin::Mutex;

// From kernel/print/printk.c
const LOG_LINE_MAX: usize = 1024 - 32;
const LOG_RING_LINES: usize = 512;

static LOG_RING: Mutex<VecDeque<String>> = Mutex::new(VecDeque::new());

/// Console log levels, the `KERN_*` prefixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Level {
    Emerg = 0,
    Alert,
    Crit,
    Err,
    Warning,
    Notice,
    Info,
    Debug,
}

impl Level {
    fn prefix(self) -> &'static str {
        match self {
            Level::Emerg => "<0>",
            Level::Alert => "<1>",
            Level::Crit => "<2>",
            Level::Err => "<3>",
            Level::Warning => "<4>",
            Level::Notice => "<5>",
            Level::Info => "<6>",
            Level::Debug => "<7>",
        }
    }
}

#[doc(hidden)]
pub struct LogLineWriter {
    data: [u8; LOG_LINE_MAX],
    pos: usize,
}

#[allow(clippy::new_without_default)]
impl LogLineWriter {
    pub fn new() -> LogLineWriter {
        LogLineWriter {
            data: [0u8; LOG_LINE_MAX],
            pos: 0,
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data[..self.pos]
    }
}

impl fmt::Write for LogLineWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        let copy_len = cmp::min(LOG_LINE_MAX - self.pos, s.len());
        self.data[self.pos..self.pos + copy_len].copy_from_slice(&s.as_bytes()[..copy_len]);
        self.pos += copy_len;
        Ok(())
    }
}

#[doc(hidden)]
pub fn printk(level: Level, args: fmt::Arguments<'_>) {
    let mut writer = LogLineWriter::new();
    // Overlong lines are truncated by the writer, it never reports an error.
    let _ = fmt::write(&mut writer, args);
    let text = String::from_utf8_lossy(writer.as_bytes());

    let mut line = String::with_capacity(text.len() + 3);
    line.push_str(level.prefix());
    line.push_str(text.trim_end_matches('\n'));

    let mut ring = LOG_RING.lock();
    if ring.len() == LOG_RING_LINES {
        ring.pop_front();
    }
    ring.push_back(line);
}

/// Returns a snapshot of the kernel log, oldest line first.
pub fn dmesg() -> Vec<String> {
    LOG_RING.lock().iter().cloned().collect()
}

/// Returns `true` if any logged line contains `needle`.
pub fn dmesg_contains(needle: &str) -> bool {
    LOG_RING.lock().iter().any(|line| line.contains(needle))
}

#[macro_export]
macro_rules! pr_err {
    ($($arg:tt)*) => {
        $crate::print::printk($crate::print::Level::Err, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! pr_warn {
    ($($arg:tt)*) => {
        $crate::print::printk($crate::print::Level::Warning, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! pr_info {
    ($($arg:tt)*) => {
        $crate::print::printk($crate::print::Level::Info, format_args!($($arg)*))
    };
}

#[macro_export]
macro_rules! pr_debug {
    ($($arg:tt)*) => {
        $crate::print::printk($crate::print::Level::Debug, format_args!($($arg)*))
    };
}

/// [`println!`] functions the same as it does in `std`, except instead of
/// printing to `stdout`, it writes to the kernel log at the `KERN_INFO`
/// level.
///
/// [`println!`]: https://doc.rust-lang.org/stable/std/macro.println.html
#[macro_export]
macro_rules! println {
    () => {
        $crate::print::printk($crate::print::Level::Info, format_args!(""))
    };
    ($($arg:tt)*) => {
        $crate::print::printk($crate::print::Level::Info, format_args!($($arg)*))
    };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_carry_level_prefix() {
        crate::pr_warn!("print test {} warn\n", 7);
        assert!(dmesg().iter().any(|l| l == "<4>print test 7 warn"));
    }

    #[test]
    fn overlong_lines_are_truncated() {
        let long = "x".repeat(LOG_LINE_MAX * 2);
        crate::pr_info!("{}", long);
        assert!(dmesg()
            .iter()
            .any(|l| l.len() == LOG_LINE_MAX + 3 && l.starts_with("<6>xxx")));
    }
}
