//! Parsers for `/proc` filesystem files.
//!
//! Pure functions that parse the content of the `/proc` files the sampler
//! needs into structured data. Designed to be testable with string inputs.

/// Error type for parsing failures.
#[derive(Debug, Clone, PartialEq)]
pub struct ParseError {
    pub message: String,
}

impl ParseError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self {
            message: msg.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Parse error: {}", self.message)
    }
}

impl std::error::Error for ParseError {}

/// Fields of `/proc/[pid]/stat` used by the sampler.
#[derive(Debug, Clone, Default)]
pub struct ProcStat {
    pub pid: u32,
    pub comm: String,
    pub state: char,
    /// CPU time spent in user mode, in clock ticks.
    pub utime: u64,
    /// CPU time spent in kernel mode, in clock ticks.
    pub stime: u64,
    /// Time the process started after boot, in clock ticks.
    pub starttime: u64,
}

/// Parses `/proc/[pid]/stat` content.
///
/// The format is tricky because the comm field can contain spaces and
/// parentheses. Format: `pid (comm) state ppid pgrp session tty_nr ...`
pub fn parse_proc_stat(content: &str) -> Result<ProcStat, ParseError> {
    let content = content.trim();

    // Find the comm field boundaries (enclosed in parentheses)
    let open_paren = content
        .find('(')
        .ok_or_else(|| ParseError::new("missing '(' in stat"))?;
    let close_paren = content
        .rfind(')')
        .ok_or_else(|| ParseError::new("missing ')' in stat"))?;

    if close_paren <= open_paren {
        return Err(ParseError::new("invalid parentheses in stat"));
    }

    let pid: u32 = content[..open_paren]
        .trim()
        .parse()
        .map_err(|_| ParseError::new("invalid pid"))?;

    let comm = content[open_paren + 1..close_paren].to_string();

    // Fields after the closing ')', zero-indexed from `state`
    let fields: Vec<&str> = content[close_paren + 1..].split_whitespace().collect();

    if fields.len() < 20 {
        return Err(ParseError::new(format!(
            "not enough fields in stat: expected 20+, got {}",
            fields.len()
        )));
    }

    let parse_field = |idx: usize, name: &str| -> Result<u64, ParseError> {
        fields
            .get(idx)
            .ok_or_else(|| ParseError::new(format!("missing field {}", name)))?
            .parse()
            .map_err(|_| ParseError::new(format!("invalid {}", name)))
    };

    Ok(ProcStat {
        pid,
        comm,
        state: fields[0].chars().next().unwrap_or('?'),
        utime: parse_field(11, "utime")?,
        stime: parse_field(12, "stime")?,
        starttime: parse_field(19, "starttime")?,
    })
}

/// Parses `VmRSS` (resident set size, in kB) out of `/proc/[pid]/status`.
///
/// Kernel threads and zombies have no `VmRSS` line; that is reported as 0.
pub fn parse_vm_rss_kb(content: &str) -> u64 {
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("VmRSS:") {
            return rest
                .trim()
                .trim_end_matches("kB")
                .trim()
                .parse()
                .unwrap_or(0);
        }
    }
    0
}

/// Parses `/proc/uptime` and returns seconds since boot.
pub fn parse_uptime(content: &str) -> Result<f64, ParseError> {
    content
        .split_whitespace()
        .next()
        .ok_or_else(|| ParseError::new("empty uptime"))?
        .parse()
        .map_err(|_| ParseError::new("invalid uptime"))
}

/// Counts logical processors from `/proc/stat` (`cpu0`, `cpu1`, ... lines).
///
/// Returns at least 1 so CPU percentages never divide by zero.
pub fn count_cpus(content: &str) -> usize {
    let count = content
        .lines()
        .filter(|line| {
            line.strip_prefix("cpu")
                .and_then(|rest| rest.chars().next())
                .is_some_and(|c| c.is_ascii_digit())
        })
        .count();
    count.max(1)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STAT_LINE: &str = "1234 (nginx) S 1 1234 1234 0 -1 4194560 2500 0 10 0 \
        350 150 0 0 20 0 2 0 9000 12345678 4000 18446744073709551615 1 1 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0";

    #[test]
    fn parse_stat_basic_fields() {
        let stat = parse_proc_stat(STAT_LINE).unwrap();
        assert_eq!(stat.pid, 1234);
        assert_eq!(stat.comm, "nginx");
        assert_eq!(stat.state, 'S');
        assert_eq!(stat.utime, 350);
        assert_eq!(stat.stime, 150);
        assert_eq!(stat.starttime, 9000);
    }

    #[test]
    fn parse_stat_comm_with_spaces_and_parens() {
        let line = "5000 (Web Content (x)) R 1 5000 5000 0 -1 4194560 0 0 0 0 \
            10 5 0 0 20 0 1 0 100 0 0 0 0 0 0 0 0 0 0 0 0 0 17 0 0 0 0 0 0";
        let stat = parse_proc_stat(line).unwrap();
        assert_eq!(stat.pid, 5000);
        assert_eq!(stat.comm, "Web Content (x)");
        assert_eq!(stat.state, 'R');
    }

    #[test]
    fn parse_stat_rejects_garbage() {
        assert!(parse_proc_stat("").is_err());
        assert!(parse_proc_stat("no parens here").is_err());
        assert!(parse_proc_stat("1 (short) S 1 2").is_err());
    }

    #[test]
    fn parse_vm_rss() {
        let status = "Name:\tnginx\nPid:\t1234\nVmSize:\t  123456 kB\nVmRSS:\t   51200 kB\n";
        assert_eq!(parse_vm_rss_kb(status), 51200);
    }

    #[test]
    fn parse_vm_rss_absent_for_kernel_thread() {
        let status = "Name:\tkworker/0:1\nPid:\t42\n";
        assert_eq!(parse_vm_rss_kb(status), 0);
    }

    #[test]
    fn parse_uptime_seconds() {
        assert_eq!(parse_uptime("12345.67 98765.43\n").unwrap(), 12345.67);
        assert!(parse_uptime("").is_err());
        assert!(parse_uptime("abc def").is_err());
    }

    #[test]
    fn count_cpus_from_stat() {
        let stat = "cpu  10 5 3 80\ncpu0 5 2 1 40\ncpu1 5 3 2 40\nintr 100\nbtime 1700000000\n";
        assert_eq!(count_cpus(stat), 2);
        // No per-cpu lines still yields 1
        assert_eq!(count_cpus("cpu 10 5 3 80\n"), 1);
    }
}
