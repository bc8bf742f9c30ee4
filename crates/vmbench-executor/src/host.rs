//! Host resource detection
//!
//! Used to size a cloned VM so that its resource envelope matches the
//! host, keeping its benchmark results comparable to the local backend's.

/// Number of logical processors on the host
#[must_use]
pub fn logical_cpus() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

/// Total physical memory in MiB, when the host exposes it
#[must_use]
pub fn total_memory_mb() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let meminfo = std::fs::read_to_string("/proc/meminfo").ok()?;
        parse_meminfo(&meminfo)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg(any(target_os = "linux", test))]
fn parse_meminfo(content: &str) -> Option<u64> {
    content
        .lines()
        .find(|line| line.starts_with("MemTotal"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb / 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn at_least_one_cpu() {
        assert!(logical_cpus() >= 1);
    }

    #[test]
    fn meminfo_parsing() {
        let content = "MemTotal:       16384000 kB\nMemFree:        1024000 kB\n";
        assert_eq!(parse_meminfo(content), Some(16000));
        assert_eq!(parse_meminfo("MemFree: 12 kB\n"), None);
        assert_eq!(parse_meminfo(""), None);
    }
}
