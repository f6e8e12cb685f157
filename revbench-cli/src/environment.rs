//! Environment Probes
//!
//! Facts about the machine and checkout, stored on the suite so runs can be
//! compared knowingly.
//!
//! - **uname**: OS, architecture, family
//! - **cpu**: model name and core count
//! - **memory**: total RAM in bytes (Linux)
//! - **vcs**: git branch and commit
//!
//! A probe with nothing to report yields no block.

use revbench_model::Information;
use std::collections::BTreeMap;
use std::process::Command;

/// Run every probe
pub fn probe_all() -> Vec<Information> {
    [uname(), cpu(), memory(), vcs()].into_iter().flatten().collect()
}

fn block<const N: usize>(name: &str, entries: [(&str, Option<String>); N]) -> Option<Information> {
    let entries: BTreeMap<String, String> = entries
        .into_iter()
        .filter_map(|(key, value)| value.map(|value| (key.to_string(), value)))
        .collect();
    (!entries.is_empty()).then(|| Information::new(name, entries))
}

fn uname() -> Option<Information> {
    block(
        "uname",
        [
            ("os", Some(std::env::consts::OS.to_string())),
            ("arch", Some(std::env::consts::ARCH.to_string())),
            ("family", Some(std::env::consts::FAMILY.to_string())),
        ],
    )
}

fn cpu() -> Option<Information> {
    let cores = std::thread::available_parallelism()
        .map(|n| n.get().to_string())
        .ok();
    block("cpu", [("model", cpu_model()), ("cores", cores)])
}

fn memory() -> Option<Information> {
    block("memory", [("total", total_memory_bytes().map(|b| b.to_string()))])
}

fn vcs() -> Option<Information> {
    let version = git(&["rev-parse", "HEAD"])?;
    block(
        "vcs",
        [
            ("system", Some("git".to_string())),
            ("branch", git(&["rev-parse", "--abbrev-ref", "HEAD"])),
            ("version", Some(version)),
        ],
    )
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    let text = String::from_utf8(output.stdout).ok()?;
    let text = text.trim();
    (!text.is_empty()).then(|| text.to_string())
}

/// CPU model name from /proc/cpuinfo (Linux only)
fn cpu_model() -> Option<String> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/cpuinfo")
            .ok()
            .and_then(|content| parse_cpu_model(&content))
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

/// Total memory from /proc/meminfo (Linux only)
fn total_memory_bytes() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        std::fs::read_to_string("/proc/meminfo")
            .ok()
            .and_then(|content| parse_mem_total(&content))
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_cpu_model(cpuinfo: &str) -> Option<String> {
    cpuinfo
        .lines()
        .find(|l| l.starts_with("model name"))
        .and_then(|l| l.split(':').nth(1))
        .map(|s| s.trim().to_string())
}

#[cfg_attr(not(target_os = "linux"), allow(dead_code))]
fn parse_mem_total(meminfo: &str) -> Option<u64> {
    meminfo
        .lines()
        .find(|l| l.starts_with("MemTotal"))
        .and_then(|l| l.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map(|kb| kb * 1024)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uname_always_present() {
        let info = probe_all();
        let uname = info.iter().find(|i| i.name() == "uname").unwrap();
        assert_eq!(uname.get("os"), Some(std::env::consts::OS));
        assert_eq!(uname.get("arch"), Some(std::env::consts::ARCH));
    }

    #[test]
    fn test_empty_block_is_dropped() {
        assert!(block("memory", [("total", None)]).is_none());
        let partial = block("cpu", [("model", None), ("cores", Some("8".into()))]).unwrap();
        assert_eq!(partial.len(), 1);
    }

    #[test]
    fn test_parse_proc_files() {
        let cpuinfo = "processor\t: 0\nmodel name\t: Example CPU @ 3.00GHz\nflags\t\t: fpu\n";
        assert_eq!(parse_cpu_model(cpuinfo).as_deref(), Some("Example CPU @ 3.00GHz"));

        let meminfo = "MemTotal:       16384 kB\nMemFree:         1024 kB\n";
        assert_eq!(parse_mem_total(meminfo), Some(16384 * 1024));
        assert_eq!(parse_mem_total("SwapTotal: 0 kB"), None);
    }
}
