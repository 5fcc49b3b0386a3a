// Router Control - Physical Interface Monitor
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Observes physical network interfaces.
//!
//! Enumeration comes from `ip -o link show`, details from sysfs, and
//! speed/duplex/media from `ethtool`. Every field is best-effort: a
//! missing tool or sysfs file leaves the field empty rather than
//! failing the whole poll. Speed resolution has three tiers:
//!
//! 1. `ethtool` `Speed:` line (negotiated speed);
//! 2. `/sys/class/net/<if>/speed` when ethtool reports `Unknown!`;
//! 3. without carrier, the maximum supported link mode, so the UI can
//!    show what the NIC is capable of while unplugged.
//!
//! Activity flags compare byte counters against the previous poll, so
//! the first poll after startup never reports activity.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, trace};

use crate::models::error::{Error, Result};
use crate::models::interface::{Duplex, InterfaceKind, LinkState, PhysicalInterface};
use crate::shell::CommandRunner;

/// Interfaces that are never physical hardware.
const VIRTUAL_PREFIXES: &[&str] = &["veth", "docker", "br-", "virbr"];

static SPEED_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Speed:\s*(\d+)([MG])b/s").expect("static regex"));
static DUPLEX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Duplex:\s*(Full|Half)").expect("static regex"));
static LINK_MODE_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d+)base[A-Za-z0-9]+/(?:Half|Full)").expect("static regex"));
static SUPPORTED_PORTS_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"Supported ports:\s*\[([^\]]*)\]").expect("static regex"));

#[derive(Debug, Clone, Copy)]
struct TrafficCounters {
    rx_bytes: u64,
    tx_bytes: u64,
}

/// Everything ethtool can tell us about one interface.
#[derive(Debug, Default)]
struct EthtoolInfo {
    speed_mbps: Option<u32>,
    duplex: Option<Duplex>,
    fiber: bool,
    max_supported_mbps: Option<u32>,
}

pub struct InterfaceMonitor {
    runner: Arc<dyn CommandRunner>,
    sysfs_root: PathBuf,
    traffic: Mutex<HashMap<String, TrafficCounters>>,
}

impl InterfaceMonitor {
    pub fn new(runner: Arc<dyn CommandRunner>) -> Self {
        Self::with_sysfs_root(runner, "/sys/class/net")
    }

    /// Use a non-default sysfs root. Used by tests.
    pub fn with_sysfs_root(runner: Arc<dyn CommandRunner>, sysfs_root: impl Into<PathBuf>) -> Self {
        Self {
            runner,
            sysfs_root: sysfs_root.into(),
            traffic: Mutex::new(HashMap::new()),
        }
    }

    /// Enumerate physical interfaces with everything observable about
    /// them. Virtual interfaces and loopback are filtered out.
    pub fn list_physical_interfaces(&self) -> Result<Vec<PhysicalInterface>> {
        let out = self.runner.run("ip", &["-o", "link", "show"])?;
        if !out.success() {
            return Err(Error::command_failed("ip -o link show", out.error_message()));
        }

        let mut interfaces = Vec::new();
        for name in parse_link_names(&out.stdout) {
            if !is_physical_name(&name) {
                trace!("Skipping virtual interface {}", name);
                continue;
            }
            interfaces.push(self.probe_interface(&name));
        }
        debug!("Enumerated {} physical interface(s)", interfaces.len());
        Ok(interfaces)
    }

    /// Forget previous traffic counters; the next poll reports no
    /// activity for every interface.
    pub fn clear_cache(&self) {
        self.traffic_lock().clear();
    }

    fn probe_interface(&self, name: &str) -> PhysicalInterface {
        let mut ifc = PhysicalInterface::new(name);

        ifc.mac_address = self.read_sysfs_string(name, "address");
        ifc.link = match self.read_sysfs_string(name, "operstate").as_deref() {
            Some("up") => LinkState::Up,
            Some("down") => LinkState::Down,
            _ => LinkState::Unknown,
        };
        ifc.mtu = self
            .read_sysfs_string(name, "mtu")
            .and_then(|s| s.parse().ok());
        ifc.carrier = self
            .read_sysfs_string(name, "carrier")
            .map(|s| s == "1")
            .unwrap_or(false);
        ifc.driver = self.read_driver(name);

        let (rx_activity, tx_activity) = self.poll_activity(name);
        ifc.rx_activity = rx_activity;
        ifc.tx_activity = tx_activity;

        // ethtool is best-effort; a missing binary or unsupported
        // interface just leaves speed/duplex empty
        let ethtool = self
            .runner
            .run("ethtool", &[name])
            .ok()
            .filter(|out| out.success())
            .map(|out| parse_ethtool_output(&out.stdout));

        if let Some(info) = &ethtool {
            ifc.speed_mbps = info.speed_mbps;
            ifc.duplex = info.duplex;
            if info.fiber {
                ifc.kind = InterfaceKind::Fiber;
            }
        }
        if ifc.speed_mbps.is_none() {
            ifc.speed_mbps = self
                .read_sysfs_string(name, "speed")
                .and_then(|s| s.parse::<i64>().ok())
                .filter(|&v| v > 0)
                .map(|v| v as u32);
        }
        if ifc.speed_mbps.is_none() && !ifc.carrier {
            if let Some(info) = &ethtool {
                ifc.speed_mbps = info.max_supported_mbps;
            }
        }

        ifc
    }

    fn poll_activity(&self, name: &str) -> (bool, bool) {
        let rx = self.read_sysfs_u64(name, "statistics/rx_bytes");
        let tx = self.read_sysfs_u64(name, "statistics/tx_bytes");
        let (rx, tx) = match (rx, tx) {
            (Some(rx), Some(tx)) => (rx, tx),
            _ => return (false, false),
        };

        let mut cache = self.traffic_lock();
        let previous = cache.insert(
            name.to_string(),
            TrafficCounters {
                rx_bytes: rx,
                tx_bytes: tx,
            },
        );
        match previous {
            Some(prev) => (
                rx.saturating_sub(prev.rx_bytes) > 0,
                tx.saturating_sub(prev.tx_bytes) > 0,
            ),
            None => (false, false),
        }
    }

    fn traffic_lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, TrafficCounters>> {
        match self.traffic.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn read_sysfs_string(&self, name: &str, file: &str) -> Option<String> {
        let path = self.sysfs_root.join(name).join(file);
        std::fs::read_to_string(path)
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
    }

    fn read_sysfs_u64(&self, name: &str, file: &str) -> Option<u64> {
        self.read_sysfs_string(name, file)?.parse().ok()
    }

    fn read_driver(&self, name: &str) -> Option<String> {
        let link = self.sysfs_root.join(name).join("device/driver");
        std::fs::read_link(link)
            .ok()
            .and_then(|target| target.file_name().map(|n| n.to_string_lossy().into_owned()))
    }
}

/// Extract interface names from `ip -o link show` output.
fn parse_link_names(output: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in output.lines() {
        let mut parts = line.splitn(3, ':');
        let _index = parts.next();
        if let Some(raw) = parts.next() {
            let raw = raw.trim();
            // veth-style names carry a peer suffix: "veth1@if5"
            let name = raw.split('@').next().unwrap_or(raw);
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
    }
    names
}

fn is_physical_name(name: &str) -> bool {
    name != "lo" && !VIRTUAL_PREFIXES.iter().any(|p| name.starts_with(p))
}

fn parse_ethtool_output(output: &str) -> EthtoolInfo {
    let mut info = EthtoolInfo {
        speed_mbps: SPEED_RE.captures(output).and_then(|cap| {
            let value: u32 = cap[1].parse().ok()?;
            Some(match &cap[2] {
                "G" => value * 1000,
                _ => value,
            })
        }),
        duplex: DUPLEX_RE.captures(output).and_then(|cap| match &cap[1] {
            "Full" => Some(Duplex::Full),
            "Half" => Some(Duplex::Half),
            _ => None,
        }),
        fiber: SUPPORTED_PORTS_RE
            .captures(output)
            .map(|cap| cap[1].contains("FIBRE"))
            .unwrap_or(false),
        max_supported_mbps: None,
    };
    info.max_supported_mbps = parse_max_supported_mbps(output);
    info
}

/// Highest speed in the "Supported link modes" block.
fn parse_max_supported_mbps(output: &str) -> Option<u32> {
    let mut in_supported = false;
    let mut max: Option<u32> = None;
    for line in output.lines() {
        let trimmed = line.trim_start();
        if trimmed.starts_with("Supported link modes:") {
            in_supported = true;
        } else if in_supported && trimmed.contains(':') && !trimmed.contains("base") {
            // Next field begins; continuation lines carry only modes
            break;
        }
        if in_supported {
            for cap in LINK_MODE_RE.captures_iter(line) {
                if let Ok(mbps) = cap[1].parse::<u32>() {
                    max = Some(max.map_or(mbps, |m| m.max(mbps)));
                }
            }
        }
    }
    max
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shell::testing::ScriptedRunner;

    const ETHTOOL_GIGABIT: &str = "Settings for eth0:\n\
\tSupported ports: [ TP MII ]\n\
\tSupported link modes:   10baseT/Half 10baseT/Full\n\
\t                        100baseT/Half 100baseT/Full\n\
\t                        1000baseT/Full\n\
\tSupported pause frame use: Symmetric\n\
\tAdvertised link modes:  1000baseT/Full\n\
\tSpeed: 1000Mb/s\n\
\tDuplex: Full\n\
\tPort: Twisted Pair\n\
\tLink detected: yes\n";

    const ETHTOOL_UNPLUGGED: &str = "Settings for eth1:\n\
\tSupported ports: [ TP ]\n\
\tSupported link modes:   10baseT/Half 100baseT/Full\n\
\t                        2500baseT/Full\n\
\tSupported pause frame use: No\n\
\tSpeed: Unknown!\n\
\tDuplex: Unknown! (255)\n\
\tLink detected: no\n";

    const ETHTOOL_FIBER: &str = "Settings for enp5s0:\n\
\tSupported ports: [ FIBRE ]\n\
\tSupported link modes:   10000baseSR/Full\n\
\tSpeed: 10Gb/s\n\
\tDuplex: Full\n\
\tLink detected: yes\n";

    fn write_sysfs(root: &Path, name: &str, file: &str, content: &str) {
        let path = root.join(name).join(file);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, content).unwrap();
    }

    #[test]
    fn test_parse_link_names_strips_peer_suffix() {
        let output = "1: lo: <LOOPBACK,UP,LOWER_UP> mtu 65536\n\
2: eth0: <BROADCAST,MULTICAST,UP,LOWER_UP> mtu 1500\n\
5: veth1a2b@if4: <BROADCAST,MULTICAST> mtu 1500\n";
        assert_eq!(parse_link_names(output), vec!["lo", "eth0", "veth1a2b"]);
    }

    #[test]
    fn test_virtual_interfaces_filtered() {
        assert!(is_physical_name("eth0"));
        assert!(is_physical_name("enp3s0"));
        assert!(!is_physical_name("lo"));
        assert!(!is_physical_name("veth1a2b"));
        assert!(!is_physical_name("docker0"));
        assert!(!is_physical_name("br-4f2a"));
        assert!(!is_physical_name("virbr0"));
    }

    #[test]
    fn test_ethtool_negotiated_speed() {
        let info = parse_ethtool_output(ETHTOOL_GIGABIT);
        assert_eq!(info.speed_mbps, Some(1000));
        assert_eq!(info.duplex, Some(Duplex::Full));
        assert!(!info.fiber);
        assert_eq!(info.max_supported_mbps, Some(1000));
    }

    #[test]
    fn test_ethtool_unknown_speed_exposes_max_supported() {
        let info = parse_ethtool_output(ETHTOOL_UNPLUGGED);
        assert_eq!(info.speed_mbps, None);
        assert_eq!(info.duplex, None);
        assert_eq!(info.max_supported_mbps, Some(2500));
    }

    #[test]
    fn test_ethtool_fiber_and_gigabit_unit() {
        let info = parse_ethtool_output(ETHTOOL_FIBER);
        assert!(info.fiber);
        assert_eq!(info.speed_mbps, Some(10000));
    }

    #[test]
    fn test_max_supported_ignores_advertised_block() {
        // Advertised modes list a higher speed than supported; only the
        // supported block counts
        let out = "\tSupported link modes:   100baseT/Full\n\
\tSupported pause frame use: No\n\
\tAdvertised link modes:  1000baseT/Full\n";
        assert_eq!(parse_max_supported_mbps(out), Some(100));
    }

    #[test]
    fn test_list_reads_sysfs_fields() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("net");
        write_sysfs(&root, "eth0", "address", "aa:bb:cc:dd:ee:ff\n");
        write_sysfs(&root, "eth0", "operstate", "up\n");
        write_sysfs(&root, "eth0", "mtu", "1500\n");
        write_sysfs(&root, "eth0", "carrier", "1\n");
        write_sysfs(&root, "eth0", "statistics/rx_bytes", "1000\n");
        write_sysfs(&root, "eth0", "statistics/tx_bytes", "2000\n");

        let runner = Arc::new(
            ScriptedRunner::new()
                .respond_ok("ip -o link show", "2: eth0: <UP> mtu 1500\n")
                .respond_ok("ethtool eth0", ETHTOOL_GIGABIT),
        );
        let monitor = InterfaceMonitor::with_sysfs_root(runner, &root);

        let list = monitor.list_physical_interfaces().unwrap();
        assert_eq!(list.len(), 1);
        let eth0 = &list[0];
        assert_eq!(eth0.mac_address.as_deref(), Some("aa:bb:cc:dd:ee:ff"));
        assert_eq!(eth0.link, LinkState::Up);
        assert_eq!(eth0.mtu, Some(1500));
        assert!(eth0.carrier);
        assert_eq!(eth0.speed_mbps, Some(1000));
        assert_eq!(eth0.duplex, Some(Duplex::Full));
        assert_eq!(eth0.kind, InterfaceKind::Ethernet);
        // First poll never reports activity
        assert!(!eth0.rx_activity);
        assert!(!eth0.tx_activity);
    }

    #[test]
    fn test_sysfs_speed_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("net");
        write_sysfs(&root, "eth1", "operstate", "up\n");
        write_sysfs(&root, "eth1", "carrier", "1\n");
        write_sysfs(&root, "eth1", "speed", "2500\n");

        let runner = Arc::new(
            ScriptedRunner::new()
                .respond_ok("ip -o link show", "2: eth1: <UP> mtu 1500\n")
                .respond_ok(
                    "ethtool eth1",
                    "Settings for eth1:\n\tSpeed: Unknown!\n\tLink detected: yes\n",
                ),
        );
        let monitor = InterfaceMonitor::with_sysfs_root(runner, &root);

        let list = monitor.list_physical_interfaces().unwrap();
        assert_eq!(list[0].speed_mbps, Some(2500));
    }

    #[test]
    fn test_unplugged_reports_max_capability() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("net");
        write_sysfs(&root, "eth1", "operstate", "down\n");
        write_sysfs(&root, "eth1", "carrier", "0\n");

        let runner = Arc::new(
            ScriptedRunner::new()
                .respond_ok("ip -o link show", "3: eth1: <DOWN> mtu 1500\n")
                .respond_ok("ethtool eth1", ETHTOOL_UNPLUGGED),
        );
        let monitor = InterfaceMonitor::with_sysfs_root(runner, &root);

        let list = monitor.list_physical_interfaces().unwrap();
        assert_eq!(list[0].speed_mbps, Some(2500));
        assert_eq!(list[0].link, LinkState::Down);
        assert!(!list[0].carrier);
    }

    #[test]
    fn test_activity_deltas_between_polls() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().join("net");
        write_sysfs(&root, "eth0", "statistics/rx_bytes", "1000\n");
        write_sysfs(&root, "eth0", "statistics/tx_bytes", "2000\n");

        let runner = Arc::new(
            ScriptedRunner::new().respond_ok("ip -o link show", "2: eth0: <UP> mtu 1500\n"),
        );
        let monitor = InterfaceMonitor::with_sysfs_root(runner, &root);

        let first = monitor.list_physical_interfaces().unwrap();
        assert!(!first[0].rx_activity);

        // Received bytes grew; transmitted did not
        write_sysfs(&root, "eth0", "statistics/rx_bytes", "1500\n");
        let second = monitor.list_physical_interfaces().unwrap();
        assert!(second[0].rx_activity);
        assert!(!second[0].tx_activity);

        // Cache cleared: next poll is a baseline again
        monitor.clear_cache();
        write_sysfs(&root, "eth0", "statistics/rx_bytes", "9999\n");
        let third = monitor.list_physical_interfaces().unwrap();
        assert!(!third[0].rx_activity);
    }

    #[test]
    fn test_enumeration_failure_is_an_error() {
        let runner = Arc::new(ScriptedRunner::new().respond_code("ip -o link show", 1, "boom"));
        let monitor = InterfaceMonitor::with_sysfs_root(runner, "/nonexistent");
        assert!(monitor.list_physical_interfaces().is_err());
    }
}
