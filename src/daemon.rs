// Router Control - D-Bus Daemon
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! D-Bus surface of the daemon.
//!
//! Three interfaces share one object path: `.Manager` for daemon and
//! backend introspection, `.Ports` for port configuration, and
//! `.Rules` for the staged rule domains. Record payloads and replies
//! travel as JSON strings wrapped in an [`ApiResponse`] envelope, so
//! bus clients stay decoupled from the record types.
//!
//! Dispatch lives on [`Services`] as plain synchronous methods; the
//! zbus interface impls are one-line wrappers around them, which keeps
//! the daemon logic testable without a bus connection.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};
use zbus::{interface, Connection};

use crate::api::{ApiResponse, PortService, RuleService};
use crate::manager::ConfigManager;
use crate::models::config::AppConfig;
use crate::models::error::Result;
use crate::models::port::ConfiguredPort;
use crate::models::snapshot::ConfigKind;
use crate::models::{CRATE_VERSION, DATA_DIR_NAME, DBUS_OBJECT_PATH, DBUS_SERVICE_NAME};
use crate::shell::{CommandRunner, SystemRunner};
use crate::staging::dhcp::DhcpStrategy;
use crate::staging::dns::DnsStrategy;
use crate::staging::firewall::FirewallStrategy;
use crate::staging::forwarding::ForwardingStrategy;
use crate::staging::routes::RouteStrategy;
use crate::store::{Record, Store};

// ============================================================================
// Service bundle
// ============================================================================

/// The daemon's full service stack, built once at startup and shared
/// by every D-Bus interface.
pub struct Services {
    manager: Arc<ConfigManager>,
    ports: PortService,
    firewall: RuleService<FirewallStrategy>,
    forwarding: RuleService<ForwardingStrategy>,
    routes: RuleService<RouteStrategy>,
    dns: RuleService<DnsStrategy>,
    dhcp: RuleService<DhcpStrategy>,
}

/// Run `$body` against the rule service owning `$domain`, or answer
/// with an error envelope for a domain the daemon does not serve.
macro_rules! with_domain {
    ($services:expr, $domain:expr, $svc:ident => $body:expr) => {
        match $domain {
            "firewall" => {
                let $svc = &$services.firewall;
                $body
            }
            "forwarding" => {
                let $svc = &$services.forwarding;
                $body
            }
            "routes" => {
                let $svc = &$services.routes;
                $body
            }
            "dns" => {
                let $svc = &$services.dns;
                $body
            }
            "dhcp" => {
                let $svc = &$services.dhcp;
                $body
            }
            other => ApiResponse::error(format!("Unknown rule domain: {}", other)),
        }
    };
}

impl Services {
    pub fn new(
        config: &AppConfig,
        runner: Arc<dyn CommandRunner>,
        store: Arc<Store>,
        manager: Arc<ConfigManager>,
    ) -> Self {
        Self {
            ports: PortService::new(store.clone(), manager.clone()),
            firewall: RuleService::new(
                store.clone(),
                ConfigKind::Firewall,
                FirewallStrategy,
                runner.clone(),
            ),
            forwarding: RuleService::new(
                store.clone(),
                ConfigKind::Forwarding,
                ForwardingStrategy,
                runner.clone(),
            ),
            routes: RuleService::new(
                store.clone(),
                ConfigKind::Routes,
                RouteStrategy,
                runner.clone(),
            ),
            dns: RuleService::new(
                store.clone(),
                ConfigKind::Dns,
                DnsStrategy::new(config.dns_conf_path.clone()),
                runner.clone(),
            ),
            dhcp: RuleService::new(
                store,
                ConfigKind::Dhcp,
                DhcpStrategy::new(config.dhcp_conf_path.clone()),
                runner,
            ),
            manager,
        }
    }

    // ------------------------------------------------------------------
    // Manager surface
    // ------------------------------------------------------------------

    fn backend_info_json(&self) -> String {
        match serde_json::to_string(&self.ports.get_backend_info()) {
            Ok(json) => json,
            Err(e) => ApiResponse::error(e.to_string()).to_json(),
        }
    }

    // ------------------------------------------------------------------
    // Ports surface
    // ------------------------------------------------------------------

    fn ports_list(&self) -> ApiResponse {
        ApiResponse::from_result(Ok(self.ports.list_ports()), "Listed ports")
    }

    fn ports_scan(&self) -> ApiResponse {
        ApiResponse::from_result(self.ports.scan_devices(), "Scanned physical interfaces")
    }

    fn ports_create(&self, payload: &str) -> ApiResponse {
        match serde_json::from_str(payload) {
            Ok(port) => ApiResponse::from_result(self.ports.create_port(port), "Port created"),
            Err(e) => ApiResponse::error(format!("Invalid port payload: {}", e)),
        }
    }

    fn ports_update(&self, id: i64, payload: &str) -> ApiResponse {
        match serde_json::from_str::<ConfiguredPort>(payload) {
            Ok(mut port) => {
                port.id = id;
                ApiResponse::from_result(self.ports.update_port(port), "Port updated")
            }
            Err(e) => ApiResponse::error(format!("Invalid port payload: {}", e)),
        }
    }

    fn ports_delete(&self, id: i64) -> ApiResponse {
        ApiResponse::from_result(self.ports.delete_port(id), "Port deleted")
    }

    fn ports_create_defaults(&self) -> ApiResponse {
        ApiResponse::from_result(
            self.ports.create_default_config(),
            "Default port configuration created",
        )
    }

    fn ports_apply_all(&self) -> ApiResponse {
        ApiResponse::from_result(self.ports.apply_all_configs(), "Port apply finished")
    }

    // ------------------------------------------------------------------
    // Rules surface
    // ------------------------------------------------------------------

    fn rules_get_all(&self, domain: &str) -> ApiResponse {
        with_domain!(self, domain, svc => {
            ApiResponse::from_result(Ok(svc.get_all()), "Listed rules")
        })
    }

    fn rules_create(&self, domain: &str, payload: &str) -> ApiResponse {
        with_domain!(self, domain, svc => match serde_json::from_str(payload) {
            Ok(rule) => ApiResponse::from_result(svc.create(rule), "Rule created"),
            Err(e) => ApiResponse::error(format!("Invalid rule payload: {}", e)),
        })
    }

    /// The path id wins over whatever id the payload carries.
    fn rules_update(&self, domain: &str, id: i64, payload: &str) -> ApiResponse {
        with_domain!(self, domain, svc => match serde_json::from_str(payload) {
            Ok(mut rule) => {
                Record::set_id(&mut rule, id);
                ApiResponse::from_result(svc.update(rule), "Rule updated")
            }
            Err(e) => ApiResponse::error(format!("Invalid rule payload: {}", e)),
        })
    }

    fn rules_delete(&self, domain: &str, id: i64) -> ApiResponse {
        with_domain!(self, domain, svc => {
            ApiResponse::from_result(svc.delete(id), "Rule deleted")
        })
    }

    fn rules_toggle_enabled(&self, domain: &str, id: i64) -> ApiResponse {
        with_domain!(self, domain, svc => {
            ApiResponse::from_result(svc.toggle_enabled(id), "Rule toggled")
        })
    }

    fn rules_apply_all(&self, domain: &str) -> ApiResponse {
        with_domain!(self, domain, svc => {
            ApiResponse::from_result(svc.apply_all(), "Apply finished")
        })
    }

    fn rules_pending_count(&self, domain: &str) -> u32 {
        match domain {
            "firewall" => self.firewall.pending_count() as u32,
            "forwarding" => self.forwarding.pending_count() as u32,
            "routes" => self.routes.pending_count() as u32,
            "dns" => self.dns.pending_count() as u32,
            "dhcp" => self.dhcp.pending_count() as u32,
            other => {
                warn!("Pending count requested for unknown domain '{}'", other);
                0
            }
        }
    }

    fn rules_revert(&self, domain: &str) -> ApiResponse {
        with_domain!(self, domain, svc => match svc.revert() {
            Ok(count) => ApiResponse::ok(format!("Reverted {} record(s)", count)),
            Err(e) => ApiResponse::error(e.to_string()),
        })
    }
}

// ============================================================================
// D-Bus interfaces
// ============================================================================

/// Daemon and backend introspection.
struct ManagerInterface {
    services: Arc<Services>,
}

#[interface(name = "com.chrisdaggas.RouterControl.Manager")]
impl ManagerInterface {
    /// Liveness probe.
    async fn ping(&self) -> bool {
        true
    }

    async fn version(&self) -> String {
        CRATE_VERSION.to_string()
    }

    /// Active backend summary as a JSON document.
    async fn backend_info(&self) -> String {
        self.services.backend_info_json()
    }

    /// Drop the memoized backend detection; the next call re-probes.
    async fn clear_backend_cache(&self) {
        self.services.manager.clear_detection_cache();
    }
}

/// Port configuration: CRUD, device scan, and apply.
struct PortsInterface {
    services: Arc<Services>,
}

#[interface(name = "com.chrisdaggas.RouterControl.Ports")]
impl PortsInterface {
    async fn list(&self) -> String {
        self.services.ports_list().to_json()
    }

    async fn scan(&self) -> String {
        self.services.ports_scan().to_json()
    }

    async fn create(&self, payload: &str) -> String {
        self.services.ports_create(payload).to_json()
    }

    async fn update(&self, id: i64, payload: &str) -> String {
        self.services.ports_update(id, payload).to_json()
    }

    async fn delete(&self, id: i64) -> String {
        self.services.ports_delete(id).to_json()
    }

    async fn create_defaults(&self) -> String {
        self.services.ports_create_defaults().to_json()
    }

    async fn apply_all(&self) -> String {
        self.services.ports_apply_all().to_json()
    }
}

/// Staged rule domains, discriminated by the `domain` argument
/// (`firewall`, `forwarding`, `routes`, `dns`, `dhcp`).
struct RulesInterface {
    services: Arc<Services>,
}

#[interface(name = "com.chrisdaggas.RouterControl.Rules")]
impl RulesInterface {
    async fn get_all(&self, domain: &str) -> String {
        self.services.rules_get_all(domain).to_json()
    }

    async fn create(&self, domain: &str, payload: &str) -> String {
        self.services.rules_create(domain, payload).to_json()
    }

    async fn update(&self, domain: &str, id: i64, payload: &str) -> String {
        self.services.rules_update(domain, id, payload).to_json()
    }

    async fn delete(&self, domain: &str, id: i64) -> String {
        self.services.rules_delete(domain, id).to_json()
    }

    async fn toggle_enabled(&self, domain: &str, id: i64) -> String {
        self.services.rules_toggle_enabled(domain, id).to_json()
    }

    async fn apply_all(&self, domain: &str) -> String {
        self.services.rules_apply_all(domain).to_json()
    }

    async fn pending_count(&self, domain: &str) -> u32 {
        self.services.rules_pending_count(domain)
    }

    async fn revert(&self, domain: &str) -> String {
        self.services.rules_revert(domain).to_json()
    }
}

// ============================================================================
// Daemon lifecycle
// ============================================================================

/// Where the persisted tables live: an explicit `state_dir` wins, then
/// `/var/lib/router-control` when the daemon may create it (system
/// service), then the XDG data directory (unprivileged runs).
fn resolve_state_dir(config: &AppConfig) -> PathBuf {
    if let Some(dir) = &config.state_dir {
        return dir.clone();
    }
    let system = PathBuf::from("/var/lib").join(DATA_DIR_NAME);
    if std::fs::create_dir_all(&system).is_ok() {
        return system;
    }
    dirs::data_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(DATA_DIR_NAME)
}

/// Build the service stack and serve it on the system bus until the
/// process is stopped.
pub async fn run(config: AppConfig) -> Result<()> {
    let runner: Arc<dyn CommandRunner> = Arc::new(SystemRunner::with_timeout(
        Duration::from_secs(config.command_timeout_secs),
    ));
    let state_dir = resolve_state_dir(&config);
    let store = Arc::new(Store::open(&state_dir, config.snapshot_retention)?);
    let manager = Arc::new(ConfigManager::new(runner.clone(), config.netplan_path.clone()));

    let backend = manager.backend_info();
    info!(
        "Using {} backend ({}), state in {}",
        backend.kind.as_str(),
        if backend.supported { "writable" } else { "read-only" },
        state_dir.display()
    );
    match manager.read_system_config() {
        Ok(system) => info!(
            "Observed {} physical interface(s), {} configured port(s)",
            system.interfaces.len(),
            system.ports.len()
        ),
        Err(e) => warn!("Interface enumeration failed: {}", e),
    }

    let services = Arc::new(Services::new(&config, runner, store, manager));

    let connection = Connection::system().await?;
    connection
        .object_server()
        .at(
            DBUS_OBJECT_PATH,
            ManagerInterface {
                services: services.clone(),
            },
        )
        .await?;
    connection
        .object_server()
        .at(
            DBUS_OBJECT_PATH,
            PortsInterface {
                services: services.clone(),
            },
        )
        .await?;
    connection
        .object_server()
        .at(DBUS_OBJECT_PATH, RulesInterface { services })
        .await?;
    // Objects are registered before the name so early callers never
    // see the name without its interfaces.
    connection.request_name(DBUS_SERVICE_NAME).await?;
    info!("Serving {} at {}", DBUS_SERVICE_NAME, DBUS_OBJECT_PATH);

    std::future::pending::<()>().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::detect::BackendDetector;
    use crate::monitor::InterfaceMonitor;
    use crate::shell::testing::ScriptedRunner;
    use crate::store::DEFAULT_SNAPSHOT_RETENTION;
    use std::path::Path;

    const TWO_NICS: &str = "1: lo: <LOOPBACK,UP> mtu 65536\n\
2: eth0: <BROADCAST,UP> mtu 1500\n\
3: eth1: <BROADCAST,UP> mtu 1500\n";

    /// Full service stack wired to a netplan-detected tempdir host.
    fn services(root: &Path, runner: Arc<ScriptedRunner>) -> Services {
        let netplan_dir = root.join("netplan");
        std::fs::create_dir_all(&netplan_dir).unwrap();
        std::fs::write(netplan_dir.join("00-seed.yaml"), "network:\n  version: 2\n").unwrap();

        let detector =
            BackendDetector::with_roots(runner.clone(), &netplan_dir, root.join("interfaces"));
        let monitor = Arc::new(InterfaceMonitor::with_sysfs_root(
            runner.clone(),
            root.join("sys"),
        ));
        let manager = Arc::new(ConfigManager::with_parts(
            runner.clone(),
            detector,
            monitor,
            netplan_dir.join("99-router-control.yaml"),
        ));
        let store =
            Arc::new(Store::open(root.join("state"), DEFAULT_SNAPSHOT_RETENTION).unwrap());

        let mut config = AppConfig::default();
        config.dns_conf_path = root.join("dnsmasq-dns.conf");
        config.dhcp_conf_path = root.join("dnsmasq-leases.conf");
        Services::new(&config, runner, store, manager)
    }

    #[test]
    fn test_unknown_domain_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path(), Arc::new(ScriptedRunner::new()));

        let response = services.rules_get_all("wireguard");
        assert!(!response.success);
        assert!(response.message.contains("Unknown rule domain"));
        assert_eq!(services.rules_pending_count("wireguard"), 0);
    }

    #[test]
    fn test_rule_payload_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path(), Arc::new(ScriptedRunner::new()));

        let created = services.rules_create("firewall", r#"{"name":"ssh","dest_port":"22"}"#);
        assert!(created.success, "{}", created.message);
        let data = created.data.unwrap();
        assert_eq!(data["id"], 1);
        assert_eq!(data["pending_changes"], true);

        let listed = services.rules_get_all("firewall");
        assert_eq!(listed.data.unwrap().as_array().unwrap().len(), 1);

        assert_eq!(services.rules_pending_count("firewall"), 1);
        let applied = services.rules_apply_all("firewall");
        assert!(applied.success, "{}", applied.message);
        assert_eq!(services.rules_pending_count("firewall"), 0);
    }

    #[test]
    fn test_malformed_payload_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path(), Arc::new(ScriptedRunner::new()));

        let response = services.rules_create("routes", "{not json");
        assert!(!response.success);
        assert!(response.message.contains("Invalid rule payload"));

        // Validation failures surface their message verbatim
        let response = services.rules_create("dns", r#"{"name":"up","server":"not-an-ip"}"#);
        assert!(!response.success);
        assert!(response.message.contains("Invalid IP address"));
    }

    #[test]
    fn test_update_forces_path_id() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path(), Arc::new(ScriptedRunner::new()));

        services.rules_create("firewall", r#"{"name":"ssh","dest_port":"22"}"#);
        let response = services.rules_update(
            "firewall",
            1,
            r#"{"id":99,"name":"ssh-alt","dest_port":"2222"}"#,
        );
        assert!(response.success, "{}", response.message);
        assert_eq!(response.data.unwrap()["id"], 1);
    }

    #[test]
    fn test_ports_surface_envelopes() {
        let dir = tempfile::tempdir().unwrap();
        let runner = Arc::new(ScriptedRunner::new().respond_ok("ip -o link show", TWO_NICS));
        let services = services(dir.path(), runner);

        let scanned = services.ports_scan();
        assert!(scanned.success);
        assert_eq!(scanned.data.unwrap().as_array().unwrap().len(), 2);

        let created = services.ports_create(
            r#"{"name":"wan","port_type":"wan","protocol":"dhcp","physical_interfaces":["eth0"]}"#,
        );
        assert!(created.success, "{}", created.message);
        assert_eq!(created.data.unwrap()["id"], 1);

        let listed = services.ports_list();
        assert_eq!(listed.data.unwrap().as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_backend_info_is_json() {
        let dir = tempfile::tempdir().unwrap();
        let services = services(dir.path(), Arc::new(ScriptedRunner::new()));

        let json = services.backend_info_json();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        assert_eq!(value["kind"], "netplan");
    }

    #[test]
    fn test_state_dir_resolution_prefers_config() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.state_dir = Some(dir.path().join("custom"));
        assert_eq!(resolve_state_dir(&config), dir.path().join("custom"));
    }
}
