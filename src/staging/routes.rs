// Router Control - Static Route Applier
// Copyright (C) 2026 Christos A. Daggas
// SPDX-License-Identifier: MIT

//! Static kernel routes via `ip route`.
//!
//! Routes have no managed chain to flush, so each emit removes any
//! existing route for the target first and then adds the staged one.
//! The removal is allowed to fail (`RTNETLINK answers: No such
//! process` is the normal first-apply case); the add is not.

use tracing::trace;

use crate::models::error::{Error, Result};
use crate::models::rules::{RouteType, StaticRoute};
use crate::models::validation;
use crate::shell::CommandRunner;
use crate::staging::{run_args, ApplyStrategy};

pub struct RouteStrategy;

impl RouteStrategy {
    fn del_args(rule: &StaticRoute) -> Vec<String> {
        let mut args = vec!["route".to_string(), "del".to_string(), rule.target.clone()];
        if let Some(table) = &rule.table {
            args.push("table".to_string());
            args.push(table.clone());
        }
        args
    }

    fn add_args(rule: &StaticRoute) -> Vec<String> {
        let mut args = vec!["route".to_string(), "add".to_string()];
        if rule.route_type != RouteType::Unicast {
            args.push(rule.route_type.as_str().to_string());
        }
        args.push(rule.target.clone());
        if let Some(gateway) = &rule.gateway {
            args.push("via".to_string());
            args.push(gateway.clone());
        }
        if let Some(interface) = &rule.interface {
            args.push("dev".to_string());
            args.push(interface.clone());
        }
        if let Some(metric) = rule.metric {
            args.push("metric".to_string());
            args.push(metric.to_string());
        }
        if let Some(mtu) = rule.mtu {
            args.push("mtu".to_string());
            args.push(mtu.to_string());
        }
        if let Some(table) = &rule.table {
            args.push("table".to_string());
            args.push(table.clone());
        }
        args
    }
}

impl ApplyStrategy for RouteStrategy {
    type Rule = StaticRoute;

    fn domain(&self) -> &'static str {
        "routes"
    }

    fn validate(&self, rule: &StaticRoute) -> Result<()> {
        validation::validate_name(&rule.name)?;
        validation::validate_route_target(&rule.target)?;
        if let Some(gateway) = &rule.gateway {
            validation::validate_ipv4(gateway)?;
        }
        match rule.route_type {
            RouteType::Unicast => {
                if rule.gateway.is_none() && rule.interface.is_none() {
                    return Err(Error::ValidationFailed(format!(
                        "route '{}' needs a gateway or an interface",
                        rule.name
                    )));
                }
            }
            _ => {
                // Reject-type routes have no next hop.
                if rule.gateway.is_some() || rule.interface.is_some() {
                    return Err(Error::ValidationFailed(format!(
                        "{} route '{}' cannot have a gateway or interface",
                        rule.route_type.as_str(),
                        rule.name
                    )));
                }
            }
        }
        Ok(())
    }

    fn begin(&self, _runner: &dyn CommandRunner) -> Result<()> {
        Ok(())
    }

    fn emit(
        &self,
        runner: &dyn CommandRunner,
        _lines: &mut Vec<String>,
        rule: &StaticRoute,
    ) -> Result<()> {
        let out = run_args(runner, "ip", &Self::del_args(rule))?;
        if !out.success() {
            trace!("No previous route for {}", rule.target);
        }

        let out = run_args(runner, "ip", &Self::add_args(rule))?;
        if !out.success() {
            return Err(Error::apply_failed(&rule.name, out.error_message()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::rules::StagedMeta;
    use crate::shell::testing::ScriptedRunner;
    use crate::staging::Reconciler;
    use std::sync::Arc;

    fn route(name: &str, target: &str, gateway: Option<&str>) -> StaticRoute {
        StaticRoute {
            id: 1,
            name: name.to_string(),
            target: target.to_string(),
            gateway: gateway.map(String::from),
            interface: None,
            metric: None,
            mtu: None,
            table: None,
            route_type: RouteType::Unicast,
            meta: StagedMeta::default(),
        }
    }

    #[test]
    fn test_emit_deletes_then_adds() {
        let runner = Arc::new(ScriptedRunner::new());
        let rec = Reconciler::new(RouteStrategy, runner.clone());

        let mut branch = route("branch-office", "10.9.0.0/24", Some("192.168.1.254"));
        branch.metric = Some(100);
        let result = rec.apply_batch(&[branch]).unwrap();
        assert!(result.report.is_success());

        let calls = runner.calls();
        assert_eq!(calls[0], "ip route del 10.9.0.0/24");
        assert_eq!(calls[1], "ip route add 10.9.0.0/24 via 192.168.1.254 metric 100");
    }

    #[test]
    fn test_missing_previous_route_is_ignored() {
        let runner = Arc::new(ScriptedRunner::new().respond_code(
            "ip route del",
            2,
            "RTNETLINK answers: No such process",
        ));
        let rec = Reconciler::new(RouteStrategy, runner.clone());

        let result = rec
            .apply_batch(&[route("r", "10.9.0.0/24", Some("192.168.1.254"))])
            .unwrap();
        assert!(result.report.is_success());
        assert_eq!(runner.calls_matching("ip route add").len(), 1);
    }

    #[test]
    fn test_add_failure_is_reported() {
        let runner = Arc::new(ScriptedRunner::new().respond_code(
            "ip route add",
            2,
            "Error: Nexthop has invalid gateway.",
        ));
        let rec = Reconciler::new(RouteStrategy, runner);

        let result = rec
            .apply_batch(&[route("r", "10.9.0.0/24", Some("192.168.1.254"))])
            .unwrap();
        assert_eq!(result.failed.len(), 1);
        assert!(result.failed[0].1.contains("invalid gateway"));
    }

    #[test]
    fn test_blackhole_has_type_and_no_nexthop() {
        let mut sinkhole = route("sinkhole", "203.0.113.0/24", None);
        sinkhole.route_type = RouteType::Blackhole;
        RouteStrategy.validate(&sinkhole).unwrap();

        let args = RouteStrategy::add_args(&sinkhole).join(" ");
        assert_eq!(args, "route add blackhole 203.0.113.0/24");
    }

    #[test]
    fn test_custom_table_on_both_commands() {
        let mut vpn = route("vpn-default", "default", Some("10.8.0.1"));
        vpn.table = Some("vpn".to_string());
        RouteStrategy.validate(&vpn).unwrap();

        assert_eq!(
            RouteStrategy::del_args(&vpn).join(" "),
            "route del default table vpn"
        );
        assert_eq!(
            RouteStrategy::add_args(&vpn).join(" "),
            "route add default via 10.8.0.1 table vpn"
        );
    }

    #[test]
    fn test_interface_route_and_mtu() {
        let mut dmz = route("dmz", "172.16.0.0/16", None);
        dmz.interface = Some("eth2".to_string());
        dmz.mtu = Some(1400);
        RouteStrategy.validate(&dmz).unwrap();

        assert_eq!(
            RouteStrategy::add_args(&dmz).join(" "),
            "route add 172.16.0.0/16 dev eth2 mtu 1400"
        );
    }

    #[test]
    fn test_unicast_requires_nexthop() {
        let orphan = route("orphan", "10.0.0.0/8", None);
        assert!(RouteStrategy.validate(&orphan).is_err());

        let mut typed = route("typed", "10.0.0.0/8", Some("192.168.1.1"));
        typed.route_type = RouteType::Unreachable;
        assert!(RouteStrategy.validate(&typed).is_err());
    }
}
