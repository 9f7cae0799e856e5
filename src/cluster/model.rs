//! In-memory cluster topology
//!
//! Built once at startup from the parsed definition. The target selector
//! flips `execute` flags before the run; during the run the scheduler
//! removes host entries as tasks complete and deletes services whose host
//! maps empty out, erasing their names from every remaining service's
//! ordering sets.

use super::config::ClusterConfig;
use crate::error::{FlotillaError, Result};
use std::collections::{BTreeMap, BTreeSet};

/// Traversal direction over the prerequisite graph
///
/// `start` and `status` follow the declared `after` sets; `stop` walks the
/// derived reciprocal `before` sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderDirection {
    /// Follow `after` edges (start, status, list)
    Forward,
    /// Follow `before` edges (stop)
    Reverse,
}

/// Cluster topology: transports and live services
#[derive(Debug, Clone)]
pub struct ClusterModel {
    /// Transport templates keyed by name
    pub transports: BTreeMap<String, String>,
    /// Live services keyed by name
    pub services: BTreeMap<String, Service>,
}

/// A named service and its deployment
#[derive(Debug, Clone)]
pub struct Service {
    /// Unique service name
    pub name: String,
    /// Start command template
    pub start: Option<String>,
    /// Stop command template
    pub stop: Option<String>,
    /// Status-check command template
    pub status: Option<String>,
    /// Transport reference
    pub transport: Option<String>,
    /// Tags
    pub tags: BTreeSet<String>,
    /// Declared prerequisites
    pub after: BTreeSet<String>,
    /// Derived reciprocal set: services that declare this one in `after`
    pub before: BTreeSet<String>,
    /// Fire the first status probe without an initial wait
    pub probe_immediately: bool,
    /// Deployment map: host name -> binding
    pub hosts: BTreeMap<String, HostBinding>,
}

impl Service {
    /// The prerequisite set for the given traversal direction
    pub fn prereqs(&self, direction: OrderDirection) -> &BTreeSet<String> {
        match direction {
            OrderDirection::Forward => &self.after,
            OrderDirection::Reverse => &self.before,
        }
    }

    /// Build the list-report description for one of this service's hosts
    pub fn describe(&self, host: &str) -> Description {
        let mut verbs = Vec::new();
        if self.start.is_some() {
            verbs.push("start");
        }
        if self.stop.is_some() {
            verbs.push("stop");
        }
        if self.status.is_some() {
            verbs.push("status");
        }

        Description {
            target: format!("{}:{}", host, self.name),
            tags: if self.tags.is_empty() {
                "-".to_string()
            } else {
                self.tags.iter().cloned().collect::<Vec<_>>().join(",")
            },
            commands: if verbs.is_empty() {
                "-".to_string()
            } else {
                verbs.join(" ")
            },
        }
    }
}

/// Per (service, host) record
#[derive(Debug, Clone)]
pub struct HostBinding {
    /// Host name
    pub host: String,
    /// Selected to actually run for this operation
    pub execute: bool,
    /// Report row, populated when the selector commits the binding
    pub description: Option<Description>,
}

/// One row of the `list` report
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Description {
    /// host:service label
    pub target: String,
    /// Comma-joined tag string
    pub tags: String,
    /// Applicable command verbs
    pub commands: String,
}

impl ClusterModel {
    /// Build the topology from a parsed definition
    ///
    /// Disabled services are pruned together with every reference to them.
    /// Undefined transport references, hosts deploying unknown services,
    /// and services deployed nowhere are configuration errors. Dangling
    /// `after` references are left in place for the ordering validator to
    /// diagnose.
    pub fn build(config: &ClusterConfig) -> Result<Self> {
        let disabled: BTreeSet<&str> = config
            .services
            .iter()
            .filter(|(_, s)| !s.enabled)
            .map(|(name, _)| name.as_str())
            .collect();

        let mut services = BTreeMap::new();
        for (name, sc) in &config.services {
            if !sc.enabled {
                tracing::debug!("Pruning disabled service {}", name);
                continue;
            }

            if let Some(transport) = &sc.transport {
                if !config.transports.contains_key(transport) {
                    return Err(FlotillaError::Config(format!(
                        "Service '{}' references unknown transport '{}'",
                        name, transport
                    )));
                }
            }

            let after = sc
                .after
                .iter()
                .filter(|a| !disabled.contains(a.as_str()))
                .cloned()
                .collect();

            services.insert(
                name.clone(),
                Service {
                    name: name.clone(),
                    start: sc.start.clone(),
                    stop: sc.stop.clone(),
                    status: sc.status.clone(),
                    transport: sc.transport.clone(),
                    tags: sc.tags.iter().cloned().collect(),
                    after,
                    before: BTreeSet::new(),
                    probe_immediately: sc.probe_immediately,
                    hosts: BTreeMap::new(),
                },
            );
        }

        for (host_name, hc) in &config.hosts {
            for svc_name in &hc.services {
                if disabled.contains(svc_name.as_str()) {
                    continue;
                }
                let service = services.get_mut(svc_name).ok_or_else(|| {
                    FlotillaError::Config(format!(
                        "Host '{}' deploys unknown service '{}'",
                        host_name, svc_name
                    ))
                })?;
                service.hosts.insert(
                    host_name.clone(),
                    HostBinding {
                        host: host_name.clone(),
                        execute: false,
                        description: None,
                    },
                );
            }
        }

        for (name, service) in &services {
            if service.hosts.is_empty() {
                return Err(FlotillaError::Config(format!(
                    "Service '{}' is not deployed on any host",
                    name
                )));
            }
        }

        // before = transpose of after over the surviving services
        let edges: Vec<(String, String)> = services
            .iter()
            .flat_map(|(name, s)| s.after.iter().map(|a| (a.clone(), name.clone())))
            .collect();
        for (prereq, dependent) in edges {
            if let Some(service) = services.get_mut(&prereq) {
                service.before.insert(dependent);
            }
        }

        Ok(Self {
            transports: config
                .transports
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
            services,
        })
    }

    /// Services whose direction-appropriate prerequisite set is empty
    pub fn ready_layer(&self, direction: OrderDirection) -> Vec<String> {
        self.services
            .values()
            .filter(|s| s.prereqs(direction).is_empty() && !s.hosts.is_empty())
            .map(|s| s.name.clone())
            .collect()
    }

    /// True once every service has completed
    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    /// Record completion of one (service, host) task
    ///
    /// Removes the host from the service's map; when the map empties, the
    /// service is deleted and its name erased from every remaining
    /// service's `after` and `before` sets.
    pub fn complete(&mut self, service: &str, host: &str) {
        let Some(entry) = self.services.get_mut(service) else {
            return;
        };
        entry.hosts.remove(host);
        if entry.hosts.is_empty() {
            self.services.remove(service);
            for other in self.services.values_mut() {
                other.after.remove(service);
                other.before.remove(service);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::parser::ClusterParser;

    fn model(yaml: &str) -> ClusterModel {
        ClusterModel::build(&ClusterParser::parse_str(yaml).unwrap()).unwrap()
    }

    #[test]
    fn test_build_transposes_after() {
        let model = model(
            r#"
services:
  db:
    start: run db
  api:
    start: run api
    after: [db]
hosts:
  h1:
    services: [db, api]
"#,
        );

        assert!(model.services["api"].after.contains("db"));
        assert!(model.services["db"].before.contains("api"));
        assert!(model.services["db"].after.is_empty());
    }

    #[test]
    fn test_disabled_service_pruned_with_references() {
        let model = model(
            r#"
services:
  legacy:
    start: run legacy
    enabled: false
  api:
    start: run api
    after: [legacy]
hosts:
  h1:
    services: [legacy, api]
"#,
        );

        assert!(!model.services.contains_key("legacy"));
        assert!(model.services["api"].after.is_empty());
        assert!(!model.services["api"].hosts.contains_key("legacy"));
    }

    #[test]
    fn test_unknown_transport_rejected() {
        let config = ClusterParser::parse_str(
            r#"
services:
  api:
    start: run api
    transport: ssh
hosts:
  h1:
    services: [api]
"#,
        )
        .unwrap();

        let result = ClusterModel::build(&config);
        match result {
            Err(FlotillaError::Config(msg)) => assert!(msg.contains("ssh")),
            other => panic!("expected config error, got {:?}", other),
        }
    }

    #[test]
    fn test_unknown_service_on_host_rejected() {
        let config = ClusterParser::parse_str(
            r#"
services:
  api:
    start: run api
hosts:
  h1:
    services: [api, ghost]
"#,
        )
        .unwrap();

        assert!(matches!(
            ClusterModel::build(&config),
            Err(FlotillaError::Config(_))
        ));
    }

    #[test]
    fn test_hostless_service_rejected() {
        let config = ClusterParser::parse_str(
            r#"
services:
  api:
    start: run api
hosts:
  h1:
    services: []
"#,
        )
        .unwrap();

        assert!(matches!(
            ClusterModel::build(&config),
            Err(FlotillaError::Config(_))
        ));
    }

    #[test]
    fn test_complete_shrinks_graph() {
        let mut model = model(
            r#"
services:
  db:
    start: run db
  api:
    start: run api
    after: [db]
hosts:
  h1:
    services: [db, api]
  h2:
    services: [db]
"#,
        );

        model.complete("db", "h1");
        assert!(model.services.contains_key("db"));
        assert!(model.services["api"].after.contains("db"));

        model.complete("db", "h2");
        assert!(!model.services.contains_key("db"));
        assert!(model.services["api"].after.is_empty());
        assert_eq!(model.ready_layer(OrderDirection::Forward), vec!["api"]);

        model.complete("api", "h1");
        assert!(model.is_empty());
    }

    #[test]
    fn test_ready_layer_directions() {
        let model = model(
            r#"
services:
  db:
    start: run db
  api:
    start: run api
    after: [db]
hosts:
  h1:
    services: [db, api]
"#,
        );

        assert_eq!(model.ready_layer(OrderDirection::Forward), vec!["db"]);
        assert_eq!(model.ready_layer(OrderDirection::Reverse), vec!["api"]);
    }

    #[test]
    fn test_describe() {
        let model = model(
            r#"
services:
  db:
    start: run db
    status: check db
    tags: [storage, critical]
hosts:
  h1:
    services: [db]
"#,
        );

        let description = model.services["db"].describe("h1");
        assert_eq!(description.target, "h1:db");
        assert_eq!(description.tags, "critical,storage");
        assert_eq!(description.commands, "start status");
    }
}
