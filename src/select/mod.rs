//! Rule-based target selection
//!
//! Decides which (service, host) pairs actually execute for a run, then
//! expands the committed selection with ordering prerequisites: forward
//! `after` for start/status/list, reverse `before` for stop. A
//! prerequisite must complete everywhere it is deployed, so every host of
//! every transitively reached prerequisite is marked.

pub mod rule;

pub use rule::{Glob, RuleAction, RuleScope, TargetRule};

use crate::cluster::ClusterModel;
use crate::error::Result;
use crate::exec::Operation;
use std::collections::{BTreeSet, VecDeque};

/// Apply target rules to the model, marking `execute` flags
///
/// An empty rule list, or a rule list opening with an exclusion, gets an
/// implicit leading `+*`. When `expand` is set, the committed selection is
/// widened with transitive prerequisites in the operation's direction.
pub fn apply(
    model: &mut ClusterModel,
    operation: Operation,
    rules: &[String],
    expand: bool,
) -> Result<()> {
    let mut parsed = rules
        .iter()
        .map(|text| TargetRule::parse(text))
        .collect::<Result<Vec<_>>>()?;

    if parsed
        .first()
        .map_or(true, |rule| rule.action == RuleAction::Exclude)
    {
        parsed.insert(0, TargetRule::parse("+*")?);
    }

    let mut picked: BTreeSet<(String, String)> = BTreeSet::new();
    for rule in &parsed {
        match rule.action {
            RuleAction::Include => {
                for service in model.services.values() {
                    for host in service.hosts.keys() {
                        if rule.matches(&service.name, &service.tags, host) {
                            picked.insert((service.name.clone(), host.clone()));
                        }
                    }
                }
            }
            RuleAction::Exclude => {
                picked.retain(|(service, host)| {
                    model
                        .services
                        .get(service)
                        .map_or(false, |s| !rule.matches(service, &s.tags, host))
                });
            }
        }
    }

    tracing::debug!("Selected {} target pairs", picked.len());

    for (service_name, host) in &picked {
        if let Some(service) = model.services.get_mut(service_name) {
            let description = service.describe(host);
            if let Some(binding) = service.hosts.get_mut(host) {
                binding.execute = true;
                binding.description = Some(description);
            }
        }
    }

    if expand {
        expand_prerequisites(model, operation, &picked);
    }

    Ok(())
}

/// Widen the selection with transitive ordering prerequisites
fn expand_prerequisites(
    model: &mut ClusterModel,
    operation: Operation,
    picked: &BTreeSet<(String, String)>,
) {
    let direction = operation.direction();

    let seeds: BTreeSet<String> = picked.iter().map(|(service, _)| service.clone()).collect();
    let mut visited = seeds.clone();
    let mut queue: VecDeque<String> = seeds.into_iter().collect();

    while let Some(name) = queue.pop_front() {
        let prereqs: Vec<String> = model
            .services
            .get(&name)
            .map(|s| s.prereqs(direction).iter().cloned().collect())
            .unwrap_or_default();

        for prereq in prereqs {
            mark_all_hosts(model, &prereq);
            if visited.insert(prereq.clone()) {
                tracing::debug!("Expanding selection with prerequisite {}", prereq);
                queue.push_back(prereq);
            }
        }
    }
}

/// Mark every host of a service for execution
fn mark_all_hosts(model: &mut ClusterModel, name: &str) {
    let Some(service) = model.services.get_mut(name) else {
        return;
    };
    let hosts: Vec<String> = service.hosts.keys().cloned().collect();
    for host in hosts {
        let description = service.describe(&host);
        if let Some(binding) = service.hosts.get_mut(&host) {
            binding.execute = true;
            binding.description = Some(description);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::ClusterParser;

    fn model(yaml: &str) -> ClusterModel {
        ClusterModel::build(&ClusterParser::parse_str(yaml).unwrap()).unwrap()
    }

    fn executing(model: &ClusterModel) -> BTreeSet<(String, String)> {
        model
            .services
            .values()
            .flat_map(|s| {
                s.hosts
                    .values()
                    .filter(|b| b.execute)
                    .map(|b| (s.name.clone(), b.host.clone()))
            })
            .collect()
    }

    fn rules(texts: &[&str]) -> Vec<String> {
        texts.iter().map(|s| s.to_string()).collect()
    }

    const TOPOLOGY: &str = r#"
services:
  db:
    start: run db
    tags: [storage]
  api:
    start: run api
    after: [db]
    tags: [web]
  ui:
    start: run ui
    after: [api]
    tags: [web]
hosts:
  node1:
    services: [db, api]
  node2:
    services: [db, ui]
"#;

    #[test]
    fn test_empty_rules_select_everything() {
        let mut m = model(TOPOLOGY);
        apply(&mut m, Operation::Start, &[], true).unwrap();

        let selected = executing(&m);
        assert_eq!(selected.len(), 4);
        assert!(selected.contains(&("db".to_string(), "node2".to_string())));
        assert!(selected.contains(&("ui".to_string(), "node2".to_string())));
    }

    #[test]
    fn test_leading_exclusion_gets_implicit_include() {
        let mut m = model(TOPOLOGY);
        apply(&mut m, Operation::Start, &rules(&["-*:ui"]), false).unwrap();

        let selected = executing(&m);
        assert_eq!(selected.len(), 3);
        assert!(!selected.iter().any(|(s, _)| s == "ui"));
    }

    #[test]
    fn test_rules_apply_in_order() {
        let mut m = model(TOPOLOGY);
        apply(
            &mut m,
            Operation::Start,
            &rules(&["-*", "+node1", "-*^storage"]),
            false,
        )
        .unwrap();

        let selected = executing(&m);
        assert_eq!(
            selected,
            [("api".to_string(), "node1".to_string())].into_iter().collect()
        );
    }

    #[test]
    fn test_exclusion_never_grows_selection() {
        let mut with_minus = model(TOPOLOGY);
        apply(
            &mut with_minus,
            Operation::Start,
            &rules(&["+node1", "-*:db"]),
            false,
        )
        .unwrap();

        let mut without_minus = model(TOPOLOGY);
        apply(&mut without_minus, Operation::Start, &rules(&["+node1"]), false).unwrap();

        assert!(executing(&with_minus).is_subset(&executing(&without_minus)));
    }

    #[test]
    fn test_forward_expansion_marks_all_prerequisite_hosts() {
        let mut m = model(TOPOLOGY);
        apply(&mut m, Operation::Start, &rules(&["node2:ui"]), true).unwrap();

        let selected = executing(&m);
        // ui pulls api (node1) which pulls db on both of its hosts
        assert!(selected.contains(&("ui".to_string(), "node2".to_string())));
        assert!(selected.contains(&("api".to_string(), "node1".to_string())));
        assert!(selected.contains(&("db".to_string(), "node1".to_string())));
        assert!(selected.contains(&("db".to_string(), "node2".to_string())));
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn test_stop_expansion_walks_reverse_edges() {
        let mut m = model(TOPOLOGY);
        apply(&mut m, Operation::Stop, &rules(&["*:db"]), true).unwrap();

        let selected = executing(&m);
        // stopping db requires its dependents stopped first, everywhere
        assert!(selected.contains(&("api".to_string(), "node1".to_string())));
        assert!(selected.contains(&("ui".to_string(), "node2".to_string())));
        assert_eq!(selected.len(), 4);
    }

    #[test]
    fn test_expansion_disabled() {
        let mut m = model(TOPOLOGY);
        apply(&mut m, Operation::Start, &rules(&["node2:ui"]), false).unwrap();

        let selected = executing(&m);
        assert_eq!(
            selected,
            [("ui".to_string(), "node2".to_string())].into_iter().collect()
        );
    }

    #[test]
    fn test_partial_direct_selection_widened_when_reached() {
        let mut m = model(TOPOLOGY);
        // db picked on node1 only, but ui's chain reaches db as a
        // prerequisite, which must complete everywhere it is deployed
        apply(
            &mut m,
            Operation::Start,
            &rules(&["node1:db", "+node2:ui"]),
            true,
        )
        .unwrap();

        let selected = executing(&m);
        assert!(selected.contains(&("db".to_string(), "node2".to_string())));
    }

    #[test]
    fn test_malformed_rule_rejected() {
        let mut m = model(TOPOLOGY);
        assert!(apply(&mut m, Operation::Start, &rules(&[""]), true).is_err());
    }

    #[test]
    fn test_commit_populates_description() {
        let mut m = model(TOPOLOGY);
        apply(&mut m, Operation::List, &rules(&["node1:db"]), false).unwrap();

        let binding = &m.services["db"].hosts["node1"];
        assert!(binding.execute);
        let description = binding.description.as_ref().unwrap();
        assert_eq!(description.target, "node1:db");
        assert_eq!(description.tags, "storage");
        assert_eq!(description.commands, "start");
    }
}
