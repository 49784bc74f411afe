// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Structural and reference validation over a flow document.
//!
//! All errors here are fatal pre-run. The graph checks (unknown
//! dependencies, cycles) run before phase computation so the engine never
//! sees an unresolvable DAG.

use crate::document::{CustomSpec, ElseSpec, FlowDocument, NextSpec};
use crate::error::FlowError;
use std::collections::{HashMap, HashSet};

fn valid_block_name(name: &str) -> bool {
    !name.is_empty()
        && name.len() <= 50
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_')
}

fn valid_specialist(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
}

/// Validate a flow document, returning the first violation found.
pub fn validate(document: &FlowDocument) -> Result<(), FlowError> {
    if document.blocks.is_empty() {
        return Err(FlowError::NoBlocks);
    }

    let mut names: HashSet<&str> = HashSet::new();
    for block in &document.blocks {
        if !valid_block_name(&block.name) {
            return Err(FlowError::InvalidBlockName(block.name.clone()));
        }
        if !names.insert(&block.name) {
            return Err(FlowError::DuplicateBlock(block.name.clone()));
        }
    }

    for block in &document.blocks {
        for dep in &block.depends_on {
            if !names.contains(dep.as_str()) {
                return Err(FlowError::UnknownDependency {
                    block: block.name.clone(),
                    dependency: dep.clone(),
                });
            }
        }

        if let Some(specialist) = &block.specialist {
            if !valid_specialist(specialist) {
                return Err(FlowError::InvalidSpecialist {
                    block: block.name.clone(),
                    specialist: specialist.clone(),
                });
            }
        }

        if let Some(logic) = &block.logic {
            if matches!(logic.custom, Some(CustomSpec::Sentinel(false))) {
                return Err(FlowError::InvalidCustomSentinel {
                    block: block.name.clone(),
                });
            }
        }

        for target in next_targets(block.next.as_ref()) {
            if !names.contains(target.as_str()) {
                return Err(FlowError::InvalidNextTarget {
                    block: block.name.clone(),
                    target,
                });
            }
        }
    }

    if let Some(inputs) = &document.inputs {
        for (field, spec) in inputs {
            if spec.default.is_some() && spec.required {
                return Err(FlowError::DefaultOnRequiredInput {
                    field: field.clone(),
                });
            }
        }
    }

    detect_cycles(document)?;
    Ok(())
}

/// Every block name a `next` spec can transfer control to.
fn next_targets(next: Option<&NextSpec>) -> Vec<String> {
    match next {
        None => Vec::new(),
        Some(NextSpec::Name(name)) => vec![name.clone()],
        Some(NextSpec::Conditions(rules)) => rules
            .iter()
            .filter_map(|rule| {
                rule.goto.clone().or(match &rule.otherwise {
                    Some(ElseSpec::Target(target)) => Some(target.clone()),
                    _ => None,
                })
            })
            .collect(),
    }
}

/// DFS cycle detection reporting the offending path.
fn detect_cycles(document: &FlowDocument) -> Result<(), FlowError> {
    let graph: HashMap<&str, &Vec<String>> = document
        .blocks
        .iter()
        .map(|b| (b.name.as_str(), &b.depends_on))
        .collect();

    fn visit<'a>(
        node: &'a str,
        graph: &HashMap<&'a str, &'a Vec<String>>,
        visited: &mut HashSet<&'a str>,
        stack: &mut Vec<&'a str>,
    ) -> Option<String> {
        visited.insert(node);
        stack.push(node);

        if let Some(deps) = graph.get(node) {
            for dep in deps.iter() {
                let dep = dep.as_str();
                if stack.contains(&dep) {
                    let mut cycle: Vec<&str> = stack
                        .iter()
                        .skip_while(|n| **n != dep)
                        .copied()
                        .collect();
                    cycle.push(dep);
                    return Some(cycle.join(" -> "));
                }
                if !visited.contains(dep) {
                    if let Some(cycle) = visit(dep, graph, visited, stack) {
                        return Some(cycle);
                    }
                }
            }
        }

        stack.pop();
        None
    }

    let mut visited = HashSet::new();
    for block in &document.blocks {
        if !visited.contains(block.name.as_str()) {
            let mut stack = Vec::new();
            if let Some(cycle) = visit(block.name.as_str(), &graph, &mut visited, &mut stack) {
                return Err(FlowError::CyclicDependency { cycle });
            }
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "validate_tests.rs"]
mod tests;
