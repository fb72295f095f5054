use std::collections::{HashMap, HashSet};

use crate::record::ProcessRecord;

/// One reconstructed process with its children. Owned by a single render
/// pass; the forest is rebuilt from scratch on every fetch/filter cycle.
#[derive(Debug, Clone)]
pub struct ProcessNode {
    pub record: ProcessRecord,
    pub children: Vec<ProcessNode>,
}

/// Path of pids from a root down to a node. Identifies a row across
/// re-flattens of the same snapshot, which is all the expand state needs.
pub type NodePath = Vec<i64>;

/// Builds the forest from a flat batch.
///
/// Linking is a one-shot map lookup: a node becomes a child iff its
/// parent_pid resolves to a pid present in the same batch, otherwise it is
/// a root. Duplicate pids collapse to one node carrying the last record's
/// fields and parent link but the first occurrence's position. A node whose
/// parent chain never reaches a root (self-reference or cycle) is emitted
/// as a root rather than dropped.
pub fn build_forest(records: &[ProcessRecord]) -> Vec<ProcessNode> {
    let mut order: Vec<i64> = Vec::with_capacity(records.len());
    let mut latest: HashMap<i64, &ProcessRecord> = HashMap::with_capacity(records.len());
    for record in records {
        if latest.insert(record.pid, record).is_none() {
            order.push(record.pid);
        }
    }

    let mut children: HashMap<i64, Vec<i64>> = HashMap::new();
    let mut roots: Vec<i64> = Vec::new();
    for pid in &order {
        match latest[pid].parent_pid {
            Some(ppid) if ppid != *pid && latest.contains_key(&ppid) => {
                children.entry(ppid).or_default().push(*pid);
            }
            _ => roots.push(*pid),
        }
    }

    let mut visited: HashSet<i64> = HashSet::with_capacity(order.len());
    let mut forest = Vec::with_capacity(roots.len());
    for pid in &roots {
        if let Some(node) = attach(*pid, &latest, &children, &mut visited) {
            forest.push(node);
        }
    }

    // Nodes trapped in a parent cycle are unreachable from any root;
    // surface them as roots instead of losing them.
    for pid in &order {
        if !visited.contains(pid) {
            if let Some(node) = attach(*pid, &latest, &children, &mut visited) {
                forest.push(node);
            }
        }
    }

    forest
}

fn attach(
    pid: i64,
    latest: &HashMap<i64, &ProcessRecord>,
    children: &HashMap<i64, Vec<i64>>,
    visited: &mut HashSet<i64>,
) -> Option<ProcessNode> {
    if !visited.insert(pid) {
        return None;
    }
    let record = (*latest.get(&pid)?).clone();
    let kids = children
        .get(&pid)
        .map(|list| {
            list.iter()
                .filter_map(|child| attach(*child, latest, children, visited))
                .collect()
        })
        .unwrap_or_default();
    Some(ProcessNode {
        record,
        children: kids,
    })
}

/// One display row of the flattened tree.
#[derive(Debug, Clone)]
pub struct TreeRow {
    pub path: NodePath,
    pub pid: i64,
    pub parent_pid: Option<i64>,
    pub name: String,
    pub hostname: String,
    pub cpu_usage: f64,
    pub memory_usage: f64,
    pub depth: usize,
    pub has_children: bool,
    pub expanded: bool,
    pub prefix: String,
}

/// Flattens the forest into display rows. Roots keep source order; each
/// children list is sorted by lowercased name ascending (absent name sorts
/// as empty). Children are emitted only under paths present in `expanded`,
/// so a fresh pass with an empty set shows roots only.
pub fn flatten_forest(forest: &[ProcessNode], expanded: &HashSet<NodePath>) -> Vec<TreeRow> {
    let mut rows = Vec::new();
    let mut branch_stack = Vec::new();
    let mut path = Vec::new();
    for node in forest {
        flatten_node(node, expanded, &mut path, &mut branch_stack, &mut rows);
    }
    rows
}

fn flatten_node(
    node: &ProcessNode,
    expanded: &HashSet<NodePath>,
    path: &mut NodePath,
    branch_stack: &mut Vec<bool>,
    rows: &mut Vec<TreeRow>,
) {
    path.push(node.record.pid);
    let is_expanded = !node.children.is_empty() && expanded.contains(path);

    rows.push(TreeRow {
        path: path.clone(),
        pid: node.record.pid,
        parent_pid: node.record.parent_pid,
        name: node.record.display_name().to_string(),
        hostname: node.record.display_host().to_string(),
        cpu_usage: node.record.cpu_usage,
        memory_usage: node.record.memory_usage,
        depth: branch_stack.len(),
        has_children: !node.children.is_empty(),
        expanded: is_expanded,
        prefix: build_tree_prefix(branch_stack),
    });

    if is_expanded {
        let mut ordered: Vec<&ProcessNode> = node.children.iter().collect();
        ordered.sort_by_key(|child| child.record.name.as_deref().unwrap_or("").to_lowercase());
        for (idx, child) in ordered.iter().enumerate() {
            branch_stack.push(idx + 1 == ordered.len());
            flatten_node(child, expanded, path, branch_stack, rows);
            branch_stack.pop();
        }
    }

    path.pop();
}

/// Removes a collapsed node's path and every descendant path, so that
/// re-expanding the node starts with its subtree fully collapsed.
pub fn prune_expanded(expanded: &mut HashSet<NodePath>, collapsed: &NodePath) {
    expanded.retain(|path| !path.starts_with(collapsed));
}

fn build_tree_prefix(stack: &[bool]) -> String {
    if stack.is_empty() {
        return String::new();
    }

    let mut prefix = String::new();
    for (idx, is_last) in stack.iter().enumerate() {
        if idx + 1 == stack.len() {
            prefix.push_str(if *is_last { "└─ " } else { "├─ " });
        } else {
            prefix.push_str(if *is_last { "   " } else { "│  " });
        }
    }
    prefix
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{filter_records, ProcessRecord};

    fn record(pid: i64, parent: Option<i64>, name: &str) -> ProcessRecord {
        ProcessRecord {
            pid,
            parent_pid: parent,
            name: Some(name.to_string()),
            hostname: Some("host".to_string()),
            cpu_usage: 0.0,
            memory_usage: 0.0,
            timestamp: None,
        }
    }

    fn expand_all(forest: &[ProcessNode], expanded: &mut HashSet<NodePath>, prefix: &NodePath) {
        for node in forest {
            let mut path = prefix.clone();
            path.push(node.record.pid);
            if !node.children.is_empty() {
                expanded.insert(path.clone());
                expand_all(&node.children, expanded, &path);
            }
        }
    }

    fn node_count(forest: &[ProcessNode]) -> usize {
        forest
            .iter()
            .map(|node| 1 + node_count(&node.children))
            .sum()
    }

    #[test]
    fn chain_builds_single_rooted_tree() {
        let records = vec![
            record(1, None, "init"),
            record(2, Some(1), "sshd"),
            record(3, Some(2), "bash"),
        ];
        let forest = build_forest(&records);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].record.display_name(), "init");
        assert_eq!(forest[0].children.len(), 1);
        assert_eq!(forest[0].children[0].record.display_name(), "sshd");
        assert_eq!(forest[0].children[0].children[0].record.display_name(), "bash");
    }

    #[test]
    fn every_parsable_record_appears_exactly_once() {
        let records = vec![
            record(10, None, "a"),
            record(11, Some(10), "b"),
            record(12, Some(99), "dangling"),
            record(13, Some(13), "self"),
        ];
        let forest = build_forest(&records);
        assert_eq!(node_count(&forest), 4);
        // dangling parent and self-reference both promote to roots
        assert_eq!(forest.len(), 3);
    }

    #[test]
    fn filtered_out_parent_reroots_the_child() {
        let records = vec![
            record(1, None, "init"),
            record(2, Some(1), "sshd"),
            record(3, Some(2), "bash"),
        ];
        let filtered = filter_records(&records, "bash");
        let forest = build_forest(&filtered);
        assert_eq!(forest.len(), 1);
        assert_eq!(forest[0].record.display_name(), "bash");
        assert!(forest[0].children.is_empty());
    }

    #[test]
    fn duplicate_pid_keeps_last_record_and_first_position() {
        let records = vec![
            record(5, None, "first"),
            record(1, None, "init"),
            record(5, Some(1), "second"),
        ];
        let forest = build_forest(&records);
        assert_eq!(node_count(&forest), 2);
        // pid 5 links per the later record, under init
        let init = forest
            .iter()
            .find(|node| node.record.pid == 1)
            .expect("init present");
        assert_eq!(init.children.len(), 1);
        assert_eq!(init.children[0].record.display_name(), "second");
        // first-seen position: pid 5 was seen before pid 1, but as a child
        // now, only init remains a root
        assert_eq!(forest.len(), 1);
    }

    #[test]
    fn parent_cycle_degrades_to_roots() {
        let records = vec![
            record(1, None, "init"),
            record(20, Some(21), "ping"),
            record(21, Some(20), "pong"),
        ];
        let forest = build_forest(&records);
        assert_eq!(node_count(&forest), 3);
        let root_pids: Vec<i64> = forest.iter().map(|node| node.record.pid).collect();
        assert!(root_pids.contains(&1));
        // the first cycle member surfaces as a root carrying the other
        assert!(root_pids.contains(&20));
    }

    #[test]
    fn flatten_starts_collapsed_and_sorts_children_by_name() {
        let records = vec![
            record(1, None, "init"),
            record(3, Some(1), "zsh"),
            record(2, Some(1), "bash"),
        ];
        let forest = build_forest(&records);

        let rows = flatten_forest(&forest, &HashSet::new());
        assert_eq!(rows.len(), 1);
        assert!(rows[0].has_children);
        assert!(!rows[0].expanded);

        let mut expanded = HashSet::new();
        expanded.insert(vec![1]);
        let rows = flatten_forest(&forest, &expanded);
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].name, "bash");
        assert_eq!(rows[2].name, "zsh");
        assert_eq!(rows[1].path, vec![1, 2]);
        assert_eq!(rows[1].depth, 1);
        assert!(!rows[1].prefix.is_empty());
    }

    #[test]
    fn roots_keep_source_order_unsorted() {
        let records = vec![
            record(9, None, "zzz"),
            record(2, None, "aaa"),
        ];
        let rows = flatten_forest(&build_forest(&records), &HashSet::new());
        assert_eq!(rows[0].name, "zzz");
        assert_eq!(rows[1].name, "aaa");
    }

    #[test]
    fn prune_drops_descendant_paths() {
        let records = vec![
            record(1, None, "init"),
            record(2, Some(1), "sshd"),
            record(3, Some(2), "bash"),
        ];
        let forest = build_forest(&records);
        let mut expanded = HashSet::new();
        expand_all(&forest, &mut expanded, &Vec::new());
        assert_eq!(flatten_forest(&forest, &expanded).len(), 3);

        prune_expanded(&mut expanded, &vec![1, 2]);
        let rows = flatten_forest(&forest, &expanded);
        assert_eq!(rows.len(), 2);
        assert!(!rows[1].expanded);

        prune_expanded(&mut expanded, &vec![1]);
        assert!(expanded.is_empty());
    }
}
