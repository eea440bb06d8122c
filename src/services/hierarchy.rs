//! Broader/narrower topic hierarchy over a directed acyclic graph.
//!
//! Edges are proposed by the completion gateway and validated before being
//! admitted: suggested names must resolve to existing active interests,
//! self-loops are dropped, and any edge that would close a directed cycle is
//! rejected. Traversals carry a visited set anyway, so even a hand-edited
//! store cannot loop them.

use crate::llm::{
    CompletionGateway, CompletionRequest, extract_json_array,
    prompts::{HIERARCHY_SUGGESTION_SYSTEM, build_hierarchy_prompt},
};
use crate::models::{HierarchyEdge, HierarchyNode, HierarchyTree, Interest, InterestId, TreeNode};
use crate::storage::InterestStore;
use crate::{Error, Result};
use serde::Deserialize;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use tracing::instrument;

/// A relationship proposed by the completion gateway.
#[derive(Debug, Clone, Deserialize)]
struct HierarchyCandidate {
    parent: String,
    child: String,
    #[serde(default = "default_candidate_confidence")]
    confidence: f32,
    #[serde(default)]
    reason: String,
}

const fn default_candidate_confidence() -> f32 {
    0.7
}

/// Maintains and queries the DAG of broader-than relationships.
pub struct HierarchyGraph<S: InterestStore, C: CompletionGateway> {
    store: Arc<S>,
    llm: Arc<C>,
}

impl<S: InterestStore, C: CompletionGateway> HierarchyGraph<S, C> {
    /// Creates a new hierarchy graph service.
    #[must_use]
    pub const fn new(store: Arc<S>, llm: Arc<C>) -> Self {
        Self { store, llm }
    }

    /// Asks the completion gateway for broader/narrower relationships among
    /// all active interests and persists the edges that survive validation.
    ///
    /// The whole active topic set goes out in one batched request. Each
    /// returned `{parent, child}` candidate is matched back to interests by
    /// case-insensitive exact topic name; unmatched names, self-loops and
    /// cycle-forming edges are skipped individually, so one bad suggestion
    /// never aborts the batch. A response with no parsable JSON array counts
    /// as zero candidates, not an error.
    ///
    /// Returns the number of edges accepted.
    ///
    /// # Errors
    ///
    /// Returns an error if the active set cannot be listed or the completion
    /// request itself fails.
    #[instrument(skip(self))]
    pub fn detect_hierarchies(&self) -> Result<usize> {
        let active = self.store.list_active_interests()?;
        if active.len() < 2 {
            return Ok(0);
        }

        let topics: Vec<&str> = active.iter().map(|i| i.topic.as_str()).collect();
        let request = CompletionRequest::new(build_hierarchy_prompt(&topics))
            .with_system(HIERARCHY_SUGGESTION_SYSTEM)
            .with_temperature(0.2);
        let response = self.llm.complete(&request)?;

        let candidates = Self::parse_candidates(&response.text);
        if candidates.is_empty() {
            tracing::debug!("No hierarchy candidates in completion response");
            return Ok(0);
        }

        // Case-insensitive topic -> id map for matching suggestions back
        let by_topic: HashMap<String, &Interest> = active
            .iter()
            .map(|i| (i.topic.to_lowercase(), i))
            .collect();

        let mut accepted = 0;
        for candidate in candidates {
            let Some(parent) = by_topic.get(&candidate.parent.to_lowercase()) else {
                tracing::debug!(name = %candidate.parent, "Suggested parent matches no interest");
                continue;
            };
            let Some(child) = by_topic.get(&candidate.child.to_lowercase()) else {
                tracing::debug!(name = %candidate.child, "Suggested child matches no interest");
                continue;
            };

            if parent.id == child.id {
                tracing::debug!(topic = %parent.topic, "Skipping self-referential suggestion");
                continue;
            }

            match self.would_create_cycle(&parent.id, &child.id) {
                Ok(true) => {
                    tracing::warn!(
                        parent = %parent.topic,
                        child = %child.topic,
                        reason = %candidate.reason,
                        "Rejected hierarchy edge: would create a cycle"
                    );
                    continue;
                },
                Ok(false) => {},
                Err(e) => {
                    tracing::warn!(
                        parent = %parent.topic,
                        child = %child.topic,
                        error = %e,
                        "Cycle check failed, skipping candidate"
                    );
                    continue;
                },
            }

            let edge = HierarchyEdge::new(
                parent.id.clone(),
                child.id.clone(),
                candidate.confidence,
            );
            if let Err(e) = self.store.upsert_edge(&edge) {
                tracing::warn!(parent = %parent.topic, child = %child.topic, error = %e, "Edge upsert failed");
                continue;
            }
            accepted += 1;
        }

        tracing::info!(accepted, "Hierarchy detection pass complete");
        Ok(accepted)
    }

    /// Parses candidate edges out of completion output.
    ///
    /// Malformed output degrades to an empty list.
    fn parse_candidates(text: &str) -> Vec<HierarchyCandidate> {
        let Some(json) = extract_json_array(text) else {
            return Vec::new();
        };
        match serde_json::from_str::<Vec<HierarchyCandidate>>(json) {
            Ok(candidates) => candidates,
            Err(e) => {
                tracing::warn!(error = %e, "Unparsable hierarchy suggestions, treating as empty");
                Vec::new()
            },
        }
    }

    /// Returns true if inserting `parent -> child` would close a directed
    /// cycle, i.e. if `child` is already an ancestor of `parent`.
    ///
    /// This is the single invariant-preserving predicate guarding every edge
    /// insertion.
    ///
    /// # Errors
    ///
    /// Returns an error if edges cannot be read.
    pub fn would_create_cycle(&self, parent_id: &InterestId, child_id: &InterestId) -> Result<bool> {
        if parent_id == child_id {
            return Ok(true);
        }
        let ancestors = self.walk_ids(parent_id, Direction::Ancestors, None)?;
        Ok(ancestors.contains_key(child_id))
    }

    /// Returns the ancestors of an interest (broader topics), each annotated
    /// with its distance from the query node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown interest id.
    pub fn get_ancestors(
        &self,
        id: &InterestId,
        max_depth: Option<u32>,
    ) -> Result<Vec<HierarchyNode>> {
        self.traverse(id, Direction::Ancestors, max_depth)
    }

    /// Returns the descendants of an interest (narrower topics), each
    /// annotated with its distance from the query node.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] for an unknown interest id.
    pub fn get_descendants(
        &self,
        id: &InterestId,
        max_depth: Option<u32>,
    ) -> Result<Vec<HierarchyNode>> {
        self.traverse(id, Direction::Descendants, max_depth)
    }

    fn traverse(
        &self,
        id: &InterestId,
        direction: Direction,
        max_depth: Option<u32>,
    ) -> Result<Vec<HierarchyNode>> {
        if self.store.get_interest(id)?.is_none() {
            return Err(Error::NotFound {
                kind: "interest",
                id: id.to_string(),
            });
        }

        let reached = self.walk_ids(id, direction, max_depth)?;
        let mut nodes = Vec::with_capacity(reached.len());
        for (node_id, distance) in reached {
            // Resolve against live rows only; edges touching tombstones are
            // invisible to traversal results.
            let Some(interest) = self.store.get_interest(&node_id)? else {
                continue;
            };
            if !interest.is_active {
                continue;
            }
            nodes.push(HierarchyNode {
                interest_id: interest.id,
                topic: interest.topic,
                distance,
            });
        }
        nodes.sort_by(|a, b| {
            a.distance
                .cmp(&b.distance)
                .then_with(|| a.topic.cmp(&b.topic))
        });
        Ok(nodes)
    }

    /// Breadth-first id walk with a visited set and optional depth cutoff.
    ///
    /// The visited set is a defensive backstop: insertion-time cycle checks
    /// should make it unreachable.
    fn walk_ids(
        &self,
        start: &InterestId,
        direction: Direction,
        max_depth: Option<u32>,
    ) -> Result<HashMap<InterestId, u32>> {
        let mut reached: HashMap<InterestId, u32> = HashMap::new();
        let mut visited: HashSet<InterestId> = HashSet::new();
        let mut queue: VecDeque<(InterestId, u32)> = VecDeque::new();

        visited.insert(start.clone());
        queue.push_back((start.clone(), 0));

        while let Some((current, depth)) = queue.pop_front() {
            if let Some(cutoff) = max_depth {
                if depth >= cutoff {
                    continue;
                }
            }

            let edges = match direction {
                Direction::Ancestors => self.store.edges_to(&current)?,
                Direction::Descendants => self.store.edges_from(&current)?,
            };

            for edge in edges {
                let next = match direction {
                    Direction::Ancestors => edge.parent_id,
                    Direction::Descendants => edge.child_id,
                };
                if !visited.insert(next.clone()) {
                    continue;
                }
                reached.insert(next.clone(), depth + 1);
                queue.push_back((next, depth + 1));
            }
        }

        Ok(reached)
    }

    /// Builds the full hierarchy forest over active interests.
    ///
    /// A node with no incoming edge is a root; depth is the distance from
    /// its root. The result carries summary statistics for the whole forest.
    ///
    /// # Errors
    ///
    /// Returns an error if interests or edges cannot be read.
    pub fn build_hierarchy_tree(&self) -> Result<HierarchyTree> {
        let active = self.store.list_active_interests()?;
        let active_ids: HashSet<&InterestId> = active.iter().map(|i| &i.id).collect();
        let by_id: HashMap<&InterestId, &Interest> = active.iter().map(|i| (&i.id, i)).collect();

        // Adjacency over active interests only
        let mut children: HashMap<&InterestId, Vec<&InterestId>> = HashMap::new();
        let mut has_parent: HashSet<&InterestId> = HashSet::new();
        let edges = self.store.list_edges()?;
        for edge in &edges {
            let (Some(parent), Some(child)) = (
                active_ids.get(&edge.parent_id),
                active_ids.get(&edge.child_id),
            ) else {
                continue;
            };
            children.entry(*parent).or_default().push(*child);
            has_parent.insert(*child);
        }
        for list in children.values_mut() {
            list.sort();
        }

        let mut roots = Vec::new();
        let mut max_depth = 0;
        let mut visited: HashSet<InterestId> = HashSet::new();
        for interest in &active {
            if has_parent.contains(&interest.id) {
                continue;
            }
            let node = Self::expand_node(interest, 0, &children, &by_id, &mut visited, &mut max_depth);
            roots.push(node);
        }

        Ok(HierarchyTree {
            root_count: roots.len(),
            total_interests: active.len(),
            max_depth,
            roots,
        })
    }

    /// Recursively expands a tree node, guarding against residual cycles
    /// with the shared visited set.
    fn expand_node(
        interest: &Interest,
        depth: u32,
        children: &HashMap<&InterestId, Vec<&InterestId>>,
        by_id: &HashMap<&InterestId, &Interest>,
        visited: &mut HashSet<InterestId>,
        max_depth: &mut u32,
    ) -> TreeNode {
        visited.insert(interest.id.clone());
        if depth > *max_depth {
            *max_depth = depth;
        }

        let child_ids: Vec<&InterestId> = children.get(&interest.id).cloned().unwrap_or_default();

        let mut child_nodes = Vec::with_capacity(child_ids.len());
        for id in child_ids {
            // A sibling subtree may already have claimed this node
            if visited.contains(id) {
                continue;
            }
            if let Some(child) = by_id.get(id) {
                child_nodes.push(Self::expand_node(
                    child, depth + 1, children, by_id, visited, max_depth,
                ));
            }
        }

        TreeNode {
            interest_id: interest.id.clone(),
            topic: interest.topic.clone(),
            confidence: interest.confidence,
            depth,
            children: child_nodes,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Ancestors,
    Descendants,
}
