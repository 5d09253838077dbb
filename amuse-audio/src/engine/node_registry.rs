use std::collections::{HashSet, VecDeque};

use amuse_types::NodeId;

/// Tracks which graph nodes are believed to exist on the sink.
///
/// Persistent nodes live until teardown. Chord layers are transient: each is
/// registered with the sink-clock time its envelope ends and is dropped from
/// the set by `expire` once that time has passed.
pub struct NodeRegistry {
    live_nodes: HashSet<NodeId>,
    transient: VecDeque<(NodeId, f64)>,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self {
            live_nodes: HashSet::new(),
            transient: VecDeque::new(),
        }
    }

    /// Record that a node has been created on the sink.
    pub fn register(&mut self, node_id: NodeId) {
        self.live_nodes.insert(node_id);
    }

    /// Record a node that stops itself at `ends_at`.
    pub fn register_transient(&mut self, node_id: NodeId, ends_at: f64) {
        self.live_nodes.insert(node_id);
        self.transient.push_back((node_id, ends_at));
    }

    /// Forget transient nodes whose envelope ended before `now`.
    pub fn expire(&mut self, now: f64) -> usize {
        let mut expired = 0;
        while let Some(&(id, ends_at)) = self.transient.front() {
            if ends_at > now {
                break;
            }
            self.transient.pop_front();
            self.live_nodes.remove(&id);
            expired += 1;
        }
        expired
    }

    /// Transient nodes that are still sounding.
    pub fn transient_ids(&self) -> Vec<NodeId> {
        self.transient.iter().map(|(id, _)| *id).collect()
    }

    /// Mark all nodes as dead (teardown or a lost output context).
    pub fn invalidate_all(&mut self) {
        self.live_nodes.clear();
        self.transient.clear();
    }

    /// Number of nodes currently believed to be alive.
    pub fn live_count(&self) -> usize {
        self.live_nodes.len()
    }
}

impl Default for NodeRegistry {
    fn default() -> Self {
        Self::new()
    }
}
