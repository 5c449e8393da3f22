//! Cell-lineage tree arena.
//!
//! A tree is a full binary tree of life episodes addressed by integer
//! label: the root cell is label 1 and the daughters of label `n` are
//! `2n` and `2n + 1`, so child lookup is pure arithmetic. Parent links are
//! kept only for upward lookups; the likelihood algorithms always walk
//! downward through the child labels.

use nohash_hasher::IntMap;

use crate::error::{Error, Result};

/// Label of the root cell.
pub const ROOT_LABEL: u32 = 1;

/// Terminal event of a cell's life episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Fate {
    /// The cell divided into two daughters.
    Divides,
    /// The cell died.
    Apoptoses,
    /// The cell was tracked to the end of observation without dividing or dying.
    NonDividing,
    /// Tracking failed; nothing about this cell was observed.
    Lost,
    /// Right-censored: the episode ran past the end of the observation window.
    Unobserved,
}

/// One cell's life episode.
#[derive(Clone, Debug)]
pub struct Node {
    label: u32,
    parent: Option<u32>,
    children: Option<[u32; 2]>,
    fate: Fate,
    measurements: Vec<(String, f64)>,
    incomplete: bool,
}

impl Node {
    fn new(label: u32, parent: Option<u32>, fate: Fate) -> Self {
        Self {
            label,
            parent,
            children: None,
            fate,
            measurements: Vec::new(),
            incomplete: false,
        }
    }

    pub fn label(&self) -> u32 {
        self.label
    }

    pub fn parent(&self) -> Option<u32> {
        self.parent
    }

    pub fn children(&self) -> Option<[u32; 2]> {
        self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_none()
    }

    pub fn is_root(&self) -> bool {
        self.label == ROOT_LABEL
    }

    pub fn fate(&self) -> Fate {
        self.fate
    }

    pub fn is_lost(&self) -> bool {
        self.fate == Fate::Lost
    }

    /// Observed value for a measurement tag; `None` means missing, not zero.
    pub fn measured(&self, tag: &str) -> Option<f64> {
        self.measurements
            .iter()
            .find(|(t, _)| t == tag)
            .map(|&(_, v)| v)
    }

    /// Whether the episode's time series was cut short, so summary
    /// statistics are right-truncated.
    pub fn is_incomplete(&self) -> bool {
        self.incomplete
    }
}

/// Rooted full binary tree of cell life episodes.
///
/// Built by repeated division: every internal node has exactly two
/// children by construction. New daughters start out [`Fate::Unobserved`]
/// until the tracking data says otherwise.
#[derive(Clone, Debug)]
pub struct LineageTree {
    nodes: IntMap<u32, Node>,
}

impl LineageTree {
    /// Create a tree holding only the root cell.
    pub fn root(fate: Fate) -> Self {
        let mut nodes = IntMap::default();
        nodes.insert(ROOT_LABEL, Node::new(ROOT_LABEL, None, fate));
        Self { nodes }
    }

    /// Divide `label` into daughters `2·label` and `2·label + 1`.
    ///
    /// The divided cell's fate becomes [`Fate::Divides`]. Returns the two
    /// daughter labels.
    pub fn divide(&mut self, label: u32) -> Result<[u32; 2]> {
        let node = self
            .nodes
            .get_mut(&label)
            .ok_or(Error::UnknownNode(label))?;
        if node.children.is_some() {
            return Err(Error::AlreadyDivided(label));
        }

        let daughters = [2 * label, 2 * label + 1];
        node.children = Some(daughters);
        node.fate = Fate::Divides;
        for daughter in daughters {
            self.nodes
                .insert(daughter, Node::new(daughter, Some(label), Fate::Unobserved));
        }
        Ok(daughters)
    }

    pub fn set_fate(&mut self, label: u32, fate: Fate) -> Result<()> {
        self.node_mut(label)?.fate = fate;
        Ok(())
    }

    /// Record an observed value for a measurement tag, replacing any
    /// earlier observation of the same tag.
    pub fn observe(&mut self, label: u32, tag: &str, value: f64) -> Result<()> {
        let node = self.node_mut(label)?;
        match node.measurements.iter_mut().find(|(t, _)| t == tag) {
            Some(slot) => slot.1 = value,
            None => node.measurements.push((tag.to_owned(), value)),
        }
        Ok(())
    }

    /// Flag the episode's time series as right-truncated.
    pub fn mark_incomplete(&mut self, label: u32) -> Result<()> {
        self.node_mut(label)?.incomplete = true;
        Ok(())
    }

    pub fn node(&self, label: u32) -> Result<&Node> {
        self.nodes.get(&label).ok_or(Error::UnknownNode(label))
    }

    pub fn get(&self, label: u32) -> Option<&Node> {
        self.nodes.get(&label)
    }

    pub fn root_node(&self) -> &Node {
        &self.nodes[&ROOT_LABEL]
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn labels(&self) -> impl Iterator<Item = u32> + '_ {
        self.nodes.keys().copied()
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values()
    }

    /// Largest label in use; bounds the index space of per-label arrays.
    pub fn max_label(&self) -> u32 {
        self.nodes.keys().copied().max().unwrap_or(ROOT_LABEL)
    }

    fn node_mut(&mut self, label: u32) -> Result<&mut Node> {
        self.nodes.get_mut(&label).ok_or(Error::UnknownNode(label))
    }
}
