use rand::{Rng, SeedableRng, rngs::StdRng, seq::SliceRandom};

use crate::{
    fragment::{Graph, Node, Relationship, SchemaDeclaration, add_index, set_node_source},
    identity::{Index, Key},
};

pub const BENCH_LABEL: &str = "Record";
pub const BENCH_PROPERTY: &str = "id";
pub const ALIAS_PROPERTY: &str = "alias";

#[derive(Clone, Debug)]
pub struct FragmentDataset {
    pub fragments: Vec<Graph>,
}

impl FragmentDataset {
    pub fn nodes(&self) -> usize {
        self.fragments.iter().map(|f| f.nodes.len()).sum()
    }

    pub fn relationships(&self) -> usize {
        self.fragments.iter().map(|f| f.relationships.len()).sum()
    }

    /// The same fragments in a seeded random order.
    pub fn shuffled(&self, seed: u64) -> FragmentDataset {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut fragments = self.fragments.clone();
        fragments.shuffle(&mut rng);
        FragmentDataset { fragments }
    }
}

#[derive(Clone, Copy, Debug)]
pub enum ReferenceShape {
    /// Relationships point only at nodes of the same or earlier fragments.
    Backward,
    /// Relationships point at nodes of later fragments, so they are deferred
    /// first. The last fragment has no later one and points anywhere.
    Forward,
    /// Relationships point anywhere in the dataset.
    Random,
}

pub fn record_key(idx: usize) -> Key {
    Key::with_property(BENCH_LABEL, BENCH_PROPERTY, format!("R{idx}"))
}

pub fn alias_key(idx: usize) -> Key {
    Key::with_property(BENCH_LABEL, ALIAS_PROPERTY, format!("alias-{idx}"))
}

/// Builds `fragment_count` fragments of `nodes_per_fragment` nodes each. Every
/// node carries a primary key plus an alias key and owns `edges_per_node`
/// outgoing relationships addressed through either key.
pub fn generate_fragments(
    shape: ReferenceShape,
    fragment_count: usize,
    nodes_per_fragment: usize,
    edges_per_node: usize,
    seed: u64,
) -> FragmentDataset {
    assert!(fragment_count > 0, "fragment_count must be positive");
    assert!(nodes_per_fragment > 0, "nodes_per_fragment must be positive");
    let total = fragment_count * nodes_per_fragment;
    let mut rng = StdRng::seed_from_u64(seed);
    let mut fragments = Vec::with_capacity(fragment_count);
    for fragment_idx in 0..fragment_count {
        let mut graph = Graph::new();
        graph.push_schema(SchemaDeclaration::unique(Index::with_property(
            BENCH_LABEL,
            BENCH_PROPERTY,
        )));
        graph.push_schema(SchemaDeclaration::index(Index::with_property(
            BENCH_LABEL,
            ALIAS_PROPERTY,
        )));
        let first = fragment_idx * nodes_per_fragment;
        for idx in first..first + nodes_per_fragment {
            let mut node = Node::new(record_key(idx));
            add_index(&mut node, alias_key(idx));
            set_node_source(&mut node, format!("fragment-{fragment_idx}"));
            graph.push_node(node);
            for _ in 0..edges_per_node {
                let target = match shape {
                    ReferenceShape::Backward => rng.gen_range(0..first + nodes_per_fragment),
                    ReferenceShape::Forward if first + nodes_per_fragment < total => {
                        rng.gen_range(first + nodes_per_fragment..total)
                    }
                    ReferenceShape::Forward => rng.gen_range(0..total),
                    ReferenceShape::Random => rng.gen_range(0..total),
                };
                let end = if rng.gen_bool(0.5) {
                    record_key(target)
                } else {
                    alias_key(target)
                };
                graph.push_relationship(Relationship::new("LINKS", record_key(idx), end));
            }
        }
        fragments.push(graph);
    }
    FragmentDataset { fragments }
}
