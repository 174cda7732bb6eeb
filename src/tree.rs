use crate::{
    split_entropy, AttributeSet, Dataset, DatasetView, FitError, FitResult,
    DEFAULT_MIN_SAMPLES_SPLIT,
};
use either::Either;
use ordered_float::OrderedFloat;
use rayon::prelude::*;
use tracing::{debug, trace, warn};

/// What to predict when a split node has no child for the value of the observation.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq)]
pub enum UnseenValue {
    /// Follow the first child of the node, ie the one with the smallest value seen in training.
    FirstChild,
    /// Return the majority label of the training rows which reached the node.
    NodeMode,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct TreeParams {
    /// A node with this number of rows or less becomes a leaf. 0 is treated as 1.
    pub min_samples_split: usize,
    pub unseen_value: UnseenValue,
}

impl TreeParams {
    pub fn new() -> Self {
        TreeParams {
            min_samples_split: DEFAULT_MIN_SAMPLES_SPLIT,
            unseen_value: UnseenValue::FirstChild,
        }
    }
}

impl Default for TreeParams {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of a node inside its [`DecisionTree`].
pub type NodeId = usize;

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct SplitNode {
    pub attribute: usize,
    /// Majority label of the training rows of the node
    pub mode_label: u32,
    /// (value of the attribute, child), by increasing value
    pub children: Vec<(u32, NodeId)>,
}

impl SplitNode {
    /// Child for this value of the attribute, if it was seen in training.
    pub fn child(&self, value: u32) -> Option<NodeId> {
        self.children
            .binary_search_by_key(&value, |&(edge, _)| edge)
            .ok()
            .map(|i| self.children[i].1)
    }
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct LeafNode {
    pub label: u32,
}

#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub enum Node {
    Split(SplitNode),
    Leaf(LeafNode),
}

/// Categorical decision tree trained with ID3.
///
/// All the nodes are stored in one vector and reference their children by index. Children are
/// pushed before their parent, so the root is the last node.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq)]
pub struct DecisionTree {
    nodes: Vec<Node>,
    root: NodeId,
    n_attributes: usize,
    params: TreeParams,
}

struct TreeBuilder {
    nodes: Vec<Node>,
    min_samples_split: usize,
}

impl TreeBuilder {
    fn push(&mut self, node: Node) -> NodeId {
        self.nodes.push(node);
        self.nodes.len() - 1
    }

    fn leaf(&mut self, label: u32, n_rows: usize, depth: usize) -> NodeId {
        trace!(label, n_rows, depth, "leaf");
        self.push(Node::Leaf(LeafNode { label }))
    }

    fn build(
        &mut self,
        mut view: DatasetView,
        used: &AttributeSet,
        parent_mode_label: u32,
        depth: usize,
    ) -> NodeId {
        if view.is_empty() {
            return self.leaf(parent_mode_label, 0, depth);
        }

        let n_rows = view.n_rows();
        let (mode_label, mode_count) = view.mode_label();
        if mode_count == n_rows || used.is_full() || n_rows <= self.min_samples_split {
            return self.leaf(mode_label, n_rows, depth);
        }

        // min_by_key keeps the first attribute on equal entropy
        let best = used
            .unused()
            .map(|attribute| {
                view.sort_by(attribute);
                (attribute, split_entropy(&view, attribute))
            })
            .min_by_key(|&(_, entropy)| OrderedFloat(entropy));
        let (attribute, entropy) = match best {
            Some(e) => e,
            None => return self.leaf(mode_label, n_rows, depth),
        };
        debug!(depth, attribute, entropy, n_rows, "split");

        let used = used.with(attribute);
        view.sort_by(attribute);

        let mut children = Vec::new();
        for split in view.split_iterator(attribute) {
            let child = self.build(split.view, &used, mode_label, depth + 1);
            children.push((split.value, child));
        }

        self.push(Node::Split(SplitNode {
            attribute,
            mode_label,
            children,
        }))
    }
}

/// Build a tree from `view`, with the attributes of `used` already consumed.
///
/// `parent_mode_label` is the label of the tree if the view is empty. Fails if `used` is not
/// sized for the attributes of the view.
pub fn id3(
    view: DatasetView,
    used: &AttributeSet,
    parent_mode_label: u32,
    params: &TreeParams,
) -> FitResult<DecisionTree> {
    if used.capacity() != view.n_attributes() {
        return Err(FitError::InvalidInput(format!(
            "attribute set holds {} attributes, the data has {}",
            used.capacity(),
            view.n_attributes()
        )));
    }
    Ok(build_tree(view, used, parent_mode_label, params))
}

fn build_tree(
    view: DatasetView,
    used: &AttributeSet,
    parent_mode_label: u32,
    params: &TreeParams,
) -> DecisionTree {
    let mut params = params.clone();
    if params.min_samples_split < 1 {
        warn!(
            min_samples_split = params.min_samples_split,
            "min_samples_split must be at least 1, using 1"
        );
        params.min_samples_split = 1;
    }

    let n_attributes = view.n_attributes();
    let mut builder = TreeBuilder {
        nodes: Vec::new(),
        min_samples_split: params.min_samples_split,
    };
    let root = builder.build(view, used, parent_mode_label, 0);
    debug!(n_nodes = builder.nodes.len(), "tree built");

    DecisionTree {
        nodes: builder.nodes,
        root,
        n_attributes,
        params,
    }
}

impl DecisionTree {
    /// Train a tree on all the rows of the dataset.
    pub fn fit(train: &Dataset, params: &TreeParams) -> DecisionTree {
        let view = DatasetView::new(train);
        let (mode_label, _) = view.mode_label();
        build_tree(
            view,
            &AttributeSet::new(train.n_attributes()),
            mode_label,
            params,
        )
    }

    /// Predict the label of an observation.
    ///
    /// When a value was never seen at a split node, the `unseen_value` policy of the params
    /// decides. The observation must have as many attributes as the training data.
    pub fn predict(&self, features: &[u32]) -> u32 {
        debug_assert_eq!(
            features.len(),
            self.n_attributes,
            "observation arity differs from the training data"
        );
        let mut node = self.root;
        loop {
            match &self.nodes[node] {
                Node::Leaf(leaf) => return leaf.label,
                Node::Split(split) => {
                    node = match split.child(features[split.attribute]) {
                        Some(child) => child,
                        None => match (self.params.unseen_value, split.children.first()) {
                            (UnseenValue::FirstChild, Some(&(_, first))) => first,
                            _ => return split.mode_label,
                        },
                    }
                }
            }
        }
    }

    /// Same as `predict`, but fails instead of using a fallback for unseen values.
    pub fn predict_strict(&self, features: &[u32]) -> FitResult<u32> {
        if features.len() != self.n_attributes {
            return Err(FitError::InvalidInput(format!(
                "observation has {} attributes, expected {}",
                features.len(),
                self.n_attributes
            )));
        }
        let mut node = self.root;
        loop {
            match &self.nodes[node] {
                Node::Leaf(leaf) => return Ok(leaf.label),
                Node::Split(split) => {
                    let value = features[split.attribute];
                    node = split.child(value).ok_or(FitError::NoMatchingBranch {
                        attribute: split.attribute,
                        value,
                    })?;
                }
            }
        }
    }

    /// Predict every row, in parallel.
    pub fn par_predict(&self, rows: &[Vec<u32>]) -> Vec<u32> {
        rows.par_iter().map(|row| self.predict(row)).collect()
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    pub fn params(&self) -> &TreeParams {
        &self.params
    }

    pub fn n_attributes(&self) -> usize {
        self.n_attributes
    }

    pub fn n_nodes(&self) -> usize {
        self.nodes.len()
    }

    pub fn n_leaves(&self) -> usize {
        self.nodes
            .iter()
            .filter(|node| matches!(node, Node::Leaf(_)))
            .count()
    }

    /// (edge value, child) of a node. Empty for a leaf.
    pub fn children(&self, id: NodeId) -> impl Iterator<Item = (u32, NodeId)> + '_ {
        match &self.nodes[id] {
            Node::Leaf(_) => Either::Left(std::iter::empty()),
            Node::Split(split) => Either::Right(split.children.iter().copied()),
        }
    }

    /// Number of edges between the root and the deepest leaf.
    pub fn depth(&self) -> usize {
        self.depth_from(self.root)
    }

    fn depth_from(&self, id: NodeId) -> usize {
        self.children(id)
            .map(|(_, child)| 1 + self.depth_from(child))
            .max()
            .unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use crate::*;
    use rand::prelude::*;
    use std::collections::BTreeSet;

    fn tennis() -> Dataset {
        // outlook, temperature, humidity, wind, play
        parse_csv(include_str!("../data/tennis.csv"), ",").expect("tennis data")
    }

    /// Every combination of the 6 attributes of the car evaluation data, labelled with a fixed
    /// set of rules. Each attribute vector appears once.
    fn car_evaluation() -> Dataset {
        let mut rows = Vec::new();
        let mut target = Vec::new();
        for buying in 0..4 {
            for maint in 0..4 {
                for doors in 0..4 {
                    for persons in 0..3 {
                        for lug_boot in 0..3 {
                            for safety in 0..3 {
                                let price = buying + maint;
                                let comfort = lug_boot + (persons == 2) as u32 + (doors >= 2) as u32;
                                let score = price + comfort + safety;
                                let label = if persons == 0 || safety == 0 || price < 2 {
                                    0
                                } else if score >= 11 {
                                    3
                                } else if score >= 9 {
                                    2
                                } else if score >= 6 {
                                    1
                                } else {
                                    0
                                };
                                rows.push(vec![buying, maint, doors, persons, lug_boot, safety]);
                                target.push(label);
                            }
                        }
                    }
                }
            }
        }
        Dataset::new(rows, target).expect("car data")
    }

    fn in_sample_accuracy(tree: &DecisionTree, data: &Dataset) -> f64 {
        let yhat: Vec<_> = data.rows().iter().map(|row| tree.predict(row)).collect();
        accuracy(data.target(), &yhat)
    }

    #[test]
    fn test_tennis_in_sample() {
        let data = tennis();
        assert_eq!(data.n_rows(), 14);
        let params = TreeParams {
            min_samples_split: 2,
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(&data, &params);

        for (row, &label) in data.rows().iter().zip(data.target()) {
            assert_eq!(tree.predict(row), label);
            assert_eq!(tree.predict_strict(row), Ok(label));
        }

        // Outlook at the root, then humidity (sunny) and wind (rain)
        match tree.node(tree.root()) {
            Node::Split(split) => {
                assert_eq!(split.attribute, 0);
                assert_eq!(split.children.len(), 3);
            }
            Node::Leaf(_) => panic!("the root must be a split"),
        }
        assert_eq!(tree.depth(), 2);
        assert_eq!(tree.n_leaves(), 5);
        assert_eq!(tree.n_nodes(), 8);
    }

    #[test]
    fn test_car_evaluation_full_depth() {
        let data = car_evaluation();
        assert_eq!(data.n_rows(), 1728);
        let labels: BTreeSet<_> = data.target().iter().copied().collect();
        assert_eq!(labels.len(), 4);

        let params = TreeParams {
            min_samples_split: 1,
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(&data, &params);
        // Every attribute vector is unique, so a full tree can't mix labels
        assert_eq!(in_sample_accuracy(&tree, &data), 1.);
        assert!(tree.depth() <= data.n_attributes());

        // Reference number of rows predicted right, computed once for this grid
        for &(min_samples_split, n_ok) in &[(2, 1728), (16, 1540)] {
            let params = TreeParams {
                min_samples_split,
                ..TreeParams::default()
            };
            let tree = DecisionTree::fit(&data, &params);
            let yhat: Vec<_> = data.rows().iter().map(|row| tree.predict(row)).collect();
            let correct = yhat.iter().zip(data.target()).filter(|(a, b)| a == b).count();
            assert_eq!(correct, n_ok, "min_samples_split={}", min_samples_split);
        }
    }

    #[test]
    fn test_id3_rejects_wrong_attribute_set() {
        let data = tennis();
        for &capacity in &[2, 5] {
            let tree = id3(
                DatasetView::new(&data),
                &AttributeSet::new(capacity),
                0,
                &TreeParams::default(),
            );
            assert!(matches!(tree, Err(FitError::InvalidInput(_))));
        }

        let used = AttributeSet::new(data.n_attributes()).with(0);
        let tree = id3(DatasetView::new(&data), &used, 0, &TreeParams::default())
            .expect("sized set");
        match tree.node(tree.root()) {
            Node::Split(split) => assert_ne!(split.attribute, 0),
            Node::Leaf(_) => panic!("the root must be a split"),
        }
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "observation arity")]
    fn test_predict_short_observation_panics() {
        let tree = DecisionTree::fit(&tennis(), &TreeParams::default());
        tree.predict(&[0]);
    }

    #[test]
    fn test_min_samples_split_stops_early() {
        let data = tennis();
        let params = TreeParams {
            min_samples_split: 14,
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(&data, &params);
        assert_eq!(tree.n_nodes(), 1);
        // 9 yes against 5 no
        assert_eq!(tree.predict(&[0, 0, 0, 0]), 1);
    }

    #[test]
    fn test_min_samples_split_zero_is_one() {
        let data = car_evaluation();
        let params = TreeParams {
            min_samples_split: 0,
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(&data, &params);
        assert_eq!(tree.params().min_samples_split, 1);
        assert_eq!(in_sample_accuracy(&tree, &data), 1.);
    }

    #[test]
    fn test_empty_view_is_parent_leaf() {
        let data = tennis();
        let empty = DatasetView::new(&data).copy_from(0, 0);

        let mut full = AttributeSet::new(data.n_attributes());
        for attribute in 0..data.n_attributes() {
            full.insert(attribute);
        }
        for used in &[AttributeSet::new(data.n_attributes()), full] {
            let tree = id3(empty.clone(), used, 7, &TreeParams::default()).expect("sized set");
            assert_eq!(tree.n_nodes(), 1);
            assert_eq!(tree.node(tree.root()), &Node::Leaf(LeafNode { label: 7 }));
            assert_eq!(tree.predict(&[0, 0, 0, 0]), 7);
        }
    }

    #[test]
    fn test_depth_is_bounded() {
        let mut rng = StdRng::seed_from_u64(42);
        for n_attributes in 1..6 {
            let rows: Vec<Vec<u32>> = (0..200)
                .map(|_| (0..n_attributes).map(|_| rng.gen_range(0..4)).collect())
                .collect();
            let target: Vec<u32> = (0..200).map(|_| rng.gen_range(0..3)).collect();
            let data = Dataset::new(rows, target).expect("random data");
            let params = TreeParams {
                min_samples_split: 1,
                ..TreeParams::default()
            };
            let tree = DecisionTree::fit(&data, &params);
            assert!(tree.depth() <= n_attributes);
            assert!(tree.n_leaves() >= 1);
        }
    }

    #[test]
    fn test_equal_entropy_picks_first_attribute() {
        // Attributes 0 and 1 are identical
        let rows = vec![vec![0, 0], vec![1, 1], vec![0, 0], vec![1, 1]];
        let data = Dataset::new(rows, vec![0, 1, 0, 1]).expect("valid dataset");
        let tree = DecisionTree::fit(&data, &TreeParams::default());
        match tree.node(tree.root()) {
            Node::Split(split) => assert_eq!(split.attribute, 0),
            Node::Leaf(_) => panic!("the root must be a split"),
        }
    }

    /// Tennis without the overcast days, and an observation with a value never seen at the
    /// root split.
    fn unseen_setup() -> (DecisionTree, TreeParams, Dataset, Vec<u32>) {
        let data = tennis();
        let (rows, target): (Vec<_>, Vec<_>) = data
            .rows()
            .iter()
            .cloned()
            .zip(data.target().iter().copied())
            .filter(|(row, _)| row[0] != 1)
            .unzip();
        let train = Dataset::new(rows, target).expect("subset");
        let params = TreeParams {
            min_samples_split: 2,
            ..TreeParams::default()
        };
        let tree = DecisionTree::fit(&train, &params);
        let attribute = match tree.node(tree.root()) {
            Node::Split(split) => split.attribute,
            Node::Leaf(_) => panic!("the root must be a split"),
        };
        let mut observation = vec![1, 1, 1, 1];
        observation[attribute] = 9;
        (tree, params, train, observation)
    }

    #[test]
    fn test_unseen_value_first_child() {
        let (tree, _, _, observation) = unseen_setup();
        let (attribute, first_value) = match tree.node(tree.root()) {
            Node::Split(split) => (split.attribute, split.children[0].0),
            Node::Leaf(_) => unreachable!(),
        };
        let mut seen = observation.clone();
        seen[attribute] = first_value;

        let label = tree.predict(&observation);
        assert_eq!(label, tree.predict(&seen));
        for _ in 0..10 {
            assert_eq!(tree.predict(&observation), label);
        }
    }

    #[test]
    fn test_unseen_value_node_mode() {
        let (_, params, train, observation) = unseen_setup();
        let params = TreeParams {
            unseen_value: UnseenValue::NodeMode,
            ..params
        };
        let tree = DecisionTree::fit(&train, &params);
        let mode_label = match tree.node(tree.root()) {
            Node::Split(split) => split.mode_label,
            Node::Leaf(_) => unreachable!(),
        };
        assert_eq!(mode_label, DatasetView::new(&train).mode_label().0);
        assert_eq!(tree.predict(&observation), mode_label);
    }

    #[test]
    fn test_unseen_value_strict() {
        let (tree, _, _, observation) = unseen_setup();
        match tree.predict_strict(&observation) {
            Err(FitError::NoMatchingBranch { value, .. }) => assert_eq!(value, 9),
            other => panic!("expected NoMatchingBranch, got {:?}", other),
        }
        assert!(matches!(
            tree.predict_strict(&[0, 0]),
            Err(FitError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_train_test_split() {
        let data = car_evaluation();
        let mut indices: Vec<usize> = (0..data.n_rows()).collect();
        indices.shuffle(&mut StdRng::seed_from_u64(0));
        let (test_idx, train_idx) = indices.split_at(data.n_rows() / 5);

        let subset = |idx: &[usize]| -> (Vec<Vec<u32>>, Vec<u32>) {
            idx.iter()
                .map(|&i| (data.row(i).to_vec(), data.target()[i]))
                .unzip()
        };
        let (rows, target) = subset(train_idx);
        let train = Dataset::new(rows, target).expect("train split");
        let (test_rows, test_target) = subset(test_idx);

        let tree = DecisionTree::fit(&train, &TreeParams::default());
        let yhat = tree.par_predict(&test_rows);
        let sequential: Vec<_> = test_rows.iter().map(|row| tree.predict(row)).collect();
        assert_eq!(yhat, sequential);
        // Must do better than always predicting the most frequent label
        let majority = DecisionTree::fit(
            &train,
            &TreeParams {
                min_samples_split: train.n_rows(),
                ..TreeParams::default()
            },
        );
        assert_eq!(majority.n_nodes(), 1);
        let baseline: Vec<_> = test_rows.iter().map(|row| majority.predict(row)).collect();
        assert!(accuracy(&test_target, &yhat) > accuracy(&test_target, &baseline));
    }

    #[test]
    fn test_serde_round_trip() {
        let data = tennis();
        let tree = DecisionTree::fit(&data, &TreeParams::default());
        let json = serde_json::to_string(&tree).expect("serialize");
        let loaded: DecisionTree = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(loaded, tree);
        for row in data.rows() {
            assert_eq!(loaded.predict(row), tree.predict(row));
        }
    }
}
