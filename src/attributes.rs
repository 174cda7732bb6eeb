/// Set of the attributes already used for a split on the path from the root.
///
/// One bit per attribute, packed in `u64` words: a dataset with up to 64 attributes uses a
/// single word, more attributes get more words.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub struct AttributeSet {
    words: Vec<u64>,
    n_attributes: usize,
}

impl AttributeSet {
    /// Empty set able to hold the attributes `0..n_attributes`.
    pub fn new(n_attributes: usize) -> Self {
        AttributeSet {
            words: vec![0; (n_attributes + 63) / 64],
            n_attributes,
        }
    }

    pub fn capacity(&self) -> usize {
        self.n_attributes
    }

    pub fn contains(&self, attribute: usize) -> bool {
        attribute < self.n_attributes && self.words[attribute / 64] & (1 << (attribute % 64)) != 0
    }

    /// Add an attribute. Panics if it is outside of the capacity.
    pub fn insert(&mut self, attribute: usize) {
        assert!(
            attribute < self.n_attributes,
            "attribute {} outside of a set of {} attributes",
            attribute,
            self.n_attributes
        );
        self.words[attribute / 64] |= 1 << (attribute % 64);
    }

    /// Copy of the set with one more attribute.
    pub fn with(&self, attribute: usize) -> Self {
        let mut o = self.clone();
        o.insert(attribute);
        o
    }

    pub fn len(&self) -> usize {
        self.words.iter().map(|w| w.count_ones() as usize).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|&w| w == 0)
    }

    /// True when every attribute has been used.
    pub fn is_full(&self) -> bool {
        self.len() == self.n_attributes
    }

    /// Attributes not in the set, in increasing order.
    pub fn unused(&self) -> impl Iterator<Item = usize> + '_ {
        (0..self.n_attributes).filter(move |&a| !self.contains(a))
    }
}
