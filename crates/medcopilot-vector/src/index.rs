use std::cmp::Ordering;

use medcopilot_core::{Error, Result, TextUnit};

/// One indexed row: the embedding and the unit it was computed from.
#[derive(Debug, Clone, PartialEq)]
pub struct Entry {
    pub vector: Vec<f32>,
    pub text: String,
    pub source: String,
}

impl Entry {
    pub fn new(vector: Vec<f32>, unit: TextUnit) -> Self {
        Self { vector, text: unit.text, source: unit.source }
    }
}

/// A search hit before catalog lookup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub row: usize,
    pub distance: f32,
}

/// Exact nearest-neighbour index under squared L2 distance.
///
/// Vectors and their catalog entries live in the same row, so row `i` of the
/// index and row `i` of the catalog cannot drift apart. Rows are append-only.
///
/// The dimension is fixed by `new`, so even the first `add` must match it.
#[derive(Debug, Clone)]
pub struct FlatIndex {
    embedder_id: String,
    dimension: usize,
    entries: Vec<Entry>,
}

impl FlatIndex {
    pub fn new(embedder_id: impl Into<String>, dimension: usize) -> Self {
        Self { embedder_id: embedder_id.into(), dimension, entries: Vec::new() }
    }

    pub fn embedder_id(&self) -> &str {
        &self.embedder_id
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    fn check_dimension(&self, len: usize) -> Result<()> {
        if len != self.dimension {
            return Err(Error::DimensionMismatch { expected: self.dimension, actual: len });
        }
        Ok(())
    }

    pub fn add_entry(&mut self, entry: Entry) -> Result<()> {
        self.check_dimension(entry.vector.len())?;
        self.entries.push(entry);
        Ok(())
    }

    /// Append a batch. The whole batch is checked first; on error nothing is added.
    pub fn add(&mut self, entries: Vec<Entry>) -> Result<()> {
        for entry in &entries {
            self.check_dimension(entry.vector.len())?;
        }
        self.entries.extend(entries);
        Ok(())
    }

    /// The `k` closest rows, ascending by distance, ties broken by lower row.
    /// Returns `min(k, len)` neighbours.
    pub fn search(&self, query: &[f32], k: usize) -> Result<Vec<Neighbor>> {
        if self.entries.is_empty() {
            return Err(Error::EmptyIndex);
        }
        self.check_dimension(query.len())?;

        let mut neighbors: Vec<Neighbor> = self
            .entries
            .iter()
            .enumerate()
            .map(|(row, e)| Neighbor { row, distance: squared_l2(query, &e.vector) })
            .collect();
        neighbors.sort_by(|a, b| match a.distance.total_cmp(&b.distance) {
            Ordering::Equal => a.row.cmp(&b.row),
            other => other,
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }

    pub fn lookup(&self, row: usize) -> Result<&Entry> {
        self.entries.get(row).ok_or(Error::RowOutOfRange { row, len: self.entries.len() })
    }

    /// `(text, source)` for every row, in row order.
    pub fn catalog(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        self.entries.iter().map(|e| (e.text.as_str(), e.source.as_str()))
    }
}

pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(v: &[f32], source: &str) -> Entry {
        Entry { vector: v.to_vec(), text: format!("text of {}", source), source: source.to_string() }
    }

    fn sample() -> FlatIndex {
        let mut idx = FlatIndex::new("test", 2);
        idx.add(vec![entry(&[0.0, 0.0], "a"), entry(&[3.0, 4.0], "b"), entry(&[1.0, 0.0], "c")]).unwrap();
        idx
    }

    #[test]
    fn search_orders_by_squared_distance() {
        let hits = sample().search(&[0.0, 0.0], 3).unwrap();
        let rows: Vec<usize> = hits.iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![0, 2, 1]);
        assert_eq!(hits[1].distance, 1.0);
        assert_eq!(hits[2].distance, 25.0);
    }

    #[test]
    fn ties_break_on_lower_row() {
        let mut idx = FlatIndex::new("test", 1);
        idx.add(vec![entry(&[1.0], "x"), entry(&[-1.0], "y"), entry(&[1.0], "z")]).unwrap();
        let rows: Vec<usize> = idx.search(&[0.0], 3).unwrap().iter().map(|h| h.row).collect();
        assert_eq!(rows, vec![0, 1, 2]);
    }

    #[test]
    fn k_is_clamped_to_len() {
        assert_eq!(sample().search(&[0.0, 0.0], 50).unwrap().len(), 3);
        assert!(sample().search(&[0.0, 0.0], 0).unwrap().is_empty());
    }

    #[test]
    fn empty_index_and_bad_query() {
        let idx = FlatIndex::new("test", 2);
        assert!(matches!(idx.search(&[0.0, 0.0], 1), Err(Error::EmptyIndex)));
        assert!(matches!(
            sample().search(&[0.0], 1),
            Err(Error::DimensionMismatch { expected: 2, actual: 1 })
        ));
    }

    #[test]
    fn batch_with_wrong_dimension_adds_nothing() {
        let mut idx = sample();
        let err = idx.add(vec![entry(&[1.0, 1.0], "ok"), entry(&[1.0], "bad")]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { .. }));
        assert_eq!(idx.len(), 3);
    }

    #[test]
    fn first_add_must_match_constructed_dimension() {
        let mut idx = FlatIndex::new("test", 2);
        let err = idx.add(vec![entry(&[1.0, 2.0, 3.0], "wide")]).unwrap_err();
        assert!(matches!(err, Error::DimensionMismatch { expected: 2, actual: 3 }));
        assert!(idx.is_empty());
    }

    #[test]
    fn lookup_out_of_range() {
        let idx = sample();
        assert_eq!(idx.lookup(1).unwrap().source, "b");
        assert!(matches!(idx.lookup(3), Err(Error::RowOutOfRange { row: 3, len: 3 })));
    }
}
