//! Ordered collections of query results.

use std::collections::BTreeMap;
use std::ops::Index;

use serde::{Deserialize, Serialize};

use crate::value::{Row, SqlValue};

/// An ordered list of items with helpers for common transformations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Collection<T> {
    items: Vec<T>,
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self { items: Vec::new() }
    }
}

impl<T> Collection<T> {
    #[must_use]
    pub const fn new(items: Vec<T>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    #[must_use]
    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut T> {
        self.items.get_mut(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn iter_mut(&mut self) -> std::slice::IterMut<'_, T> {
        self.items.iter_mut()
    }

    pub fn push(&mut self, item: T) {
        self.items.push(item);
    }

    #[must_use]
    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn as_mut_slice(&mut self) -> &mut [T] {
        &mut self.items
    }

    #[must_use]
    pub fn into_vec(self) -> Vec<T> {
        self.items
    }

    #[must_use]
    pub fn map<U>(self, f: impl FnMut(T) -> U) -> Collection<U> {
        self.items.into_iter().map(f).collect()
    }

    #[must_use]
    pub fn filter(self, mut predicate: impl FnMut(&T) -> bool) -> Self {
        self.items.into_iter().filter(|item| predicate(item)).collect()
    }

    pub fn find(&self, mut predicate: impl FnMut(&T) -> bool) -> Option<&T> {
        self.items.iter().find(|item| predicate(item))
    }

    pub fn contains(&self, predicate: impl FnMut(&T) -> bool) -> bool {
        self.items.iter().any(predicate)
    }

    /// Calls `f` for each item until it returns `false`.
    pub fn each(&self, mut f: impl FnMut(&T) -> bool) {
        for item in &self.items {
            if !f(item) {
                break;
            }
        }
    }

    /// Indexes items by `key`; later items replace earlier ones.
    #[must_use]
    pub fn key_by<K: Ord>(self, mut key: impl FnMut(&T) -> K) -> BTreeMap<K, T> {
        self.items.into_iter().map(|item| (key(&item), item)).collect()
    }

    /// Groups items by `key`, keeping order within each group.
    #[must_use]
    pub fn group_by<K: Ord>(self, mut key: impl FnMut(&T) -> K) -> BTreeMap<K, Self> {
        let mut groups: BTreeMap<K, Self> = BTreeMap::new();
        for item in self.items {
            groups.entry(key(&item)).or_default().push(item);
        }
        groups
    }

    /// Splits into collections of at most `size` items. A size of zero
    /// yields nothing.
    #[must_use]
    pub fn chunk(self, size: usize) -> Vec<Self>
    where
        T: Clone,
    {
        if size == 0 {
            return Vec::new();
        }
        self.items
            .chunks(size)
            .map(|chunk| Self::new(chunk.to_vec()))
            .collect()
    }

    #[must_use]
    pub fn sort_by<K: Ord>(mut self, key: impl FnMut(&T) -> K) -> Self {
        self.items.sort_by_key(key);
        self
    }

    #[must_use]
    pub fn reverse(mut self) -> Self {
        self.items.reverse();
        self
    }

    /// Keeps the first item for each distinct key.
    #[must_use]
    pub fn unique_by<K: Ord>(self, mut key: impl FnMut(&T) -> K) -> Self {
        let mut seen = std::collections::BTreeSet::new();
        self.items
            .into_iter()
            .filter(|item| seen.insert(key(item)))
            .collect()
    }

    #[must_use]
    pub fn take(self, n: usize) -> Self {
        self.items.into_iter().take(n).collect()
    }

    #[must_use]
    pub fn skip(self, n: usize) -> Self {
        self.items.into_iter().skip(n).collect()
    }

    /// Splits into items matching `predicate` and the rest.
    #[must_use]
    pub fn partition(self, predicate: impl FnMut(&T) -> bool) -> (Self, Self) {
        let (yes, no): (Vec<T>, Vec<T>) = self.items.into_iter().partition(predicate);
        (Self::new(yes), Self::new(no))
    }
}

impl Collection<Row> {
    /// Values of `column` across all rows; missing columns yield `Null`.
    #[must_use]
    pub fn pluck(&self, column: &str) -> Vec<SqlValue> {
        self.items
            .iter()
            .map(|row| row.get(column).cloned().unwrap_or(SqlValue::Null))
            .collect()
    }
}

impl<T> From<Vec<T>> for Collection<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T> IntoIterator for Collection<T> {
    type Item = T;
    type IntoIter = std::vec::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.into_iter()
    }
}

impl<'a, T> IntoIterator for &'a Collection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

impl<'a, T> IntoIterator for &'a mut Collection<T> {
    type Item = &'a mut T;
    type IntoIter = std::slice::IterMut<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter_mut()
    }
}

impl<T> Extend<T> for Collection<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        self.items.extend(iter);
    }
}

impl<T> Index<usize> for Collection<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::row;

    #[test]
    fn test_group_and_key_by() {
        let words: Collection<&str> = vec!["apple", "avocado", "banana"].into();
        let groups = words.clone().group_by(|w| w.chars().next());
        assert_eq!(groups[&Some('a')].len(), 2);
        assert_eq!(groups[&Some('b')].as_slice(), &["banana"]);

        let keyed = words.key_by(|w| w.len());
        assert_eq!(keyed[&6], "banana");
    }

    #[test]
    fn test_chunk_keeps_remainder() {
        let numbers: Collection<i32> = (1..=5).collect();
        let chunks = numbers.chunk(2);
        assert_eq!(chunks.len(), 3);
        assert_eq!(chunks[2].as_slice(), &[5]);
        assert!(Collection::new(vec![1]).chunk(0).is_empty());
    }

    #[test]
    fn test_unique_partition_sort() {
        let numbers: Collection<i32> = vec![3, 1, 3, 2, 1].into();
        let unique = numbers.unique_by(|n| *n);
        assert_eq!(unique.as_slice(), &[3, 1, 2]);

        let (odd, even) = unique.sort_by(|n| *n).partition(|n| n % 2 == 1);
        assert_eq!(odd.into_vec(), vec![1, 3]);
        assert_eq!(even.into_vec(), vec![2]);
    }

    #[test]
    fn test_each_stops_on_false() {
        let numbers: Collection<i32> = (1..=10).collect();
        let mut seen = Vec::new();
        numbers.each(|n| {
            seen.push(*n);
            *n < 3
        });
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[test]
    fn test_pluck_rows() {
        let rows: Collection<Row> = vec![
            row! { "id" => 1, "name" => "Ada" },
            row! { "id" => 2 },
        ]
        .into();
        assert_eq!(
            rows.pluck("name"),
            vec![SqlValue::Text(String::from("Ada")), SqlValue::Null]
        );
    }

    #[test]
    fn test_serializes_as_array() {
        let numbers: Collection<i32> = vec![1, 2].into();
        assert_eq!(serde_json::to_string(&numbers).unwrap(), "[1,2]");
    }
}
