//! Result collections.
//!
//! Every query result is handed back as a [`Collection`]: an ordered,
//! immutable list of items that is checked once, the first time anything
//! reads it. If the check fails, every read reports the same
//! [`Error::InvalidItem`] from then on. Transforms never touch the receiver;
//! they return a new collection.
//!
//! ```
//! use elementfinder::collection::StringCollection;
//!
//! let prices: StringCollection = ["$5.95", "$7.95"].map(String::from).into_iter().collect();
//! let usd = prices.replace("!^\\$(.+)!", "$1 USD").unwrap();
//! assert_eq!(usd.first().unwrap().map(String::as_str), Some("5.95 USD"));
//! ```

use std::fmt;
use std::sync::OnceLock;

use indexmap::IndexSet;
use tracing::warn;

use crate::error::Error;
use crate::finder::{Element, ElementFinder};
use crate::pattern::Pattern;

/// An item that can live in a [`Collection`].
pub trait CollectionItem: Clone {
    /// Checks the item. The error text becomes the `reason` of
    /// [`Error::InvalidItem`].
    ///
    /// # Errors
    ///
    /// Returns a description of what is wrong with the item.
    fn check(&self) -> Result<(), String> {
        Ok(())
    }
}

impl CollectionItem for String {}

/// Text results: inner/outer markup or node values.
pub type StringCollection = Collection<String>;

/// Nested finders built from matched fragments.
pub type ObjectCollection = Collection<ElementFinder>;

/// Standalone copies of matched elements.
pub type ElementCollection = Collection<Element>;

/// An ordered, lazily validated list of query results.
#[derive(Clone)]
pub struct Collection<T> {
    items: Vec<T>,
    validated: OnceLock<Result<(), Error>>,
}

impl<T: fmt::Debug> fmt::Debug for Collection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("items", &self.items)
            .field("validated", &self.validated.get())
            .finish()
    }
}

impl<T> Default for Collection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            validated: OnceLock::new(),
        }
    }
}

impl<T: CollectionItem> From<Vec<T>> for Collection<T> {
    fn from(items: Vec<T>) -> Self {
        Self::new(items)
    }
}

impl<T: CollectionItem> FromIterator<T> for Collection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}

impl<T: CollectionItem> Collection<T> {
    /// Wraps `items`. Nothing is checked until the first read.
    #[must_use]
    pub fn new(items: Vec<T>) -> Self {
        Self {
            items,
            validated: OnceLock::new(),
        }
    }

    fn validate(&self) -> Result<(), Error> {
        self.validated
            .get_or_init(|| {
                for (index, item) in self.items.iter().enumerate() {
                    if let Err(reason) = item.check() {
                        warn!(index, %reason, "invalid collection item");
                        return Err(Error::invalid_item(index, reason));
                    }
                }
                Ok(())
            })
            .clone()
    }

    /// All items, in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if any item fails its check.
    pub fn all(&self) -> Result<&[T], Error> {
        self.validate()?;
        Ok(&self.items)
    }

    /// Iterates over the items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if any item fails its check.
    pub fn iter(&self) -> Result<std::slice::Iter<'_, T>, Error> {
        Ok(self.all()?.iter())
    }

    /// Consumes the collection, returning its items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if any item fails its check.
    pub fn into_items(self) -> Result<Vec<T>, Error> {
        self.validate()?;
        Ok(self.items)
    }

    /// Number of items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if any item fails its check.
    pub fn count(&self) -> Result<usize, Error> {
        Ok(self.all()?.len())
    }

    /// Returns `true` when there are no items.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if any item fails its check.
    pub fn is_empty(&self) -> Result<bool, Error> {
        Ok(self.all()?.is_empty())
    }

    /// The first item, or `None` when empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if any item fails its check.
    pub fn first(&self) -> Result<Option<&T>, Error> {
        Ok(self.all()?.first())
    }

    /// The last item, or `None` when empty.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if any item fails its check.
    pub fn last(&self) -> Result<Option<&T>, Error> {
        Ok(self.all()?.last())
    }

    /// The item at `index`, or `None` when out of range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if any item fails its check.
    pub fn get(&self, index: usize) -> Result<Option<&T>, Error> {
        Ok(self.all()?.get(index))
    }

    /// Like [`get`](Self::get), but accepts negative indices, which are
    /// always out of range.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if any item fails its check.
    pub fn get_signed(&self, index: isize) -> Result<Option<&T>, Error> {
        let items = self.all()?;
        Ok(usize::try_from(index).ok().and_then(|i| items.get(i)))
    }

    /// A new collection holding these items followed by `other`'s.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if either collection is invalid.
    pub fn merge(&self, other: &Self) -> Result<Self, Error> {
        let mut items = self.all()?.to_vec();
        items.extend_from_slice(other.all()?);
        Ok(Self::new(items))
    }

    /// A new collection with `item` appended.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if this collection is invalid.
    pub fn add(&self, item: T) -> Result<Self, Error> {
        let mut items = self.all()?.to_vec();
        items.push(item);
        Ok(Self::new(items))
    }
}

// --- String operations ---

impl Collection<String> {
    /// Applies `f` to every item.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if this collection is invalid.
    pub fn map<F>(&self, f: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> String,
    {
        Ok(self.iter()?.map(|s| f(s)).collect())
    }

    /// Keeps the items for which `keep` returns `true`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if this collection is invalid.
    pub fn filter<F>(&self, keep: F) -> Result<Self, Error>
    where
        F: Fn(&str) -> bool,
    {
        Ok(self.iter()?.filter(|s| keep(s)).cloned().collect())
    }

    /// Replaces every match of `pattern` in every item.
    ///
    /// See [`Pattern`] for the pattern syntax and
    /// [`Pattern::replace_all`] for group references.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern does not compile.
    pub fn replace(&self, pattern: &str, replacement: &str) -> Result<Self, Error> {
        let pattern = Pattern::new(pattern)?;
        self.iter()?
            .map(|s| pattern.replace_all(s, replacement))
            .collect::<Result<Vec<_>, _>>()
            .map(Self::new)
    }

    /// Group `group` of every match in every item, flattened in order.
    ///
    /// Group 0 is the whole match. A group the pattern does not have adds
    /// nothing; a group that did not take part in a match adds `""`.
    ///
    /// ```
    /// use elementfinder::collection::StringCollection;
    ///
    /// let c = StringCollection::new(vec!["a1 b2".into(), "c3".into()]);
    /// assert_eq!(c.match_all("/(\\d)/", 1).unwrap().all().unwrap(), ["1", "2", "3"]);
    /// ```
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern does not compile.
    pub fn match_all(&self, pattern: &str, group: usize) -> Result<Self, Error> {
        let pattern = Pattern::new(pattern)?;
        let mut out = Vec::new();
        for item in self.iter()? {
            out.extend(pattern.captures_all(item, group)?);
        }
        Ok(Self::new(out))
    }

    /// Shorthand for `match_all(pattern, 1)`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern does not compile.
    pub fn matches(&self, pattern: &str) -> Result<Self, Error> {
        self.match_all(pattern, 1)
    }

    /// Splits every item around `pattern`, flattened in order.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidPattern`] if the pattern does not compile.
    pub fn split(&self, pattern: &str) -> Result<Self, Error> {
        let pattern = Pattern::new(pattern)?;
        let mut out = Vec::new();
        for item in self.iter()? {
            out.extend(pattern.split(item)?);
        }
        Ok(Self::new(out))
    }

    /// Drops repeated items, keeping the first occurrence of each.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidItem`] if this collection is invalid.
    pub fn unique(&self) -> Result<Self, Error> {
        let seen: IndexSet<&String> = self.iter()?.collect();
        Ok(seen.into_iter().cloned().collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn strings(items: &[&str]) -> StringCollection {
        items.iter().map(|s| (*s).to_owned()).collect()
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Even(u32);

    impl CollectionItem for Even {
        fn check(&self) -> Result<(), String> {
            if self.0 % 2 == 0 {
                Ok(())
            } else {
                Err(format!("{} is odd", self.0))
            }
        }
    }

    #[test]
    fn test_accessors() {
        let c = strings(&["a", "b", "c"]);
        assert_eq!(c.count().unwrap(), 3);
        assert_eq!(c.first().unwrap().unwrap(), "a");
        assert_eq!(c.last().unwrap().unwrap(), "c");
        assert_eq!(c.get(1).unwrap().unwrap(), "b");
        assert_eq!(c.get(3).unwrap(), None);
        assert_eq!(c.get_signed(-1).unwrap(), None);
        assert_eq!(c.get_signed(2).unwrap().unwrap(), "c");
        assert!(!c.is_empty().unwrap());
    }

    #[test]
    fn test_empty_collection() {
        let c = StringCollection::default();
        assert_eq!(c.first().unwrap(), None);
        assert_eq!(c.last().unwrap(), None);
        assert!(c.is_empty().unwrap());
    }

    #[test]
    fn test_invalid_item_fails_every_access() {
        let c = Collection::new(vec![Even(2), Even(4), Even(5)]);
        let expected = Error::InvalidItem {
            index: 2,
            reason: "5 is odd".into(),
        };
        assert_eq!(c.count().unwrap_err(), expected);
        assert_eq!(c.first().unwrap_err(), expected);
        assert_eq!(c.add(Even(6)).unwrap_err(), expected);
        assert_eq!(c.into_items().unwrap_err(), expected);
    }

    #[test]
    fn test_merge_and_add_leave_receiver_alone() {
        let a = strings(&["a"]);
        let b = strings(&["b", "c"]);
        let merged = a.merge(&b).unwrap();
        assert_eq!(merged.all().unwrap(), ["a", "b", "c"]);
        let added = a.add("z".into()).unwrap();
        assert_eq!(added.all().unwrap(), ["a", "z"]);
        assert_eq!(a.all().unwrap(), ["a"]);
    }

    #[test]
    fn test_map_and_filter() {
        let c = strings(&["one", "two", "three"]);
        let upper = c.map(str::to_uppercase).unwrap();
        assert_eq!(upper.all().unwrap(), ["ONE", "TWO", "THREE"]);
        let short = c.filter(|s| s.len() == 3).unwrap();
        assert_eq!(short.all().unwrap(), ["one", "two"]);
    }

    #[test]
    fn test_match_flattens_across_items() {
        let c = strings(&["a1 b2", "c3"]);
        assert_eq!(c.matches("(\\d)").unwrap().all().unwrap(), ["1", "2", "3"]);
        assert!(c.match_all("/(\\d)/", 4).unwrap().is_empty().unwrap());
    }

    #[test]
    fn test_replace_and_split() {
        let c = strings(&["$5.95", "$7.95"]);
        let usd = c.replace("!^\\$(.+)!iu", "$1 USD").unwrap();
        assert_eq!(usd.all().unwrap(), ["5.95 USD", "7.95 USD"]);

        let parts = strings(&["a,b", "c"]).split("/,/").unwrap();
        assert_eq!(parts.all().unwrap(), ["a", "b", "c"]);
    }

    #[test]
    fn test_bad_pattern_is_an_error() {
        let c = strings(&["a"]);
        assert!(matches!(c.replace("/(/", ""), Err(Error::InvalidPattern { .. })));
        assert!(matches!(c.split("/a/z"), Err(Error::InvalidPattern { .. })));
    }

    #[test]
    fn test_unique_keeps_first_seen_order() {
        let c = strings(&["b", "a", "b", "c", "a"]);
        assert_eq!(c.unique().unwrap().all().unwrap(), ["b", "a", "c"]);
    }
}
