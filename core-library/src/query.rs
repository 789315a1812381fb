//! IN-list helpers for batch queries.
//!
//! Batch loaders filter on a set of ids (`playlist_id IN (...)`,
//! `track_id IN (...)`). [`InList`] owns the de-duplicated id set and hands
//! out chunks no larger than [`MAX_IN_LIST_PARAMS`]. Each chunk pushes its
//! own filter onto a [`QueryBuilder`], so no call site counts parameter
//! indexes by hand.
//!
//! ```rust,ignore
//! for chunk in ids.chunks() {
//!     let mut builder = QueryBuilder::<Sqlite>::new("SELECT id, name FROM artists WHERE ");
//!     chunk.push_filter(&mut builder, "id");
//!     rows.extend(builder.build_query_as::<Artist>().fetch_all(&pool).await?);
//! }
//! ```

use sqlx::{Encode, QueryBuilder, Sqlite, Type};
use std::collections::HashSet;
use std::hash::Hash;

/// Upper bound on bound parameters per statement.
///
/// SQLite builds before 3.32 cap host parameters at 999; 500 leaves room for
/// the handful of extra binds a batch statement carries.
pub const MAX_IN_LIST_PARAMS: usize = 500;

/// De-duplicated, order-preserving set of values for an `IN (...)` filter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InList<T> {
    values: Vec<T>,
}

impl<T> InList<T>
where
    T: Copy + Eq + Hash,
{
    /// Collects values, keeping the first occurrence of each.
    pub fn new<I>(values: I) -> Self
    where
        I: IntoIterator<Item = T>,
    {
        let mut seen = HashSet::new();
        let values = values.into_iter().filter(|v| seen.insert(*v)).collect();
        Self { values }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    /// Splits the set into chunks of at most [`MAX_IN_LIST_PARAMS`] values.
    pub fn chunks(&self) -> impl Iterator<Item = InChunk<'_, T>> {
        self.chunks_of(MAX_IN_LIST_PARAMS)
    }

    fn chunks_of(&self, size: usize) -> impl Iterator<Item = InChunk<'_, T>> {
        self.values
            .chunks(size.max(1))
            .map(|values| InChunk { values })
    }
}

impl<T> FromIterator<T> for InList<T>
where
    T: Copy + Eq + Hash,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::new(iter)
    }
}

/// One statement's worth of an [`InList`].
#[derive(Debug, Clone, Copy)]
pub struct InChunk<'a, T> {
    values: &'a [T],
}

impl<'a, T> InChunk<'a, T>
where
    T: Copy,
{
    pub fn values(&self) -> &'a [T] {
        self.values
    }

    /// Pushes `column IN (?, ?, ...)` onto a builder, binding every value.
    pub fn push_filter<'args>(&self, builder: &mut QueryBuilder<'args, Sqlite>, column: &str)
    where
        T: 'args + Encode<'args, Sqlite> + Type<Sqlite>,
    {
        builder.push(column);
        builder.push(" IN (");
        let mut separated = builder.separated(", ");
        for value in self.values {
            separated.push_bind(*value);
        }
        separated.push_unseparated(")");
    }
}
