//! Kind filters.
//!
//! [`KindFilter`] gates a middleware on the kind of the context. When the
//! kind is not in the set, the wrapped middleware is skipped and the chain
//! continues with the next entry.

use std::collections::BTreeSet;
use std::sync::Arc;

use futures::future::BoxFuture;

use crate::error::{ChainError, ChainResult};
use crate::middleware::{BoxedMiddleware, Middleware, MiddlewareResult, Next};
use ferrogram_core::{Context, UpdateKind};

/// A set of update kinds. Duplicates collapse.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindSet(BTreeSet<UpdateKind>);

impl KindSet {
    /// Parses kind tags given as text.
    pub fn parse<I, S>(tags: I) -> ChainResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        tags.into_iter()
            .map(|tag| {
                let tag = tag.as_ref();
                tag.parse::<UpdateKind>()
                    .map_err(|_| ChainError::UnknownKind(tag.to_string()))
            })
            .collect::<ChainResult<BTreeSet<_>>>()
            .map(Self)
    }

    pub fn contains(&self, kind: UpdateKind) -> bool {
        self.0.contains(&kind)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = UpdateKind> + '_ {
        self.0.iter().copied()
    }
}

impl From<UpdateKind> for KindSet {
    fn from(kind: UpdateKind) -> Self {
        Self(BTreeSet::from([kind]))
    }
}

impl<const N: usize> From<[UpdateKind; N]> for KindSet {
    fn from(kinds: [UpdateKind; N]) -> Self {
        Self(BTreeSet::from(kinds))
    }
}

impl From<&[UpdateKind]> for KindSet {
    fn from(kinds: &[UpdateKind]) -> Self {
        kinds.iter().copied().collect()
    }
}

impl From<Vec<UpdateKind>> for KindSet {
    fn from(kinds: Vec<UpdateKind>) -> Self {
        kinds.into_iter().collect()
    }
}

impl FromIterator<UpdateKind> for KindSet {
    fn from_iter<T: IntoIterator<Item = UpdateKind>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// A middleware that only runs for contexts of the given kinds.
#[derive(Clone)]
pub struct KindFilter {
    kinds: KindSet,
    inner: BoxedMiddleware,
}

impl KindFilter {
    /// Gates `inner` on `kinds`.
    ///
    /// Fails with [`ChainError::EmptyKinds`] if `kinds` is empty.
    pub fn new(kinds: impl Into<KindSet>, inner: impl Middleware) -> ChainResult<Self> {
        let kinds = kinds.into();
        if kinds.is_empty() {
            return Err(ChainError::EmptyKinds);
        }
        Ok(Self {
            kinds,
            inner: Arc::new(inner),
        })
    }

    /// Returns the kinds this filter lets through.
    pub fn kinds(&self) -> &KindSet {
        &self.kinds
    }
}

impl Middleware for KindFilter {
    fn call(&self, ctx: Arc<Context>, next: Next) -> BoxFuture<'static, MiddlewareResult> {
        if self.kinds.contains(ctx.kind()) {
            self.inner.call(ctx, next)
        } else {
            next.run(ctx)
        }
    }
}

impl std::fmt::Debug for KindFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KindFilter")
            .field("kinds", &self.kinds)
            .finish_non_exhaustive()
    }
}

/// Shorthand for [`KindFilter::new`].
pub fn on(kinds: impl Into<KindSet>, inner: impl Middleware) -> ChainResult<KindFilter> {
    KindFilter::new(kinds, inner)
}
