//! Module: index::query
//! Responsibility: index scans: comparison search, term matching and
//! occurrence statistics.
//! Does not own: range lowering (`db::store::query`) or blob layout.
//! Boundary: every scan decodes blobs through one `ScanVisit`.

use crate::{
    db::{
        index::{
            ValueIndex,
            matcher::{MatchFlags, MatchSyntax, TermMatcher, start_term},
            occurrences::ValueOccurrences,
            posting::{PostingDecodeError, PostingReader, Segment},
        },
        store::{Address, BlobStore, IndexOp, IndexQuery, ScanControl},
    },
    error::InternalError,
    model::{CollectionId, Document, DocumentSet, NodeProxy, NodeSet},
    value::{AtomicType, IndexableValue, KEY_PREFIX_LEN, decode_key, type_prefix},
};
use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
};
use tracing::{debug, warn};

///
/// QueryContext
///
/// Cooperative cancellation shared between a running query and whoever may
/// stop it. Scans check the flag before every visited key.
///

#[derive(Clone, Debug, Default)]
pub struct QueryContext {
    terminated: Arc<AtomicBool>,
}

impl QueryContext {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn terminate(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub(crate) fn check_terminated(&self) -> Result<(), InternalError> {
        if self.is_terminated() {
            return Err(InternalError::query_terminated());
        }

        Ok(())
    }
}

///
/// AncestorPolicy
///
/// What a match contributes when a context set is given.
///

#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum AncestorPolicy {
    /// The nearest context node containing the match.
    #[default]
    ReturnAncestor,

    /// The matching node itself, if some context node contains it.
    Descendant,
}

///
/// ScanStrategy
///

enum ScanStrategy<'a> {
    Search {
        policy: AncestorPolicy,
        result: &'a mut NodeSet,
    },
    Match {
        matcher: &'a TermMatcher,
        result: &'a mut NodeSet,
    },
    Occurrences {
        ty: AtomicType,
        found: &'a mut BTreeMap<IndexableValue, ValueOccurrences>,
    },
}

enum Admission {
    Visit(Option<IndexableValue>),
    Skip,
    Stop,
}

///
/// ScanVisit
///
/// Visitor state for one query across all scanned collections.
///

struct ScanVisit<'a, S: BlobStore> {
    store: &'a S,
    docs: &'a DocumentSet,
    context: Option<&'a NodeSet>,
    control: &'a QueryContext,
    strategy: ScanStrategy<'a>,
}

impl<S: BlobStore> ScanVisit<'_, S> {
    fn visit(&mut self, key: &[u8], address: Address) -> Result<ScanControl, InternalError> {
        self.control.check_terminated()?;

        // Phase 1: decide from the key alone.
        let value = match self.admit(key) {
            Admission::Visit(value) => value,
            Admission::Skip => return Ok(ScanControl::Continue),
            Admission::Stop => return Ok(ScanControl::Stop),
        };

        // Phase 2: load the posting blob.
        let data = match self.store.get_at(address) {
            Ok(Some(data)) => data,
            Ok(None) => return Ok(ScanControl::Continue),
            Err(err) => {
                warn!(store = self.store.name(), %address, error = %err, "posting blob unreadable");
                return Ok(ScanControl::Continue);
            }
        };

        // Phase 3: walk segments of the admitted documents.
        if let Err(err) = self.collect(&data, value.as_ref()) {
            warn!(
                store = self.store.name(),
                key = ?key,
                error = %err,
                "corrupt posting blob; remaining bytes skipped"
            );
        }

        Ok(ScanControl::Continue)
    }

    fn admit(&self, key: &[u8]) -> Admission {
        match &self.strategy {
            ScanStrategy::Search { .. } => Admission::Visit(None),
            ScanStrategy::Match { matcher, .. } => {
                let term = key
                    .get(KEY_PREFIX_LEN..)
                    .and_then(|payload| std::str::from_utf8(payload).ok());
                match term {
                    Some(term) if matcher.matches(term) => Admission::Visit(None),
                    Some(_) => Admission::Skip,
                    None => {
                        warn!(key = ?key, "string index key is not valid utf-8");
                        Admission::Skip
                    }
                }
            }
            ScanStrategy::Occurrences { ty, .. } => match decode_key(key) {
                Ok((_, value)) if value.atomic_type() == *ty => Admission::Visit(Some(value)),
                Ok(_) => Admission::Stop,
                Err(err) => {
                    warn!(key = ?key, error = %err, "undecodable index key");
                    Admission::Skip
                }
            },
        }
    }

    fn collect(
        &mut self,
        data: &[u8],
        value: Option<&IndexableValue>,
    ) -> Result<(), PostingDecodeError> {
        let docs = self.docs;
        let context = self.context;

        for segment in PostingReader::new(data) {
            let segment = segment?;
            let Some(doc) = docs.get(segment.doc()) else {
                continue;
            };

            match (&mut self.strategy, value) {
                (ScanStrategy::Search { policy, result }, _) => {
                    resolve_nodes(&segment, doc, context, *policy, result)?;
                }
                (ScanStrategy::Match { result, .. }, _) => {
                    resolve_nodes(&segment, doc, context, AncestorPolicy::ReturnAncestor, result)?;
                }
                (ScanStrategy::Occurrences { found, .. }, Some(value)) => {
                    count_occurrences(&segment, doc, context, value, found)?;
                }
                (ScanStrategy::Occurrences { .. }, None) => {}
            }
        }

        Ok(())
    }
}

fn resolve_nodes(
    segment: &Segment<'_>,
    doc: &Document,
    context: Option<&NodeSet>,
    policy: AncestorPolicy,
    result: &mut NodeSet,
) -> Result<(), PostingDecodeError> {
    if let Some(context) = context
        && !context.contains_doc(doc.id())
    {
        return Ok(());
    }

    for node in segment.nodes() {
        let node = node?;
        let current = NodeProxy::new(doc.id(), node);

        match context {
            None => {
                result.add(current);
            }
            Some(context) => {
                if let Some(parent) = context.parent_with_child(doc, node) {
                    result.add(match policy {
                        AncestorPolicy::ReturnAncestor => parent,
                        AncestorPolicy::Descendant => current,
                    });
                }
            }
        }
    }

    Ok(())
}

fn count_occurrences(
    segment: &Segment<'_>,
    doc: &Document,
    context: Option<&NodeSet>,
    value: &IndexableValue,
    found: &mut BTreeMap<IndexableValue, ValueOccurrences>,
) -> Result<(), PostingDecodeError> {
    let mut doc_added = false;

    for node in segment.nodes() {
        let node = node?;
        let included = context.is_none_or(|context| context.parent_with_child(doc, node).is_some());
        if !included {
            continue;
        }

        let entry = found
            .entry(value.clone())
            .or_insert_with(|| ValueOccurrences::new(value.clone()));
        if !doc_added {
            entry.add_document(doc.id());
            doc_added = true;
        }
        entry.add_occurrences(1);
    }

    Ok(())
}

impl<S: BlobStore> ValueIndex<S> {
    /// Nodes whose value compares to `value` under `op`, restricted to
    /// `docs` and re-rooted to their nearest ancestor in `context`.
    pub fn find(
        &self,
        control: &QueryContext,
        op: IndexOp,
        docs: &DocumentSet,
        context: Option<&NodeSet>,
        value: &IndexableValue,
    ) -> Result<NodeSet, InternalError> {
        self.find_with(control, op, docs, context, value, AncestorPolicy::default())
    }

    pub fn find_with(
        &self,
        control: &QueryContext,
        op: IndexOp,
        docs: &DocumentSet,
        context: Option<&NodeSet>,
        value: &IndexableValue,
        policy: AncestorPolicy,
    ) -> Result<NodeSet, InternalError> {
        let mut result = NodeSet::new();
        let mut visit = ScanVisit {
            store: self.store.as_ref(),
            docs,
            context,
            control,
            strategy: ScanStrategy::Search {
                policy,
                result: &mut result,
            },
        };

        for collection in docs.collections() {
            let query = IndexQuery::new(op, self.key_for(value, collection));
            let prefix = type_prefix(collection, value.atomic_type());
            self.scan(&query, Some(prefix.as_slice()), &mut visit, "find")?;
        }
        drop(visit);

        debug!(store = self.store.name(), %op, %value, hits = result.len(), "value index find");

        Ok(result)
    }

    /// Nodes whose string value matches `expr`.
    #[allow(clippy::too_many_arguments)]
    pub fn match_values(
        &self,
        control: &QueryContext,
        docs: &DocumentSet,
        context: Option<&NodeSet>,
        expr: &str,
        syntax: MatchSyntax,
        flags: MatchFlags,
        case_sensitive_query: bool,
    ) -> Result<NodeSet, InternalError> {
        let matcher = TermMatcher::new(expr, syntax, flags)?;

        let mut result = NodeSet::new();
        let mut visit = ScanVisit {
            store: self.store.as_ref(),
            docs,
            context,
            control,
            strategy: ScanStrategy::Match {
                matcher: &matcher,
                result: &mut result,
            },
        };

        for collection in docs.collections() {
            let query = self.match_scan_query(expr, syntax, case_sensitive_query, collection);
            self.scan(&query, None, &mut visit, "match")?;
        }
        drop(visit);

        debug!(store = self.store.name(), expr, %syntax, hits = result.len(), "value index match");

        Ok(result)
    }

    /// Per-value document and node counts for every value of `start`'s type
    /// at or after `start` (strings: every string starting with `start`).
    /// A terminated query yields what was aggregated so far.
    pub fn scan_index_keys(
        &self,
        control: &QueryContext,
        docs: &DocumentSet,
        context: Option<&NodeSet>,
        start: &IndexableValue,
    ) -> Vec<ValueOccurrences> {
        let ty = start.atomic_type();
        let mut found = BTreeMap::new();
        let mut visit = ScanVisit {
            store: self.store.as_ref(),
            docs,
            context,
            control,
            strategy: ScanStrategy::Occurrences {
                ty,
                found: &mut found,
            },
        };

        for collection in docs.collections() {
            let key = self.key_for(start, collection);
            let prefix = type_prefix(collection, ty);
            let scanned = if ty.is_string() {
                self.scan(&IndexQuery::trunc_right(key), None, &mut visit, "scan_index_keys")
            } else {
                let query = IndexQuery::new(IndexOp::Geq, key);
                self.scan(&query, Some(prefix.as_slice()), &mut visit, "scan_index_keys")
            };

            if let Err(err) = scanned {
                warn!(store = self.store.name(), error = %err, "occurrence scan stopped early");
                break;
            }
        }
        drop(visit);

        found.into_values().collect()
    }

    /// Range a match scan covers in one collection: the serialized start
    /// term when one applies, otherwise every string key.
    pub(crate) fn match_scan_query(
        &self,
        expr: &str,
        syntax: MatchSyntax,
        case_sensitive_query: bool,
        collection: CollectionId,
    ) -> IndexQuery {
        let term = if case_sensitive_query == self.case_sensitive {
            start_term(expr, syntax)
        } else {
            None
        };

        match term {
            Some(term) => IndexQuery::trunc_right(self.key_for(&IndexableValue::string(term), collection)),
            None => IndexQuery::trunc_right(type_prefix(collection, AtomicType::String).to_vec()),
        }
    }

    // One collection scan under the shared lock. Only termination
    // propagates; other failures end this scan with a log entry.
    fn scan(
        &self,
        query: &IndexQuery,
        prefix: Option<&[u8]>,
        visit: &mut ScanVisit<'_, S>,
        op: &'static str,
    ) -> Result<(), InternalError> {
        let _guard = match self.store.lock().read(self.lock_timeout) {
            Ok(guard) => guard,
            Err(err) => {
                warn!(store = self.store.name(), op, error = %err, "value index lock unavailable");
                return Ok(());
            }
        };

        let outcome = self.store.query(query, prefix, &mut |key: &[u8], address: Address| {
            visit.visit(key, address)
        });

        match outcome {
            Ok(()) => Ok(()),
            Err(err) if err.is_terminated() => Err(err),
            Err(err) => {
                warn!(store = self.store.name(), op, error = %err, "value index scan failed");
                Ok(())
            }
        }
    }
}
