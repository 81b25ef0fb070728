//! Handler registry.
//!
//! Registrations live in one list per [`EventKind`], kept sorted by order
//! with insertion order breaking ties. A dispatch snapshots the lists for the
//! kind's ancestor chain under the lock and merges them outside it, so a
//! running dispatch never blocks registration or other dispatches.

use std::cmp::Reverse;
use std::collections::{BinaryHeap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use parking_lot::Mutex;

use crate::event::EventKind;
use crate::handler::{BoxedHandler, Filter, HandlerOptions};

/// Identifies one registration. Returned by registration, consumed by
/// [`Bus::unregister`](crate::bus::Bus::unregister).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandlerId(u64);

impl fmt::Display for HandlerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// One registered handler.
pub(crate) struct Registration {
    pub(crate) id: HandlerId,
    pub(crate) kind: &'static EventKind,
    pub(crate) order: i32,
    pub(crate) force: bool,
    pub(crate) once: bool,
    pub(crate) filter: Option<Filter>,
    pub(crate) owner: Option<Arc<str>>,
    pub(crate) handler: BoxedHandler,
    /// Held by the dispatch currently invoking a once-handler.
    claimed: AtomicBool,
    /// Set when the registration leaves the registry.
    removed: AtomicBool,
}

impl Registration {
    /// Claims a once-handler for one invocation. Returns `false` if another
    /// dispatch holds or has consumed it.
    pub(crate) fn claim(&self) -> bool {
        !self.claimed.swap(true, Ordering::AcqRel)
    }

    /// Gives a claim back so the handler may fire again.
    pub(crate) fn release(&self) {
        self.claimed.store(false, Ordering::Release);
    }

    pub(crate) fn is_removed(&self) -> bool {
        self.removed.load(Ordering::Acquire)
    }
}

#[derive(Default)]
struct Tables {
    lists: HashMap<&'static EventKind, Vec<Arc<Registration>>>,
    index: HashMap<HandlerId, &'static EventKind>,
    chains: HashMap<&'static EventKind, Arc<[&'static EventKind]>>,
}

/// Per-kind, order-sorted handler lists behind one coarse mutex.
#[derive(Default)]
pub(crate) struct Registry {
    tables: Mutex<Tables>,
    next_id: AtomicU64,
}

impl Registry {
    pub(crate) fn insert(
        &self,
        kind: &'static EventKind,
        options: HandlerOptions,
        handler: BoxedHandler,
    ) -> HandlerId {
        let id = HandlerId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let registration = Arc::new(Registration {
            id,
            kind,
            order: options.order,
            force: options.force,
            once: options.once,
            filter: options.filter,
            owner: options.owner,
            handler,
            claimed: AtomicBool::new(false),
            removed: AtomicBool::new(false),
        });

        let mut tables = self.tables.lock();
        let list = tables.lists.entry(kind).or_default();
        let position = list.partition_point(|r| r.order <= registration.order);
        list.insert(position, registration);
        tables.index.insert(id, kind);
        id
    }

    pub(crate) fn remove(&self, id: HandlerId) -> bool {
        let mut tables = self.tables.lock();
        let Some(kind) = tables.index.remove(&id) else {
            return false;
        };
        let Some(list) = tables.lists.get_mut(kind) else {
            return false;
        };
        match list.iter().position(|r| r.id == id) {
            Some(position) => {
                let registration = list.remove(position);
                registration.removed.store(true, Ordering::Release);
                true
            }
            None => false,
        }
    }

    pub(crate) fn remove_owner(&self, owner: &str) -> usize {
        let mut tables = self.tables.lock();
        let Tables { lists, index, .. } = &mut *tables;
        let mut removed = 0;
        for list in lists.values_mut() {
            list.retain(|registration| {
                if registration.owner.as_deref() != Some(owner) {
                    return true;
                }
                registration.removed.store(true, Ordering::Release);
                index.remove(&registration.id);
                removed += 1;
                false
            });
        }
        removed
    }

    pub(crate) fn count(&self, kind: &'static EventKind) -> usize {
        self.tables
            .lock()
            .lists
            .get(kind)
            .map_or(0, Vec::len)
    }

    pub(crate) fn len(&self) -> usize {
        self.tables.lock().index.len()
    }

    /// Handlers that observe `kind`, in visiting order.
    pub(crate) fn snapshot(&self, kind: &'static EventKind) -> Vec<Arc<Registration>> {
        let lists: Vec<Vec<Arc<Registration>>> = {
            let mut tables = self.tables.lock();
            let chain = Arc::clone(
                tables
                    .chains
                    .entry(kind)
                    .or_insert_with(|| kind.chain().into()),
            );
            chain
                .iter()
                .filter_map(|ancestor| tables.lists.get(*ancestor))
                .filter(|list| !list.is_empty())
                .cloned()
                .collect()
        };
        merge_by_order(lists)
    }
}

/// K-way merge of order-sorted lists given root first. Equal orders keep
/// ancestors ahead of descendants and then list position.
fn merge_by_order(lists: Vec<Vec<Arc<Registration>>>) -> Vec<Arc<Registration>> {
    match lists.len() {
        0 => return Vec::new(),
        1 => return lists.into_iter().next().unwrap_or_default(),
        _ => {}
    }

    let total = lists.iter().map(Vec::len).sum();
    let mut merged = Vec::with_capacity(total);
    let mut heap: BinaryHeap<Reverse<(i32, usize, usize)>> = lists
        .iter()
        .enumerate()
        .filter_map(|(depth, list)| list.first().map(|r| Reverse((r.order, depth, 0))))
        .collect();

    while let Some(Reverse((_, depth, position))) = heap.pop() {
        let list = &lists[depth];
        merged.push(Arc::clone(&list[position]));
        if let Some(next) = list.get(position + 1) {
            heap.push(Reverse((next.order, depth, position + 1)));
        }
    }
    merged
}
