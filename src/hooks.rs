//! Process-wide lifecycle hook surface (§4.10, component J).
//!
//! Grounded in `original_source/ir/stat/firmstat.c`, which wires up a
//! consumer for essentially this same event set (`stat_new_ir_op`,
//! `stat_new_node`, `stat_irg_walk`, `stat_merge_nodes`, `stat_reassociate`,
//! ...) and whose own "enter a statistic function only when we are not
//! already in a hook" guard is the precedent for this module's per-event
//! re-entry counter; and in this pack's `once_cell`-backed process-wide
//! registries (`op.rs`'s `REGISTRY`, `mode.rs`'s `TABLE`): each event is a
//! `Vec` of callbacks behind a `Mutex`, fanned out to in registration order.

use crate::entity::NodeId;
use crate::ir::graph::Graph;
use once_cell::sync::Lazy;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};

/// Every lifecycle event a client may subscribe to (§4.10).
#[derive(Copy, Clone, PartialEq, Eq, Hash, Debug)]
pub enum Event {
    NewIrOp,
    FreeIrOp,
    NewNode,
    TurnIntoId,
    Normalize,
    NewGraph,
    FreeGraph,
    IrgWalk,
    IrgBlockWalk,
    MergeNodes,
    ReassociateStart,
    ReassociateStop,
    Lower,
    Inline,
    TailRec,
    StrengthRed,
    DeadNodeElimStart,
    DeadNodeElimStop,
    FuncCall,
    ArchDepReplace,
    NodeInfo,
}

/// A subscriber: given the event and the node/graph it fired on, does
/// whatever side effect it wants (logging, stats, a dumper annotation).
pub type Hook = Arc<dyn Fn(Event, Option<NodeId>, &Graph) + Send + Sync>;

struct Registry {
    subscribers: HashMap<Event, Vec<Hook>>,
    /// Re-entry guard: an event currently firing may not be re-triggered
    /// from within one of its own subscribers (§4.10).
    firing: HashMap<Event, AtomicU32>,
}

impl Registry {
    fn new() -> Self {
        Registry {
            subscribers: HashMap::new(),
            firing: HashMap::new(),
        }
    }
}

static REGISTRY: Lazy<Mutex<Registry>> = Lazy::new(|| Mutex::new(Registry::new()));

/// Subscribes `hook` to `event`, appended after any existing subscriber.
pub fn register(event: Event, hook: impl Fn(Event, Option<NodeId>, &Graph) + Send + Sync + 'static) {
    let mut reg = REGISTRY.lock().unwrap();
    reg.subscribers.entry(event).or_default().push(Arc::new(hook));
}

/// Removes every subscriber for `event` — mainly for test isolation.
pub fn clear(event: Event) {
    let mut reg = REGISTRY.lock().unwrap();
    reg.subscribers.remove(&event);
}

/// Fires `event` for `node` (if applicable) in `graph`, fanning out to
/// every subscriber in registration order. Panics if a subscriber
/// re-triggers the same event while it is already firing (§4.10's re-entry
/// guard).
pub fn fire(event: Event, node: Option<NodeId>, graph: &Graph) {
    let snapshot: Vec<Hook> = {
        let mut reg = REGISTRY.lock().unwrap();
        let counter = reg.firing.entry(event).or_insert_with(|| AtomicU32::new(0));
        let depth = counter.fetch_add(1, Ordering::SeqCst);
        assert!(
            depth == 0,
            "hook event {:?} re-triggered while already firing (re-entry disallowed)",
            event
        );
        reg.subscribers.get(&event).cloned().unwrap_or_default()
    };
    for hook in &snapshot {
        hook(event, node, graph);
    }
    let reg = REGISTRY.lock().unwrap();
    reg.firing[&event].fetch_sub(1, Ordering::SeqCst);
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;

    #[test]
    fn subscribers_fire_in_registration_order() {
        clear(Event::NewGraph);
        let order = Arc::new(Mutex::new(Vec::new()));
        let o1 = order.clone();
        register(Event::NewGraph, move |_, _, _| o1.lock().unwrap().push(1));
        let o2 = order.clone();
        register(Event::NewGraph, move |_, _, _| o2.lock().unwrap().push(2));

        let g = Graph::new("p", "f");
        fire(Event::NewGraph, None, &g);

        assert_eq!(*order.lock().unwrap(), vec![1, 2]);
        clear(Event::NewGraph);
    }

    #[test]
    fn fire_counts_every_subscriber() {
        clear(Event::FreeGraph);
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        register(Event::FreeGraph, move |_, _, _| {
            c.fetch_add(1, Ordering::SeqCst);
        });
        let g = Graph::new("p", "f");
        fire(Event::FreeGraph, None, &g);
        fire(Event::FreeGraph, None, &g);
        assert_eq!(count.load(Ordering::SeqCst), 2);
        clear(Event::FreeGraph);
    }
}
