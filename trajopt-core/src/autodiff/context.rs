//! Node arena shared by every expression built from one [`Context`].
//!
//! Nodes live in a [`Pool`] and are addressed by stable [`NodeId`]s. Each node
//! carries a reference count (one per owning [`Variable`] plus one per parent
//! node using it as an operand) and is returned to the pool when the count
//! reaches zero. Nodes are immutable after construction apart from their
//! cached value and adjoint slots.
//!
//! Every node gets a monotonically increasing `order` at construction. Operands
//! always exist before their parents, so sorting any set of nodes by `order`
//! yields a topological order.

use std::cell::{Ref, RefCell, RefMut};
use std::collections::HashSet;
use std::fmt;
use std::rc::Rc;

use super::expression_type::ExpressionType;
use super::opcode::{self, OpCode};
use super::variable::Variable;
use crate::pool::{BlockId, Pool, PoolError};

/// Stable handle of an expression node.
pub type NodeId = BlockId;

/// One scalar operation result.
#[derive(Debug, Clone)]
pub(crate) struct Node {
    pub op: OpCode,
    pub args: [Option<NodeId>; 2],
    pub value: f64,
    pub adjoint: f64,
    pub ty: ExpressionType,
    pub refcount: u32,
    pub order: u64,
    /// Generation at which `value` was last computed. Leaves are always current.
    pub stamp: u64,
}

#[derive(Debug)]
pub(crate) struct Arena {
    pub nodes: Pool<Node>,
    next_order: u64,
    generation: u64,
}

impl Arena {
    fn new(nodes: Pool<Node>) -> Self {
        Self {
            nodes,
            next_order: 0,
            generation: 1,
        }
    }

    #[inline]
    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id]
    }

    #[inline]
    pub fn node_mut(&mut self, id: NodeId) -> &mut Node {
        &mut self.nodes[id]
    }

    #[inline]
    pub fn value(&self, id: NodeId) -> f64 {
        self.nodes[id].value
    }

    #[inline]
    fn is_current(&self, id: NodeId) -> bool {
        let node = &self.nodes[id];
        node.op.is_leaf() || node.stamp == self.generation
    }

    /// Allocate a node computing `op(args)`. Operand reference counts are
    /// bumped; the new node starts with a count of one, owned by the caller.
    pub fn push(&mut self, op: OpCode, args: [Option<NodeId>; 2], leaf_value: f64) -> Result<NodeId, PoolError> {
        let (value, ty, stamp) = if op.is_leaf() {
            let ty = opcode::result_type(op, ExpressionType::None, ExpressionType::None, None);
            (leaf_value, ty, self.generation)
        } else {
            let a = args[0].map(|id| &self.nodes[id]);
            let b = args[1].map(|id| &self.nodes[id]);
            let (va, ta) = a.map_or((0.0, ExpressionType::None), |n| (n.value, n.ty));
            let (vb, tb) = b.map_or((0.0, ExpressionType::None), |n| (n.value, n.ty));
            let b_const = b.filter(|n| n.op == OpCode::Const).map(|n| n.value);
            let current = args.iter().flatten().all(|&id| self.is_current(id));
            let stamp = if current { self.generation } else { 0 };
            (
                opcode::eval_forward(op, va, vb),
                opcode::result_type(op, ta, tb, b_const),
                stamp,
            )
        };

        let order = self.next_order;
        let id = self.nodes.allocate(Node {
            op,
            args,
            value,
            adjoint: 0.0,
            ty,
            refcount: 1,
            order,
            stamp,
        })?;
        self.next_order += 1;

        for arg in args.iter().flatten() {
            self.nodes[*arg].refcount += 1;
        }
        Ok(id)
    }

    #[inline]
    pub fn retain(&mut self, id: NodeId) {
        self.nodes[id].refcount += 1;
    }

    /// Drop one reference; frees the node and, transitively, operands whose
    /// count reaches zero. Iterative so long chains cannot overflow the stack.
    pub fn release(&mut self, id: NodeId) {
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            let node = &mut self.nodes[id];
            node.refcount -= 1;
            if node.refcount == 0 {
                if let Ok(node) = self.nodes.deallocate(id) {
                    stack.extend(node.args.iter().flatten().copied());
                }
            }
        }
    }

    /// Set a leaf value and invalidate every cached dependent value.
    pub fn set_value(&mut self, id: NodeId, value: f64) {
        self.generation += 1;
        let generation = self.generation;
        let node = &mut self.nodes[id];
        node.value = value;
        node.stamp = generation;
    }

    /// Mark the start of a bulk update: every non-leaf becomes stale.
    pub fn invalidate(&mut self) {
        self.generation += 1;
    }

    /// Recompute a node in place from its operands and mark it current.
    #[inline]
    pub fn evaluate(&mut self, id: NodeId) {
        let node = &self.nodes[id];
        if node.op.is_leaf() {
            return;
        }
        let va = node.args[0].map_or(0.0, |a| self.nodes[a].value);
        let vb = node.args[1].map_or(0.0, |b| self.nodes[b].value);
        let value = opcode::eval_forward(node.op, va, vb);
        let generation = self.generation;
        let node = &mut self.nodes[id];
        node.value = value;
        node.stamp = generation;
    }

    /// Current value of a node, re-evaluating stale parts of its subgraph.
    pub fn current_value(&mut self, id: NodeId) -> f64 {
        if self.is_current(id) {
            return self.nodes[id].value;
        }

        let mut stale = Vec::new();
        let mut seen = HashSet::new();
        let mut stack = vec![id];
        while let Some(id) = stack.pop() {
            if self.is_current(id) || !seen.insert(id) {
                continue;
            }
            stale.push(id);
            stack.extend(self.nodes[id].args.iter().flatten().copied());
        }

        stale.sort_by_key(|&id| self.nodes[id].order);
        for id in stale {
            self.evaluate(id);
        }
        self.nodes[id].value
    }

    /// All nodes reachable from `roots`, sorted topologically (operands first).
    pub fn topological_subgraph(&self, roots: &[NodeId]) -> Vec<NodeId> {
        let mut seen = HashSet::new();
        let mut out = Vec::new();
        let mut stack: Vec<NodeId> = roots.to_vec();
        while let Some(id) = stack.pop() {
            if !seen.insert(id) {
                continue;
            }
            out.push(id);
            stack.extend(self.nodes[id].args.iter().flatten().copied());
        }
        out.sort_by_key(|&id| self.nodes[id].order);
        out
    }
}

/// Expression-building context.
///
/// Owns the node pool that backs every [`Variable`] created from it. Cloning a
/// context is cheap and yields another handle to the same pool. The pool lives
/// as long as any handle (or any variable) does.
#[derive(Clone)]
pub struct Context {
    inner: Rc<RefCell<Arena>>,
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.inner.try_borrow() {
            Ok(arena) => f
                .debug_struct("Context")
                .field("blocks_in_use", &arena.nodes.blocks_in_use())
                .finish(),
            Err(_) => f.debug_struct("Context").finish_non_exhaustive(),
        }
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::new()
    }
}

impl Context {
    /// Create a context with an unbounded node pool.
    pub fn new() -> Self {
        Self::with_pool(Pool::new())
    }

    pub(crate) fn with_pool(pool: Pool<Node>) -> Self {
        Self {
            inner: Rc::new(RefCell::new(Arena::new(pool))),
        }
    }

    /// Create a context whose pool refuses to grow past `limit` live nodes.
    pub fn with_block_limit(limit: usize) -> Self {
        Self::with_pool(Pool::with_block_limit(limit))
    }

    /// Number of live expression nodes.
    pub fn blocks_in_use(&self) -> usize {
        self.arena().nodes.blocks_in_use()
    }

    /// A constant leaf.
    pub fn constant(&self, value: f64) -> Variable {
        let id = self.push(OpCode::Const, [None, None], value);
        Variable::from_new_node(self.clone(), id)
    }

    /// A free-standing settable leaf that is not registered with any problem.
    pub fn input(&self, value: f64) -> Variable {
        let id = self.push(OpCode::Input, [None, None], value);
        Variable::from_new_node(self.clone(), id)
    }

    #[inline]
    pub fn same_as(&self, other: &Context) -> bool {
        Rc::ptr_eq(&self.inner, &other.inner)
    }

    #[inline]
    pub(crate) fn arena(&self) -> Ref<'_, Arena> {
        self.inner.borrow()
    }

    #[inline]
    pub(crate) fn arena_mut(&self) -> RefMut<'_, Arena> {
        self.inner.borrow_mut()
    }

    /// Opcode and cached value of a node, if the arena is not mutably borrowed.
    pub(crate) fn try_node(&self, id: NodeId) -> Option<(OpCode, f64)> {
        let arena = self.inner.try_borrow().ok()?;
        arena.nodes.get(id).map(|node| (node.op, node.value))
    }

    /// Allocate a node. Pool exhaustion is fatal for graph construction.
    pub(crate) fn push(&self, op: OpCode, args: [Option<NodeId>; 2], leaf_value: f64) -> NodeId {
        let result = self.arena_mut().push(op, args, leaf_value);
        match result {
            Ok(id) => id,
            Err(e) => panic!("expression graph construction failed: {}", e),
        }
    }

    pub(crate) fn release(&self, id: NodeId) {
        match self.inner.try_borrow_mut() {
            Ok(mut arena) => arena.release(id),
            Err(_) => log::error!(
                "expression node {} released while the arena was borrowed; leaking it",
                id.index()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nodes_are_released_with_last_owner() {
        let ctx = Context::new();
        {
            let x = ctx.input(2.0);
            let y = &x * &x + 1.0;
            assert_eq!(y.value(), 5.0);
            assert!(ctx.blocks_in_use() >= 3);
        }
        assert_eq!(ctx.blocks_in_use(), 0);
    }

    #[test]
    fn test_long_chain_release_does_not_recurse() {
        let ctx = Context::new();
        {
            let x = ctx.input(1.0);
            let mut sum = ctx.constant(0.0);
            for _ in 0..200_000 {
                sum = sum + &x;
            }
            assert_eq!(sum.value(), 200_000.0);
        }
        assert_eq!(ctx.blocks_in_use(), 0);
    }

    #[test]
    fn test_topological_order_puts_operands_first() {
        let ctx = Context::new();
        let x = ctx.input(1.0);
        let y = ctx.input(2.0);
        let z = (&x + &y) * &x;
        let arena = ctx.arena();
        let order = arena.topological_subgraph(&[z.id()]);
        let pos = |id: NodeId| order.iter().position(|&n| n == id).unwrap();
        assert!(pos(x.id()) < pos(z.id()));
        assert!(pos(y.id()) < pos(z.id()));
        assert_eq!(*order.last().unwrap(), z.id());
    }

    #[test]
    #[should_panic(expected = "Pool exhausted")]
    fn test_block_limit_is_fatal() {
        let ctx = Context::with_block_limit(2);
        let x = ctx.input(1.0);
        let _y = &x + 1.0;
    }
}
