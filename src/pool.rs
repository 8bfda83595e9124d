//! Reusable traversal stacks.
//!
//! Tree evaluation runs on every dispatch, so the depth-first traversal
//! borrows its work stack from a pool instead of allocating. A stack is
//! requested at the start of a traversal and returns to the pool, capacity
//! intact, when it goes out of scope.

use parking_lot::Mutex;

/// Pool of reusable stack buffers. Each evaluator owns one, so the free
/// list stays short: one buffer per concurrently running traversal.
pub struct StackPool<T> {
    free: Mutex<Vec<Vec<T>>>,
}

impl<T> StackPool<T> {
    pub fn new() -> Self {
        Self {
            free: Mutex::new(Vec::new()),
        }
    }

    /// Borrow a stack. It is cleared and handed back on drop.
    pub fn request(&self) -> PooledStack<'_, T> {
        let buf = self.free.lock().pop().unwrap_or_default();
        PooledStack { buf, pool: self }
    }
}

impl<T> Default for StackPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// A stack borrowed from a [`StackPool`].
pub struct PooledStack<'a, T> {
    buf: Vec<T>,
    pool: &'a StackPool<T>,
}

impl<T> PooledStack<'_, T> {
    pub fn push(&mut self, item: T) {
        self.buf.push(item);
    }

    pub fn pop(&mut self) -> Option<T> {
        self.buf.pop()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.buf.capacity()
    }
}

impl<T: Clone> PooledStack<'_, T> {
    /// Push every element but the head, in reverse, so that popping yields
    /// the tails in declared left-to-right order. The caller keeps the head
    /// to continue the traversal without a stack round-trip.
    pub fn push_tails_reversed(&mut self, items: &[T]) {
        for item in items.iter().skip(1).rev() {
            self.buf.push(item.clone());
        }
    }
}

impl<T> Drop for PooledStack<'_, T> {
    fn drop(&mut self) {
        let mut buf = std::mem::take(&mut self.buf);
        buf.clear();
        self.pool.free.lock().push(buf);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pop_order_is_lifo() {
        let pool = StackPool::new();
        let mut stack = pool.request();
        stack.push(1);
        stack.push(2);
        stack.push(3);
        assert_eq!(stack.pop(), Some(3));
        assert_eq!(stack.pop(), Some(2));
        assert_eq!(stack.pop(), Some(1));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn tails_pop_in_declared_order() {
        let pool = StackPool::new();
        let mut stack = pool.request();
        stack.push_tails_reversed(&[10, 20, 30, 40]);
        assert_eq!(stack.pop(), Some(20));
        assert_eq!(stack.pop(), Some(30));
        assert_eq!(stack.pop(), Some(40));
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn single_element_slice_pushes_nothing() {
        let pool = StackPool::new();
        let mut stack = pool.request();
        stack.push_tails_reversed(&[1]);
        assert!(stack.is_empty());
    }

    #[test]
    fn returned_stack_keeps_its_capacity() {
        let pool = StackPool::new();
        {
            let mut stack = pool.request();
            for i in 0..64 {
                stack.push(i);
            }
        }
        let reused = pool.request();
        assert!(reused.capacity() >= 64);
        assert!(reused.is_empty());
    }

    #[test]
    fn concurrent_requests_get_distinct_stacks() {
        let pool = StackPool::new();
        let mut first = pool.request();
        let mut second = pool.request();
        first.push(1);
        second.push(2);
        assert_eq!(first.pop(), Some(1));
        assert_eq!(second.pop(), Some(2));
    }
}
