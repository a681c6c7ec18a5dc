use std::num::NonZeroUsize;

/// Fixed-capacity circular array of values.
///
/// The occupied region is the `len` slots starting at `head`, wrapping at the
/// capacity; `tail` is where the next value goes. Slots outside that region are
/// empty. `Ring` has no synchronization of its own: it is the value a
/// [`BoundedBuffer`](crate::BoundedBuffer) keeps in a replicated cell and only
/// touches while holding the buffer lock.
pub struct Ring<V> {
    slots: Box<[Option<V>]>,
    head: usize,
    tail: usize,
    count: usize,
}

impl<V> Ring<V> {
    /// Create an empty ring with `capacity` slots.
    pub fn with_capacity(capacity: NonZeroUsize) -> Self {
        Self {
            slots: (0..capacity.get()).map(|_| None).collect(),
            head: 0,
            tail: 0,
            count: 0,
        }
    }

    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.count
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    #[inline]
    pub fn is_full(&self) -> bool {
        self.count == self.slots.len()
    }

    /// Store `value` at the tail, or hand it back if every slot is occupied.
    pub fn push(&mut self, value: V) -> Result<(), V> {
        if self.is_full() {
            return Err(value);
        }
        self.slots[self.tail] = Some(value);
        self.tail = self.advance(self.tail);
        self.count += 1;
        Ok(())
    }

    /// Remove the value at the head, if any.
    pub fn pop(&mut self) -> Option<V> {
        if self.is_empty() {
            return None;
        }
        let value = self.slots[self.head].take();
        self.head = self.advance(self.head);
        self.count -= 1;
        value
    }

    #[inline]
    fn advance(&self, index: usize) -> usize {
        if index + 1 == self.slots.len() {
            0
        } else {
            index + 1
        }
    }

    /// Point-in-time view of the indices.
    pub fn status(&self) -> RingStatus {
        RingStatus {
            head: self.head,
            tail: self.tail,
            len: self.count,
            capacity: self.slots.len(),
        }
    }

    /// Whether the indices and the occupied region agree with each other.
    pub fn invariants_hold(&self) -> bool {
        let capacity = self.slots.len();
        if self.count > capacity || self.head >= capacity || self.tail >= capacity {
            return false;
        }
        if (self.head + self.count) % capacity != self.tail {
            return false;
        }
        (0..capacity).all(|offset| {
            let index = (self.head + offset) % capacity;
            self.slots[index].is_some() == (offset < self.count)
        })
    }
}

impl<V> std::fmt::Debug for Ring<V> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Ring")
            .field("head", &self.head)
            .field("tail", &self.tail)
            .field("count", &self.count)
            .field("capacity", &self.slots.len())
            .finish()
    }
}

/// Status snapshot of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RingStatus {
    pub head: usize,
    pub tail: usize,
    pub len: usize,
    pub capacity: usize,
}

impl RingStatus {
    /// Occupancy state of the ring.
    pub fn occupancy(&self) -> Occupancy {
        if self.len == 0 {
            Occupancy::Empty
        } else if self.len == self.capacity {
            Occupancy::Full
        } else {
            Occupancy::Partial
        }
    }
}

impl std::fmt::Display for RingStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "head={} tail={} len={}/{} ({:?})",
            self.head,
            self.tail,
            self.len,
            self.capacity,
            self.occupancy()
        )
    }
}

/// Occupancy of a ring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occupancy {
    Empty,
    Partial,
    Full,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ring<V>(capacity: usize) -> Ring<V> {
        Ring::with_capacity(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn new_ring_is_empty_with_every_slot_free() {
        let ring = ring::<u8>(4);
        assert_eq!(ring.capacity(), 4);
        assert!(ring.is_empty());
        assert!(!ring.is_full());
        assert!(ring.invariants_hold());
    }

    #[test]
    fn push_until_full_then_reject() {
        let mut ring = ring(3);
        assert_eq!(ring.status().occupancy(), Occupancy::Empty);
        for i in 0..3 {
            assert!(ring.push(i).is_ok());
            assert!(ring.invariants_hold());
        }
        assert!(ring.is_full());
        assert_eq!(ring.push(99), Err(99));
        assert_eq!(ring.len(), 3);
    }

    #[test]
    fn pop_from_empty_is_none() {
        let mut ring = ring::<String>(2);
        assert_eq!(ring.pop(), None);
        assert!(ring.invariants_hold());
    }

    #[test]
    fn indices_wrap_and_order_is_fifo() {
        let mut ring = ring(3);
        let mut expected = 0;
        let mut next = 0;

        // Drive head and tail around the ring several times.
        for round in 0..10 {
            while !ring.is_full() {
                ring.push(next).unwrap();
                next += 1;
            }
            let drain = 1 + round % 3;
            for _ in 0..drain {
                assert_eq!(ring.pop(), Some(expected));
                expected += 1;
            }
            assert!(ring.invariants_hold(), "{}", ring.status());
        }

        while let Some(v) = ring.pop() {
            assert_eq!(v, expected);
            expected += 1;
        }
        assert_eq!(expected, next);
    }

    #[test]
    fn popped_slot_is_cleared() {
        let mut ring = ring(2);
        ring.push("a").unwrap();
        ring.pop();
        let status = ring.status();
        assert_eq!(status.head, 1);
        assert_eq!(status.tail, 1);
        assert!(ring.slots.iter().all(Option::is_none));
    }

    #[test]
    fn capacity_one_alternates() {
        let mut ring = ring(1);
        for i in 0..5 {
            ring.push(i).unwrap();
            assert_eq!(ring.status().occupancy(), Occupancy::Full);
            assert_eq!(ring.push(i + 100), Err(i + 100));
            assert_eq!(ring.pop(), Some(i));
            assert_eq!(ring.status(), RingStatus {
                head: 0,
                tail: 0,
                len: 0,
                capacity: 1,
            });
        }
    }
}
