//! Insertion strategies for [`RbTree`](super::RbTree).
//!
//! A strategy answers a single question during the descent: does the new key
//! belong to the left of an existing one? Equal keys go right, so duplicates
//! are kept in insertion order.

/// Ordering used when descending the tree on insert.
pub trait KeyOrder<K> {
    /// Returns `true` when `key` must be placed left of `existing`.
    fn precedes(&self, key: &K, existing: &K) -> bool;
}

/// Plain `<` ordering.
#[derive(Debug, Clone, Copy, Default)]
pub struct ValueOrder;

impl<K: Ord> KeyOrder<K> for ValueOrder {
    #[inline]
    fn precedes(&self, key: &K, existing: &K) -> bool {
        key < existing
    }
}

/// Wraparound-tolerant ordering for millisecond timer keys.
///
/// Timer keys sit in a narrow window (usually minutes) but overflow every
/// ~49.7 days when stored in 32 bits. The difference of two keys is taken
/// modulo the key width and read as a signed number, so a key just past the
/// wrap still sorts after one just before it.
#[derive(Debug, Clone, Copy, Default)]
pub struct TimerOrder;

impl KeyOrder<u32> for TimerOrder {
    #[inline]
    fn precedes(&self, key: &u32, existing: &u32) -> bool {
        (key.wrapping_sub(*existing) as i32) < 0
    }
}

impl KeyOrder<u64> for TimerOrder {
    #[inline]
    fn precedes(&self, key: &u64, existing: &u64) -> bool {
        (key.wrapping_sub(*existing) as i64) < 0
    }
}

/// Adapts a closure into a [`KeyOrder`].
#[derive(Debug, Clone, Copy)]
pub struct OrderBy<F>(pub F);

impl<K, F> KeyOrder<K> for OrderBy<F>
where
    F: Fn(&K, &K) -> bool,
{
    #[inline]
    fn precedes(&self, key: &K, existing: &K) -> bool {
        (self.0)(key, existing)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_order_is_strict() {
        assert!(ValueOrder.precedes(&1u32, &2));
        assert!(!ValueOrder.precedes(&2u32, &2));
        assert!(!ValueOrder.precedes(&3u32, &2));
    }

    #[test]
    fn timer_order_survives_wraparound() {
        let before_wrap = u32::MAX - 10;
        let after_wrap = 5u32;

        // A plain comparison gets this backwards.
        assert!(!ValueOrder.precedes(&before_wrap, &after_wrap));
        assert!(TimerOrder.precedes(&before_wrap, &after_wrap));
        assert!(!TimerOrder.precedes(&after_wrap, &before_wrap));
    }

    #[test]
    fn timer_order_u64() {
        assert!(TimerOrder.precedes(&(u64::MAX - 1), &1u64));
        assert!(TimerOrder.precedes(&10u64, &11u64));
        assert!(!TimerOrder.precedes(&11u64, &11u64));
    }

    #[test]
    fn order_by_closure() {
        let reverse = OrderBy(|a: &i32, b: &i32| a > b);
        assert!(reverse.precedes(&5, &1));
        assert!(!reverse.precedes(&1, &5));
    }
}
