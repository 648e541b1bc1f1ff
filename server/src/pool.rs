use shared::Bolt;

/// Free list of released bolts.
///
/// Only ever touched from inside the actor registry's critical section.
#[derive(Debug)]
pub struct BoltPool {
    free: Vec<Bolt>,
    capacity: usize,
}

impl BoltPool {
    pub fn new(capacity: usize) -> Self {
        Self {
            free: Vec::with_capacity(capacity),
            capacity,
        }
    }

    /// Hands out a released bolt, or a fresh blank one when the pool is dry.
    pub fn obtain(&mut self) -> Bolt {
        self.free.pop().unwrap_or_else(Bolt::blank)
    }

    /// Resets `bolt` and keeps it for reuse. Bolts past capacity are dropped.
    pub fn release(&mut self, mut bolt: Bolt) {
        bolt.reset();
        if self.free.len() < self.capacity {
            self.free.push(bolt);
        }
    }

    pub fn available(&self) -> usize {
        self.free.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use shared::Transform;
    use uuid::Uuid;

    #[test]
    fn test_obtain_from_empty_pool_is_blank() {
        let mut pool = BoltPool::new(4);
        let bolt = pool.obtain();
        assert_eq!(bolt.shooter_id, None);
        assert_eq!(bolt.speed, 0.0);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_release_resets_before_reuse() {
        let mut pool = BoltPool::new(4);
        let mut bolt = pool.obtain();
        let fired_id = Uuid::new_v4();
        bolt.id = fired_id;
        bolt.shooter_id = Some(Uuid::new_v4());
        bolt.transform = Transform::new(5.0, 6.0, 7.0);
        bolt.speed = 8.0;

        pool.release(bolt);
        assert_eq!(pool.available(), 1);

        let reused = pool.obtain();
        assert_ne!(reused.id, fired_id);
        assert_eq!(reused.shooter_id, None);
        assert_eq!(reused.transform, Transform::default());
        assert_eq!(reused.speed, 0.0);
        assert_eq!(pool.available(), 0);
    }

    #[test]
    fn test_release_past_capacity_drops() {
        let mut pool = BoltPool::new(2);
        for _ in 0..5 {
            pool.release(Bolt::blank());
        }
        assert_eq!(pool.available(), 2);
    }
}
