//! Two-slot ping-pong storage.
//!
//! One slot is the *write target* for the current pass, the other is the
//! *history source* holding the previous result. [`PingPong::swap`] exchanges
//! the roles without moving either value.

/// Which slot is being referred to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    A,
    B,
}

impl Slot {
    /// The opposite slot.
    pub fn other(self) -> Self {
        match self {
            Slot::A => Slot::B,
            Slot::B => Slot::A,
        }
    }
}

/// A pair of values with alternating write/history roles.
#[derive(Debug, Clone)]
pub struct PingPong<T> {
    a: T,
    b: T,
    write: Slot,
}

impl<T> PingPong<T> {
    /// Creates the pair with `a` as the initial write target.
    pub fn new(a: T, b: T) -> Self {
        Self {
            a,
            b,
            write: Slot::A,
        }
    }

    /// The slot currently acting as write target.
    pub fn write_slot(&self) -> Slot {
        self.write
    }

    /// The slot currently acting as history source.
    pub fn history_slot(&self) -> Slot {
        self.write.other()
    }

    pub fn write(&self) -> &T {
        self.get(self.write)
    }

    pub fn history(&self) -> &T {
        self.get(self.history_slot())
    }

    /// Borrows the write target mutably and the history source shared, at once.
    pub fn split_mut(&mut self) -> (&mut T, &T) {
        match self.write {
            Slot::A => (&mut self.a, &self.b),
            Slot::B => (&mut self.b, &self.a),
        }
    }

    /// Exchanges the roles: the write target becomes the history source.
    pub fn swap(&mut self) {
        self.write = self.write.other();
    }

    pub fn get(&self, slot: Slot) -> &T {
        match slot {
            Slot::A => &self.a,
            Slot::B => &self.b,
        }
    }

    /// Mutable access to both values, e.g. for clearing or resizing.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut T> {
        [&mut self.a, &mut self.b].into_iter()
    }

    /// Replaces both values while keeping the current role assignment.
    pub fn replace_both(&mut self, a: T, b: T) {
        self.a = a;
        self.b = b;
    }

    pub fn into_inner(self) -> (T, T) {
        (self.a, self.b)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_writing_to_a() {
        let pair = PingPong::new("a", "b");
        assert_eq!(pair.write_slot(), Slot::A);
        assert_eq!(*pair.write(), "a");
        assert_eq!(*pair.history(), "b");
    }

    #[test]
    fn written_slot_becomes_history_after_swap() {
        let mut pair = PingPong::new(0u32, 0u32);
        for k in 1..=10 {
            let written = pair.write_slot();
            {
                let (target, _) = pair.split_mut();
                *target = k;
            }
            pair.swap();
            assert_eq!(pair.history_slot(), written);
            assert_eq!(*pair.history(), k);
        }
    }

    #[test]
    fn split_mut_reads_previous_result() {
        let mut pair = PingPong::new(1, 2);
        let (target, history) = pair.split_mut();
        *target = *history * 10;
        pair.swap();
        assert_eq!(*pair.history(), 20);
        assert_eq!(*pair.write(), 2);
    }

    #[test]
    fn replace_both_keeps_roles() {
        let mut pair = PingPong::new(1, 2);
        pair.swap();
        pair.replace_both(3, 4);
        assert_eq!(pair.write_slot(), Slot::B);
        assert_eq!(*pair.write(), 4);
        assert_eq!(*pair.history(), 3);
    }

    #[test]
    fn iter_mut_visits_both() {
        let mut pair = PingPong::new(1, 2);
        pair.iter_mut().for_each(|v| *v = 0);
        assert_eq!(pair.into_inner(), (0, 0));
    }
}
