/// Fixed-capacity circular buffer. Appends are O(1) and overwrite the
/// oldest element once full; the backing storage is allocated once at
/// construction and never grows. Iteration order is oldest to newest.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    data: Vec<T>,
    cap: usize,
    head: usize,
    len: usize,
}

impl<T: Clone> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        let cap = capacity.max(1);
        Self {
            data: Vec::with_capacity(cap),
            cap,
            head: 0,
            len: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.cap
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_full(&self) -> bool {
        self.len == self.capacity()
    }

    pub fn push(&mut self, item: T) {
        if self.data.len() < self.cap {
            self.data.push(item);
            self.len += 1;
        } else {
            self.data[self.head] = item;
        }
        self.head = (self.head + 1) % self.cap;
    }

    /// Element `i` in insertion order: 0 is the oldest retained element.
    pub fn get(&self, i: usize) -> Option<&T> {
        if i >= self.len {
            return None;
        }
        let start = if self.len < self.cap { 0 } else { self.head };
        let idx = (start + i) % self.cap;
        self.data.get(idx)
    }

    pub fn last(&self) -> Option<&T> {
        if self.len == 0 {
            None
        } else {
            self.get(self.len - 1)
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        (0..self.len).filter_map(move |i| self.get(i))
    }

    /// The most recent `n` elements, newest first.
    pub fn recent(&self, n: usize) -> Vec<T> {
        let n = n.min(self.len);
        (0..n)
            .filter_map(|i| self.get(self.len - 1 - i))
            .cloned()
            .collect()
    }

    /// The oldest `n` elements, oldest first.
    pub fn oldest(&self, n: usize) -> Vec<T> {
        let n = n.min(self.len);
        (0..n).filter_map(|i| self.get(i)).cloned().collect()
    }

    /// All retained elements, oldest first.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.head = 0;
        self.len = 0;
    }
}

impl RingBuffer<f64> {
    pub fn mean(&self) -> f64 {
        if self.len == 0 {
            return 0.0;
        }
        self.iter().sum::<f64>() / self.len as f64
    }

    pub fn min(&self) -> f64 {
        self.iter().copied().fold(f64::INFINITY, f64::min)
    }

    pub fn max(&self) -> f64 {
        self.iter().copied().fold(f64::NEG_INFINITY, f64::max)
    }
}
