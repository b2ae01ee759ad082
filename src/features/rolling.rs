//! Trailing-window aggregation
//!
//! A window holds the most recent prior observations for one grouping key.
//! Features are read from the window *before* the current observation is
//! pushed, so a value never includes the match it describes.

use std::collections::{HashMap, VecDeque};
use std::hash::Hash;

/// How a window reduces its observations
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Aggregate {
    /// Mean of the non-null values
    Mean,
    /// Sum of the non-null values
    Sum,
    /// Number of non-null values
    Count,
}

/// Ring buffer over the last `size` observations (or all of them when unbounded)
///
/// Null observations occupy a slot but do not contribute to the aggregate.
#[derive(Debug, Clone)]
pub struct TrailingWindow {
    size: Option<usize>,
    agg: Aggregate,
    buf: VecDeque<Option<f64>>,
    sum: f64,
    present: usize,
}

impl TrailingWindow {
    pub fn new(size: usize, agg: Aggregate) -> Self {
        TrailingWindow {
            size: Some(size),
            agg,
            buf: VecDeque::with_capacity(size + 1),
            sum: 0.0,
            present: 0,
        }
    }

    /// Window over the whole prior history
    pub fn unbounded(agg: Aggregate) -> Self {
        TrailingWindow {
            size: None,
            agg,
            buf: VecDeque::new(),
            sum: 0.0,
            present: 0,
        }
    }

    /// Aggregate over the observations currently held
    ///
    /// Null when the window holds no observation. Mean and sum are also null
    /// when every held observation is null.
    pub fn value(&self) -> Option<f64> {
        if self.buf.is_empty() {
            return None;
        }
        match self.agg {
            Aggregate::Count => Some(self.present as f64),
            Aggregate::Sum if self.present > 0 => Some(self.sum),
            Aggregate::Mean if self.present > 0 => Some(self.sum / self.present as f64),
            _ => None,
        }
    }

    pub fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.present += 1;
        }
        self.buf.push_back(value);

        if let Some(size) = self.size {
            while self.buf.len() > size {
                if let Some(Some(old)) = self.buf.pop_front() {
                    self.sum -= old;
                    self.present -= 1;
                }
            }
        }
        if self.present == 0 {
            self.sum = 0.0;
        }
    }

    /// Number of observations held (null ones included)
    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }
}

/// Independent trailing windows per sub-key (surface, opponent, ...)
#[derive(Debug, Clone)]
pub struct KeyedWindows<K> {
    size: Option<usize>,
    agg: Aggregate,
    windows: HashMap<K, TrailingWindow>,
}

impl<K: Eq + Hash> KeyedWindows<K> {
    pub fn new(size: usize, agg: Aggregate) -> Self {
        KeyedWindows {
            size: Some(size),
            agg,
            windows: HashMap::new(),
        }
    }

    pub fn unbounded(agg: Aggregate) -> Self {
        KeyedWindows {
            size: None,
            agg,
            windows: HashMap::new(),
        }
    }

    pub fn value(&self, key: &K) -> Option<f64> {
        self.windows.get(key).and_then(|w| w.value())
    }

    pub fn push(&mut self, key: K, value: Option<f64>) {
        let (size, agg) = (self.size, self.agg);
        self.windows
            .entry(key)
            .or_insert_with(|| match size {
                Some(n) => TrailingWindow::new(n, agg),
                None => TrailingWindow::unbounded(agg),
            })
            .push(value);
    }
}

/// Aggregate of the preceding `size` values at every position of a sequence
pub fn trailing(values: &[Option<f64>], size: usize, agg: Aggregate) -> Vec<Option<f64>> {
    let mut window = TrailingWindow::new(size, agg);
    values
        .iter()
        .map(|&v| {
            let out = window.value();
            window.push(v);
            out
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_window_is_null() {
        for agg in [Aggregate::Mean, Aggregate::Sum, Aggregate::Count] {
            assert_eq!(TrailingWindow::new(5, agg).value(), None);
        }
    }

    #[test]
    fn test_excludes_current_observation() {
        // w + 1 observations: the last position sees only the first w
        let results = [Some(1.0), Some(0.0), Some(1.0), Some(1.0), Some(0.0), Some(1.0)];
        let out = trailing(&results, 5, Aggregate::Mean);

        assert_eq!(out[0], None);
        assert_eq!(out[1], Some(1.0));
        assert_eq!(out[5], Some(3.0 / 5.0));
    }

    #[test]
    fn test_partial_window_uses_what_exists() {
        let out = trailing(&[Some(2.0), Some(4.0), Some(9.0)], 10, Aggregate::Mean);
        assert_eq!(out, vec![None, Some(2.0), Some(3.0)]);
    }

    #[test]
    fn test_eviction() {
        let out = trailing(&[Some(1.0), Some(2.0), Some(3.0), Some(4.0)], 2, Aggregate::Sum);
        assert_eq!(out, vec![None, Some(1.0), Some(3.0), Some(5.0)]);
    }

    #[test]
    fn test_null_observations_take_a_slot() {
        let out = trailing(&[Some(1.0), None, None, Some(5.0)], 2, Aggregate::Mean);
        assert_eq!(out, vec![None, Some(1.0), Some(1.0), None]);

        let counts = trailing(&[Some(1.0), None, None], 2, Aggregate::Count);
        assert_eq!(counts, vec![None, Some(1.0), Some(1.0)]);
    }

    #[test]
    fn test_keyed_windows_are_independent() {
        let mut windows = KeyedWindows::new(3, Aggregate::Mean);
        windows.push("clay", Some(1.0));
        windows.push("hard", Some(0.0));
        windows.push("clay", Some(0.0));

        assert_eq!(windows.value(&"clay"), Some(0.5));
        assert_eq!(windows.value(&"hard"), Some(0.0));
        assert_eq!(windows.value(&"grass"), None);
    }

    #[test]
    fn test_unbounded_count() {
        let mut w = TrailingWindow::unbounded(Aggregate::Count);
        for _ in 0..25 {
            w.push(Some(1.0));
        }
        assert_eq!(w.value(), Some(25.0));
    }
}
