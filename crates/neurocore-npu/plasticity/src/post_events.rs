// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Post-Synaptic Event History
//!
//! Per post-synaptic neuron, the most recent `N - 1` spike times and the trace value recorded
//! with each. Slot 0 is a sentinel at tick 0 with the default trace, so a window always has a
//! previous event to decay from. When the history is full the oldest real event (slot 1) is
//! discarded and slots `2..N` shift down by one.

/// One recorded post-synaptic spike
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostEvent<T> {
    pub time: u32,
    pub trace: T,
}

#[derive(Debug, Clone)]
pub struct PostEventHistory<T: Copy + Default, const N: usize> {
    count: usize,
    times: [u32; N],
    traces: [T; N],
}

impl<T: Copy + Default, const N: usize> Default for PostEventHistory<T, N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Copy + Default, const N: usize> PostEventHistory<T, N> {
    pub fn new() -> Self {
        assert!(N >= 2, "history needs the sentinel and at least one event");
        Self {
            count: 1,
            times: [0; N],
            traces: [T::default(); N],
        }
    }

    /// Recorded events, sentinel excluded
    pub fn len(&self) -> usize {
        self.count - 1
    }

    pub fn is_empty(&self) -> bool {
        self.count == 1
    }

    /// Most recent event, or the sentinel
    pub fn last(&self) -> PostEvent<T> {
        let i = self.count - 1;
        PostEvent {
            time: self.times[i],
            trace: self.traces[i],
        }
    }

    /// Recorded event times, oldest first
    pub fn times(&self) -> &[u32] {
        &self.times[1..self.count]
    }

    pub fn add(&mut self, time: u32, trace: T) {
        if self.count < N {
            self.times[self.count] = time;
            self.traces[self.count] = trace;
            self.count += 1;
        } else {
            self.times.copy_within(2..N, 1);
            self.traces.copy_within(2..N, 1);
            self.times[N - 1] = time;
            self.traces[N - 1] = trace;
        }
    }

    /// Events with `begin < time <= end`, plus the last event at or before `begin`
    pub fn window(&self, begin: u32, end: u32) -> PostEventWindow<'_, T> {
        // First event after `begin`, searching back from the newest; the sentinel stops it
        let mut first = self.count;
        while first > 1 && self.times[first - 1] > begin {
            first -= 1;
        }
        let mut last = first;
        while last < self.count && self.times[last] <= end {
            last += 1;
        }
        let prev = first - 1;
        PostEventWindow {
            times: &self.times[first..last],
            traces: &self.traces[first..last],
            prev: (prev > 0).then(|| PostEvent {
                time: self.times[prev],
                trace: self.traces[prev],
            }),
        }
    }
}

/// Events a synapse has not yet been updated with
#[derive(Debug, Clone)]
pub struct PostEventWindow<'a, T> {
    times: &'a [u32],
    traces: &'a [T],
    /// Last event before the window; `None` when that is the sentinel
    prev: Option<PostEvent<T>>,
}

impl<T: Copy> PostEventWindow<'_, T> {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn prev(&self) -> Option<PostEvent<T>> {
        self.prev
    }

    /// Events in the window, oldest first
    pub fn events(&self) -> impl Iterator<Item = PostEvent<T>> + '_ {
        self.times
            .iter()
            .zip(self.traces)
            .map(|(&time, &trace)| PostEvent { time, trace })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinel_at_tick_zero() {
        let history = PostEventHistory::<u16, 4>::new();
        assert!(history.is_empty());
        assert_eq!(history.last(), PostEvent { time: 0, trace: 0 });
        let window = history.window(0, 100);
        assert!(window.is_empty());
        assert!(window.prev().is_none());
    }

    #[test]
    fn test_overflow_drops_oldest_real_event() {
        let mut history = PostEventHistory::<u16, 4>::new();
        for (t, trace) in [(10, 1), (20, 2), (30, 3), (40, 4)] {
            history.add(t, trace);
        }
        assert_eq!(history.times(), &[20, 30, 40]);
        assert_eq!(history.last(), PostEvent { time: 40, trace: 4 });
    }

    #[test]
    fn test_window_bounds() {
        let mut history = PostEventHistory::<(), 8>::new();
        for t in [5, 10, 15, 20] {
            history.add(t, ());
        }
        let window = history.window(10, 18);
        assert_eq!(window.events().map(|e| e.time).collect::<Vec<_>>(), vec![15]);
        assert_eq!(window.prev().map(|e| e.time), Some(10));

        let window = history.window(4, 20);
        assert_eq!(window.len(), 4);
        assert!(window.prev().is_none());

        let window = history.window(20, 30);
        assert!(window.is_empty());
        assert_eq!(window.prev().map(|e| e.time), Some(20));
    }
}
