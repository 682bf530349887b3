//! Per-room FIFO of pending tracks.
//!
//! The queue only holds what is still to be played: the loop pops the head
//! at the moment playback starts, so the playing track is never part of it.
//! Positions exposed to users are 1-based.

use std::collections::VecDeque;
use std::time::Duration;

use crate::errors::{MusicError, Result};
use crate::model::Track;

#[derive(Clone, Debug, Default)]
pub struct TrackQueue {
    items: VecDeque<Track>,
}

/// One page of the queue, numbered globally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct QueuePage {
    /// 1-based page number.
    pub page: usize,
    pub pages: usize,
    /// Number of queued items across all pages.
    pub total: usize,
    /// 1-based position of `items[0]`.
    pub first_position: usize,
    pub items: Vec<Track>,
}

impl TrackQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Appends at the tail and returns the 1-based position of the new item.
    pub fn push(&mut self, track: Track) -> usize {
        self.items.push_back(track);
        self.items.len()
    }

    pub fn pop_front(&mut self) -> Option<Track> {
        self.items.pop_front()
    }

    pub fn get(&self, position: usize) -> Option<&Track> {
        position.checked_sub(1).and_then(|i| self.items.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &Track> {
        self.items.iter()
    }

    pub fn to_vec(&self) -> Vec<Track> {
        self.items.iter().cloned().collect()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Removes the item at the 1-based `position`.
    pub fn remove_at(&mut self, position: usize) -> Result<Track> {
        if position == 0 {
            return Err(MusicError::validation("No 0s please..."));
        }
        self.items
            .remove(position - 1)
            .ok_or_else(|| MusicError::Validation(format!("There's no track {} in the queue.", position)))
    }

    /// Removes every position in `[first, last]` (1-based, inclusive).
    ///
    /// `last` past the tail is clamped; `first` past the tail is rejected.
    /// Nothing is removed when validation fails.
    pub fn remove_range(&mut self, first: usize, last: usize) -> Result<Vec<Track>> {
        if first == 0 || last == 0 {
            return Err(MusicError::validation("No 0s please..."));
        }
        if first > last {
            return Err(MusicError::validation("Numbers that make sense, please..."));
        }
        if first == last {
            return self.remove_at(first).map(|track| vec![track]);
        }
        if first > self.items.len() {
            return Err(MusicError::Validation(format!(
                "There's no track {} in the queue.",
                first
            )));
        }

        let last = last.min(self.items.len());
        Ok(self.items.drain(first - 1..last).collect())
    }

    /// Sum of the known lengths; streams count as zero.
    pub fn total_length(&self) -> Duration {
        self.items.iter().filter_map(|t| t.length).sum()
    }

    /// Returns the 1-based `page` of `page_size` items.
    pub fn page(&self, page: usize, page_size: usize) -> Result<QueuePage> {
        let page_size = page_size.max(1);
        let total = self.items.len();
        if total == 0 {
            return Err(MusicError::QueueEmpty);
        }
        let pages = total.div_ceil(page_size);
        if page == 0 || page > pages {
            return Err(MusicError::Validation(format!(
                "There's only {} page{} of tracks in the queue.",
                pages,
                crate::format::plural(pages)
            )));
        }

        let start = (page - 1) * page_size;
        let items = self.items.iter().skip(start).take(page_size).cloned().collect();
        Ok(QueuePage {
            page,
            pages,
            total,
            first_position: start + 1,
            items,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn track(title: &str, secs: Option<u64>) -> Track {
        Track {
            encoded: format!("enc-{title}"),
            identifier: title.to_string(),
            title: title.to_string(),
            author: String::new(),
            uri: None,
            length: secs.map(Duration::from_secs),
            query: title.to_string(),
        }
    }

    fn queue_of(n: usize) -> TrackQueue {
        let mut queue = TrackQueue::new();
        for i in 1..=n {
            queue.push(track(&format!("T{i}"), Some(60)));
        }
        queue
    }

    fn titles(queue: &TrackQueue) -> Vec<String> {
        queue.iter().map(|t| t.title.clone()).collect()
    }

    #[test]
    fn test_push_returns_position() {
        let mut queue = TrackQueue::new();
        assert_eq!(queue.push(track("A", Some(1))), 1);
        assert_eq!(queue.push(track("B", Some(1))), 2);
        assert_eq!(queue.get(2).unwrap().title, "B");
        assert!(queue.get(0).is_none());
    }

    #[test]
    fn test_remove_at() {
        let mut queue = queue_of(3);
        assert_eq!(queue.remove_at(2).unwrap().title, "T2");
        assert_eq!(titles(&queue), vec!["T1", "T3"]);

        assert!(queue.remove_at(0).is_err());
        assert!(queue.remove_at(3).is_err());
        assert_eq!(queue.len(), 2);
    }

    #[test]
    fn test_remove_range_inclusive() {
        let mut queue = queue_of(6);
        let removed = queue.remove_range(2, 4).unwrap();
        assert_eq!(removed.len(), 3);
        assert_eq!(titles(&queue), vec!["T1", "T5", "T6"]);
    }

    #[test]
    fn test_remove_range_rejections_do_not_mutate() {
        let mut queue = queue_of(4);
        assert!(matches!(queue.remove_range(0, 2), Err(MusicError::Validation(_))));
        assert!(matches!(queue.remove_range(2, 0), Err(MusicError::Validation(_))));
        assert!(matches!(queue.remove_range(3, 2), Err(MusicError::Validation(_))));
        assert!(matches!(queue.remove_range(5, 9), Err(MusicError::Validation(_))));
        assert_eq!(queue.len(), 4);
    }

    #[test]
    fn test_remove_range_degenerate_and_clamped() {
        let mut queue = queue_of(4);
        let removed = queue.remove_range(2, 2).unwrap();
        assert_eq!(removed[0].title, "T2");

        let removed = queue.remove_range(2, 99).unwrap();
        assert_eq!(removed.len(), 2);
        assert_eq!(titles(&queue), vec!["T1"]);
    }

    #[test]
    fn test_remove_from_last_to_first_empties_queue() {
        let n = 5;
        let mut queue = queue_of(n);
        for position in (1..=n).rev() {
            queue.remove_at(position).unwrap();
        }
        assert!(queue.is_empty());
    }

    #[test]
    fn test_remove_head_repeatedly() {
        let n = 4;
        let mut queue = queue_of(n);
        for k in 1..=n {
            queue.remove_at(1).unwrap();
            assert_eq!(queue.len(), n - k);
        }
    }

    #[test]
    fn test_pagination() {
        let queue = queue_of(23);
        let page = queue.page(3, 10).unwrap();
        assert_eq!(page.pages, 3);
        assert_eq!(page.total, 23);
        assert_eq!(page.first_position, 21);
        assert_eq!(page.items.len(), 3);

        assert!(queue.page(4, 10).is_err());
        assert!(matches!(TrackQueue::new().page(1, 10), Err(MusicError::QueueEmpty)));
    }

    #[test]
    fn test_total_length_skips_streams() {
        let mut queue = TrackQueue::new();
        queue.push(track("A", Some(180)));
        queue.push(track("B", None));
        queue.push(track("C", Some(90)));
        assert_eq!(queue.total_length(), Duration::from_secs(270));
    }
}
