//! Per-user search sessions.
//!
//! A keyword search displays up to ten candidates and remembers them for the
//! user who asked. A later bare number ("3", "$3", "$p 3", "$play 3") from
//! that user in the same channel picks one. A new search from the same user
//! replaces the previous session.

use dashmap::DashMap;
use regex::Regex;
use tracing::debug;

use crate::model::{ChannelId, MessageRef, Track, UserId};

/// Hard cap on displayed candidates.
pub const MAX_CANDIDATES: usize = 10;

/// Unresolved result list shown to one user.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchSession {
    pub user: UserId,
    pub candidates: Vec<Track>,
    /// Message displaying the list.
    pub message: MessageRef,
}

/// A consumed session and the candidate that was picked.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub track: Track,
    pub message: MessageRef,
}

/// User → session map; every operation is atomic per user.
#[derive(Debug, Default)]
pub struct SearchSessionStore {
    sessions: DashMap<UserId, SearchSession>,
}

impl SearchSessionStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a session for `user`, returning the one it supersedes.
    ///
    /// Candidates beyond `MAX_CANDIDATES` are dropped.
    pub fn open(
        &self,
        user: UserId,
        mut candidates: Vec<Track>,
        message: MessageRef,
    ) -> Option<SearchSession> {
        candidates.truncate(MAX_CANDIDATES);
        debug!(user = %user, count = candidates.len(), "search session opened");
        self.sessions.insert(
            user,
            SearchSession {
                user,
                candidates,
                message,
            },
        )
    }

    /// Consumes the session when `index` (1-based) picks one of its
    /// candidates and the reply comes from the channel showing the list.
    ///
    /// Anything else leaves the session untouched and yields `None`.
    pub fn resolve(&self, user: UserId, channel: ChannelId, index: usize) -> Option<Selection> {
        let (_, session) = self.sessions.remove_if(&user, |_, session| {
            session.message.channel == channel && (1..=session.candidates.len()).contains(&index)
        })?;
        debug!(user = %user, index, "search session resolved");

        let SearchSession {
            mut candidates,
            message,
            ..
        } = session;
        Some(Selection {
            track: candidates.swap_remove(index - 1),
            message,
        })
    }

    pub fn has_session(&self, user: UserId) -> bool {
        self.sessions.contains_key(&user)
    }

    pub fn get(&self, user: UserId) -> Option<SearchSession> {
        self.sessions.get(&user).map(|entry| entry.value().clone())
    }

    pub fn discard(&self, user: UserId) -> Option<SearchSession> {
        self.sessions.remove(&user).map(|(_, session)| session)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

/// Recognizes selection replies for a given command prefix.
#[derive(Debug, Clone)]
pub struct SelectionMatcher {
    full: Regex,
    bare: Regex,
}

impl SelectionMatcher {
    pub fn new(prefix: &str) -> Self {
        let full = Regex::new(&format!(
            r"^({}(p(lay)?\s+)?)?(10|[1-9])$",
            regex::escape(prefix)
        ))
        .expect("selection pattern is valid");
        let bare = Regex::new(r"^(10|[1-9])$").expect("selection pattern is valid");
        Self { full, bare }
    }

    /// Index picked by a whole chat message (`3`, `$3`, `$p 3`, `$play 3`).
    pub fn parse_message(&self, content: &str) -> Option<usize> {
        let captures = self.full.captures(content)?;
        captures.get(4)?.as_str().parse().ok()
    }

    /// Index picked by the argument of a play command (`3`).
    pub fn parse_argument(&self, argument: &str) -> Option<usize> {
        if self.bare.is_match(argument) {
            argument.parse().ok()
        } else {
            None
        }
    }
}
