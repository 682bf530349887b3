//! Chat command surface.
//!
//! Turns user text into operations on the registry, the controllers and the
//! search session store, and answers every command with a short reply.
//! Failures are never propagated to the chat layer: they become replies.

use std::sync::Arc;
use std::time::Duration;

use regex::Regex;
use tracing::{debug, warn};

use crate::backend::PlaybackBackend;
use crate::config_ext::MusicSettings;
use crate::errors::{MusicError, Result};
use crate::format;
use crate::model::{ChannelId, RoomId, Track, UserId};
use crate::notifier::RoomNotifier;
use crate::registry::ControllerRegistry;
use crate::search::{SearchSessionStore, SelectionMatcher};

/// Where a message came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandContext {
    pub room: RoomId,
    /// Text channel the message was posted in.
    pub channel: ChannelId,
    pub user: UserId,
    /// Voice channel the author currently sits in.
    pub voice_channel: Option<ChannelId>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command {
    Join,
    Play(String),
    Queue(Option<String>),
    NowPlaying,
    Skip(Option<String>),
    Pause,
    Resume,
    Volume(Option<String>),
    Destroy,
}

impl Command {
    /// Parses `<prefix><name> [argument]`. Unknown names yield `None`.
    pub fn parse(prefix: &str, content: &str) -> Option<Self> {
        let rest = content.trim().strip_prefix(prefix)?;
        let (name, argument) = match rest.split_once(char::is_whitespace) {
            Some((name, argument)) => (name, argument.trim()),
            None => (rest, ""),
        };
        let argument = (!argument.is_empty()).then(|| argument.to_string());

        let command = match name {
            "join" | "connect" => Command::Join,
            "play" | "p" => Command::Play(argument.unwrap_or_default()),
            "queue" | "q" | "list" => Command::Queue(argument),
            "nowplaying" | "np" | "what" => Command::NowPlaying,
            "skip" | "s" | "next" => Command::Skip(argument),
            "pause" | "unresume" => Command::Pause,
            "resume" | "unpause" | "continue" => Command::Resume,
            "volume" => Command::Volume(argument),
            "destroy" | "disconnect" | "dc" | "leave" | "stop" | "kill" | "die" => {
                Command::Destroy
            }
            _ => return None,
        };
        Some(command)
    }
}

pub struct MusicCommands {
    backend: Arc<dyn PlaybackBackend>,
    notifier: Arc<dyn RoomNotifier>,
    registry: Arc<ControllerRegistry>,
    sessions: Arc<SearchSessionStore>,
    settings: MusicSettings,
    selection: SelectionMatcher,
    url: Regex,
    skip: Regex,
}

impl MusicCommands {
    pub fn new(
        backend: Arc<dyn PlaybackBackend>,
        notifier: Arc<dyn RoomNotifier>,
        registry: Arc<ControllerRegistry>,
        sessions: Arc<SearchSessionStore>,
        settings: MusicSettings,
    ) -> Self {
        let selection = SelectionMatcher::new(&settings.command_prefix);
        Self {
            backend,
            notifier,
            registry,
            sessions,
            settings,
            selection,
            url: Regex::new(r"^https?://.+").expect("url pattern is valid"),
            skip: Regex::new(r"^(\d+)(-(\d+))?$").expect("skip pattern is valid"),
        }
    }

    pub fn settings(&self) -> &MusicSettings {
        &self.settings
    }

    /// Entry point for every chat message of a room.
    ///
    /// Returns true when the message was consumed, either as a search
    /// selection or as a command.
    pub async fn handle_message(&self, ctx: &CommandContext, content: &str) -> bool {
        if self.on_message(ctx, content).await {
            return true;
        }
        match Command::parse(&self.settings.command_prefix, content) {
            Some(command) => {
                self.execute(ctx, command).await;
                true
            }
            None => false,
        }
    }

    /// Resolves a pending search when `content` is a selection reply.
    pub async fn on_message(&self, ctx: &CommandContext, content: &str) -> bool {
        if !self.sessions.has_session(ctx.user) {
            return false;
        }
        match self.selection.parse_message(content.trim()) {
            Some(index) => match self.select(ctx, index).await {
                Ok(picked) => picked,
                Err(e) => {
                    self.reply_error(ctx, &e).await;
                    true
                }
            },
            None => false,
        }
    }

    pub async fn execute(&self, ctx: &CommandContext, command: Command) {
        debug!(room = %ctx.room, user = %ctx.user, ?command, "executing command");
        let outcome = match command {
            Command::Join => self.join(ctx).await,
            Command::Play(query) => self.play(ctx, &query).await,
            Command::Queue(page) => self.queue(ctx, page.as_deref()).await,
            Command::NowPlaying => self.now_playing(ctx).await,
            Command::Skip(which) => self.skip(ctx, which.as_deref()).await,
            Command::Pause => self.pause(ctx).await,
            Command::Resume => self.resume(ctx).await,
            Command::Volume(volume) => self.volume(ctx, volume.as_deref()).await,
            Command::Destroy => self.destroy(ctx).await,
        };
        if let Err(e) = outcome {
            self.reply_error(ctx, &e).await;
        }
    }

    async fn reply(&self, ctx: &CommandContext, text: &str) {
        if let Err(e) = self.notifier.send(ctx.channel, text).await {
            warn!(room = %ctx.room, "reply not delivered: {}", e);
        }
    }

    async fn reply_error(&self, ctx: &CommandContext, error: &MusicError) {
        if !error.is_user_facing() {
            warn!(room = %ctx.room, user = %ctx.user, "command failed: {}", error);
        }
        self.reply(ctx, &error.to_string()).await;
    }

    pub async fn join(&self, ctx: &CommandContext) -> Result<()> {
        let voice = ctx.voice_channel.ok_or(MusicError::NotInVoiceChannel)?;
        self.reply(ctx, &format!("Joining __<#{}>__.", voice)).await;
        self.backend.connect(ctx.room, voice).await?;

        let controller = self.registry.get_or_create(ctx.room);
        controller.bind_channel(ctx.channel);
        Ok(())
    }

    pub async fn play(&self, ctx: &CommandContext, query: &str) -> Result<()> {
        let query = query.trim();
        if query.is_empty() {
            return Err(MusicError::validation("What should I play?"));
        }

        if !self.backend.is_connected(ctx.room) {
            self.join(ctx).await?;
        }

        if self.url.is_match(query) {
            return self.play_url(ctx, query).await;
        }

        if self.sessions.has_session(ctx.user) {
            if let Some(index) = self.selection.parse_argument(query) {
                self.select(ctx, index).await?;
                return Ok(());
            }
        }

        self.search(ctx, query).await
    }

    async fn play_url(&self, ctx: &CommandContext, url: &str) -> Result<()> {
        let loaded = self.backend.search(url).await?;
        if loaded.is_empty() {
            return Err(MusicError::validation("Couldn't find anything."));
        }

        if loaded.playlist.is_some() {
            let controller = self.registry.get_or_create(ctx.room);
            let count = controller.enqueue_all(loaded.tracks);
            self.reply(ctx, &format!("Added `{}` tracks to the queue.", count))
                .await;
            return Ok(());
        }

        let mut tracks = loaded.tracks;
        let track = tracks.swap_remove(0);
        self.enqueue(ctx, track).await;
        Ok(())
    }

    async fn search(&self, ctx: &CommandContext, query: &str) -> Result<()> {
        let mut loaded = self.backend.search(&format!("ytsearch:{}", query)).await?;
        loaded.tracks.truncate(self.settings.search_limit);
        if loaded.is_empty() {
            return Err(MusicError::validation("Couldn't find anything."));
        }

        let text = format!(
            "Results for \"{}\":\n{}",
            query,
            format::track_list(&loaded.tracks, 1)
        );
        let message = self.notifier.send(ctx.channel, &text).await?;

        if let Some(superseded) = self.sessions.open(ctx.user, loaded.tracks, message) {
            if let Err(e) = self.notifier.delete(&superseded.message).await {
                warn!(user = %ctx.user, "superseded result list not removed: {}", e);
            }
        }
        Ok(())
    }

    /// Enqueues candidate `index` of the user's session. Returns false when
    /// the index does not pick anything.
    async fn select(&self, ctx: &CommandContext, index: usize) -> Result<bool> {
        let Some(selection) = self.sessions.resolve(ctx.user, ctx.channel, index) else {
            debug!(user = %ctx.user, index, "selection ignored");
            return Ok(false);
        };
        if let Err(e) = self.notifier.delete(&selection.message).await {
            warn!(user = %ctx.user, "result list not removed: {}", e);
        }
        self.enqueue(ctx, selection.track).await;
        Ok(true)
    }

    async fn enqueue(&self, ctx: &CommandContext, track: Track) {
        let title = format::escape_markdown(&track.title);
        self.registry.get_or_create(ctx.room).enqueue(track);
        self.reply(ctx, &format!("Added to the queue: {}", title)).await;
    }

    pub async fn queue(&self, ctx: &CommandContext, page: Option<&str>) -> Result<()> {
        let page = match page {
            Some(raw) => raw
                .parse::<i64>()
                .map_err(|_| MusicError::validation("That's not a page number..."))?,
            None => 1,
        };
        if page < 1 {
            return Ok(());
        }

        let controller = self.registry.get(ctx.room).ok_or(MusicError::QueueEmpty)?;
        let current = controller.current();
        if current.is_none() && controller.queue_len() == 0 {
            return Err(MusicError::QueueEmpty);
        }
        let position = self.position(ctx.room);

        let mut out = String::new();
        let remaining = match &current {
            Some(track) => {
                out.push_str(&format!(
                    ":arrow_forward: {} {}\n",
                    format::progress_tag(track, position),
                    format::escape_markdown(&track.title)
                ));
                if let Some(uri) = &track.uri {
                    out.push_str(&format!("<{}>\n", uri));
                }
                let left = track
                    .length
                    .map(|length| length.saturating_sub(position))
                    .unwrap_or(Duration::ZERO);
                format::time_hms(left + controller.queued_length())
            }
            None => {
                out.push_str(":arrow_forward: Starting the next track...\n");
                "??:??".to_string()
            }
        };

        if controller.queue_len() == 0 {
            out.push_str("Nothing queued.");
        } else {
            let page = controller.queue_page(page as usize, self.settings.page_size)?;
            if page.pages > 1 {
                out.push_str(&format!("Page `{}/{}` ", page.page, page.pages));
            }
            out.push_str(&format!(
                "(`{}` item{}, `[{}]` remaining)\n",
                page.total,
                format::plural(page.total),
                remaining
            ));
            out.push_str(&format::track_list(&page.items, page.first_position));
        }

        self.reply(ctx, &out).await;
        Ok(())
    }

    pub async fn now_playing(&self, ctx: &CommandContext) -> Result<()> {
        let track = self
            .registry
            .get(ctx.room)
            .and_then(|controller| controller.current())
            .ok_or(MusicError::NothingPlaying)?;
        let position = self.position(ctx.room);

        if let Some(uri) = &track.uri {
            self.reply(ctx, uri).await;
        }
        self.reply(
            ctx,
            &format!(
                "{} {}",
                format::progress_tag(&track, position),
                format::escape_markdown(&track.title)
            ),
        )
        .await;
        Ok(())
    }

    pub async fn skip(&self, ctx: &CommandContext, which: Option<&str>) -> Result<()> {
        let Some(which) = which else {
            let controller = self.registry.get(ctx.room).ok_or(MusicError::NothingPlaying)?;
            let track = controller.skip_current().await?;
            self.reply(
                ctx,
                &format!("Skipping {}", format::escape_markdown(&track.title)),
            )
            .await;
            return Ok(());
        };

        let Some(captures) = self.skip.captures(which) else {
            debug!(room = %ctx.room, which, "skip argument not understood");
            return Ok(());
        };
        let number = |raw: &str| {
            raw.parse::<usize>()
                .map_err(|_| MusicError::validation("Numbers that make sense, please..."))
        };
        let first = number(&captures[1])?;
        let last = captures.get(3).map(|m| number(m.as_str())).transpose()?;

        let controller = self.registry.get(ctx.room).ok_or(MusicError::QueueEmpty)?;
        match last {
            Some(last) if last != first => {
                controller.remove_range(first, last)?;
                self.reply(ctx, &format!("Skipped tracks {}-{}.", first, last))
                    .await;
            }
            _ => {
                let track = controller.remove_at(first)?;
                self.reply(
                    ctx,
                    &format!(
                        "Skipped track {}: {}",
                        first,
                        format::escape_markdown(&track.title)
                    ),
                )
                .await;
            }
        }
        Ok(())
    }

    pub async fn pause(&self, ctx: &CommandContext) -> Result<()> {
        let controller = self.registry.get(ctx.room).ok_or(MusicError::NothingPlaying)?;
        controller.pause().await?;
        self.reply(ctx, "Pausing.").await;
        Ok(())
    }

    pub async fn resume(&self, ctx: &CommandContext) -> Result<()> {
        let controller = self.registry.get(ctx.room).ok_or(MusicError::NotPaused)?;
        controller.resume().await?;
        self.reply(ctx, "Resuming.").await;
        Ok(())
    }

    pub async fn volume(&self, ctx: &CommandContext, volume: Option<&str>) -> Result<()> {
        let requested = volume
            .and_then(parse_volume)
            .ok_or_else(|| MusicError::validation("Volume must be a number between 0 and 1000..."))?;
        let controller = self.registry.get_or_create(ctx.room);
        let volume = controller.set_volume(requested).await?;
        self.reply(ctx, &format!("Volume is now `{}%`.", volume)).await;
        Ok(())
    }

    /// Tears the room down. Without a controller this still detaches the
    /// voice connection, silently.
    pub async fn destroy(&self, ctx: &CommandContext) -> Result<()> {
        match self.registry.remove(ctx.room) {
            Some(controller) => {
                controller.destroy().await?;
                self.reply(ctx, "Ok, bye!").await;
            }
            None => self.backend.disconnect(ctx.room).await?,
        }
        Ok(())
    }

    fn position(&self, room: RoomId) -> Duration {
        self.backend
            .player_state(room)
            .map(|state| state.position)
            .unwrap_or(Duration::ZERO)
    }
}

/// Integer volume; out-of-range magnitudes saturate so clamping still applies.
fn parse_volume(raw: &str) -> Option<i64> {
    match raw.parse::<i64>() {
        Ok(volume) => Some(volume),
        Err(_) => {
            let digits = raw.strip_prefix('-').unwrap_or(raw);
            if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
                None
            } else if raw.starts_with('-') {
                Some(i64::MIN)
            } else {
                Some(i64::MAX)
            }
        }
    }
}
