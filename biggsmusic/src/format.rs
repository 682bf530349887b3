//! Text rendering for chat replies: durations, track lines and lists.

use std::time::Duration;

use crate::model::Track;

/// Formats a duration the way replies show it.
///
/// Hours are only printed when non-zero, minutes as soon as there is at
/// least one, seconds always.
///
/// ```
/// # use std::time::Duration;
/// # use biggsmusic::format::time_hms;
/// assert_eq!(time_hms(Duration::from_secs(45)), "45");
/// assert_eq!(time_hms(Duration::from_secs(90)), "01:30");
/// assert_eq!(time_hms(Duration::from_secs(3700)), "1:01:40");
/// ```
pub fn time_hms(duration: Duration) -> String {
    let total = duration.as_secs();
    let hours = total / 3600;
    let minutes = (total % 3600) / 60;
    let seconds = total % 60;

    let mut out = String::new();
    if hours > 0 {
        out.push_str(&format!("{}:", hours));
    }
    if minutes > 0 || hours > 0 {
        out.push_str(&format!("{:02}:", minutes));
    }
    out.push_str(&format!("{:02}", seconds));
    out
}

/// Plural suffix for `count` items.
pub fn plural(count: usize) -> &'static str {
    if count == 1 { "" } else { "s" }
}

/// Escapes chat markdown control characters in user-provided text.
pub fn escape_markdown(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        if matches!(c, '\\' | '*' | '_' | '~' | '`' | '|' | '>') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// `` `[length]` `` or `` `[STREAM]` ``.
pub fn length_tag(track: &Track) -> String {
    match track.length {
        Some(length) => format!("`[{}]`", time_hms(length)),
        None => "`[STREAM]`".to_string(),
    }
}

/// `` `[position/length]` `` or `` `[STREAM]` ``.
pub fn progress_tag(track: &Track, position: Duration) -> String {
    match track.length {
        Some(length) => format!("`[{}/{}]`", time_hms(position), time_hms(length)),
        None => "`[STREAM]`".to_string(),
    }
}

/// Notification posted when a track starts.
pub fn now_playing_line(track: &Track) -> String {
    format!(
        ":arrow_forward: {} {}",
        length_tag(track),
        escape_markdown(&track.title)
    )
}

/// Numbered list lines; `first` is the 1-based number of the first entry.
pub fn track_list(tracks: &[Track], first: usize) -> String {
    tracks
        .iter()
        .enumerate()
        .map(|(i, track)| {
            format!(
                "`{:>2}` - {} {}",
                first + i,
                length_tag(track),
                escape_markdown(&track.title)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
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

    #[test]
    fn test_time_hms() {
        assert_eq!(time_hms(Duration::ZERO), "00");
        assert_eq!(time_hms(Duration::from_secs(5)), "05");
        assert_eq!(time_hms(Duration::from_secs(60)), "01:00");
        assert_eq!(time_hms(Duration::from_secs(180)), "03:00");
        assert_eq!(time_hms(Duration::from_secs(3600)), "1:00:00");
        assert_eq!(time_hms(Duration::from_millis(90_999)), "01:30");
    }

    #[test]
    fn test_escape_markdown() {
        assert_eq!(escape_markdown("a_b*c"), "a\\_b\\*c");
        assert_eq!(escape_markdown("plain"), "plain");
    }

    #[test]
    fn test_track_list_numbering() {
        let tracks = vec![track("A", Some(180)), track("B", None)];
        let list = track_list(&tracks, 11);
        assert_eq!(list, "`11` - `[03:00]` A\n`12` - `[STREAM]` B");

        let list = track_list(&tracks[..1], 1);
        assert_eq!(list, "` 1` - `[03:00]` A");
    }

    #[test]
    fn test_progress_and_now_playing() {
        let a = track("A", Some(180));
        assert_eq!(progress_tag(&a, Duration::from_secs(30)), "`[30/03:00]`");
        assert_eq!(now_playing_line(&a), ":arrow_forward: `[03:00]` A");
        let b = track("B", None);
        assert_eq!(progress_tag(&b, Duration::from_secs(30)), "`[STREAM]`");
    }
}
