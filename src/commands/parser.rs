//! Extraction of `@app <command> [args]` mentions from comment text.
//!
//! The scanner is pure: it takes the comment body and the App's name and
//! returns every command mention in body order. Mentions inside fenced code
//! blocks, inline code spans and `>` quote lines do not count.

use serde_json::Value;

use super::types::CommandMention;
use crate::webhooks::Event;

/// Extracts every command mention addressed to `app_name` in `body`.
///
/// # Matching Rules
///
/// - The trigger `@{app_name}` is ASCII case-insensitive (like GitHub mentions)
/// - The trigger must start the text or follow whitespace (`foo@app` is an
///   email address and `(@app` is not a mention)
/// - The trigger must not be followed by an alphanumeric char, `_` or `-`
///   (`@app` does not match `@apps` or `@app-two`)
/// - The command follows after at least one space or tab and is lower-cased
/// - Arguments run to the end of the line or the next mention, trimmed
/// - Mentions without a command are skipped
///
/// # Examples
///
/// ```
/// use github_app_router::commands::extract_commands;
///
/// let found = extract_commands("@Bot deploy staging\n@bot status", "bot");
/// let pairs: Vec<_> = found.iter().map(|m| (m.command.as_str(), m.args.as_str())).collect();
/// assert_eq!(pairs, [("deploy", "staging"), ("status", "")]);
///
/// assert!(extract_commands("no mention here", "bot").is_empty());
/// assert!(extract_commands("mail me at me@bot deploy", "bot").is_empty());
/// ```
pub fn extract_commands(body: &str, app_name: &str) -> Vec<CommandMention> {
    if app_name.is_empty() || body.is_empty() {
        return Vec::new();
    }

    let trigger = format!("@{}", app_name);
    let masked = mask_ignored_regions(body);
    let mentions = find_mentions(body, &masked, trigger.as_bytes());

    mentions
        .iter()
        .enumerate()
        .filter_map(|(i, &position)| {
            let limit = mentions.get(i + 1).copied().unwrap_or(body.len());
            parse_after_trigger(body, position, trigger.len(), limit)
        })
        .collect()
}

/// Returns the body of the comment (or review) carried by a comment-style event.
///
/// Absent, null and empty bodies all yield `None`.
pub fn comment_body(event: &Event) -> Option<&str> {
    let container = match event.event_type() {
        "pull_request_review" => "review",
        _ => "comment",
    };
    event
        .get_path(&[container, "body"])
        .and_then(Value::as_str)
        .filter(|body| !body.is_empty())
}

/// Extracts the command mentions of an event's comment body.
///
/// An event without a comment body has no commands; this is not an error.
pub fn commands_in_event(event: &Event, app_name: &str) -> Vec<CommandMention> {
    comment_body(event)
        .map(|body| extract_commands(body, app_name))
        .unwrap_or_default()
}

/// Finds the byte position of every valid trigger, in order.
fn find_mentions(body: &str, masked: &[u8], trigger: &[u8]) -> Vec<usize> {
    let mut positions = Vec::new();
    let mut search_start = 0;
    while let Some(pos) = find_trigger(body, masked, search_start, trigger) {
        positions.push(pos);
        search_start = pos + trigger.len();
    }
    positions
}

/// Finds the next occurrence of the trigger (case-insensitive) at a valid boundary.
/// Returns the byte position of the `@` character if found.
fn find_trigger(body: &str, masked: &[u8], start: usize, trigger: &[u8]) -> Option<usize> {
    let mut search_pos = start;

    while search_pos < masked.len() {
        let at_pos = search_pos + masked[search_pos..].iter().position(|&b| b == b'@')?;
        let end = at_pos + trigger.len();

        if let Some(candidate) = masked.get(at_pos..end) {
            if candidate.eq_ignore_ascii_case(trigger)
                && has_left_boundary(body, at_pos)
                && has_right_boundary(body, end)
            {
                return Some(at_pos);
            }
        }

        search_pos = at_pos + 1;
    }
    None
}

/// Start of text, or preceded by whitespace.
fn has_left_boundary(body: &str, at_pos: usize) -> bool {
    match body.get(..at_pos).and_then(|before| before.chars().next_back()) {
        Some(prev) => prev.is_whitespace(),
        None => true,
    }
}

/// End of text, or followed by a char that cannot continue a login.
fn has_right_boundary(body: &str, end: usize) -> bool {
    match body.get(end..).and_then(|after| after.chars().next()) {
        Some(next) => !is_login_char(next),
        None => true,
    }
}

fn is_login_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_' || c == '-'
}

/// Parses the command and arguments following the trigger at `position`.
///
/// `limit` is the position of the next mention (or the end of the body).
fn parse_after_trigger(
    body: &str,
    position: usize,
    trigger_len: usize,
    limit: usize,
) -> Option<CommandMention> {
    let start = position + trigger_len;
    let rest = body.get(start..)?;
    let line_end = rest.find('\n').map_or(body.len(), |i| start + i);
    let segment = body.get(start..line_end.min(limit))?;

    // At least one space or tab must separate the trigger from the command.
    let segment = segment.strip_prefix(is_blank)?;
    let segment = segment.trim_start_matches(is_blank);

    let (command, args) = split_command(segment);
    if command.is_empty() {
        return None;
    }

    Some(CommandMention {
        command: command.to_lowercase(),
        args: args.trim().to_string(),
        position,
        line: body[..position].matches('\n').count() + 1,
    })
}

fn is_blank(c: char) -> bool {
    c == ' ' || c == '\t'
}

/// Splits the command token off the front of `text`.
///
/// The token is a run of alphanumerics, `_` and `-`. If the text starts with
/// something else (e.g. `?`), the first whitespace-delimited word is used.
fn split_command(text: &str) -> (&str, &str) {
    let token_len = text
        .find(|c: char| !is_login_char(c))
        .unwrap_or(text.len());
    if token_len > 0 {
        (&text[..token_len], &text[token_len..])
    } else {
        split_first_word(text)
    }
}

/// Splits text at the first whitespace, returning (word, rest).
/// If no whitespace, returns (text, "").
fn split_first_word(text: &str) -> (&str, &str) {
    match text.find(|c: char| c.is_whitespace()) {
        Some(pos) => (&text[..pos], &text[pos..]),
        None => (text, ""),
    }
}

/// Returns a copy of the body's bytes with code and quoted text blanked out.
///
/// Blanked bytes become spaces (newlines are kept), so byte offsets in the
/// mask line up with the original body.
fn mask_ignored_regions(body: &str) -> Vec<u8> {
    let mut masked = body.as_bytes().to_vec();
    mask_fenced_code(&mut masked);
    mask_inline_code(&mut masked);
    mask_quote_lines(&mut masked);
    masked
}

/// Blanks ```` ``` ```` fenced blocks. An unterminated fence is left alone.
fn mask_fenced_code(masked: &mut [u8]) {
    const FENCE: &[u8] = b"```";
    let mut pos = 0;
    while let Some(open) = find_bytes(&masked[pos..], FENCE).map(|i| pos + i) {
        let body_start = open + FENCE.len();
        let Some(close) = find_bytes(&masked[body_start..], FENCE).map(|i| body_start + i) else {
            break;
        };
        let end = close + FENCE.len();
        blank(&mut masked[open..end]);
        pos = end;
    }
}

/// Blanks `` `inline` `` code spans (at least one char between backticks).
fn mask_inline_code(masked: &mut [u8]) {
    let mut pos = 0;
    while let Some(open) = masked[pos..].iter().position(|&b| b == b'`').map(|i| pos + i) {
        match masked[open + 1..].iter().position(|&b| b == b'`') {
            Some(0) => pos = open + 1,
            Some(i) => {
                let close = open + 1 + i;
                blank(&mut masked[open..=close]);
                pos = close + 1;
            }
            None => break,
        }
    }
}

/// Blanks lines whose first non-whitespace char is `>`.
fn mask_quote_lines(masked: &mut [u8]) {
    let mut start = 0;
    while start <= masked.len() {
        let end = masked[start..]
            .iter()
            .position(|&b| b == b'\n')
            .map_or(masked.len(), |i| start + i);
        let is_quote = masked[start..end]
            .iter()
            .find(|b| !b.is_ascii_whitespace())
            == Some(&b'>');
        if is_quote {
            blank(&mut masked[start..end]);
        }
        start = end + 1;
    }
}

fn blank(region: &mut [u8]) {
    for b in region.iter_mut().filter(|b| **b != b'\n') {
        *b = b' ';
    }
}

fn find_bytes(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}
