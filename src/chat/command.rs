//! Chat command parser for parley.
//!
//! A line beginning with `/` is a command: a case-insensitive verb plus at
//! most two further tokens, where the last token absorbs the rest of the
//! line so whisper payloads keep their inner spaces.

/// A parsed client command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Show the help text.
    Help,
    /// Change nickname. The name is empty when the argument was missing.
    Nick(String),
    /// Send a private message. Either field is empty when missing.
    Whisper { target: String, message: String },
    /// Request the roster for this session only.
    List,
    /// Unrecognized verb.
    Unknown(String),
}

/// Fixed help text sent for `/help`. Each embedded newline becomes its own
/// wire frame.
pub const HELP_TEXT: &str = "Commands:\n\
    /nick NewName      -> change your nickname\n\
    /w User Message    -> send a private message (whisper)\n\
    /list              -> list connected users\n\
    /help              -> this screen";

/// Reply for `/nick` without an argument.
pub const USAGE_NICK: &str = "Usage: /nick NewName";
/// Reply for `/w` with fewer than two arguments.
pub const USAGE_WHISPER: &str = "Usage: /w TargetUser Message";
/// Reply for a rename to a malformed nickname.
pub const INVALID_NICKNAME: &str = "Invalid nickname.";
/// Reply for a rename to an occupied nickname.
pub const NICKNAME_IN_USE: &str = "That nickname is already in use.";
/// Reply for a whisper to an unregistered target.
pub const TARGET_UNAVAILABLE: &str = "Target user not found or offline.";
/// Reply for an unrecognized verb.
pub const UNKNOWN_COMMAND: &str = "Unknown command. /help";

/// Parse a raw command line.
///
/// The verb is lower-cased; runs of separating spaces collapse; the
/// whisper message is taken verbatim after its leading spaces.
pub fn parse(line: &str) -> Command {
    let trimmed = line.trim();
    let rest = trimmed.strip_prefix('/').unwrap_or(trimmed);
    let (verb, rest) = split_token(rest);

    match verb.to_lowercase().as_str() {
        "help" => Command::Help,
        "nick" => {
            let (name, _) = split_token(rest);
            Command::Nick(name.to_string())
        }
        "w" => {
            let (target, rest) = split_token(rest);
            Command::Whisper {
                target: target.to_string(),
                message: rest.trim_start().to_string(),
            }
        }
        "list" => Command::List,
        other => Command::Unknown(other.to_string()),
    }
}

/// Take the next space-delimited token, returning it and the remainder.
fn split_token(s: &str) -> (&str, &str) {
    let s = s.trim_start();
    match s.find(' ') {
        Some(pos) => (&s[..pos], &s[pos..]),
        None => (s, ""),
    }
}
