//! Console Command Parser
//!
//! One command per line, whitespace separated:
//!
//! ```text
//! add <buy|sell> <qty> <call|put> <strike> <expiration>
//! remove <call|put> <strike> <expiration>
//! edit <call|put> <strike> <expiration> <action|qty|right|strike|expiration> <value>
//! clear | refresh | expirations | show | json | help | quit
//! ```
//!
//! Expirations are `YYYY-MM-DD`. Single-letter forms `b`/`s` and `c`/`p`
//! are accepted.

use std::num::NonZeroU32;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::domain::position::{LegAction, LegField, LegKey, OptionRight};

/// Usage text for `help`.
pub const USAGE: &str = "\
commands:
  add <buy|sell> <qty> <call|put> <strike> <YYYY-MM-DD>
  remove <call|put> <strike> <YYYY-MM-DD>
  edit <call|put> <strike> <YYYY-MM-DD> <action|qty|right|strike|expiration> <value>
  clear
  refresh
  expirations
  show
  json
  help
  quit";

/// A parsed console command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Add a leg.
    Add {
        /// Buy or sell.
        action: LegAction,
        /// Contract count.
        multiplier: NonZeroU32,
        /// Leg identity.
        key: LegKey,
    },
    /// Remove a leg.
    Remove {
        /// Leg to remove.
        key: LegKey,
    },
    /// Edit one field of a leg.
    Edit {
        /// Leg to edit.
        key: LegKey,
        /// New value.
        field: LegField,
    },
    /// Remove every leg.
    Clear,
    /// Manual refresh.
    Refresh,
    /// List expirations from the quote source.
    Expirations,
    /// Re-render the current snapshot.
    Show,
    /// Print the current snapshot as JSON.
    Json,
    /// Print usage.
    Help,
    /// Leave the console.
    Quit,
}

/// Command parse errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandParseError {
    /// Blank line.
    #[error("empty command")]
    Empty,

    /// First word is not a command.
    #[error("unknown command: {0}")]
    UnknownCommand(String),

    /// Too few words.
    #[error("missing argument: {0}")]
    MissingArgument(&'static str),

    /// A word could not be parsed.
    #[error("invalid {name}: {value}")]
    InvalidArgument {
        /// Argument name.
        name: &'static str,
        /// Text given.
        value: String,
    },

    /// Too many words.
    #[error("unexpected input: {0}")]
    TrailingInput(String),
}

impl FromStr for Command {
    type Err = CommandParseError;

    fn from_str(line: &str) -> Result<Self, Self::Err> {
        let mut args = Args {
            words: line.split_whitespace(),
        };
        let name = args.words.next().ok_or(CommandParseError::Empty)?;

        let command = match name.to_ascii_lowercase().as_str() {
            "add" => {
                let action = args.next("action", parse_action)?;
                let multiplier = args.next("qty", parse_multiplier)?;
                let key = args.key()?;
                Self::Add {
                    action,
                    multiplier,
                    key,
                }
            }
            "remove" | "rm" => Self::Remove { key: args.key()? },
            "edit" => {
                let key = args.key()?;
                let field = args.field()?;
                Self::Edit { key, field }
            }
            "clear" => Self::Clear,
            "refresh" => Self::Refresh,
            "expirations" | "exp" => Self::Expirations,
            "show" => Self::Show,
            "json" => Self::Json,
            "help" | "?" => Self::Help,
            "quit" | "exit" => Self::Quit,
            other => return Err(CommandParseError::UnknownCommand(other.to_string())),
        };

        args.finish()?;
        Ok(command)
    }
}

struct Args<'a> {
    words: std::str::SplitWhitespace<'a>,
}

impl Args<'_> {
    fn next<T>(
        &mut self,
        name: &'static str,
        parse: fn(&str) -> Option<T>,
    ) -> Result<T, CommandParseError> {
        let word = self
            .words
            .next()
            .ok_or(CommandParseError::MissingArgument(name))?;
        parse(word).ok_or_else(|| CommandParseError::InvalidArgument {
            name,
            value: word.to_string(),
        })
    }

    fn key(&mut self) -> Result<LegKey, CommandParseError> {
        let right = self.next("right", parse_right)?;
        let strike = self.next("strike", parse_strike)?;
        let expiration = self.next("expiration", parse_expiration)?;
        Ok(LegKey::new(expiration, strike, right))
    }

    fn field(&mut self) -> Result<LegField, CommandParseError> {
        let name = self
            .words
            .next()
            .ok_or(CommandParseError::MissingArgument("field"))?;
        match name.to_ascii_lowercase().as_str() {
            "action" => self.next("action", parse_action).map(LegField::Action),
            "qty" | "multiplier" => self.next("qty", parse_multiplier).map(LegField::Multiplier),
            "right" => self.next("right", parse_right).map(LegField::Right),
            "strike" => self.next("strike", parse_strike).map(LegField::Strike),
            "expiration" | "exp" => self
                .next("expiration", parse_expiration)
                .map(LegField::Expiration),
            _ => Err(CommandParseError::InvalidArgument {
                name: "field",
                value: name.to_string(),
            }),
        }
    }

    fn finish(mut self) -> Result<(), CommandParseError> {
        let rest: Vec<&str> = self.words.by_ref().collect();
        if rest.is_empty() {
            Ok(())
        } else {
            Err(CommandParseError::TrailingInput(rest.join(" ")))
        }
    }
}

fn parse_action(word: &str) -> Option<LegAction> {
    match word.to_ascii_lowercase().as_str() {
        "buy" | "b" => Some(LegAction::Buy),
        "sell" | "s" => Some(LegAction::Sell),
        _ => None,
    }
}

fn parse_right(word: &str) -> Option<OptionRight> {
    match word.to_ascii_lowercase().as_str() {
        "call" | "c" => Some(OptionRight::Call),
        "put" | "p" => Some(OptionRight::Put),
        _ => None,
    }
}

fn parse_multiplier(word: &str) -> Option<NonZeroU32> {
    word.parse().ok()
}

fn parse_strike(word: &str) -> Option<Decimal> {
    Decimal::from_str(word)
        .ok()
        .filter(|strike| strike.is_sign_positive() && !strike.is_zero())
}

fn parse_expiration(word: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(word, "%Y-%m-%d").ok()
}
