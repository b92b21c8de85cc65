use time::Date;

use super::{Board, DropOutcome};
use crate::board::{CardColor, CardId};
use crate::sanitize::SanitizeError;

/// Board mutations as plain values, for front ends that are not driven by
/// pointer events (the CLI, scripted imports).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Add { date: Date, text: String },
    Paste { date: Date, raw: String },
    ToggleDone(CardId),
    CycleColor(CardId),
    SetColor { id: CardId, color: CardColor },
    Move { ids: Vec<CardId>, date: Date, index: Option<usize> },
    Delete(CardId),
    Undo,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandOutcome {
    Created(Vec<CardId>),
    Done(bool),
    Colored(CardColor),
    Moved(DropOutcome),
    Deleted,
    Undone,
    Rejected(SanitizeError),
    /// Nothing matched; the board is unchanged.
    Ignored,
}

impl CommandOutcome {
    pub fn changed(&self) -> bool {
        !matches!(self, CommandOutcome::Rejected(_) | CommandOutcome::Ignored)
    }
}

impl Board {
    pub fn apply(&mut self, command: Command) -> CommandOutcome {
        tracing::debug!(?command, "applying command");
        match command {
            Command::Add { date, text } => match self.add_card(date, &text) {
                Ok(id) => CommandOutcome::Created(vec![id]),
                Err(err) => CommandOutcome::Rejected(err),
            },
            Command::Paste { date, raw } => match self.paste(date, &raw) {
                Ok(ids) => CommandOutcome::Created(ids),
                Err(err) => CommandOutcome::Rejected(err),
            },
            Command::ToggleDone(id) => self
                .toggle_done(id)
                .map(CommandOutcome::Done)
                .unwrap_or(CommandOutcome::Ignored),
            Command::CycleColor(id) => self
                .cycle_color(id)
                .map(CommandOutcome::Colored)
                .unwrap_or(CommandOutcome::Ignored),
            Command::SetColor { id, color } => {
                if self.set_color(id, color) {
                    CommandOutcome::Colored(color)
                } else {
                    CommandOutcome::Ignored
                }
            }
            Command::Move { ids, date, index } => self
                .move_cards(&ids, date, index)
                .map(CommandOutcome::Moved)
                .unwrap_or(CommandOutcome::Ignored),
            Command::Delete(id) => {
                if self.delete_card(id) {
                    CommandOutcome::Deleted
                } else {
                    CommandOutcome::Ignored
                }
            }
            Command::Undo => {
                if self.undo() {
                    CommandOutcome::Undone
                } else {
                    CommandOutcome::Ignored
                }
            }
        }
    }
}
