//! Command-line subcommands.

use clap::{Subcommand, ValueEnum};

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
  /// Browse the public todo list (no sign-in needed)
  Public {
    #[arg(long, value_enum, default_value_t = StatusFilter::All)]
    status: StatusFilter,
    /// Only show todos whose title contains this text
    #[arg(long)]
    search: Option<String>,
    /// Show at most this many rows
    #[arg(long)]
    limit: Option<usize>,
  },
  /// Show your todos
  #[command(alias = "ls")]
  List {
    #[arg(long, value_enum, default_value_t = StatusFilter::All)]
    status: StatusFilter,
    #[arg(long)]
    search: Option<String>,
  },
  /// Re-fetch your todos, ignoring the cache
  Refresh,
  /// Create a todo
  Add {
    /// Title of the new todo
    #[arg(required = true, num_args = 1..)]
    title: Vec<String>,
  },
  /// Change a todo's title or completed flag
  Edit {
    id: u64,
    #[arg(long)]
    title: Option<String>,
    #[arg(long)]
    completed: Option<bool>,
  },
  /// Flip a todo between done and pending
  Toggle { id: u64 },
  /// Delete a todo
  #[command(alias = "rm")]
  Delete { id: u64 },
  /// Act as the given owner from now on
  Login { owner: String },
  /// Forget the current owner and drop their cached todos
  Logout,
  /// Print the current owner
  Whoami,
}

/// Faceted filter on the completed flag
#[derive(ValueEnum, Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum StatusFilter {
  #[default]
  All,
  Done,
  Pending,
}

impl StatusFilter {
  pub fn matches(self, completed: bool) -> bool {
    match self {
      StatusFilter::All => true,
      StatusFilter::Done => completed,
      StatusFilter::Pending => !completed,
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_status_filter() {
    assert!(StatusFilter::All.matches(true));
    assert!(StatusFilter::All.matches(false));
    assert!(StatusFilter::Done.matches(true));
    assert!(!StatusFilter::Done.matches(false));
    assert!(StatusFilter::Pending.matches(false));
    assert!(!StatusFilter::Pending.matches(true));
  }
}
