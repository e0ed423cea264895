//! Plain-text rendering of todo lists.

use chrono::{DateTime, Utc};
use std::fmt::Write;

use crate::cache::{CacheResult, CacheSource};
use crate::commands::StatusFilter;
use crate::todos::types::Todo;

const TITLE_WIDTH: usize = 60;

/// Todos passing the status filter and (case-insensitive) title search.
pub fn filter_todos<'a>(
  todos: &'a [Todo],
  status: StatusFilter,
  search: Option<&str>,
) -> Vec<&'a Todo> {
  let needle = search.map(|s| s.trim().to_lowercase());
  todos
    .iter()
    .filter(|t| status.matches(t.completed))
    .filter(|t| match &needle {
      Some(n) => t.title.to_lowercase().contains(n.as_str()),
      None => true,
    })
    .collect()
}

fn truncate(s: &str, max: usize) -> String {
  if s.chars().count() <= max {
    s.to_string()
  } else {
    let mut out: String = s.chars().take(max.saturating_sub(1)).collect();
    out.push('…');
    out
  }
}

pub fn render_table(todos: &[&Todo]) -> String {
  if todos.is_empty() {
    return "No todos.\n".to_string();
  }

  let id_width = todos
    .iter()
    .map(|t| t.id.to_string().len())
    .max()
    .unwrap_or(2)
    .max(2);

  let mut out = String::new();
  let _ = writeln!(out, "{:>id_width$}  {:<4}  {:<6}  TITLE", "ID", "DONE", "OWNER");
  for todo in todos {
    let _ = writeln!(
      out,
      "{:>id_width$}  {:<4}  {:<6}  {}",
      todo.id,
      if todo.completed { "[x]" } else { "[ ]" },
      todo.owner_id.to_string(),
      truncate(&todo.title, TITLE_WIDTH),
    );
  }
  out
}

fn age(since: DateTime<Utc>) -> String {
  let secs = (Utc::now() - since).num_seconds().max(0);
  match secs {
    0..=59 => format!("{}s", secs),
    60..=3599 => format!("{}m", secs / 60),
    _ => format!("{}h", secs / 3600),
  }
}

/// One-line note on where a listing came from.
pub fn source_note<T>(result: &CacheResult<T>) -> Option<String> {
  match (result.source, result.cached_at) {
    (CacheSource::CacheFresh, Some(at)) => Some(format!("(cached {} ago)", age(at))),
    (CacheSource::Offline, Some(at)) => Some(format!(
      "(offline: showing cached data from {} ago)",
      age(at)
    )),
    _ => None,
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::todos::types::OwnerId;

  fn todo(id: u64, title: &str, completed: bool) -> Todo {
    Todo {
      owner_id: OwnerId::from("1"),
      id,
      title: title.to_string(),
      completed,
    }
  }

  #[test]
  fn test_filter_by_status_and_search() {
    let todos = vec![
      todo(1, "Buy milk", false),
      todo(2, "Buy bread", true),
      todo(3, "Walk dog", false),
    ];

    let pending = filter_todos(&todos, StatusFilter::Pending, None);
    assert_eq!(pending.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 3]);

    let buys = filter_todos(&todos, StatusFilter::All, Some("BUY"));
    assert_eq!(buys.iter().map(|t| t.id).collect::<Vec<_>>(), vec![1, 2]);

    let done_buys = filter_todos(&todos, StatusFilter::Done, Some("buy"));
    assert_eq!(done_buys.iter().map(|t| t.id).collect::<Vec<_>>(), vec![2]);
  }

  #[test]
  fn test_render_table() {
    let todos = vec![todo(1, "Buy milk", false), todo(12, "Walk dog", true)];
    let rows: Vec<&Todo> = todos.iter().collect();

    let table = render_table(&rows);
    let lines: Vec<&str> = table.lines().collect();

    assert_eq!(lines.len(), 3);
    assert!(lines[1].contains("[ ]") && lines[1].ends_with("Buy milk"));
    assert!(lines[2].starts_with("12") && lines[2].contains("[x]"));
  }

  #[test]
  fn test_render_empty() {
    assert_eq!(render_table(&[]), "No todos.\n");
  }

  #[test]
  fn test_truncate() {
    assert_eq!(truncate("short", 10), "short");
    assert_eq!(truncate("abcdefghij", 5), "abcd…");
  }

  #[test]
  fn test_source_note() {
    let fresh = CacheResult::from_cache((), Utc::now());
    assert!(source_note(&fresh).unwrap().starts_with("(cached"));

    let network = CacheResult::from_network(());
    assert_eq!(source_note(&network), None);

    let offline = CacheResult::offline((), Utc::now());
    assert!(source_note(&offline).unwrap().starts_with("(offline"));
  }
}
