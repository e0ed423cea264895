//! Caching implementations for todo types.

use crate::cache::{Cacheable, QueryKey};

use super::types::{OwnerId, Todo};

/// Endpoint name of an owner's todo list.
pub const TODOS_ENDPOINT: &str = "getTodos";

/// Endpoint name of the public list of every todo.
pub const PUBLIC_TODOS_ENDPOINT: &str = "getPublicTodos";

impl Cacheable for Todo {
  fn cache_key(&self) -> String {
    self.id.to_string()
  }

  fn entity_type() -> &'static str {
    "todo"
  }
}

/// Cache key of the todo list owned by `owner`.
pub fn todos_key(owner: &OwnerId) -> QueryKey {
  QueryKey::new(TODOS_ENDPOINT, owner.as_str())
}

/// Cache key of the public todo list.
pub fn public_todos_key() -> QueryKey {
  QueryKey::new(PUBLIC_TODOS_ENDPOINT, "")
}

/// Position of the todo with `id` in a cached list.
pub fn position_of(todos: &[Todo], id: u64) -> Option<usize> {
  let key = id.to_string();
  todos.iter().position(|t| t.cache_key() == key)
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_keys_are_scoped_by_owner() {
    assert_eq!(
      todos_key(&OwnerId::from("7")).to_string(),
      "getTodos(\"7\")"
    );
    assert_ne!(todos_key(&OwnerId::from("7")), todos_key(&OwnerId::from("8")));
    assert_ne!(todos_key(&OwnerId::from("")), public_todos_key());
  }
}
