use color_eyre::{eyre::WrapErr, Result, Section};
use std::sync::Arc;
use tracing::{debug, info};

use crate::cache::{
  CacheStore, KeyValueStorage, NoopStorage, PersistenceAdapter, SqliteStorage, SubscriptionId,
  Whitelist,
};
use crate::commands::{Command, StatusFilter};
use crate::config::Config;
use crate::error::SyncError;
use crate::identity::{IdentityChange, Session};
use crate::output;
use crate::todos::types::{OwnerId, Todo, TodoPatch};
use crate::todos::{CachedTodoClient, PatchOutcome, TodoClient};

/// Storage key of the owner chosen with `login`. Not part of the cache slice.
const SESSION_KEY: &str = "session:owner";

/// Main application state
pub struct App {
  client: CachedTodoClient<TodoClient>,
  storage: Arc<dyn KeyValueStorage>,
  persistence: PersistenceAdapter<dyn KeyValueStorage>,
  /// Write-through subscription of `persistence` on the client's store
  persist_subscription: SubscriptionId,
}

impl App {
  /// Open storage, rehydrate the cache and resolve the acting owner.
  ///
  /// Owner precedence: `--owner`, TODO_SYNC_OWNER, `login`, config file.
  pub fn new(config: &Config, owner_override: Option<OwnerId>, persist: bool) -> Result<Self> {
    let storage: Arc<dyn KeyValueStorage> = if persist && config.cache.enabled {
      Arc::new(
        SqliteStorage::open(config.cache.path.as_deref()).wrap_err("Failed to open cache")?,
      )
    } else {
      debug!("persistence disabled");
      Arc::new(NoopStorage)
    };

    let store: CacheStore<Todo> = CacheStore::new();
    let persistence =
      PersistenceAdapter::new(Arc::clone(&storage), Whitelist::new(config.cache.persist.iter().cloned()));
    let persist_subscription = persistence.attach(&store);

    let stored_owner = storage
      .get(SESSION_KEY)
      .wrap_err("Failed to read session")?
      .map(OwnerId::from);
    let owner = owner_override
      .or_else(Config::owner_from_env)
      .or(stored_owner)
      .or_else(|| config.owner_id.clone());
    debug!(owner = ?owner, "resolved owner");

    let client = CachedTodoClient::new(
      TodoClient::new(&config.api)?,
      store,
      Session::new(owner),
      config.cache.stale_time(),
    );

    Ok(Self {
      client,
      storage,
      persistence,
      persist_subscription,
    })
  }

  pub async fn run(&self, command: Command) -> Result<()> {
    match command {
      Command::Public {
        status,
        search,
        limit,
      } => {
        let result = self.client.public_todos().await?;
        let mut rows = output::filter_todos(&result.data, status, search.as_deref());
        if let Some(limit) = limit {
          rows.truncate(limit);
        }
        print!("{}", output::render_table(&rows));
        print_note(&result);
      }
      Command::List { status, search } => {
        let result = self.client.todos().await.map_err(with_hint)?;
        let rows = output::filter_todos(&result.data, status, search.as_deref());
        print!("{}", output::render_table(&rows));
        print_note(&result);
      }
      Command::Refresh => {
        let result = self.client.refresh().await.map_err(with_hint)?;
        let rows = output::filter_todos(&result.data, StatusFilter::All, None);
        print!("{}", output::render_table(&rows));
      }
      Command::Add { title } => {
        self.ensure_list().await?;
        let todo = self.client.create(&title.join(" ")).await.map_err(with_hint)?;
        println!("Created todo {}: {}", todo.id, todo.title);
      }
      Command::Edit {
        id,
        title,
        completed,
      } => {
        self.ensure_list().await?;
        let mut patch = TodoPatch::new(id);
        if let Some(title) = title {
          patch = patch.title(title);
        }
        if let Some(completed) = completed {
          patch = patch.completed(completed);
        }
        let outcome = self.client.update(patch).await.map_err(with_hint)?;
        report(outcome, id, "Updated");
      }
      Command::Toggle { id } => {
        self.ensure_list().await?;
        let outcome = self.client.toggle(id).await.map_err(with_hint)?;
        report(outcome, id, "Toggled");
      }
      Command::Delete { id } => {
        self.ensure_list().await?;
        let outcome = self.client.delete(id).await.map_err(with_hint)?;
        report(outcome, id, "Deleted");
      }
      Command::Login { owner } => {
        let owner = OwnerId::from(owner);
        if owner.as_str().is_empty() {
          return Err(SyncError::Validation("owner must not be empty".to_string()).into());
        }
        let change = self.client.sign_in(owner.clone());
        self.storage.set(SESSION_KEY, owner.as_str())?;
        info!(%owner, ?change, "login");
        println!("Signed in as {}", owner);
      }
      Command::Logout => {
        // Detach first so the sign-out reset is not written back
        self.client.store().unsubscribe(self.persist_subscription);
        let change = self.client.sign_out();
        self.storage.remove(SESSION_KEY)?;
        self.persistence.purge()?;
        if change == IdentityChange::SignedOut {
          println!("Signed out");
        } else {
          println!("Not signed in");
        }
      }
      Command::Whoami => match self.client.session().current_owner_id() {
        Some(owner) => println!("{}", owner),
        None => println!("Not signed in"),
      },
    }
    Ok(())
  }

  /// Writes patch the cached list, so it has to be resident first.
  async fn ensure_list(&self) -> Result<()> {
    self.client.todos().await.map_err(with_hint)?;
    Ok(())
  }
}

fn print_note<T>(result: &crate::cache::CacheResult<T>) {
  if let Some(note) = output::source_note(result) {
    eprintln!("{}", note);
  }
}

fn report(outcome: PatchOutcome, id: u64, verb: &str) {
  match outcome {
    PatchOutcome::Applied => println!("{} todo {}", verb, id),
    PatchOutcome::Missing => {
      println!("Server accepted the change, but todo {} is not in your list", id)
    }
  }
}

/// Attach a suggestion to errors the user can act on.
fn with_hint(e: SyncError) -> color_eyre::Report {
  match e {
    SyncError::Unauthenticated => color_eyre::Report::new(e)
      .suggestion("Run `todo-sync login <owner>` or pass --owner <owner>"),
    SyncError::Network { .. } => {
      color_eyre::Report::new(e).suggestion("Check your connection and the api.base_url setting")
    }
    SyncError::KeyNotFound { .. } => {
      color_eyre::Report::new(e).suggestion("Run `todo-sync refresh` to reload your todos")
    }
    _ => color_eyre::Report::new(e),
  }
}
