//! Signed-in identity.
//!
//! Credentials are verified elsewhere; the core only needs a stable owner id
//! to scope queries, and to know when that id changes.

use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::watch;
use tracing::info;

use crate::todos::types::OwnerId;

/// What a sign-in or sign-out did to the current identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IdentityChange {
  Unchanged,
  SignedIn,
  /// A different owner replaced the previous one
  Switched,
  SignedOut,
}

impl IdentityChange {
  /// Whether cached data of the previous identity must be dropped.
  pub fn invalidates_cache(self) -> bool {
    matches!(self, IdentityChange::Switched | IdentityChange::SignedOut)
  }
}

type IdentityHook = Arc<dyn Fn(IdentityChange) + Send + Sync>;

/// Current identity, shared by every component that needs it.
///
/// Hooks registered with [`Session::on_identity_change`] run synchronously
/// inside `sign_in`/`sign_out`, so whatever they do is finished before the
/// new identity can be used by the caller.
#[derive(Clone)]
pub struct Session {
  owner: Arc<watch::Sender<Option<OwnerId>>>,
  hooks: Arc<Mutex<Vec<IdentityHook>>>,
}

impl Session {
  pub fn new(owner: Option<OwnerId>) -> Self {
    let (tx, _rx) = watch::channel(owner);
    Self {
      owner: Arc::new(tx),
      hooks: Arc::new(Mutex::new(Vec::new())),
    }
  }

  pub fn current_owner_id(&self) -> Option<OwnerId> {
    self.owner.borrow().clone()
  }

  /// Receiver for async consumers; sees the latest owner only.
  #[allow(dead_code)]
  pub fn subscribe(&self) -> watch::Receiver<Option<OwnerId>> {
    self.owner.subscribe()
  }

  /// Run `hook` on every change of identity (never for `Unchanged`).
  pub fn on_identity_change(&self, hook: impl Fn(IdentityChange) + Send + Sync + 'static) {
    self
      .hooks
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .push(Arc::new(hook));
  }

  pub fn sign_in(&self, owner: OwnerId) -> IdentityChange {
    let previous = self.owner.send_replace(Some(owner.clone()));
    let change = match previous {
      Some(prev) if prev == owner => IdentityChange::Unchanged,
      Some(_) => IdentityChange::Switched,
      None => IdentityChange::SignedIn,
    };
    if change != IdentityChange::Unchanged {
      info!(%owner, ?change, "identity changed");
      self.notify(change);
    }
    change
  }

  pub fn sign_out(&self) -> IdentityChange {
    match self.owner.send_replace(None) {
      Some(prev) => {
        info!(owner = %prev, "signed out");
        self.notify(IdentityChange::SignedOut);
        IdentityChange::SignedOut
      }
      None => IdentityChange::Unchanged,
    }
  }

  fn notify(&self, change: IdentityChange) {
    let hooks: Vec<IdentityHook> = self
      .hooks
      .lock()
      .unwrap_or_else(PoisonError::into_inner)
      .clone();
    for hook in hooks {
      hook(change);
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_sign_in_transitions() {
    let session = Session::new(None);
    assert_eq!(session.current_owner_id(), None);

    assert_eq!(session.sign_in(OwnerId::from("7")), IdentityChange::SignedIn);
    assert_eq!(session.sign_in(OwnerId::from("7")), IdentityChange::Unchanged);
    assert_eq!(session.sign_in(OwnerId::from("8")), IdentityChange::Switched);
    assert_eq!(session.current_owner_id(), Some(OwnerId::from("8")));
  }

  #[test]
  fn test_sign_out() {
    let session = Session::new(Some(OwnerId::from("7")));

    assert_eq!(session.sign_out(), IdentityChange::SignedOut);
    assert_eq!(session.sign_out(), IdentityChange::Unchanged);
    assert_eq!(session.current_owner_id(), None);
  }

  #[test]
  fn test_only_switch_and_sign_out_invalidate() {
    assert!(!IdentityChange::SignedIn.invalidates_cache());
    assert!(!IdentityChange::Unchanged.invalidates_cache());
    assert!(IdentityChange::Switched.invalidates_cache());
    assert!(IdentityChange::SignedOut.invalidates_cache());
  }

  #[tokio::test]
  async fn test_subscribers_observe_changes() {
    let session = Session::new(None);
    let mut rx = session.subscribe();

    session.sign_in(OwnerId::from("7"));

    rx.changed().await.unwrap();
    assert_eq!(*rx.borrow(), Some(OwnerId::from("7")));
  }

  #[test]
  fn test_hooks_run_on_changes_only() {
    let session = Session::new(None);
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = Arc::clone(&seen);
    session.on_identity_change(move |change| sink.lock().unwrap().push(change));

    session.sign_in(OwnerId::from("7"));
    session.sign_in(OwnerId::from("7"));
    session.sign_in(OwnerId::from("8"));
    session.sign_out();
    session.sign_out();

    assert_eq!(
      *seen.lock().unwrap(),
      vec![
        IdentityChange::SignedIn,
        IdentityChange::Switched,
        IdentityChange::SignedOut,
      ]
    );
  }

  #[test]
  fn test_clones_share_hooks() {
    let session = Session::new(Some(OwnerId::from("7")));
    let count = Arc::new(Mutex::new(0));
    let sink = Arc::clone(&count);
    session.on_identity_change(move |_| *sink.lock().unwrap() += 1);

    session.clone().sign_out();

    assert_eq!(*count.lock().unwrap(), 1);
  }
}
