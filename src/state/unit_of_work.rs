//! Checkpoint-and-restore boundary around a mutation.

use crate::state::Repository;
use std::ops::{Deref, DerefMut};

/// A logical operation over a locked repository.
///
/// The state is cloned on `begin`. Unless `commit` is called, dropping the
/// unit of work restores that clone, which also covers early returns via `?`.
pub struct UnitOfWork<'a, R: Repository> {
    state: &'a mut R,
    checkpoint: Option<R>,
}

impl<'a, R: Repository> UnitOfWork<'a, R> {
    pub fn begin(state: &'a mut R) -> Self {
        let checkpoint = Some(state.clone());
        Self { state, checkpoint }
    }

    /// Keep every change made through this unit of work.
    pub fn commit(mut self) {
        self.checkpoint = None;
    }

    /// Discard every change made through this unit of work.
    pub fn rollback(self) {
        // Drop restores the checkpoint.
    }
}

impl<R: Repository> Deref for UnitOfWork<'_, R> {
    type Target = R;

    fn deref(&self) -> &R {
        self.state
    }
}

impl<R: Repository> DerefMut for UnitOfWork<'_, R> {
    fn deref_mut(&mut self) -> &mut R {
        self.state
    }
}

impl<R: Repository> Drop for UnitOfWork<'_, R> {
    fn drop(&mut self) {
        if let Some(checkpoint) = self.checkpoint.take() {
            *self.state = checkpoint;
        }
    }
}
