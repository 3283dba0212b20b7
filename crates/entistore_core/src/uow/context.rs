//! The per-task stack of units of work.

use super::UnitOfWork;
use crate::error::{CoreError, CoreResult};

/// Holds the units of work of one task. The top of the stack is the
/// current unit of work.
///
/// A context is an ordinary value passed to whatever needs it. Moving a
/// unit of work to another context goes through [`pause`](Self::pause)
/// and [`resume`](Self::resume).
#[derive(Debug, Default)]
pub struct UnitOfWorkContext {
    stack: Vec<UnitOfWork>,
}

impl UnitOfWorkContext {
    /// Creates an empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes `uow` the current unit of work, nesting the previous one.
    pub fn push(&mut self, uow: UnitOfWork) {
        self.stack.push(uow);
    }

    /// Removes and returns the current unit of work.
    pub fn pop(&mut self) -> Option<UnitOfWork> {
        self.stack.pop()
    }

    /// The current unit of work.
    #[must_use]
    pub fn current(&self) -> Option<&UnitOfWork> {
        self.stack.last()
    }

    /// The current unit of work, mutably.
    pub fn current_mut(&mut self) -> Option<&mut UnitOfWork> {
        self.stack.last_mut()
    }

    /// Number of nested units of work.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    /// Whether there is no current unit of work.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Detaches the current unit of work and marks it paused. The unit it
    /// was nested in becomes current again.
    ///
    /// # Errors
    ///
    /// `NoCurrentUnitOfWork` if the context is empty; `UnitOfWorkPaused` /
    /// `UnitOfWorkClosed` if the current unit is not open.
    pub fn pause(&mut self) -> CoreResult<UnitOfWork> {
        let uow = self
            .stack
            .last_mut()
            .ok_or(CoreError::NoCurrentUnitOfWork)?;
        uow.mark_paused()?;
        self.stack.pop().ok_or(CoreError::NoCurrentUnitOfWork)
    }

    /// Reattaches a paused unit of work as the current one.
    ///
    /// On error the unit of work is dropped, which discards it.
    ///
    /// # Errors
    ///
    /// `ContextOccupied` if this context already has a current unit of
    /// work; `InvalidOperation` if `uow` is not paused.
    pub fn resume(&mut self, mut uow: UnitOfWork) -> CoreResult<()> {
        if !self.stack.is_empty() {
            return Err(CoreError::ContextOccupied);
        }
        uow.mark_resumed()?;
        self.stack.push(uow);
        Ok(())
    }
}
