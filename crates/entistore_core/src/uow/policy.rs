//! Declarative "join or start a unit of work" with retry on conflict.

use super::{RetryConfig, UnitOfWork, UnitOfWorkContext, UnitOfWorkFactory};
use crate::error::{CoreError, CoreResult};
use crate::usecase::Usecase;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// Whether an operation joins the current unit of work or gets its own.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    /// Join the current unit of work, or start one if there is none.
    #[default]
    Required,
    /// Join the current unit of work; fail if there is none.
    Mandatory,
    /// Always start a new unit of work, nested in the current one.
    RequiresNew,
}

/// Decides whether an error returned by the wrapped operation discards the
/// unit of work the policy started.
#[derive(Clone, Default)]
pub enum DiscardPolicy {
    /// Discard on every error.
    #[default]
    Always,
    /// Never discard. The unit of work stays open and current, and the
    /// caller must complete or discard it.
    Never,
    /// Discard when the predicate returns true.
    When(Arc<dyn Fn(&CoreError) -> bool + Send + Sync>),
}

impl DiscardPolicy {
    /// Creates a predicate-based policy.
    pub fn when(predicate: impl Fn(&CoreError) -> bool + Send + Sync + 'static) -> Self {
        Self::When(Arc::new(predicate))
    }

    /// Whether `error` discards the unit of work.
    #[must_use]
    pub fn should_discard(&self, error: &CoreError) -> bool {
        match self {
            Self::Always => true,
            Self::Never => false,
            Self::When(predicate) => predicate(error),
        }
    }
}

impl fmt::Debug for DiscardPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Always => f.write_str("Always"),
            Self::Never => f.write_str("Never"),
            Self::When(_) => f.write_str("When(..)"),
        }
    }
}

/// Outcome of one run of a wrapped operation.
#[derive(Debug)]
pub enum Attempt<T> {
    /// The operation and its completion succeeded.
    Done(T),
    /// Completion lost to a concurrent writer. Retryable.
    Conflict(CoreError),
    /// Anything else. Not retried.
    Failed(CoreError),
}

impl<T> Attempt<T> {
    /// Sorts a result into success, conflict or failure.
    pub fn classify(result: CoreResult<T>) -> Self {
        match result {
            Ok(value) => Self::Done(value),
            Err(e) if e.is_concurrent_modification() => Self::Conflict(e),
            Err(e) => Self::Failed(e),
        }
    }

    /// Whether this attempt lost to a concurrent writer.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict(_))
    }

    /// Converts back into a plain result.
    ///
    /// # Errors
    ///
    /// Returns the conflict or failure error.
    pub fn into_result(self) -> CoreResult<T> {
        match self {
            Self::Done(value) => Ok(value),
            Self::Conflict(e) | Self::Failed(e) => Err(e),
        }
    }
}

/// Runs operations inside units of work.
///
/// # Example
///
/// ```rust,no_run
/// # use entistore_core::{UnitOfWorkContext, UnitOfWorkFactory, UnitOfWorkPolicy, RetryConfig, CoreResult};
/// # fn demo(factory: &UnitOfWorkFactory) -> CoreResult<()> {
/// let policy = UnitOfWorkPolicy::new().with_retry(RetryConfig::new(3));
/// let mut ctx = UnitOfWorkContext::new();
///
/// policy.run(factory, &mut ctx, |uow| {
///     let counter = uow.get("Counter", "hits")?;
///     let next = counter.property("value").and_then(|v| v.as_integer()).unwrap_or(0) + 1;
///     counter.set_property("value", next)
/// })?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct UnitOfWorkPolicy {
    /// Join or start.
    pub propagation: Propagation,
    /// Retries on conflict.
    pub retry: RetryConfig,
    /// Discarding on operation errors.
    pub discard: DiscardPolicy,
    /// Usecase for started units of work; the factory default if unset.
    pub usecase: Option<Usecase>,
}

impl UnitOfWorkPolicy {
    /// Creates a `Required` policy retrying once.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the propagation mode.
    #[must_use]
    pub fn with_propagation(mut self, propagation: Propagation) -> Self {
        self.propagation = propagation;
        self
    }

    /// Sets the retry configuration.
    #[must_use]
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Sets the discard policy.
    #[must_use]
    pub fn with_discard(mut self, discard: DiscardPolicy) -> Self {
        self.discard = discard;
        self
    }

    /// Sets the usecase of started units of work.
    #[must_use]
    pub fn with_usecase(mut self, usecase: impl Into<Usecase>) -> Self {
        self.usecase = Some(usecase.into());
        self
    }

    /// Runs `op` according to the policy.
    ///
    /// A joined unit of work is left to its owner: it is neither completed
    /// nor discarded here, and nothing is retried. A started unit of work
    /// is completed when `op` succeeds. When completion loses to a
    /// concurrent writer, `op` runs again in a fresh unit of work, up to
    /// `retry.max_retries` times, so it must be safe to re-run.
    ///
    /// # Errors
    ///
    /// - `NoCurrentUnitOfWork` under `Mandatory` with an empty context
    /// - whatever `op` returns
    /// - `CompletionFailed` from the last completion attempt, unchanged
    pub fn run<T, F>(
        &self,
        factory: &UnitOfWorkFactory,
        ctx: &mut UnitOfWorkContext,
        mut op: F,
    ) -> CoreResult<T>
    where
        F: FnMut(&mut UnitOfWork) -> CoreResult<T>,
    {
        match self.propagation {
            Propagation::Mandatory => {
                let uow = ctx.current_mut().ok_or(CoreError::NoCurrentUnitOfWork)?;
                return op(uow);
            }
            Propagation::Required => {
                if let Some(uow) = ctx.current_mut() {
                    return op(uow);
                }
            }
            Propagation::RequiresNew => {}
        }

        let mut attempt = 0;
        loop {
            match self.run_once(factory, ctx, &mut op) {
                Attempt::Done(value) => return Ok(value),
                Attempt::Failed(e) => return Err(e),
                Attempt::Conflict(e) if attempt >= self.retry.max_retries => {
                    warn!(
                        usecase = ?self.usecase,
                        attempts = attempt + 1,
                        "giving up after concurrent modification"
                    );
                    return Err(e);
                }
                Attempt::Conflict(_) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    attempt += 1;
                    info!(
                        usecase = ?self.usecase,
                        retry = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "retrying after concurrent modification"
                    );
                    if !delay.is_zero() {
                        std::thread::sleep(delay);
                    }
                }
            }
        }
    }

    fn run_once<T, F>(
        &self,
        factory: &UnitOfWorkFactory,
        ctx: &mut UnitOfWorkContext,
        op: &mut F,
    ) -> Attempt<T>
    where
        F: FnMut(&mut UnitOfWork) -> CoreResult<T>,
    {
        let opened = match &self.usecase {
            Some(usecase) => factory.new_unit_of_work_with(usecase.clone()),
            None => factory.new_unit_of_work(),
        };
        let uow = match opened {
            Ok(uow) => uow,
            Err(e) => return Attempt::Failed(e),
        };
        ctx.push(uow);

        let result = match ctx.current_mut() {
            Some(uow) => op(uow),
            None => Err(CoreError::NoCurrentUnitOfWork),
        };
        match result {
            Ok(value) => {
                let Some(mut uow) = ctx.pop() else {
                    return Attempt::Failed(CoreError::NoCurrentUnitOfWork);
                };
                // The operation may have closed the unit of work itself
                if !uow.is_open() {
                    return Attempt::Done(value);
                }
                Attempt::classify(uow.complete().map(|()| value))
            }
            Err(e) => {
                if self.discard.should_discard(&e) {
                    if let Some(mut uow) = ctx.pop() {
                        uow.discard();
                    }
                }
                Attempt::Failed(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::Config;
    use crate::entity::{EntityDescriptor, EntityModel};
    use crate::store::MapEntityStore;
    use entistore_codec::{Value, ValueType};
    use entistore_storage::{EntityReference, MemoryMapStore};
    use std::time::Duration;

    fn factory() -> UnitOfWorkFactory {
        let model = Arc::new(
            EntityModel::new()
                .with_type(EntityDescriptor::new("Counter").property("value", ValueType::Integer))
                .unwrap(),
        );
        let store = MapEntityStore::new(Arc::new(MemoryMapStore::new()), Arc::clone(&model));
        UnitOfWorkFactory::new(Arc::new(store), model, Config::default())
    }

    fn seed(factory: &UnitOfWorkFactory) {
        let mut uow = factory.new_unit_of_work().unwrap();
        uow.new_entity("Counter", Some("c")).unwrap();
        uow.complete().unwrap();
    }

    /// Bumps the counter in a unit of work of its own.
    fn interfere(factory: &UnitOfWorkFactory) {
        let mut other = factory.new_unit_of_work().unwrap();
        let counter = other.get("Counter", "c").unwrap();
        let value = counter.property("value").and_then(Value::as_integer).unwrap_or(0);
        counter.set_property("value", value + 100).unwrap();
        other.complete().unwrap();
    }

    #[test]
    fn classify_attempts() {
        let conflict = CoreError::ConcurrentModification { references: vec![] };
        assert!(Attempt::<()>::classify(Err(CoreError::completion_failed(conflict))).is_conflict());
        assert!(matches!(
            Attempt::<()>::classify(Err(CoreError::UnitOfWorkClosed)),
            Attempt::Failed(_)
        ));
        assert!(matches!(Attempt::classify(Ok(3)), Attempt::Done(3)));
    }

    #[test]
    fn discard_policy_predicate() {
        let policy = DiscardPolicy::when(CoreError::is_programming_error);
        assert!(policy.should_discard(&CoreError::UnitOfWorkClosed));
        assert!(!policy.should_discard(&CoreError::not_found(&EntityReference::new("x"))));
        assert!(DiscardPolicy::Always.should_discard(&CoreError::UnitOfWorkClosed));
        assert!(!DiscardPolicy::Never.should_discard(&CoreError::UnitOfWorkClosed));
    }

    #[test]
    fn started_unit_of_work_is_completed() {
        let factory = factory();
        seed(&factory);
        let mut ctx = UnitOfWorkContext::new();

        UnitOfWorkPolicy::new()
            .run(&factory, &mut ctx, |uow| uow.get("Counter", "c")?.set_property("value", 7))
            .unwrap();
        assert!(ctx.is_empty());

        let mut check = factory.new_unit_of_work().unwrap();
        let counter = check.get("Counter", "c").unwrap();
        assert_eq!(counter.property("value"), Some(&Value::Integer(7)));
        assert_eq!(counter.version(), 2);
    }

    #[test]
    fn conflict_is_retried() {
        let factory = factory();
        seed(&factory);
        let mut ctx = UnitOfWorkContext::new();
        let mut runs = 0;

        let policy = UnitOfWorkPolicy::new().with_retry(
            RetryConfig::new(2).with_delay_factor(Duration::from_millis(1)),
        );
        policy
            .run(&factory, &mut ctx, |uow| {
                runs += 1;
                uow.get("Counter", "c")?;
                if runs == 1 {
                    interfere(&factory);
                }
                uow.get("Counter", "c")?.set_property("value", 1)
            })
            .unwrap();
        assert_eq!(runs, 2);
    }

    #[test]
    fn required_joins_current() {
        let factory = factory();
        seed(&factory);
        let mut ctx = UnitOfWorkContext::new();
        ctx.push(factory.new_unit_of_work().unwrap());
        let outer = ctx.current().unwrap().id();

        let seen = UnitOfWorkPolicy::new()
            .run(&factory, &mut ctx, |uow| {
                uow.get("Counter", "c")?.set_property("value", 9)?;
                Ok(uow.id())
            })
            .unwrap();
        assert_eq!(seen, outer);
        // Joined, so not completed
        assert!(ctx.current().unwrap().is_open());
        let mut check = factory.new_unit_of_work().unwrap();
        assert_eq!(check.get("Counter", "c").unwrap().version(), 1);
    }

    #[test]
    fn mandatory_needs_current() {
        let factory = factory();
        let mut ctx = UnitOfWorkContext::new();
        let result = UnitOfWorkPolicy::new()
            .with_propagation(Propagation::Mandatory)
            .run(&factory, &mut ctx, |_| Ok(()));
        assert!(matches!(result, Err(CoreError::NoCurrentUnitOfWork)));
    }

    #[test]
    fn requires_new_nests() {
        let factory = factory();
        let mut ctx = UnitOfWorkContext::new();
        ctx.push(factory.new_unit_of_work().unwrap());
        let outer = ctx.current().unwrap().id();

        let inner = UnitOfWorkPolicy::new()
            .with_propagation(Propagation::RequiresNew)
            .with_usecase("nested")
            .run(&factory, &mut ctx, |uow| {
                assert_eq!(uow.usecase().name(), "nested");
                Ok(uow.id())
            })
            .unwrap();
        assert_ne!(inner, outer);
        assert_eq!(ctx.depth(), 1);
        assert_eq!(ctx.current().unwrap().id(), outer);
    }
}
