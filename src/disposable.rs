//! Освобождаемые ресурсы: токены подписок и их композиции.
//!
//! - [`Disposable`] — общий контракт для всего, что можно освободить;
//! - [`DisposableBag`] / [`DisposableBagBuilder`] — сборка нескольких
//!   токенов в один;
//! - [`SingleAssignmentDisposable`] — слот для отложенного присваивания
//!   токена;
//! - [`DisposeGuard`] — освобождение при `Drop`.

use std::sync::atomic::{AtomicBool, Ordering};

use parking_lot::Mutex;

use crate::error::BrokerError;

/// Ресурс, который можно освободить.
///
/// `dispose` обязан быть идемпотентным: эффект имеет только первый вызов.
pub trait Disposable: Send + Sync {
    fn dispose(&self);
}

impl<D: Disposable + ?Sized> Disposable for Box<D> {
    fn dispose(&self) {
        (**self).dispose()
    }
}

/// Токен, который ничего не делает.
#[derive(Debug, Default, Clone, Copy)]
pub struct EmptyDisposable;

impl Disposable for EmptyDisposable {
    fn dispose(&self) {}
}

/// Фабрика составных токенов.
pub struct DisposableBag;

impl DisposableBag {
    /// Общий пустой токен.
    pub fn empty() -> Box<dyn Disposable> {
        Box::new(EmptyDisposable)
    }

    /// Токен, освобождающий все `disposables` один раз.
    pub fn create(disposables: Vec<Box<dyn Disposable>>) -> Box<dyn Disposable> {
        Box::new(NthDisposable {
            disposed: AtomicBool::new(false),
            disposables,
        })
    }

    pub fn builder() -> DisposableBagBuilder {
        DisposableBagBuilder::default()
    }

    pub fn builder_with_capacity(capacity: usize) -> DisposableBagBuilder {
        DisposableBagBuilder {
            disposables: Vec::with_capacity(capacity),
        }
    }
}

struct NthDisposable {
    disposed: AtomicBool,
    disposables: Vec<Box<dyn Disposable>>,
}

impl Disposable for NthDisposable {
    fn dispose(&self) {
        if self.disposed.swap(true, Ordering::AcqRel) {
            return;
        }
        for item in &self.disposables {
            item.dispose();
        }
    }
}

/// Накопитель токенов.
#[derive(Default)]
pub struct DisposableBagBuilder {
    disposables: Vec<Box<dyn Disposable>>,
}

impl DisposableBagBuilder {
    pub fn add(
        &mut self,
        disposable: Box<dyn Disposable>,
    ) {
        self.disposables.push(disposable);
    }

    /// Освобождает всё накопленное и очищает накопитель.
    pub fn clear(&mut self) {
        for item in self.disposables.drain(..) {
            item.dispose();
        }
    }

    pub fn len(&self) -> usize {
        self.disposables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.disposables.is_empty()
    }

    /// Собирает накопленные токены в один.
    pub fn build(self) -> Box<dyn Disposable> {
        DisposableBag::create(self.disposables)
    }
}

/// Удобные операции над токенами.
pub trait DisposableExt {
    /// Кладёт токен в накопитель.
    fn add_to(
        self,
        bag: &mut DisposableBagBuilder,
    );

    /// Присваивает токен single-assignment слоту.
    fn set_to(
        self,
        slot: &SingleAssignmentDisposable,
    ) -> Result<(), BrokerError>;

    /// Оборачивает токен в guard, который освобождает его при `Drop`.
    fn dispose_on_drop(self) -> DisposeGuard;
}

impl DisposableExt for Box<dyn Disposable> {
    fn add_to(
        self,
        bag: &mut DisposableBagBuilder,
    ) {
        bag.add(self);
    }

    fn set_to(
        self,
        slot: &SingleAssignmentDisposable,
    ) -> Result<(), BrokerError> {
        slot.set(self)
    }

    fn dispose_on_drop(self) -> DisposeGuard {
        DisposeGuard { inner: Some(self) }
    }
}

/// Слот, которому токен можно присвоить ровно один раз.
///
/// Полезен, когда подписка создаётся позже, чем объект, который должен
/// её освободить. Если слот уже освобождён, присваиваемый токен
/// освобождается сразу.
#[derive(Default)]
pub struct SingleAssignmentDisposable {
    state: Mutex<SingleAssignmentState>,
}

#[derive(Default)]
struct SingleAssignmentState {
    inner: Option<Box<dyn Disposable>>,
    assigned: bool,
    disposed: bool,
}

impl SingleAssignmentDisposable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Присваивает токен.
    ///
    /// После `dispose` слота любой присваиваемый токен освобождается сразу,
    /// сколько бы раз ни вызывался `set`.
    ///
    /// # Ошибки
    /// [`BrokerError::DoubleAssignment`], если живому слоту токен уже был
    /// присвоен.
    pub fn set(
        &self,
        disposable: Box<dyn Disposable>,
    ) -> Result<(), BrokerError> {
        let mut state = self.state.lock();
        if state.disposed {
            state.assigned = true;
            drop(state);
            disposable.dispose();
            return Ok(());
        }
        if state.assigned {
            return Err(BrokerError::DoubleAssignment);
        }

        state.assigned = true;
        state.inner = Some(disposable);
        Ok(())
    }

    pub fn is_disposed(&self) -> bool {
        self.state.lock().disposed
    }
}

impl Disposable for SingleAssignmentDisposable {
    fn dispose(&self) {
        let inner = {
            let mut state = self.state.lock();
            if state.disposed {
                return;
            }
            state.disposed = true;
            state.inner.take()
        };

        if let Some(inner) = inner {
            inner.dispose();
        }
    }
}

/// Guard, освобождающий токен при `Drop`.
pub struct DisposeGuard {
    inner: Option<Box<dyn Disposable>>,
}

impl DisposeGuard {
    /// Забирает токен обратно, не освобождая его.
    pub fn into_inner(mut self) -> Box<dyn Disposable> {
        match self.inner.take() {
            Some(inner) => inner,
            None => DisposableBag::empty(),
        }
    }
}

impl Drop for DisposeGuard {
    fn drop(&mut self) {
        if let Some(inner) = self.inner.take() {
            inner.dispose();
        }
    }
}
