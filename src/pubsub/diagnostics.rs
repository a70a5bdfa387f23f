use std::{
    fmt,
    sync::atomic::{AtomicU64, AtomicUsize, Ordering},
};

use dashmap::DashMap;
use tracing::debug;

static NEXT_HOLDER_ID: AtomicU64 = AtomicU64::new(1);
static NEXT_SUBSCRIPTION_ID: AtomicU64 = AtomicU64::new(1);

/// Идентификатор владельца реестра обработчиков (ядро без ключа или
/// holder одного ключа). Уникален в пределах процесса.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HolderId(u64);

/// Идентификатор одной подписки.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(u64);

impl HolderId {
    pub(crate) fn next() -> Self {
        Self(NEXT_HOLDER_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl SubscriptionId {
    pub(crate) fn next() -> Self {
        Self(NEXT_SUBSCRIPTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

impl fmt::Display for HolderId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "holder#{}", self.0)
    }
}

impl fmt::Display for SubscriptionId {
    fn fmt(
        &self,
        f: &mut fmt::Formatter<'_>,
    ) -> fmt::Result {
        write!(f, "sub#{}", self.0)
    }
}

/// Приёмник событий жизненного цикла подписок.
///
/// Ядра брокера только сообщают о событиях и никогда не читают состояние
/// диагностики обратно. Один приёмник может разделяться многими ядрами,
/// поэтому реализация обязана быть потокобезопасной.
pub trait Diagnostics: Send + Sync {
    fn increment_subscribe(
        &self,
        holder: HolderId,
        subscription: SubscriptionId,
    );

    fn decrement_subscribe(
        &self,
        holder: HolderId,
        subscription: SubscriptionId,
    );

    /// Владелец реестра освобождён целиком; `final_count` — число живых
    /// подписок на момент освобождения.
    fn remove_target_diagnostics(
        &self,
        holder: HolderId,
        final_count: usize,
    );
}

/// Диагностика, которая ничего не делает.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopDiagnostics;

impl Diagnostics for NoopDiagnostics {
    fn increment_subscribe(
        &self,
        _holder: HolderId,
        _subscription: SubscriptionId,
    ) {
    }

    fn decrement_subscribe(
        &self,
        _holder: HolderId,
        _subscription: SubscriptionId,
    ) {
    }

    fn remove_target_diagnostics(
        &self,
        _holder: HolderId,
        _final_count: usize,
    ) {
    }
}

/// Счётчик живых подписок по владельцам реестров.
#[derive(Debug, Default)]
pub struct SubscriptionDiagnostics {
    per_holder: DashMap<HolderId, usize>,
    total: AtomicUsize,
}

impl SubscriptionDiagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Общее число живых подписок.
    pub fn subscribe_count(&self) -> usize {
        self.total.load(Ordering::Acquire)
    }

    /// Число живых подписок у конкретного владельца.
    pub fn count_for(
        &self,
        holder: HolderId,
    ) -> usize {
        self.per_holder.get(&holder).map(|c| *c).unwrap_or(0)
    }

    /// Число владельцев, у которых есть хотя бы одна живая подписка.
    pub fn holder_count(&self) -> usize {
        self.per_holder.len()
    }
}

impl Diagnostics for SubscriptionDiagnostics {
    fn increment_subscribe(
        &self,
        holder: HolderId,
        subscription: SubscriptionId,
    ) {
        *self.per_holder.entry(holder).or_insert(0) += 1;
        let total = self.total.fetch_add(1, Ordering::AcqRel) + 1;
        debug!(%holder, %subscription, total, "subscription registered");
    }

    fn decrement_subscribe(
        &self,
        holder: HolderId,
        subscription: SubscriptionId,
    ) {
        let found = match self.per_holder.get_mut(&holder) {
            Some(mut count) => {
                *count = count.saturating_sub(1);
                true
            }
            None => false,
        };

        if found {
            self.per_holder.remove_if(&holder, |_, count| *count == 0);
            self.total.fetch_sub(1, Ordering::AcqRel);
            debug!(%holder, %subscription, "subscription released");
        }
    }

    fn remove_target_diagnostics(
        &self,
        holder: HolderId,
        final_count: usize,
    ) {
        if let Some((_, live)) = self.per_holder.remove(&holder) {
            self.total.fetch_sub(live, Ordering::AcqRel);
        }
        debug!(%holder, final_count, "holder removed from diagnostics");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_unique() {
        let a = HolderId::next();
        let b = HolderId::next();
        assert_ne!(a, b);
        assert_ne!(SubscriptionId::next(), SubscriptionId::next());
        assert!(a.to_string().starts_with("holder#"));
    }

    /// Тест проверяет, что счётчики увеличиваются и уменьшаются по
    /// владельцам независимо.
    #[test]
    fn test_counts_per_holder() {
        let diag = SubscriptionDiagnostics::new();
        let (h1, h2) = (HolderId::next(), HolderId::next());

        diag.increment_subscribe(h1, SubscriptionId::next());
        diag.increment_subscribe(h1, SubscriptionId::next());
        diag.increment_subscribe(h2, SubscriptionId::next());

        assert_eq!(diag.subscribe_count(), 3);
        assert_eq!(diag.count_for(h1), 2);
        assert_eq!(diag.holder_count(), 2);

        diag.decrement_subscribe(h2, SubscriptionId::next());
        assert_eq!(diag.count_for(h2), 0);
        assert_eq!(diag.holder_count(), 1);
        assert_eq!(diag.subscribe_count(), 2);
    }

    /// Тест проверяет, что удаление владельца снимает все его подписки
    /// с общего счётчика.
    #[test]
    fn test_remove_target_drops_remaining() {
        let diag = SubscriptionDiagnostics::new();
        let h = HolderId::next();
        for _ in 0..4 {
            diag.increment_subscribe(h, SubscriptionId::next());
        }

        diag.remove_target_diagnostics(h, 4);
        assert_eq!(diag.subscribe_count(), 0);
        assert_eq!(diag.holder_count(), 0);

        // Повторное удаление и декремент неизвестного владельца безвредны.
        diag.remove_target_diagnostics(h, 0);
        diag.decrement_subscribe(h, SubscriptionId::next());
        assert_eq!(diag.subscribe_count(), 0);
    }
}
