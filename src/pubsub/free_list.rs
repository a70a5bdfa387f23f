use std::sync::Arc;

/// Ячейка реестра.
///
/// Свободная ячейка может хранить устаревшее значение, если её освободили
/// без стирания (`erase_on_remove = false`). Такое значение никогда не
/// попадает в снимок и вытесняется следующим `add` в этот индекс.
#[derive(Debug)]
enum Slot<T> {
    Occupied(T),
    Vacant(Option<T>),
}

impl<T> Slot<T> {
    fn into_inner(self) -> Option<T> {
        match self {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant(stale) => stale,
        }
    }
}

/// Реестр слотов с повторным использованием освобождённых индексов.
///
/// - `add` и `remove` выполняются за O(1) (амортизированно);
/// - хранилище только растёт: удаление помечает ячейку свободной и кладёт
///   её индекс в стек свободных индексов;
/// - `values` отдаёт снимок `Arc<[Option<T>]>`, который можно обходить без
///   блокировки: последующие мутации никогда не трогают уже выданный снимок.
///
/// Снимок строится лениво: первая `values` после мутации собирает новый
/// массив, следующие возвращают тот же `Arc`, пока реестр не изменится.
#[derive(Debug)]
pub struct FreeList<T> {
    slots: Vec<Slot<T>>,
    /// Стек свободных индексов (LIFO).
    free: Vec<usize>,
    count: usize,
    snapshot: Option<Arc<[Option<T>]>>,
    disposed: bool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl<T> FreeList<T> {
    /// Создаёт пустой реестр.
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            count: 0,
            snapshot: None,
            disposed: false,
        }
    }

    /// Добавляет значение и возвращает индекс его слота.
    ///
    /// Если стек свободных индексов не пуст, используется последний
    /// освобождённый индекс, иначе значение дописывается в конец.
    ///
    /// # Возвращает
    /// - `Some((index, stale))` — индекс занятого слота и устаревшее
    ///   значение, вытесненное из ячейки (только если её освободили без
    ///   стирания). Вызывающий уничтожает `stale` вне своей блокировки;
    /// - `None`, если реестр уже освобождён через [`FreeList::try_dispose`].
    pub fn add(
        &mut self,
        value: T,
    ) -> Option<(usize, Option<T>)> {
        if self.disposed {
            return None;
        }

        let (index, stale) = match self.free.pop() {
            Some(index) => {
                let stale = std::mem::replace(&mut self.slots[index], Slot::Occupied(value));
                (index, stale.into_inner())
            }
            None => {
                self.slots.push(Slot::Occupied(value));
                (self.slots.len() - 1, None)
            }
        };

        self.count += 1;
        self.snapshot = None;
        Some((index, stale))
    }

    /// Освобождает слот `index`.
    ///
    /// При `erase_on_remove = true` значение извлекается из ячейки и
    /// возвращается вызывающему, чтобы тот мог уничтожить его вне
    /// блокировки. При `false` значение остаётся в ячейке до следующего
    /// `add` в этот индекс, который вернёт его вызывающему.
    ///
    /// Свободный или несуществующий индекс игнорируется.
    pub fn remove(
        &mut self,
        index: usize,
        erase_on_remove: bool,
    ) -> Option<T> {
        let slot = self.slots.get_mut(index)?;
        if matches!(slot, Slot::Vacant(_)) {
            return None;
        }

        let Slot::Occupied(value) = std::mem::replace(slot, Slot::Vacant(None)) else {
            return None;
        };

        self.free.push(index);
        self.count -= 1;
        self.snapshot = None;

        if erase_on_remove {
            Some(value)
        } else {
            *slot = Slot::Vacant(Some(value));
            None
        }
    }

    /// Количество занятых слотов.
    pub fn len(&self) -> usize {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    /// Длина хранилища, включая свободные слоты.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    pub fn is_disposed(&self) -> bool {
        self.disposed
    }

    /// Переводит реестр в окончательно пустое состояние.
    ///
    /// Первый вызов очищает все ячейки и стек свободных индексов и
    /// возвращает число живых значений на момент вызова. Повторные вызовы
    /// возвращают `None`, чтобы счётчики диагностики не уменьшались дважды.
    pub fn try_dispose(&mut self) -> Option<usize> {
        if self.disposed {
            return None;
        }

        let count = self.count;
        self.disposed = true;
        self.slots.clear();
        self.free.clear();
        self.count = 0;
        self.snapshot = None;
        Some(count)
    }
}

impl<T: Clone> FreeList<T> {
    /// Снимок хранилища.
    ///
    /// Длина снимка равна [`FreeList::capacity`]; свободные слоты
    /// представлены `None`.
    pub fn values(&mut self) -> Arc<[Option<T>]> {
        if let Some(snapshot) = &self.snapshot {
            return Arc::clone(snapshot);
        }

        let snapshot: Arc<[Option<T>]> = self
            .slots
            .iter()
            .map(|slot| match slot {
                Slot::Occupied(value) => Some(value.clone()),
                Slot::Vacant(_) => None,
            })
            .collect();

        self.snapshot = Some(Arc::clone(&snapshot));
        snapshot
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов для FreeList
////////////////////////////////////////////////////////////////////////////////

impl<T> Default for FreeList<T> {
    fn default() -> Self {
        Self::new()
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////
