use std::sync::Arc;

/// Обработчик сообщений одного типа.
///
/// Вызывается синхронно в потоке, который выполняет `publish`. Паника
/// обработчика раскручивается до издателя: изоляции между обработчиками
/// нет, и оставшиеся обработчики того же снимка не вызываются.
pub trait MessageHandler<M>: Send + Sync {
    fn handle(
        &self,
        message: &M,
    );
}

impl<M, F> MessageHandler<M> for F
where
    F: Fn(&M) + Send + Sync,
{
    fn handle(
        &self,
        message: &M,
    ) {
        self(message)
    }
}

/// Обработчик, пропускающий только сообщения, для которых предикат
/// возвращает `true`.
pub struct PredicateHandler<M> {
    predicate: Box<dyn Fn(&M) -> bool + Send + Sync>,
    inner: Arc<dyn MessageHandler<M>>,
}

impl<M> PredicateHandler<M> {
    pub fn new<P>(
        predicate: P,
        inner: Arc<dyn MessageHandler<M>>,
    ) -> Self
    where
        P: Fn(&M) -> bool + Send + Sync + 'static,
    {
        Self {
            predicate: Box::new(predicate),
            inner,
        }
    }
}

impl<M> MessageHandler<M> for PredicateHandler<M> {
    fn handle(
        &self,
        message: &M,
    ) {
        if (self.predicate)(message) {
            self.inner.handle(message);
        }
    }
}
