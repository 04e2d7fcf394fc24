use parking_lot::Mutex;
use tracing::debug;

/// Флаги текущей рассылки, которые слушатели могут изменить.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastContext {
    pub cancelled: bool,
    pub interrupted: bool,
}

/// Итог рассылки, возвращаемый вызывающей стороне.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastResult {
    /// Какой-либо слушатель отменил сообщение.
    pub cancelled: bool,
    /// Рассылка остановлена до обхода всех слушателей.
    pub interrupted: bool,
}

/// Управление текущей рассылкой из колбэка.
pub trait BroadcastControl {
    /// Выставляет флаги самой внутренней активной рассылки.
    fn cancel_current(
        &self,
        cancel: bool,
        interrupt: bool,
    );
}

/// Стек контекстов рассылки одного маршрутизатора.
///
/// В общем режиме существует единственный кадр, который сбрасывает каждая
/// рассылка, включая вложенную. Поэтому флаги, выставленные во вложенной
/// рассылке, видны внешней, а вложенная рассылка стирает флаги внешней.
/// В изолированном режиме каждая рассылка получает собственный кадр.
#[derive(Debug)]
pub(crate) struct ContextStack {
    frames: Vec<BroadcastContext>,
    isolate: bool,
}

/// Активная рассылка. Снимает свой кадр при завершении, в том числе при
/// панике в колбэке.
pub(crate) struct BroadcastScope<'a> {
    contexts: &'a Mutex<ContextStack>,
    finished: bool,
}

////////////////////////////////////////////////////////////////////////////////
// Собственные методы
////////////////////////////////////////////////////////////////////////////////

impl ContextStack {
    pub fn new(isolate: bool) -> Self {
        let frames = if isolate {
            Vec::new()
        } else {
            vec![BroadcastContext::default()]
        };
        Self { frames, isolate }
    }

    pub fn enter(&mut self) {
        if self.isolate {
            self.frames.push(BroadcastContext::default());
        } else if let Some(frame) = self.frames.first_mut() {
            *frame = BroadcastContext::default();
        }
    }

    pub fn exit(&mut self) -> BroadcastContext {
        if self.isolate {
            self.frames.pop().unwrap_or_default()
        } else {
            self.current()
        }
    }

    /// Возвращает `false`, если активной рассылки нет (только в
    /// изолированном режиме).
    pub fn cancel(
        &mut self,
        cancel: bool,
        interrupt: bool,
    ) -> bool {
        match self.frames.last_mut() {
            Some(frame) => {
                frame.cancelled = cancel;
                frame.interrupted = interrupt;
                true
            }
            None => false,
        }
    }

    pub fn current(&self) -> BroadcastContext {
        self.frames.last().copied().unwrap_or_default()
    }

    #[cfg(test)]
    pub fn depth(&self) -> usize {
        self.frames.len()
    }
}

impl<'a> BroadcastScope<'a> {
    pub fn enter(contexts: &'a Mutex<ContextStack>) -> Self {
        contexts.lock().enter();
        Self {
            contexts,
            finished: false,
        }
    }

    pub fn interrupted(&self) -> bool {
        self.contexts.lock().current().interrupted
    }

    pub fn finish(mut self) -> BroadcastResult {
        self.finished = true;
        self.contexts.lock().exit().into()
    }
}

/// Общая реализация `cancel_current` для маршрутизаторов.
pub(crate) fn cancel_on(
    contexts: &Mutex<ContextStack>,
    cancel: bool,
    interrupt: bool,
) {
    if !contexts.lock().cancel(cancel, interrupt) {
        debug!(cancel, interrupt, "cancel_current called outside of a broadcast");
    }
}

////////////////////////////////////////////////////////////////////////////////
// Общие реализации трейтов
////////////////////////////////////////////////////////////////////////////////

impl Drop for BroadcastScope<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.contexts.lock().exit();
        }
    }
}

impl From<BroadcastContext> for BroadcastResult {
    fn from(ctx: BroadcastContext) -> Self {
        Self {
            cancelled: ctx.cancelled,
            interrupted: ctx.interrupted,
        }
    }
}

////////////////////////////////////////////////////////////////////////////////
// Тесты
////////////////////////////////////////////////////////////////////////////////

#[cfg(test)]
mod tests {
    use super::*;

    /// Тест проверяет, что в общем режиме вложенная рассылка сбрасывает
    /// флаги внешней.
    #[test]
    fn test_shared_mode_resets_outer_flags() {
        let contexts = Mutex::new(ContextStack::new(false));

        let outer = BroadcastScope::enter(&contexts);
        cancel_on(&contexts, true, false);

        let inner = BroadcastScope::enter(&contexts);
        assert_eq!(inner.finish(), BroadcastResult::default());

        assert_eq!(outer.finish(), BroadcastResult::default());
        assert_eq!(contexts.lock().depth(), 1);
    }

    /// Тест проверяет, что в общем режиме флаги вложенной рассылки видны
    /// внешней.
    #[test]
    fn test_shared_mode_leaks_inner_flags() {
        let contexts = Mutex::new(ContextStack::new(false));

        let outer = BroadcastScope::enter(&contexts);
        let inner = BroadcastScope::enter(&contexts);
        cancel_on(&contexts, true, true);
        inner.finish();

        assert!(outer.interrupted());
        assert_eq!(
            outer.finish(),
            BroadcastResult {
                cancelled: true,
                interrupted: true
            }
        );
    }

    #[test]
    fn test_isolated_mode_keeps_frames_apart() {
        let contexts = Mutex::new(ContextStack::new(true));

        let outer = BroadcastScope::enter(&contexts);
        cancel_on(&contexts, true, false);

        let inner = BroadcastScope::enter(&contexts);
        assert_eq!(contexts.lock().depth(), 2);
        cancel_on(&contexts, false, true);
        let inner_result = inner.finish();
        assert!(inner_result.interrupted);
        assert!(!inner_result.cancelled);

        let outer_result = outer.finish();
        assert!(outer_result.cancelled);
        assert!(!outer_result.interrupted);
        assert_eq!(contexts.lock().depth(), 0);
    }

    #[test]
    fn test_cancel_outside_broadcast() {
        let mut isolated = ContextStack::new(true);
        assert!(!isolated.cancel(true, true));

        let mut shared = ContextStack::new(false);
        assert!(shared.cancel(true, true));
        shared.enter();
        assert_eq!(shared.current(), BroadcastContext::default());
    }

    /// Тест проверяет, что кадр снимается, даже если рассылка не была
    /// завершена явно.
    #[test]
    fn test_scope_pops_on_drop() {
        let contexts = Mutex::new(ContextStack::new(true));
        {
            let _scope = BroadcastScope::enter(&contexts);
            assert_eq!(contexts.lock().depth(), 1);
        }
        assert_eq!(contexts.lock().depth(), 0);
    }
}
