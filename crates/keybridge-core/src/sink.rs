#![forbid(unsafe_code)]

//! Outbound collaborators: the canonical event sink and the scratch surface.

use std::cell::RefCell;
use std::rc::Rc;

use crate::canonical::CanonicalEvent;

/// Accepts canonical events for transport. Call order is significant.
pub trait EventSink {
    fn accept(&mut self, event: CanonicalEvent);
}

impl EventSink for Vec<CanonicalEvent> {
    fn accept(&mut self, event: CanonicalEvent) {
        self.push(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for &mut T {
    fn accept(&mut self, event: CanonicalEvent) {
        (**self).accept(event);
    }
}

impl<T: EventSink + ?Sized> EventSink for Box<T> {
    fn accept(&mut self, event: CanonicalEvent) {
        (**self).accept(event);
    }
}

/// Adapts a closure into an [`EventSink`].
pub struct FnSink<F>(pub F);

impl<F: FnMut(CanonicalEvent)> EventSink for FnSink<F> {
    fn accept(&mut self, event: CanonicalEvent) {
        (self.0)(event);
    }
}

/// The invisible, always-focused text field the platform IME targets.
pub trait ScratchSurface {
    /// Remove all contents. Idempotent.
    fn clear(&mut self);

    /// The surface lost focus; take it back so the IME keeps targeting it.
    fn reclaim_focus(&mut self) {}
}

impl<T: ScratchSurface + ?Sized> ScratchSurface for &mut T {
    fn clear(&mut self) {
        (**self).clear();
    }

    fn reclaim_focus(&mut self) {
        (**self).reclaim_focus();
    }
}

impl<T: ScratchSurface + ?Sized> ScratchSurface for Box<T> {
    fn clear(&mut self) {
        (**self).clear();
    }

    fn reclaim_focus(&mut self) {
        (**self).reclaim_focus();
    }
}

/// Surface that holds nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSurface;

impl ScratchSurface for NullSurface {
    fn clear(&mut self) {}
}

/// Adapts a closure into a [`ScratchSurface`].
pub struct FnSurface<F>(pub F);

impl<F: FnMut()> ScratchSurface for FnSurface<F> {
    fn clear(&mut self) {
        (self.0)();
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalEntry {
    Emit(CanonicalEvent),
    Clear,
}

/// Shared recorder that is both the sink and the surface, so the relative
/// order of `clear()` calls and emitted events can be observed.
#[derive(Debug, Clone, Default)]
pub struct Journal {
    entries: Rc<RefCell<Vec<JournalEntry>>>,
}

impl Journal {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn entries(&self) -> Vec<JournalEntry> {
        self.entries.borrow().clone()
    }

    #[must_use]
    pub fn events(&self) -> Vec<CanonicalEvent> {
        self.entries
            .borrow()
            .iter()
            .filter_map(|entry| match entry {
                JournalEntry::Emit(ev) => Some(*ev),
                JournalEntry::Clear => None,
            })
            .collect()
    }

    #[must_use]
    pub fn clear_count(&self) -> usize {
        self.entries
            .borrow()
            .iter()
            .filter(|entry| matches!(entry, JournalEntry::Clear))
            .count()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }

    pub fn take(&self) -> Vec<JournalEntry> {
        std::mem::take(&mut *self.entries.borrow_mut())
    }
}

impl EventSink for Journal {
    fn accept(&mut self, event: CanonicalEvent) {
        self.entries.borrow_mut().push(JournalEntry::Emit(event));
    }
}

impl ScratchSurface for Journal {
    fn clear(&mut self) {
        self.entries.borrow_mut().push(JournalEntry::Clear);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canonical::CharEvent;
    use crate::input::Modifiers;

    fn ch(c: char) -> CanonicalEvent {
        CanonicalEvent::Char(CharEvent {
            timestamp: 0,
            ch: c,
            mods: Modifiers::empty(),
        })
    }

    #[test]
    fn journal_interleaves_clears_and_events() {
        let journal = Journal::new();
        let mut sink = journal.clone();
        let mut surface = journal.clone();
        sink.accept(ch('a'));
        surface.clear();
        sink.accept(ch('b'));
        assert_eq!(
            journal.entries(),
            vec![
                JournalEntry::Emit(ch('a')),
                JournalEntry::Clear,
                JournalEntry::Emit(ch('b')),
            ]
        );
        assert_eq!(journal.events(), vec![ch('a'), ch('b')]);
        assert_eq!(journal.clear_count(), 1);
        assert_eq!(journal.take().len(), 3);
        assert!(journal.is_empty());
    }

    #[test]
    fn closure_adapters_forward() {
        let mut seen = Vec::new();
        let mut clears = 0;
        {
            let mut sink = FnSink(|ev: CanonicalEvent| seen.push(ev));
            sink.accept(ch('x'));
        }
        {
            let mut surface = FnSurface(|| clears += 1);
            surface.clear();
            surface.clear();
        }
        assert_eq!(seen, vec![ch('x')]);
        assert_eq!(clears, 2);
    }
}
