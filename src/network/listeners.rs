//! Listener registry
//!
//! At most one listener per event and entity kind. Registering replaces the
//! previous listener; registering `None` removes it. Listeners run on the
//! thread that applies the change, with the network lock held, and only ever
//! see the entity itself.

/// Callback for added or deleted entities
pub type EntityListener<T> = Box<dyn FnMut(&T) + Send>;

/// Observer of in-place entity changes
///
/// `before` captures whatever the listener needs from the old value; the
/// snapshot is handed back to `after` together with the new value.
pub trait ChangeListener<T>: Send {
    type Snapshot;

    fn before(&mut self, entity: &T) -> Self::Snapshot;

    fn after(&mut self, entity: &T, snapshot: Self::Snapshot);
}

/// `ChangeListener` built from a pair of closures
pub struct FnChangeListener<B, A> {
    before: B,
    after: A,
}

/// Builds a change listener from `before` and `after` closures
pub fn change_listener<B, A>(before: B, after: A) -> FnChangeListener<B, A> {
    FnChangeListener { before, after }
}

impl<T, S, B, A> ChangeListener<T> for FnChangeListener<B, A>
where
    B: FnMut(&T) -> S + Send,
    A: FnMut(&T, S) + Send,
{
    type Snapshot = S;

    fn before(&mut self, entity: &T) -> S {
        (self.before)(entity)
    }

    fn after(&mut self, entity: &T, snapshot: S) {
        (self.after)(entity, snapshot)
    }
}

/// Object-safe form of `ChangeListener` with the snapshot type erased
///
/// Implemented for every `ChangeListener`; box one to register it.
pub trait DynChangeListener<T>: Send {
    /// Runs `change` between the listener's `before` and `after` hooks
    fn around(&mut self, entity: &mut T, change: &mut dyn FnMut(&mut T));
}

/// Registered change listener
pub type BoxedChangeListener<T> = Box<dyn DynChangeListener<T>>;

impl<T, L> DynChangeListener<T> for L
where
    L: ChangeListener<T>,
{
    fn around(&mut self, entity: &mut T, change: &mut dyn FnMut(&mut T)) {
        let snapshot = self.before(entity);
        change(entity);
        self.after(entity, snapshot);
    }
}

/// Listener slots of one entity kind
pub(crate) struct Listeners<T> {
    added: Option<EntityListener<T>>,
    changed: Option<BoxedChangeListener<T>>,
    deleted: Option<EntityListener<T>>,
}

impl<T: 'static> Listeners<T> {
    pub(crate) fn new() -> Self {
        Self {
            added: None,
            changed: None,
            deleted: None,
        }
    }

    pub(crate) fn set_added(&mut self, listener: Option<EntityListener<T>>) {
        self.added = listener;
    }

    pub(crate) fn set_changed(&mut self, listener: Option<BoxedChangeListener<T>>) {
        self.changed = listener;
    }

    pub(crate) fn set_deleted(&mut self, listener: Option<EntityListener<T>>) {
        self.deleted = listener;
    }

    pub(crate) fn added(&mut self, entity: &T) {
        if let Some(listener) = self.added.as_mut() {
            listener(entity);
        }
    }

    pub(crate) fn deleted(&mut self, entity: &T) {
        if let Some(listener) = self.deleted.as_mut() {
            listener(entity);
        }
    }

    /// Applies `change` to `entity`, wrapped in the changed listener
    pub(crate) fn change(&mut self, entity: &mut T, change: impl FnOnce(&mut T)) {
        let mut change = Some(change);
        let mut apply = |entity: &mut T| {
            if let Some(change) = change.take() {
                change(entity);
            }
        };
        match self.changed.as_mut() {
            Some(listener) => listener.around(entity, &mut apply),
            None => apply(entity),
        }
    }
}
