//! Shared value slots.
//!
//! A trap call receives the receiver, arguments and results by reference so
//! interceptors can read and overwrite them. Those references are modelled as
//! [`Slot`]s: shared, lockable cells holding a type-erased value. A slot is
//! cheap to clone, and clones alias the same storage, so a post hook can keep
//! a result slot and update it after the original body has run.

use std::any::Any;
use std::fmt;
use std::sync::Arc;

use parking_lot::Mutex;

#[derive(Clone)]
pub struct Slot(Arc<Mutex<Box<dyn Any + Send>>>);

impl Slot {
    pub fn new<T: Any + Send>(value: T) -> Self {
        Slot(Arc::new(Mutex::new(Box::new(value))))
    }

    /// Clone the current value out, if it has type `T`.
    pub fn get<T: Any + Clone>(&self) -> Option<T> {
        self.0.lock().downcast_ref::<T>().cloned()
    }

    /// Replace the value. The slot keeps its type: returns `false` and leaves
    /// the slot untouched when `T` differs from the stored type.
    pub fn set<T: Any + Send>(&self, value: T) -> bool {
        let mut guard = self.0.lock();
        match guard.downcast_mut::<T>() {
            Some(current) => {
                *current = value;
                true
            }
            None => false,
        }
    }

    /// Run `f` on the value in place, if it has type `T`.
    pub fn with<T: Any, R>(&self, f: impl FnOnce(&mut T) -> R) -> Option<R> {
        self.0.lock().downcast_mut::<T>().map(f)
    }

    /// Whether both slots alias the same storage.
    pub fn ptr_eq(&self, other: &Slot) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    /// Stable address of the storage, usable as an identity key.
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0).cast::<()>() as usize
    }
}

impl fmt::Debug for Slot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Slot({:#x})", self.addr())
    }
}
