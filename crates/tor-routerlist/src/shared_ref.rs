//! Utility module to safely refer to a mutable Arc.

use std::sync::{Arc, RwLock};

use educe::Educe;

use crate::{Error, Result};

/// A shareable mutable-ish optional reference to an [`Arc`].
///
/// Readers get an `Arc` to the current value and can keep using it as long
/// as they like.  Writers change the value by replacing it: [`Arc::make_mut`]
/// avoids a clone when no reader is holding the old one.
///
// We give this construction its own type so that we never hold the lock
// longer than a single operation.
#[derive(Debug, Educe)]
#[educe(Default)]
pub(crate) struct SharedMutArc<T> {
    /// Locked reference to the current value.
    ///
    /// (It's okay to use RwLock here, because we never suspend
    /// while holding the lock.)
    inner: RwLock<Option<Arc<T>>>,
}

impl<T> SharedMutArc<T> {
    /// Construct a new empty SharedMutArc.
    pub(crate) fn new() -> Self {
        SharedMutArc::default()
    }

    /// Replace the current value with `new_val`.
    pub(crate) fn replace(&self, new_val: T) {
        let mut w = self
            .inner
            .write()
            .expect("Poisoned lock for router list reference");
        *w = Some(Arc::new(new_val));
    }

    /// Return a new reference to the current value, if there is one.
    pub(crate) fn get(&self) -> Option<Arc<T>> {
        let r = self
            .inner
            .read()
            .expect("Poisoned lock for router list reference");
        r.as_ref().map(Arc::clone)
    }

    /// Replace the contents of this SharedMutArc with the results of applying
    /// `func` to the inner value.
    ///
    /// Gives an error if there is no inner value.
    ///
    /// Other threads will not be able to access the inner value
    /// while the function is running.
    ///
    /// # Limitation: No panic-safety
    ///
    /// If `func` panics while it's running, this object will become invalid
    /// and future attempts to use it will panic.
    pub(crate) fn mutate<F, U>(&self, func: F) -> Result<U>
    where
        F: FnOnce(&mut T) -> Result<U>,
        T: Clone,
    {
        let mut writeable = self
            .inner
            .write()
            .expect("Poisoned lock for router list reference");
        match writeable.as_mut() {
            None => Err(Error::NoRouterList),
            Some(arc) => func(Arc::make_mut(arc)),
        }
    }

    /// Run `func` on the (possibly absent) inner value, holding the write
    /// lock throughout.
    ///
    /// This is for callers that need to install a value when there is none,
    /// without letting anybody else do so first.
    pub(crate) fn write_with<F, U>(&self, func: F) -> U
    where
        F: FnOnce(&mut Option<Arc<T>>) -> U,
    {
        let mut writeable = self
            .inner
            .write()
            .expect("Poisoned lock for router list reference");
        func(&mut *writeable)
    }
}

#[cfg(test)]
mod test {
    // @@ begin test lint list maintained by maint/add_warning @@
    #![allow(clippy::bool_assert_comparison)]
    #![allow(clippy::clone_on_copy)]
    #![allow(clippy::dbg_macro)]
    #![allow(clippy::mixed_attributes_style)]
    #![allow(clippy::print_stderr)]
    #![allow(clippy::print_stdout)]
    #![allow(clippy::single_char_pattern)]
    #![allow(clippy::unwrap_used)]
    #![allow(clippy::unchecked_duration_subtraction)]
    #![allow(clippy::useless_vec)]
    #![allow(clippy::needless_pass_by_value)]
    //! <!-- @@ end test lint list maintained by maint/add_warning @@ -->
    use super::*;

    #[test]
    fn snapshots_survive_mutation() {
        let val: SharedMutArc<Vec<u32>> = SharedMutArc::new();
        assert!(val.get().is_none());
        assert!(matches!(
            val.mutate(|v| {
                v.push(1);
                Ok(())
            }),
            Err(Error::NoRouterList)
        ));

        val.replace(vec![1, 2]);
        let before = val.get().unwrap();
        let n = val
            .mutate(|v| {
                v.push(3);
                Ok(v.len())
            })
            .unwrap();
        assert_eq!(n, 3);
        // The old snapshot didn't change under us.
        assert_eq!(before.as_ref(), &vec![1, 2]);
        assert_eq!(val.get().unwrap().as_ref(), &vec![1, 2, 3]);

        // A failed mutation reports its error.
        let r: Result<()> = val.mutate(|_| Err(Error::InvalidRelay("nope".into())));
        assert!(matches!(r, Err(Error::InvalidRelay(_))));
    }

    #[test]
    fn write_with() {
        let val: SharedMutArc<Vec<u32>> = SharedMutArc::new();
        let was_empty = val.write_with(|slot| {
            let was_empty = slot.is_none();
            *slot = Some(Arc::new(vec![7]));
            was_empty
        });
        assert!(was_empty);
        val.write_with(|slot| {
            if let Some(arc) = slot {
                Arc::make_mut(arc).push(8);
            }
        });
        assert_eq!(val.get().unwrap().as_ref(), &vec![7, 8]);
    }
}
