use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// A thread-safe, reference-counted resource container with read-write locking.
///
/// `MtResource` shares a value of type `T` between one writer and any number of
/// readers. The terrain system uses it for state owned by an outside
/// subsystem, such as the sun direction set by the lighting code.
///
/// # Type Parameters
/// - `T`: The type of the contained resource, must be `Send + Sync`
///
/// # Examples
///
/// ```
/// use terrain_engine::core::MtResource;
///
/// let counter = MtResource::new(0);
/// let reader = counter.clone();
///
/// let handle = std::thread::spawn(move || {
///     *counter.get_mut() += 1;
/// });
/// handle.join().unwrap();
///
/// assert_eq!(reader.snapshot(), 1);
/// ```
///
/// # Poisoning
/// A writer that panicked leaves the last value it wrote in place; readers
/// keep going with it rather than propagating the panic.
#[derive(Debug)]
pub struct MtResource<T: Send + Sync> {
    resource: Arc<RwLock<T>>,
}

impl<T: Send + Sync + 'static> MtResource<T> {
    /// Creates a new `MtResource` containing the given value.
    pub fn new(resource: T) -> Self {
        Self {
            resource: Arc::new(RwLock::new(resource)),
        }
    }

    /// Returns a read-only guard that allows reading the contained value.
    pub fn get(&self) -> RwLockReadGuard<'_, T> {
        self.resource.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a mutable guard that allows modifying the contained value.
    pub fn get_mut(&self) -> RwLockWriteGuard<'_, T> {
        self.resource.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Replaces the contained value.
    pub fn set(&self, value: T) {
        *self.get_mut() = value;
    }

    /// Number of handles sharing this resource.
    pub fn handle_count(&self) -> usize {
        Arc::strong_count(&self.resource)
    }
}

impl<T: Clone + Send + Sync + 'static> MtResource<T> {
    /// Copies the current value out, releasing the lock immediately.
    pub fn snapshot(&self) -> T {
        self.get().clone()
    }
}

impl<T: Send + Sync> Clone for MtResource<T> {
    fn clone(&self) -> Self {
        Self {
            resource: self.resource.clone(),
        }
    }
}
