//! Unit of Work
//!
//! One transactional span of engine activity. Carries a transient attribute
//! store that lives exactly as long as the unit of work; nothing in it is
//! ever persisted. Callers pass the unit of work explicitly, so there is no
//! ambient "current context" to look up.

use std::any::Any;
use std::collections::HashMap;

use uuid::Uuid;

pub struct UnitOfWork {
    id: Uuid,
    attributes: HashMap<String, Box<dyn Any + Send>>,
}

impl UnitOfWork {
    pub fn new() -> Self {
        let id = Uuid::now_v7();
        tracing::trace!(unit_of_work = %id, "unit of work started");
        Self {
            id,
            attributes: HashMap::new(),
        }
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Typed read. `None` if absent or stored under a different type.
    pub fn attribute<T: Any + Send>(&self, key: &str) -> Option<&T> {
        self.attributes.get(key)?.downcast_ref::<T>()
    }

    pub fn attribute_mut<T: Any + Send>(&mut self, key: &str) -> Option<&mut T> {
        self.attributes.get_mut(key)?.downcast_mut::<T>()
    }

    /// Store a value, replacing whatever was under `key`.
    pub fn set_attribute<T: Any + Send>(&mut self, key: impl Into<String>, value: T) {
        self.attributes.insert(key.into(), Box::new(value));
    }

    /// Remove and return the value under `key` if it has type `T`.
    /// A value of another type is left in place.
    pub fn take_attribute<T: Any + Send>(&mut self, key: &str) -> Option<T> {
        if !self.attributes.get(key)?.is::<T>() {
            return None;
        }
        self.attributes
            .remove(key)
            .and_then(|value| value.downcast::<T>().ok())
            .map(|boxed| *boxed)
    }

    pub fn has_attribute(&self, key: &str) -> bool {
        self.attributes.contains_key(key)
    }

    /// End the unit of work successfully. All attributes are dropped.
    pub fn commit(self) {
        tracing::trace!(
            unit_of_work = %self.id,
            attributes = self.attributes.len(),
            "unit of work committed"
        );
    }

    /// Abort the unit of work. All attributes are dropped; anything recorded
    /// in them is forgotten.
    pub fn rollback(self) {
        tracing::debug!(
            unit_of_work = %self.id,
            attributes = self.attributes.len(),
            "unit of work rolled back"
        );
    }
}

impl Default for UnitOfWork {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<&str> = self.attributes.keys().map(String::as_str).collect();
        keys.sort_unstable();
        f.debug_struct("UnitOfWork")
            .field("id", &self.id)
            .field("attributes", &keys)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typed_attributes() {
        let mut uow = UnitOfWork::new();
        assert!(uow.attribute::<u32>("count").is_none());

        uow.set_attribute("count", 3u32);
        assert_eq!(uow.attribute::<u32>("count"), Some(&3));
        assert!(uow.attribute::<String>("count").is_none());

        *uow.attribute_mut::<u32>("count").unwrap() += 1;
        assert_eq!(uow.attribute::<u32>("count"), Some(&4));
    }

    #[test]
    fn test_take_leaves_mismatched_type() {
        let mut uow = UnitOfWork::new();
        uow.set_attribute("slot", "text".to_string());

        assert_eq!(uow.take_attribute::<u32>("slot"), None);
        assert!(uow.has_attribute("slot"));

        assert_eq!(uow.take_attribute::<String>("slot"), Some("text".to_string()));
        assert!(!uow.has_attribute("slot"));
    }

    #[test]
    fn test_units_do_not_share_attributes() {
        let mut first = UnitOfWork::new();
        first.set_attribute("k", 1i64);
        let second = UnitOfWork::new();

        assert_ne!(first.id(), second.id());
        assert!(second.attribute::<i64>("k").is_none());
        first.commit();
    }
}
