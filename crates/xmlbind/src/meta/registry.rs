//! Process-wide descriptor registry.

use std::any::TypeId;
use std::collections::HashMap;
use std::sync::Arc;

use once_cell::sync::Lazy;
use parking_lot::RwLock;

use crate::meta::{TypeDescriptor, XmlObject};

static DESCRIPTORS: Lazy<RwLock<HashMap<TypeId, Arc<TypeDescriptor>>>> =
    Lazy::new(|| RwLock::new(HashMap::new()));

/// Returns the shared descriptor for `T`, building it on first use.
///
/// Entries are never evicted. `describe` runs outside the lock, so two threads
/// may both build a descriptor for the same type; the first insert wins and
/// both callers receive it.
pub fn descriptor_of<T: XmlObject>() -> Arc<TypeDescriptor> {
    let id = TypeId::of::<T>();
    if let Some(descriptor) = DESCRIPTORS.read().get(&id) {
        return Arc::clone(descriptor);
    }

    let built = Arc::new(T::describe());
    let mut descriptors = DESCRIPTORS.write();
    Arc::clone(descriptors.entry(id).or_insert(built))
}
