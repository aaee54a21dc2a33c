// src/key.rs

//! Node and factory keys.
//!
//! A [`TaskNodeKey`] identifies one vertex of a task graph. It is made of a
//! [`TaskFactoryKey`] (which factory produces the node) and the factory
//! argument the node is created for. Both parts are compared structurally, so
//! two keys built independently from equal parts find the same node.

use std::any::{Any, TypeId};
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

/// Runtime tag of a Rust type, compared by `TypeId`.
#[derive(Clone, Copy)]
pub struct TypeTag {
    id: TypeId,
    name: &'static str,
}

impl TypeTag {
    pub fn of<T: Any>() -> Self {
        Self {
            id: TypeId::of::<T>(),
            name: std::any::type_name::<T>(),
        }
    }

    pub fn is<T: Any>(&self) -> bool {
        self.id == TypeId::of::<T>()
    }

    pub fn name(&self) -> &'static str {
        self.name
    }
}

impl PartialEq for TypeTag {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for TypeTag {}

impl Hash for TypeTag {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl fmt::Debug for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name)
    }
}

/// Anything usable as part of a key: hashable, comparable, printable and
/// shareable across threads.
pub trait KeyValue: Any + fmt::Debug + Send + Sync {
    fn as_any(&self) -> &dyn Any;
    fn eq_value(&self, other: &dyn KeyValue) -> bool;
    fn hash_value(&self, state: &mut dyn Hasher);
}

impl<T> KeyValue for T
where
    T: Any + fmt::Debug + Eq + Hash + Send + Sync,
{
    fn as_any(&self) -> &dyn Any {
        self
    }

    fn eq_value(&self, other: &dyn KeyValue) -> bool {
        other
            .as_any()
            .downcast_ref::<T>()
            .is_some_and(|other| other == self)
    }

    fn hash_value(&self, mut state: &mut dyn Hasher) {
        TypeId::of::<T>().hash(&mut state);
        self.hash(&mut state);
    }
}

/// Type-erased, cheaply clonable key component.
#[derive(Clone)]
pub struct KeyPart(Arc<dyn KeyValue>);

impl KeyPart {
    pub fn new<T: KeyValue>(value: T) -> Self {
        Self(Arc::new(value))
    }

    pub fn downcast_ref<T: Any>(&self) -> Option<&T> {
        self.0.as_any().downcast_ref::<T>()
    }
}

impl PartialEq for KeyPart {
    fn eq(&self, other: &Self) -> bool {
        self.0.eq_value(other.0.as_ref())
    }
}

impl Eq for KeyPart {}

impl Hash for KeyPart {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.0.hash_value(state);
    }
}

impl fmt::Debug for KeyPart {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(&*self.0, f)
    }
}

/// Identifies a task factory: what it produces, what argument it takes and a
/// caller-chosen discriminator telling apart factories with the same types.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TaskFactoryKey {
    output_type: TypeTag,
    input_type: TypeTag,
    key: KeyPart,
}

impl TaskFactoryKey {
    /// Factory producing `R` from an argument of type `I`.
    pub fn new<R: Any, I: Any>(key: impl KeyValue) -> Self {
        Self {
            output_type: TypeTag::of::<R>(),
            input_type: TypeTag::of::<I>(),
            key: KeyPart::new(key),
        }
    }

    /// Factory key without a discriminator.
    pub fn of<R: Any, I: Any>() -> Self {
        Self::new::<R, I>(())
    }

    pub fn output_type(&self) -> TypeTag {
        self.output_type
    }

    pub fn input_type(&self) -> TypeTag {
        self.input_type
    }

    pub fn key(&self) -> &KeyPart {
        &self.key
    }

    /// Key of the node this factory creates for `factory_arg`.
    pub fn node_key(&self, factory_arg: impl KeyValue) -> TaskNodeKey {
        TaskNodeKey::new(self.clone(), factory_arg)
    }
}

impl fmt::Display for TaskFactoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:?}<{} -> {}>",
            self.key,
            short_type_name(self.input_type.name),
            short_type_name(self.output_type.name)
        )
    }
}

impl fmt::Debug for TaskFactoryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

#[derive(Clone, PartialEq, Eq, Hash)]
pub struct TaskNodeKey {
    factory_key: TaskFactoryKey,
    factory_arg: KeyPart,
}

impl TaskNodeKey {
    pub fn new(factory_key: TaskFactoryKey, factory_arg: impl KeyValue) -> Self {
        Self {
            factory_key,
            factory_arg: KeyPart::new(factory_arg),
        }
    }

    pub fn factory_key(&self) -> &TaskFactoryKey {
        &self.factory_key
    }

    pub fn factory_arg(&self) -> &KeyPart {
        &self.factory_arg
    }
}

impl fmt::Display for TaskNodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}:{:?}", self.factory_key.key, self.factory_arg)
    }
}

impl fmt::Debug for TaskNodeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(self, f)
    }
}

/// `alloc::string::String` -> `String`; generic arguments are left as-is.
fn short_type_name(name: &'static str) -> &'static str {
    let head = name.split('<').next().unwrap_or(name);
    match head.rfind("::") {
        Some(idx) if !name.contains('<') => &name[idx + 2..],
        _ => name,
    }
}
