use std::{
    any::{Any, TypeId},
    fmt::Display,
    sync::Arc,
};

/// Error returned by part constructors
pub type DynError = Box<dyn std::error::Error + Send + Sync>;

/// Anything that can be composed may be shared between threads once the host is built.
/// Contracts are usually trait objects, so this is implemented for unsized types as well.
pub trait Injectable: Send + Sync + 'static {}
impl<T: ?Sized + Send + Sync + 'static> Injectable for T {}

/// Type Name and Type Id
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct TypeInfo {
    pub type_name: &'static str,
    pub type_id: TypeId,
}
impl std::fmt::Display for TypeInfo {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.type_name)
    }
}
impl TypeInfo {
    pub fn of<T: 'static + ?Sized>() -> TypeInfo {
        TypeInfo {
            type_name: std::any::type_name::<T>(),
            type_id: TypeId::of::<T>(),
        }
    }
}

/// The key an export is published under and requested by.
///
/// A contract without a name only matches unnamed exports, it is never a wildcard.
#[derive(Debug, Clone, Hash, PartialEq, Eq)]
pub struct Contract {
    pub info: TypeInfo,
    pub name: Option<String>,
}
impl Contract {
    /// Unnamed contract for `C`
    pub fn of<C: ?Sized + 'static>() -> Self {
        Contract {
            info: TypeInfo::of::<C>(),
            name: None,
        }
    }

    /// Named contract for `C` - an empty name is the same as no name
    pub fn named<C: ?Sized + 'static>(name: impl Into<String>) -> Self {
        Self::of::<C>().with_name(Some(name.into()))
    }

    pub fn with_name(mut self, name: Option<String>) -> Self {
        self.name = name.filter(|name| !name.is_empty());
        self
    }

    pub fn is_named(&self) -> bool {
        self.name.is_some()
    }
}
impl Display for Contract {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} (\"{}\")", self.info, name),
            None => write!(f, "{}", self.info),
        }
    }
}

/// A composed value, erased to be stored next to values of other contracts.
///
/// Holds an `Arc<C>` where `C` is the contract type, which may be a trait object.
#[derive(Clone)]
pub struct Instance {
    /// Contract type the value was exported as
    pub contract: TypeInfo,
    /// Name of the part which produced the value, or the contract type name for overrides
    pub origin: &'static str,
    value: Arc<dyn Any + Send + Sync + 'static>,
}
impl std::fmt::Debug for Instance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Instance")
            .field("contract", &self.contract.type_name)
            .field("origin", &self.origin)
            .finish()
    }
}

impl Instance {
    pub(crate) fn new<C: ?Sized + Injectable>(origin: &'static str, value: Arc<C>) -> Self {
        Instance {
            contract: TypeInfo::of::<C>(),
            origin,
            value: Arc::new(value),
        }
    }

    /// Returns the contained contract pointer, or the origin type name if `C` is not the exported contract
    pub fn downcast<C: ?Sized + Injectable>(&self) -> Result<Arc<C>, &'static str> {
        match self.value.downcast_ref::<Arc<C>>() {
            Some(downcasted) => Ok(downcasted.clone()),
            None => Err(self.origin),
        }
    }
}

/// Converts a part into one of the contracts it exports.
///
/// Every part can export itself. For trait contracts use [`implements!`](crate::implements).
pub trait Upcast<C: ?Sized>: Injectable {
    fn upcast(self: Arc<Self>) -> Arc<C>;
}
impl<T: Injectable> Upcast<T> for T {
    fn upcast(self: Arc<Self>) -> Arc<T> {
        self
    }
}

/// Declares that a part can be exported as the given contracts
///
/// # Example
/// ```rust
/// use partwire::implements;
///
/// trait Greeter: Send + Sync {
///     fn greet(&self) -> String;
/// }
///
/// struct English;
/// impl Greeter for English {
///     fn greet(&self) -> String {
///         "Hello".to_string()
///     }
/// }
///
/// implements!(English => dyn Greeter);
/// ```
#[macro_export]
macro_rules! implements {
    ($part:ty => $($contract:ty),+ $(,)?) => {
        $(
            impl $crate::types::Upcast<$contract> for $part {
                fn upcast(self: ::std::sync::Arc<Self>) -> ::std::sync::Arc<$contract> {
                    self
                }
            }
        )+
    };
}
