use std::{any::type_name, fmt::Debug, sync::Arc};

use crate::types::{Contract, Injectable, Instance, TypeInfo};

/// Release hook of a composed value which is owned by the composition
pub trait Dispose {
    fn dispose(&self);
}

type ReleaseHook = Arc<dyn Fn() + Send + Sync>;

/// Satisfies a contract type with an already existing instance.
///
/// The override bypasses conventions completely. It matches every contract of its type,
/// named or not, and always hands out the very same instance.
#[derive(Clone)]
pub struct InstanceOverride {
    instance: Instance,
    release: Option<ReleaseHook>,
}
impl Debug for InstanceOverride {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InstanceOverride")
            .field("contract", &self.instance.contract.type_name)
            .field("owned", &self.is_owned())
            .finish()
    }
}

impl InstanceOverride {
    /// Override not owned by the composition - closing it leaves the instance alone
    ///
    /// The concrete type behind `instance` is unknown, so the contract names its origin
    pub fn new<C: ?Sized + Injectable>(instance: Arc<C>) -> Self {
        InstanceOverride {
            instance: Instance::new(type_name::<C>(), instance),
            release: None,
        }
    }

    /// Override owned by the composition - closing it disposes the instance
    pub fn disposable<C: ?Sized + Injectable + Dispose>(instance: Arc<C>) -> Self {
        let owned = instance.clone();
        InstanceOverride {
            instance: Instance::new(type_name::<C>(), instance),
            release: Some(Arc::new(move || owned.dispose())),
        }
    }

    pub fn contract_type(&self) -> TypeInfo {
        self.instance.contract
    }

    /// Only the contract type is compared, the name does not matter
    pub fn satisfies(&self, contract: &Contract) -> bool {
        contract.info == self.instance.contract
    }

    pub fn instance(&self) -> &Instance {
        &self.instance
    }

    /// Whether the composition has to dispose the instance on close
    pub fn is_owned(&self) -> bool {
        self.release.is_some()
    }

    pub(crate) fn release(&self) {
        if let Some(release) = &self.release {
            tracing::debug!("Disposing override of {}", self.instance.contract);
            release();
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, Ordering};

    use super::*;

    trait Mailer: Send + Sync {
        fn sent(&self) -> usize;
    }

    #[derive(Default)]
    struct FakeMailer {
        disposed: AtomicBool,
    }
    impl Mailer for FakeMailer {
        fn sent(&self) -> usize {
            0
        }
    }
    impl Dispose for FakeMailer {
        fn dispose(&self) {
            self.disposed.store(true, Ordering::SeqCst);
        }
    }

    #[test]
    fn satisfies_every_name_of_its_type() {
        let mailer: Arc<dyn Mailer> = Arc::new(FakeMailer::default());
        let provider = InstanceOverride::new(mailer);

        assert!(provider.satisfies(&Contract::of::<dyn Mailer>()));
        assert!(provider.satisfies(&Contract::named::<dyn Mailer>("smtp")));
        assert!(!provider.satisfies(&Contract::of::<FakeMailer>()));
        assert_eq!(provider.contract_type(), TypeInfo::of::<dyn Mailer>());
    }

    #[test]
    fn yields_the_stored_instance() {
        let mailer: Arc<dyn Mailer> = Arc::new(FakeMailer::default());
        let provider = InstanceOverride::new(mailer.clone());

        let first = provider.instance().downcast::<dyn Mailer>().unwrap();
        let second = provider.instance().downcast::<dyn Mailer>().unwrap();

        assert!(Arc::ptr_eq(&first, &mailer));
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.sent(), 0);
    }

    #[test]
    fn only_owned_overrides_are_released() {
        let owned = Arc::new(FakeMailer::default());
        let borrowed = Arc::new(FakeMailer::default());

        let owned_provider = InstanceOverride::disposable(owned.clone());
        let borrowed_provider = InstanceOverride::new(borrowed.clone());
        owned_provider.release();
        borrowed_provider.release();

        assert!(owned_provider.is_owned());
        assert!(!borrowed_provider.is_owned());
        assert!(owned.disposed.load(Ordering::SeqCst));
        assert!(!borrowed.disposed.load(Ordering::SeqCst));
    }
}
