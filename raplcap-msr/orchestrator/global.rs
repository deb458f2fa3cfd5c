// Process-wide default context and the opt-in locking wrapper

use once_cell::sync::Lazy;
use parking_lot::{Mutex, MutexGuard, RwLock};

use crate::common::arch::CpuModel;
use crate::common::Topology;
use crate::config::RaplCapConfig;
use crate::error::{RaplCapError, Result};
use crate::orchestrator::RaplCap;

/// The default context used by callers that do not own one
///
/// The lock only guards installing and removing the context. Operations run
/// under a shared guard, so concurrent read-modify-write sequences on the same
/// register may still interleave; use [`LockedRaplCap`] when that matters.
static GLOBAL: Lazy<RwLock<Option<RaplCap>>> = Lazy::new(|| RwLock::new(None));

/// Initialize the default context; a second call is a no-op
pub fn init() -> Result<()> {
    init_with_config(&RaplCapConfig::from_env())
}

pub fn init_with_config(config: &RaplCapConfig) -> Result<()> {
    install(|| RaplCap::with_config(config))
}

/// Initialize the default context for a known model, skipping CPUID
pub fn init_with_model(model: &'static CpuModel, config: &RaplCapConfig) -> Result<()> {
    install(|| RaplCap::with_model(model, config))
}

fn install(build: impl FnOnce() -> Result<RaplCap>) -> Result<()> {
    let mut global = GLOBAL.write();
    if global.is_some() {
        tracing::debug!("Default RAPL context already initialized");
        return Ok(());
    }
    *global = Some(build()?);
    Ok(())
}

/// Tear down the default context; destroying an uninitialized one is a no-op
pub fn destroy() -> Result<()> {
    let cap = GLOBAL.write().take();
    match cap {
        Some(cap) => cap.destroy(),
        None => Ok(()),
    }
}

pub fn is_initialized() -> bool {
    GLOBAL.read().is_some()
}

/// Run `f` against the default context
pub fn with<R>(f: impl FnOnce(&RaplCap) -> Result<R>) -> Result<R> {
    let global = GLOBAL.read();
    let cap = global.as_ref().ok_or(RaplCapError::NotInitialized)?;
    f(cap)
}

/// Packages of the default context, or of a fresh topology scan when it is
/// not initialized
pub fn num_packages() -> Result<u32> {
    if let Some(cap) = GLOBAL.read().as_ref() {
        return Ok(cap.num_packages());
    }
    Ok(Topology::discover(&RaplCapConfig::from_env())?.num_packages())
}

/// A context whose operations are serialized by a mutex
///
/// Holding the guard from [`LockedRaplCap::lock`] across a read and a later
/// write keeps other threads from interleaving their own updates.
#[derive(Debug)]
pub struct LockedRaplCap {
    inner: Mutex<RaplCap>,
}

impl LockedRaplCap {
    pub fn new(cap: RaplCap) -> Self {
        Self {
            inner: Mutex::new(cap),
        }
    }

    pub fn lock(&self) -> MutexGuard<'_, RaplCap> {
        self.inner.lock()
    }

    /// Run `f` with exclusive access to the context
    pub fn with<R>(&self, f: impl FnOnce(&RaplCap) -> R) -> R {
        f(&self.inner.lock())
    }

    pub fn into_inner(self) -> RaplCap {
        self.inner.into_inner()
    }

    pub fn destroy(self) -> Result<()> {
        self.into_inner().destroy()
    }
}

impl From<RaplCap> for LockedRaplCap {
    fn from(cap: RaplCap) -> Self {
        Self::new(cap)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::arch;
    use crate::orchestrator::context::tests::FakeMachine;
    use crate::types::{Limit, Zone};
    use raplcap_raw::rapl::msr;
    use std::sync::Arc;

    // The only test touching the process-wide context
    #[test]
    fn test_global_lifecycle() {
        let machine = FakeMachine::new(&[0, 1]);
        let model = arch::lookup(6, 0x5E).unwrap();

        assert!(matches!(
            with(|cap| Ok(cap.num_packages())),
            Err(RaplCapError::NotInitialized)
        ));
        destroy().unwrap();

        install(|| Ok(machine.open(0x5E))).unwrap();
        assert!(is_initialized());
        // Second init keeps the existing context
        init_with_model(model, &RaplCapConfig::default()).unwrap();
        assert_eq!(num_packages().unwrap(), 2);

        with(|cap| cap.set_zone_enabled(1, 0, Zone::Dram, true)).unwrap();
        assert_eq!(machine.peek(1, msr::MSR_DRAM_POWER_LIMIT), (1 << 15) | (1 << 16));

        destroy().unwrap();
        assert!(!is_initialized());
        assert!(matches!(
            with(|cap| cap.get_limits(0, 0, Zone::Package)),
            Err(RaplCapError::NotInitialized)
        ));
    }

    #[test]
    fn test_locked_serializes_updates() {
        let machine = FakeMachine::new(&[0]);
        let locked = Arc::new(LockedRaplCap::new(machine.open(0x5E)));

        let handles: Vec<_> = (1..=8u32)
            .map(|i| {
                let locked = Arc::clone(&locked);
                std::thread::spawn(move || {
                    locked.with(|cap| {
                        cap.set_limits(0, 0, Zone::Package, Some(&Limit::new(0.0, i as f64)), None)
                    })
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap().unwrap();
        }

        let cap = Arc::try_unwrap(locked).unwrap().into_inner();
        let watts = cap.get_limits(0, 0, Zone::Package).unwrap().long_term.watts;
        assert!((1.0..=8.0).contains(&watts));
        cap.destroy().unwrap();
    }

    #[test]
    fn test_locked_guard() {
        let machine = FakeMachine::new(&[0]);
        let locked = LockedRaplCap::from(machine.open(0x5E));
        {
            let cap = locked.lock();
            cap.set_zone_locked(0, 0, Zone::Package).unwrap();
            assert!(cap.is_zone_locked(0, 0, Zone::Package).unwrap());
        }
        locked.destroy().unwrap();
    }
}
