//! Compiled layout plans.
//!
//! Resolving a [`TypeLayout`](crate::layout::TypeLayout) for a version walks every versioned
//! attribute of every field. A plan is the result of that walk, cached per `(type, version)`
//! so that repeated population of the same type skips it entirely. The per-field read and
//! write routines themselves are monomorphized by the derive, so a plan is only the ordered
//! list of steps.
//!
//! Two threads compiling the same key at once both resolve it and the second insert wins.
//! Plans for equal keys are identical, so this is harmless.

use super::Structure;
use crate::error::Result;
use crate::layout::ResolvedLayout;
use parking_lot::RwLock;
use std::any::TypeId;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::debug;

type PlanKey = (TypeId, Option<u64>);

static PLANS: LazyLock<RwLock<HashMap<PlanKey, Arc<ResolvedLayout>>>> =
    LazyLock::new(|| RwLock::new(HashMap::new()));

fn key<T: 'static>(version: Option<f64>) -> PlanKey {
    // `+ 0.0` folds -0.0 into 0.0 so both spellings share a plan.
    (TypeId::of::<T>(), version.map(|v| (v + 0.0).to_bits()))
}

/// The cached plan for `T` at `version`, compiling it on first use.
///
/// # Errors
/// Any layout error raised while registering or resolving `T`. Failed resolutions are not
/// cached.
pub fn compiled<T: Structure>(version: Option<f64>) -> Result<Arc<ResolvedLayout>> {
    let key = key::<T>(version);
    if let Some(plan) = PLANS.read().get(&key) {
        return Ok(Arc::clone(plan));
    }

    let plan = resolve::<T>(version)?;
    debug!(
        type_name = %plan.type_name,
        ?version,
        fields = plan.steps.len(),
        "compiled layout plan"
    );
    PLANS.write().insert(key, Arc::clone(&plan));
    Ok(plan)
}

/// Resolves `T` at `version` without touching the cache.
pub fn resolve<T: Structure>(version: Option<f64>) -> Result<Arc<ResolvedLayout>> {
    Ok(Arc::new(T::layout()?.resolve(version)?))
}

/// Drops every cached plan.
pub fn clear() {
    PLANS.write().clear();
}

/// Number of cached plans.
pub fn cached_plans() -> usize {
    PLANS.read().len()
}

/// Whether a plan for `T` at `version` is cached.
pub fn is_compiled<T: Structure>(version: Option<f64>) -> bool {
    PLANS.read().contains_key(&key::<T>(version))
}
