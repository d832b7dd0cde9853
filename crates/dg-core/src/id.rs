use lasso::{Spur, ThreadedRodeo};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::LazyLock;

/// Global string interner for model IDs.
static INTERNER: LazyLock<ThreadedRodeo> = LazyLock::new(ThreadedRodeo::default);

/// A lightweight, interned identifier for a domain-model object.
///
/// Controllers refer to their model through a `ModelId`; the model itself is
/// shared and never owned by the controller tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ModelId(Spur);

impl ModelId {
    /// Intern a string as a ModelId, or return the existing one.
    pub fn intern(s: &str) -> Self {
        ModelId(INTERNER.get_or_intern(s))
    }

    /// Resolve back to a string slice.
    pub fn as_str(&self) -> &str {
        INTERNER.resolve(&self.0)
    }

    /// Generate a unique anonymous ID.
    pub fn anonymous() -> Self {
        Self::with_prefix("_anon")
    }

    /// Generate a unique ID with a prefix (e.g. `copy_3`).
    pub fn with_prefix(prefix: &str) -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        loop {
            let n = COUNTER.fetch_add(1, Ordering::Relaxed);
            let candidate = format!("{prefix}_{n}");
            // Never hand out a name someone already interned by hand.
            if INTERNER.get(&candidate).is_none() {
                return Self::intern(&candidate);
            }
        }
    }
}

impl fmt::Debug for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.as_str())
    }
}

impl fmt::Display for ModelId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ModelId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ModelId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(ModelId::intern(&s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interning_is_stable() {
        let a = ModelId::intern("task_box");
        let b = ModelId::intern("task_box");
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "task_box");
    }

    #[test]
    fn generated_ids_are_unique() {
        let a = ModelId::anonymous();
        let b = ModelId::anonymous();
        assert_ne!(a, b);
    }

    #[test]
    fn generated_ids_skip_names_in_use() {
        let taken = ModelId::intern("dup_0");
        let fresh = ModelId::with_prefix("dup");
        assert_ne!(taken, fresh);
    }
}
