//! Immutability classification
//!
//! Instances of an immutable type are never copied: the clone of such a
//! value is the value itself.
//!
//! Rules, in order:
//! - primitives, enums, pointers and strings are immutable
//! - classes, interfaces and arrays without value semantics are mutable
//! - structs and value-semantic classes (records) are immutable when every
//!   field type is immutable; for records every field must also be
//!   init-only
//!
//! Recursive type graphs are handled optimistically: a type reached again
//! while it is still being classified counts as immutable. A negative
//! verdict is always final and cached. A positive verdict that leaned on
//! such an optimistic assumption is kept in a per-call scratch table and
//! reused from there; it moves to the shared cache once the assumed type
//! itself has been settled, so no cached verdict ever depends on a
//! computation that is still running.

use dashmap::DashMap;
use replica_model::{TypeDescriptor, TypeIntrospector, TypeKey, TypeKind};
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
struct Verdict {
    immutable: bool,
    /// Lowest in-progress stack depth this verdict assumed immutable
    assumes: Option<usize>,
}

/// Working state of one top-level classification
#[derive(Debug, Default)]
struct Pass {
    in_progress: Vec<TypeKey>,
    /// Positive verdicts still resting on an entry of `in_progress`
    provisional: HashMap<TypeKey, Verdict>,
}

impl Verdict {
    const fn settled(immutable: bool) -> Self {
        Self {
            immutable,
            assumes: None,
        }
    }
}

/// Memoizing immutability classifier
#[derive(Debug, Default)]
pub struct ImmutabilityClassifier {
    verdicts: DashMap<TypeKey, bool>,
}

impl ImmutabilityClassifier {
    /// Create empty classifier
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether instances of `ty` are deeply immutable
    ///
    /// Types the introspector does not know are treated as mutable and not
    /// cached, since they may be defined later.
    pub fn is_immutable(&self, types: &dyn TypeIntrospector, ty: TypeKey) -> bool {
        if let Some(verdict) = self.verdicts.get(&ty) {
            return *verdict;
        }
        self.classify(types, ty, &mut Pass::default()).immutable
    }

    /// Number of cached verdicts
    #[must_use]
    pub fn len(&self) -> usize {
        self.verdicts.len()
    }

    /// Whether nothing is cached yet
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.verdicts.is_empty()
    }

    fn classify(&self, types: &dyn TypeIntrospector, ty: TypeKey, pass: &mut Pass) -> Verdict {
        if let Some(verdict) = self.verdicts.get(&ty) {
            return Verdict::settled(*verdict);
        }
        if let Some(depth) = pass.in_progress.iter().position(|&t| t == ty) {
            return Verdict {
                immutable: true,
                assumes: Some(depth),
            };
        }
        if let Some(verdict) = pass.provisional.get(&ty) {
            return *verdict;
        }
        let Some(desc) = types.descriptor(ty) else {
            return Verdict::settled(false);
        };

        let verdict = match desc.kind() {
            TypeKind::Primitive | TypeKind::Enum | TypeKind::Pointer | TypeKind::String => {
                Verdict::settled(true)
            }
            TypeKind::Struct => self.classify_fields(types, &desc, pass),
            TypeKind::Class if desc.has_value_semantics() => {
                self.classify_fields(types, &desc, pass)
            }
            TypeKind::Class | TypeKind::Interface | TypeKind::Array { .. } => {
                Verdict::settled(false)
            }
        };

        if verdict.assumes.is_none() {
            tracing::trace!(
                "Classified '{}' as {}",
                desc.name(),
                if verdict.immutable { "immutable" } else { "mutable" }
            );
            self.verdicts.insert(ty, verdict.immutable);
        } else {
            pass.provisional.insert(ty, verdict);
        }
        verdict
    }

    fn classify_fields(
        &self,
        types: &dyn TypeIntrospector,
        desc: &TypeDescriptor,
        pass: &mut Pass,
    ) -> Verdict {
        let depth = pass.in_progress.len();
        pass.in_progress.push(desc.key());

        let requires_init_only = !desc.is_value_type();
        let mut assumes: Option<usize> = None;
        let mut immutable = true;
        for field in desc.fields() {
            if requires_init_only && !field.init_only {
                immutable = false;
                break;
            }
            let verdict = self.classify(types, field.ty, pass);
            if !verdict.immutable {
                immutable = false;
                break;
            }
            assumes = match (assumes, verdict.assumes) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
        }

        pass.in_progress.pop();
        if !immutable {
            // Every type still in progress reaches this one, so every
            // provisional positive is now wrong
            pass.provisional.clear();
            return Verdict::settled(false);
        }
        // Assumptions about this type itself are resolved now
        let remaining = assumes.filter(|&d| d < depth);
        self.resolve_assumptions(pass, depth, remaining);
        Verdict {
            immutable: true,
            assumes: remaining,
        }
    }

    /// Rebase provisional verdicts that assumed the type at `depth` onto
    /// whatever that type itself still assumes
    fn resolve_assumptions(&self, pass: &mut Pass, depth: usize, remaining: Option<usize>) {
        pass.provisional.retain(|&ty, verdict| {
            if verdict.assumes.is_some_and(|d| d < depth) {
                return true;
            }
            match remaining {
                Some(d) => {
                    verdict.assumes = Some(d);
                    true
                }
                None => {
                    self.verdicts.insert(ty, verdict.immutable);
                    false
                }
            }
        });
    }
}
