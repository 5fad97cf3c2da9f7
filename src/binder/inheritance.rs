//! Inheritance states.
//!
//! One [`InheritanceState`] per mapped class (entities and mapped
//! superclasses), computed in a single pass over classes ordered
//! superclass-first. The states form a forest mirroring the class hierarchy:
//!
//! ```text
//! Vehicle (SINGLE_TABLE, has_siblings)
//! ├── Car      (has_parents, SINGLE_TABLE inherited, no table)
//! └── Truck    (has_parents, SINGLE_TABLE inherited, no table)
//! ```
//!
//! A subclass always takes the strategy of its nearest stated ancestor. A
//! subclass declaring a different non-default strategy is reported as a soft
//! warning; the inherited strategy wins.

use std::collections::HashMap;

use super::errors::{BindingError, BindingResult};
use crate::metadata::descriptors::{ClassDescriptor, ClassKind, InheritanceType};
use crate::model::MetadataCollector;

#[derive(Debug, Clone, PartialEq)]
pub struct InheritanceState {
    pub class_name: String,
    /// Nearest ancestor that has a state (entity or mapped superclass).
    pub superclass: Option<String>,
    /// Nearest ancestor that is an entity.
    pub super_entity: Option<String>,
    pub has_parents: bool,
    pub has_siblings: bool,
    /// `None` only for a mapped superclass without `@Inheritance`.
    pub strategy: Option<InheritanceType>,
    pub is_embeddable_superclass: bool,
}

impl InheritanceState {
    fn new(class: &ClassDescriptor) -> Self {
        let is_embeddable_superclass = class.kind == ClassKind::MappedSuperclass;
        let strategy = match (class.inheritance, is_embeddable_superclass) {
            (Some(strategy), _) => Some(strategy),
            (None, true) => None,
            (None, false) => Some(InheritanceType::SingleTable),
        };
        InheritanceState {
            class_name: class.name.clone(),
            superclass: None,
            super_entity: None,
            has_parents: false,
            has_siblings: false,
            strategy,
            is_embeddable_superclass,
        }
    }

    /// Strategy used for binding; an unstated root is SINGLE_TABLE.
    pub fn effective_strategy(&self) -> InheritanceType {
        self.strategy.unwrap_or(InheritanceType::SingleTable)
    }

    /// Whether the class owns a table of its own.
    pub fn has_table(&self) -> bool {
        !self.is_embeddable_superclass
            && (!self.has_parents || self.effective_strategy() != InheritanceType::SingleTable)
    }

    /// Whether the class's table holds every inherited column as well.
    pub fn has_denormalized_table(&self) -> bool {
        self.has_parents && self.effective_strategy() == InheritanceType::TablePerClass
    }
}

/// Inheritance states keyed by class name.
#[derive(Debug, Clone, Default)]
pub struct InheritanceStates {
    states: HashMap<String, InheritanceState>,
}

impl InheritanceStates {
    pub fn get(&self, class_name: &str) -> Option<&InheritanceState> {
        self.states.get(class_name)
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// State of the class, as an assertion when it was never built.
    pub fn require(&self, class_name: &str) -> BindingResult<&InheritanceState> {
        self.states.get(class_name).ok_or_else(|| {
            BindingError::assertion(format!(
                "no inheritance state for '{}' (classes must be supplied superclass first)",
                class_name
            ))
        })
    }
}

/// Build the inheritance states of `ordered_classes`.
///
/// Classes must be ordered superclass-first. Embeddables have no state.
/// Strategy mismatches are logged and recorded on the collector.
pub fn build_inheritance_states(
    ordered_classes: &[ClassDescriptor],
    collector: &mut MetadataCollector,
) -> InheritanceStates {
    let by_name: HashMap<&str, &ClassDescriptor> = ordered_classes
        .iter()
        .map(|c| (c.name.as_str(), c))
        .collect();
    let mut states = InheritanceStates::default();

    for class in ordered_classes {
        if class.kind == ClassKind::Embeddable {
            continue;
        }
        let mut state = InheritanceState::new(class);

        let superclass = nearest_ancestor(class, &by_name, &states, |_| true);
        if let Some(superclass_name) = superclass {
            let super_entity = nearest_ancestor(class, &by_name, &states, |s| {
                !s.is_embeddable_superclass
            });
            state.superclass = Some(superclass_name.clone());
            state.has_parents = super_entity.is_some();
            state.super_entity = super_entity;

            let superclass_state = states
                .states
                .get_mut(&superclass_name)
                .and_then(|s| {
                    s.has_siblings = true;
                    s.strategy
                });

            if let Some(inherited) = superclass_state {
                let non_default = state
                    .strategy
                    .is_some_and(|s| s != InheritanceType::SingleTable);
                let mixing = state.strategy.is_some_and(|s| s != inherited);
                if non_default && mixing {
                    collector.warn(format!(
                        "Mixing inheritance strategy in an entity hierarchy is not allowed, ignoring sub strategy in: {}",
                        class.name
                    ));
                }
                state.strategy = Some(inherited);
            }
        }

        log::debug!(
            "Inheritance state of '{}': strategy={:?} has_parents={} has_table={}",
            class.name,
            state.strategy,
            state.has_parents,
            state.has_table()
        );
        states.states.insert(class.name.clone(), state);
    }

    states
}

/// Walk up the declared superclass chain to the first ancestor with a state
/// matching `accept`.
fn nearest_ancestor(
    class: &ClassDescriptor,
    by_name: &HashMap<&str, &ClassDescriptor>,
    states: &InheritanceStates,
    accept: impl Fn(&InheritanceState) -> bool,
) -> Option<String> {
    let mut current = class.superclass.as_deref();
    while let Some(name) = current {
        if let Some(state) = states.get(name) {
            if accept(state) {
                return Some(name.to_string());
            }
        }
        current = by_name.get(name).and_then(|c| c.superclass.as_deref());
    }
    None
}
