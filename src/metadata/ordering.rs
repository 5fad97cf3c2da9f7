//! Superclass-first ordering of class descriptors.

use std::collections::{HashMap, HashSet};

use super::descriptors::ClassDescriptor;
use crate::binder::errors::{BindingError, BindingResult};

/// Order classes so that every superclass precedes its subclasses.
///
/// The relative order of unrelated classes is preserved. A superclass that
/// is not part of the set is treated as a plain (unmapped) class.
pub fn order_hierarchically(classes: &[ClassDescriptor]) -> BindingResult<Vec<ClassDescriptor>> {
    let by_name: HashMap<&str, &ClassDescriptor> =
        classes.iter().map(|c| (c.name.as_str(), c)).collect();

    let mut ordered = Vec::with_capacity(classes.len());
    let mut placed: HashSet<&str> = HashSet::new();

    for class in classes {
        let mut chain = Vec::new();
        let mut visiting: HashSet<&str> = HashSet::new();
        let mut current = Some(class);
        while let Some(c) = current {
            if placed.contains(c.name.as_str()) {
                break;
            }
            if !visiting.insert(c.name.as_str()) {
                return Err(BindingError::annotation(
                    &c.name,
                    "class hierarchy contains a cycle",
                ));
            }
            chain.push(c);
            current = c
                .superclass
                .as_deref()
                .and_then(|s| by_name.get(s).copied());
        }
        for c in chain.into_iter().rev() {
            placed.insert(c.name.as_str());
            ordered.push(c.clone());
        }
    }

    Ok(ordered)
}
