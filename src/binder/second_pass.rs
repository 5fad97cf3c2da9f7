//! Second-pass scheduling.
//!
//! Binding steps that need mapping state which may not exist yet (the target
//! entity of an association, the columns of a referenced key) are deferred
//! as [`SecondPass`] tasks. Once every class has been bound the queue is
//! drained group by group:
//!
//! | Group            | Work                                                   |
//! |------------------|--------------------------------------------------------|
//! | `IdentifierCopy` | derived identifiers copy the referenced id columns      |
//! | `ForeignKey`     | to-one / joined-subclass key linking and foreign keys   |
//! | `Key`            | primary keys, union-table column copies, natural ids    |
//! | `SecondaryTable` | secondary table keys                                   |
//! | `Generic`        | collections, one-to-one, anything else                 |
//!
//! Within a group tasks run in enqueue order. Foreign keys that are part of
//! a primary key are first ordered so that a referenced entity's own keyed
//! tasks run before the tasks depending on them; a cycle is fatal.
//!
//! A task failing with a recoverable error stays pending for the rest of the
//! round. Pending tasks are retried after their own group and again after
//! every later group, each time for up to `max_recovery_passes` passes; a
//! pass that resolves nothing ends that retry early. Whatever still fails
//! once `Generic` has run is escalated to a fatal error carrying the first
//! original message.

use std::collections::{HashMap, HashSet};
use std::fmt;

use super::errors::{BindingError, BindingResult};
use super::BuildContext;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SecondPassGroup {
    IdentifierCopy,
    ForeignKey,
    Key,
    SecondaryTable,
    Generic,
}

impl SecondPassGroup {
    pub const ORDER: [SecondPassGroup; 5] = [
        SecondPassGroup::IdentifierCopy,
        SecondPassGroup::ForeignKey,
        SecondPassGroup::Key,
        SecondPassGroup::SecondaryTable,
        SecondPassGroup::Generic,
    ];
}

/// Ordering key of a foreign key that belongs to its owner's primary key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDependency {
    pub owner_entity: String,
    pub referenced_entity: String,
}

pub trait SecondPass: fmt::Debug {
    fn group(&self) -> SecondPassGroup;

    /// Short description for logs.
    fn describe(&self) -> String;

    /// Run the deferred step. Must be safe to re-run after a recoverable failure.
    fn do_second_pass(&self, ctx: &mut BuildContext) -> BindingResult<()>;

    fn key_dependency(&self) -> Option<KeyDependency> {
        None
    }
}

#[derive(Debug, Default)]
pub struct SecondPassQueue {
    tasks: Vec<Box<dyn SecondPass>>,
}

impl SecondPassQueue {
    pub fn enqueue(&mut self, task: Box<dyn SecondPass>) {
        log::trace!("Deferred {:?} pass: {}", task.group(), task.describe());
        self.tasks.push(task);
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Remove and return every task of `group`, keeping enqueue order.
    pub fn take_group(&mut self, group: SecondPassGroup) -> Vec<Box<dyn SecondPass>> {
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut self.tasks)
            .into_iter()
            .partition(|task| task.group() == group);
        self.tasks = kept;
        taken
    }
}

/// Drain every queued second pass.
///
/// Tasks enqueued while draining are picked up by a further round.
pub fn drain(ctx: &mut BuildContext) -> BindingResult<()> {
    ctx.collector.set_in_second_pass(true);
    let result = drain_rounds(ctx);
    ctx.collector.set_in_second_pass(false);
    result
}

fn drain_rounds(ctx: &mut BuildContext) -> BindingResult<()> {
    let mut round = 0;
    while !ctx.second_passes.is_empty() {
        round += 1;
        log::debug!(
            "Second pass round {}: {} task(s) queued",
            round,
            ctx.second_passes.len()
        );
        let mut pending: Vec<PendingPass> = Vec::new();
        for group in SecondPassGroup::ORDER {
            let mut tasks = ctx.second_passes.take_group(group);
            if !tasks.is_empty() {
                if matches!(group, SecondPassGroup::IdentifierCopy | SecondPassGroup::ForeignKey) {
                    tasks = order_key_dependencies(tasks)?;
                }
                run_group(ctx, group, tasks, &mut pending)?;
            }
            retry_pending(ctx, &mut pending)?;
        }

        if let Some((_, first_error)) = pending.into_iter().next() {
            return Err(first_error.into_fatal());
        }
    }
    Ok(())
}

/// A task that failed recoverably, with its first error.
type PendingPass = (Box<dyn SecondPass>, BindingError);

/// Run a group once. Recoverable failures are appended to `pending`.
fn run_group(
    ctx: &mut BuildContext,
    group: SecondPassGroup,
    tasks: Vec<Box<dyn SecondPass>>,
    pending: &mut Vec<PendingPass>,
) -> BindingResult<()> {
    log::debug!("Running {} {:?} pass(es)", tasks.len(), group);
    for task in tasks {
        match task.do_second_pass(ctx) {
            Ok(()) => {}
            Err(err) if err.is_recoverable() => {
                log::debug!("Deferring '{}' for retry: {}", task.describe(), err);
                pending.push((task, err));
            }
            Err(err) => return Err(err),
        }
    }
    Ok(())
}

/// Retry pending tasks, oldest first, for up to `max_recovery_passes`
/// passes. Stops early once a pass resolves nothing.
fn retry_pending(ctx: &mut BuildContext, pending: &mut Vec<PendingPass>) -> BindingResult<()> {
    let max_passes = ctx.options.max_recovery_passes.max(1);
    let mut pass = 0;
    while !pending.is_empty() && pass < max_passes {
        pass += 1;
        let before = pending.len();
        let mut still_failing = Vec::new();
        for (task, first_error) in std::mem::take(pending) {
            match task.do_second_pass(ctx) {
                Ok(()) => log::debug!("Recovered '{}' on retry {}", task.describe(), pass),
                Err(err) if err.is_recoverable() => still_failing.push((task, first_error)),
                Err(err) => return Err(err),
            }
        }
        *pending = still_failing;
        if pending.len() == before {
            break;
        }
    }
    Ok(())
}

/// Order foreign-key tasks: keyed tasks follow the tasks of the entity they
/// reference, the rest keep their position after them.
pub fn order_key_dependencies(
    tasks: Vec<Box<dyn SecondPass>>,
) -> BindingResult<Vec<Box<dyn SecondPass>>> {
    let (keyed, plain): (Vec<_>, Vec<_>) = tasks
        .into_iter()
        .partition(|task| task.key_dependency().is_some());
    if keyed.is_empty() {
        return Ok(plain);
    }

    let dependencies: Vec<KeyDependency> = keyed
        .iter()
        .filter_map(|task| task.key_dependency())
        .collect();
    let mut by_owner: HashMap<&str, Vec<usize>> = HashMap::new();
    for (index, dependency) in dependencies.iter().enumerate() {
        by_owner
            .entry(dependency.owner_entity.as_str())
            .or_default()
            .push(index);
    }

    let mut order = Vec::with_capacity(keyed.len());
    let mut done: HashSet<usize> = HashSet::new();
    for index in 0..keyed.len() {
        let mut visiting = Vec::new();
        visit(index, &dependencies, &by_owner, &mut done, &mut visiting, &mut order)?;
    }

    let mut slots: Vec<Option<Box<dyn SecondPass>>> = keyed.into_iter().map(Some).collect();
    let mut ordered: Vec<Box<dyn SecondPass>> = order
        .into_iter()
        .filter_map(|index| slots[index].take())
        .collect();
    ordered.extend(plain);
    Ok(ordered)
}

fn visit(
    index: usize,
    dependencies: &[KeyDependency],
    by_owner: &HashMap<&str, Vec<usize>>,
    done: &mut HashSet<usize>,
    visiting: &mut Vec<usize>,
    order: &mut Vec<usize>,
) -> BindingResult<()> {
    if done.contains(&index) {
        return Ok(());
    }
    if visiting.contains(&index) {
        let mut tables: Vec<&str> = visiting
            .iter()
            .map(|i| dependencies[*i].owner_entity.as_str())
            .collect();
        tables.dedup();
        return Err(BindingError::ForeignKeyCircularity {
            tables: tables.join(", "),
        });
    }
    visiting.push(index);
    let referenced = dependencies[index].referenced_entity.as_str();
    if referenced != dependencies[index].owner_entity {
        if let Some(prerequisites) = by_owner.get(referenced) {
            for prerequisite in prerequisites {
                visit(*prerequisite, dependencies, by_owner, done, visiting, order)?;
            }
        }
    }
    visiting.pop();
    done.insert(index);
    order.push(index);
    Ok(())
}
