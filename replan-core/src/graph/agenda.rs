//! Execution agenda
//!
//! Actions sharing the same dependency set form an event: they may all start once every
//! action of the set completed. Events are ordered by the size of their dependency set,
//! then by the set itself, and render one per line:
//!
//! ```text
//! * -> migrate(vm2,n2,n3)[0,5] & run(vm6,n4)[0,5]
//! !migrate(vm5,n4,n3)[0,3] -> migrate(vm4,n2,n4)[3,7]
//! ```

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

/// Actions unblocked by the completion of the same prerequisites
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Event {
    pub after: Vec<String>,
    pub actions: Vec<String>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.after.is_empty() {
            write!(f, "*")?;
        } else {
            let prerequisites: Vec<String> = self.after.iter().map(|a| format!("!{}", a)).collect();
            write!(f, "{}", prerequisites.join(" & "))?;
        }
        write!(f, " -> {}", self.actions.join(" & "))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Agenda {
    events: Vec<Event>,
}

impl Agenda {
    /// `dependencies[i]` holds indices into `labels`, already in the stable action order
    pub(crate) fn new(labels: &[String], dependencies: &[BTreeSet<usize>]) -> Self {
        let mut groups: BTreeMap<Vec<usize>, Vec<usize>> = BTreeMap::new();
        for (i, deps) in dependencies.iter().enumerate() {
            groups
                .entry(deps.iter().copied().collect())
                .or_default()
                .push(i);
        }
        let mut keyed: Vec<(Vec<usize>, Vec<usize>)> = groups.into_iter().collect();
        keyed.sort_by(|(a, _), (b, _)| a.len().cmp(&b.len()).then_with(|| a.cmp(b)));

        let name = |ids: &[usize]| -> Vec<String> {
            ids.iter().map(|i| labels[*i].clone()).collect()
        };
        Self {
            events: keyed
                .into_iter()
                .map(|(after, actions)| Event {
                    after: name(&after),
                    actions: name(&actions),
                })
                .collect(),
        }
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl fmt::Display for Agenda {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for event in &self.events {
            writeln!(f, "{}", event)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_events_ordered_by_prerequisite_count() {
        let labels: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let deps = vec![
            BTreeSet::new(),
            BTreeSet::from([0, 3]),
            BTreeSet::from([3]),
            BTreeSet::new(),
        ];
        let agenda = Agenda::new(&labels, &deps);
        assert_eq!(agenda.len(), 3);
        assert_eq!(agenda.to_string(), "* -> a & d\n!d -> c\n!a & !d -> b\n");
    }

    #[test]
    fn test_empty_agenda_renders_nothing() {
        let agenda = Agenda::new(&[], &[]);
        assert!(agenda.is_empty());
        assert_eq!(agenda.to_string(), "");
    }
}
