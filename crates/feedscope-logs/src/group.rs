use feedscope_types::{ArcLogEntry, HiddenRunGroup, Row};

use crate::filter::VisibilityFilter;

/// Collapses runs of filtered-out entries into expandable groups
///
/// Groups are rebuilt from scratch on every pass. A group's `expanded` flag
/// is carried over from the previous pass's group with the same first
/// entry, so expansion survives unrelated log growth.
#[derive(Clone, Debug, Default)]
pub struct HiddenRunGrouper {
    previous: Vec<HiddenRunGroup>,
}

/// A hidden run still being scanned
struct OpenRun {
    /// Index of the group marker in the output rows
    row_index: usize,
    group: HiddenRunGroup,
}

impl HiddenRunGrouper {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter and group entries into projection rows
    ///
    /// With grouping disabled, hidden entries leave no trace in the output.
    pub fn build(
        &mut self,
        entries: &[ArcLogEntry],
        filter: &VisibilityFilter,
        grouping: bool,
    ) -> Vec<Row> {
        let mut rows = Vec::with_capacity(entries.len());
        let mut groups = Vec::new();
        let mut open: Option<OpenRun> = None;

        for entry in entries {
            if filter.is_visible(entry) {
                if let Some(run) = open.take() {
                    close_run(run, &mut rows, &mut groups);
                }
                rows.push(Row::Entry(entry.clone()));
                continue;
            }

            if !grouping {
                continue;
            }

            let run = open.get_or_insert_with(|| {
                let group = HiddenRunGroup {
                    first_entry_id: entry.id,
                    count: 0,
                    expanded: self.was_expanded(entry.id),
                };
                rows.push(Row::GroupStart(group));
                OpenRun {
                    row_index: rows.len() - 1,
                    group,
                }
            });

            run.group.count += 1;
            if run.group.expanded {
                rows.push(Row::Entry(entry.clone()));
            }
        }

        if let Some(run) = open.take() {
            close_run(run, &mut rows, &mut groups);
        }

        self.previous = groups;
        rows
    }

    fn was_expanded(&self, first_entry_id: u64) -> bool {
        self.previous
            .iter()
            .filter(|g| g.expanded)
            .any(|g| g.first_entry_id == first_entry_id)
    }

    /// Groups produced by the last build
    pub fn groups(&self) -> &[HiddenRunGroup] {
        &self.previous
    }

    /// Flip a group's expanded flag; takes effect on the next build
    ///
    /// Returns false when no group starts at that entry.
    pub fn toggle(&mut self, first_entry_id: u64) -> bool {
        match self
            .previous
            .iter_mut()
            .find(|g| g.first_entry_id == first_entry_id)
        {
            Some(group) => {
                group.expanded = !group.expanded;
                true
            }
            None => false,
        }
    }

    pub fn set_expanded(&mut self, first_entry_id: u64, expanded: bool) -> bool {
        match self
            .previous
            .iter_mut()
            .find(|g| g.first_entry_id == first_entry_id)
        {
            Some(group) => {
                group.expanded = expanded;
                true
            }
            None => false,
        }
    }

    /// Forget all groups and their expansion state
    pub fn reset(&mut self) {
        self.previous.clear();
    }
}

/// Finalise a run: patch its marker with the final count, close it if expanded
fn close_run(run: OpenRun, rows: &mut Vec<Row>, groups: &mut Vec<HiddenRunGroup>) {
    rows[run.row_index] = Row::GroupStart(run.group);
    if run.group.expanded {
        rows.push(Row::GroupEnd(run.group.first_entry_id));
    }
    groups.push(run.group);
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedscope_types::LogEntry;
    use std::sync::Arc;

    fn log(layers: &[&str]) -> Vec<ArcLogEntry> {
        layers
            .iter()
            .enumerate()
            .map(|(i, layer)| {
                let mut entry = LogEntry::new(format!("m{}", i), *layer, i as f64);
                entry.id = i as u64;
                Arc::new(entry)
            })
            .collect()
    }

    fn hide(layer: &str) -> VisibilityFilter {
        let mut filter = VisibilityFilter::new();
        filter.set_layer(layer, false);
        filter
    }

    fn shape(rows: &[Row]) -> Vec<String> {
        rows.iter()
            .map(|row| match row {
                Row::Entry(e) => format!("e{}", e.id),
                Row::GroupStart(g) => format!("g{}x{}", g.first_entry_id, g.count),
                Row::GroupEnd(id) => format!("end{}", id),
                Row::Gap(_) => "gap".to_string(),
            })
            .collect()
    }

    #[test]
    fn test_collapsed_run() {
        let entries = log(&["A", "B", "B", "B", "A"]);
        let mut grouper = HiddenRunGrouper::new();
        let rows = grouper.build(&entries, &hide("B"), true);
        assert_eq!(shape(&rows), vec!["e0", "g1x3", "e4"]);
    }

    #[test]
    fn test_expanded_run() {
        let entries = log(&["A", "B", "B", "B", "A"]);
        let filter = hide("B");
        let mut grouper = HiddenRunGrouper::new();
        grouper.build(&entries, &filter, true);
        assert!(grouper.toggle(1));

        let rows = grouper.build(&entries, &filter, true);
        assert_eq!(shape(&rows), vec!["e0", "g1x3", "e1", "e2", "e3", "end1", "e4"]);
    }

    #[test]
    fn test_run_open_at_end_of_log_is_closed() {
        let entries = log(&["A", "B", "B"]);
        let filter = hide("B");
        let mut grouper = HiddenRunGrouper::new();
        let rows = grouper.build(&entries, &filter, true);
        assert_eq!(shape(&rows), vec!["e0", "g1x2"]);
        assert_eq!(grouper.groups()[0].count, 2);

        grouper.toggle(1);
        let rows = grouper.build(&entries, &filter, true);
        assert_eq!(shape(&rows), vec!["e0", "g1x2", "e1", "e2", "end1"]);
    }

    #[test]
    fn test_grouping_disabled_skips_hidden() {
        let entries = log(&["A", "B", "B", "A"]);
        let mut grouper = HiddenRunGrouper::new();
        let rows = grouper.build(&entries, &hide("B"), false);
        assert_eq!(shape(&rows), vec!["e0", "e3"]);
        assert!(grouper.groups().is_empty());
    }

    #[test]
    fn test_expansion_survives_growth() {
        let mut entries = log(&["A", "B", "B", "A"]);
        let filter = hide("B");
        let mut grouper = HiddenRunGrouper::new();
        grouper.build(&entries, &filter, true);
        grouper.toggle(1);

        let mut extra = LogEntry::new("later", "A", 10.0);
        extra.id = 4;
        entries.push(Arc::new(extra));
        let mut hidden = LogEntry::new("later hidden", "B", 11.0);
        hidden.id = 5;
        entries.push(Arc::new(hidden));

        let rows = grouper.build(&entries, &filter, true);
        assert_eq!(
            shape(&rows),
            vec!["e0", "g1x2", "e1", "e2", "end1", "e3", "e4", "g5x1"]
        );
        assert!(grouper.groups()[0].expanded);
        assert!(!grouper.groups()[1].expanded);
    }

    #[test]
    fn test_expansion_lost_when_first_entry_evicted() {
        let entries = log(&["B", "B", "A"]);
        let filter = hide("B");
        let mut grouper = HiddenRunGrouper::new();
        grouper.build(&entries, &filter, true);
        grouper.toggle(0);

        let rows = grouper.build(&entries[1..], &filter, true);
        assert_eq!(shape(&rows), vec!["g1x1", "e2"]);
    }

    #[test]
    fn test_toggle_unknown_group() {
        let mut grouper = HiddenRunGrouper::new();
        assert!(!grouper.toggle(42));
    }
}
