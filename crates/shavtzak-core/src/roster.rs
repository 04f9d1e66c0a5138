//! In-memory roster state.
//!
//! `Roster` holds the working list of soldiers together with the snapshot
//! that was last loaded from (or pushed to) the sheet. Edits only touch the
//! working list; `changed_soldiers` diffs it against the snapshot so that a
//! sync writes just the rows that changed.

use std::collections::{BTreeSet, HashMap};

use thiserror::Error;
use tracing::debug;

use crate::models::{FilterState, FormErrors, Soldier, SoldierForm};
use crate::status::Status;

#[derive(Error, Debug, PartialEq)]
pub enum RosterError {
    #[error("Invalid soldier: {0}")]
    Invalid(FormErrors),

    #[error("A soldier with personal number {0} already exists")]
    DuplicateId(String),

    #[error("No soldier with personal number {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, Default)]
pub struct Roster {
    soldiers: Vec<Soldier>,
    original: Vec<Soldier>,
    pub filter: FilterState,
}

impl Roster {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the working list and the baseline snapshot.
    pub fn load(&mut self, soldiers: Vec<Soldier>) {
        debug!(count = soldiers.len(), "Roster loaded");
        self.original = soldiers.clone();
        self.soldiers = soldiers;
    }

    pub fn soldiers(&self) -> &[Soldier] {
        &self.soldiers
    }

    /// The records as last loaded from or written to the sheet.
    pub fn baseline(&self) -> &[Soldier] {
        &self.original
    }

    pub fn len(&self) -> usize {
        self.soldiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.soldiers.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Soldier> {
        self.soldiers.iter().find(|s| s.id == id)
    }

    fn get_mut(&mut self, id: &str) -> Result<&mut Soldier, RosterError> {
        self.soldiers
            .iter_mut()
            .find(|s| s.id == id)
            .ok_or_else(|| RosterError::NotFound(id.to_string()))
    }

    // ===== Filtering =====

    pub fn filtered(&self) -> Vec<&Soldier> {
        self.soldiers.iter().filter(|s| self.filter.matches(s)).collect()
    }

    pub fn platoons(&self) -> Vec<String> {
        self.soldiers
            .iter()
            .map(|s| s.platoon.clone())
            .filter(|p| !p.is_empty())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    }

    /// Advance the platoon filter: none -> first platoon -> ... -> last -> none.
    pub fn cycle_platoon_filter(&mut self) {
        let platoons = self.platoons();
        self.filter.platoon = match self.filter.platoon.take() {
            None => platoons.first().cloned(),
            Some(current) => platoons
                .iter()
                .position(|p| *p == current)
                .and_then(|idx| platoons.get(idx + 1))
                .cloned(),
        };
    }

    /// Advance the status filter: none -> each status -> none.
    pub fn cycle_status_filter(&mut self) {
        self.filter.status = match self.filter.status {
            None => Some(Status::Home),
            Some(Status::Home) => Some(Status::Guard),
            Some(Status::Guard) => Some(Status::Other),
            Some(Status::Other) => None,
        };
    }

    // ===== Selection =====

    pub fn toggle_selected(&mut self, id: &str) -> Result<bool, RosterError> {
        let soldier = self.get_mut(id)?;
        soldier.is_selected = !soldier.is_selected;
        Ok(soldier.is_selected)
    }

    /// Set selection on every soldier visible through the current filter.
    pub fn select_all_filtered(&mut self, selected: bool) {
        let filter = self.filter.clone();
        for soldier in self.soldiers.iter_mut().filter(|s| filter.matches(s)) {
            soldier.is_selected = selected;
        }
    }

    pub fn clear_selection(&mut self) {
        for soldier in &mut self.soldiers {
            soldier.is_selected = false;
        }
    }

    pub fn selected(&self) -> Vec<&Soldier> {
        self.soldiers.iter().filter(|s| s.is_selected).collect()
    }

    // ===== Edits =====

    pub fn set_status(
        &mut self,
        id: &str,
        status: Status,
        custom_status: Option<String>,
    ) -> Result<(), RosterError> {
        self.get_mut(id)?.set_status(status, custom_status);
        Ok(())
    }

    /// Apply a status to every selected soldier. Returns how many were updated.
    pub fn set_status_for_selected(&mut self, status: Status, custom_status: Option<String>) -> usize {
        let mut count = 0;
        for soldier in self.soldiers.iter_mut().filter(|s| s.is_selected) {
            soldier.set_status(status, custom_status.clone());
            count += 1;
        }
        count
    }

    pub fn set_notes(&mut self, id: &str, notes: &str) -> Result<(), RosterError> {
        let notes = notes.trim();
        self.get_mut(id)?.notes = (!notes.is_empty()).then(|| notes.to_string());
        Ok(())
    }

    /// Replace the soldier identified by `id` with the form's contents.
    pub fn update_soldier(&mut self, id: &str, form: &SoldierForm) -> Result<(), RosterError> {
        let errors = form.validate();
        if !errors.is_empty() {
            return Err(RosterError::Invalid(errors));
        }

        let new_id = form.id.trim();
        if new_id != id && self.get(new_id).is_some() {
            return Err(RosterError::DuplicateId(new_id.to_string()));
        }

        let existing = self.get_mut(id)?;
        let mut updated = form.to_soldier();
        updated.is_selected = existing.is_selected;
        updated.is_manually_added = existing.is_manually_added;
        *existing = updated;
        Ok(())
    }

    pub fn add_manual(&mut self, form: &SoldierForm) -> Result<&Soldier, RosterError> {
        let errors = form.validate();
        if !errors.is_empty() {
            return Err(RosterError::Invalid(errors));
        }
        let id = form.id.trim();
        if self.get(id).is_some() {
            return Err(RosterError::DuplicateId(id.to_string()));
        }

        let mut soldier = form.to_soldier();
        soldier.is_manually_added = Some(true);
        debug!(id = %soldier.id, "Soldier added manually");
        self.soldiers.push(soldier);
        Ok(&self.soldiers[self.soldiers.len() - 1])
    }

    pub fn remove(&mut self, id: &str) -> Result<Soldier, RosterError> {
        let idx = self
            .soldiers
            .iter()
            .position(|s| s.id == id)
            .ok_or_else(|| RosterError::NotFound(id.to_string()))?;
        Ok(self.soldiers.remove(idx))
    }

    // ===== Change detection =====

    /// Soldiers that need to be written back to the sheet.
    ///
    /// A record is changed when no baseline record has the same `(id, name)`
    /// or when its persisted fields differ from that baseline record.
    pub fn changed_soldiers(&self) -> Vec<&Soldier> {
        let baseline: HashMap<(&str, &str), &Soldier> =
            self.original.iter().map(|s| (s.identity(), s)).collect();

        self.soldiers
            .iter()
            .filter(|s| match baseline.get(&s.identity()) {
                Some(original) => s.differs_from(original),
                None => true,
            })
            .collect()
    }

    pub fn has_changes(&self) -> bool {
        !self.changed_soldiers().is_empty()
    }

    /// Record that `sent` reached the sheet. Each sent record replaces the
    /// baseline entry with its personal number, since the sheet matches rows
    /// by id. Edits made after the snapshot was taken stay changed.
    pub fn mark_synced(&mut self, sent: &[Soldier]) {
        for record in sent {
            self.original.retain(|s| s.id != record.id);
            self.original.push(record.clone());
        }
    }

    /// Drop local edits and go back to the baseline. Selection is kept.
    pub fn discard_changes(&mut self) {
        let selected: Vec<String> = self.selected().iter().map(|s| s.id.clone()).collect();
        self.soldiers = self.original.clone();
        for soldier in &mut self.soldiers {
            soldier.is_selected = selected.contains(&soldier.id);
        }
    }

    // ===== Summaries =====

    pub fn status_counts(&self, filtered_only: bool) -> StatusCounts {
        let mut counts = StatusCounts::default();
        let iter: Box<dyn Iterator<Item = &Soldier>> = if filtered_only {
            Box::new(self.soldiers.iter().filter(|s| self.filter.matches(s)))
        } else {
            Box::new(self.soldiers.iter())
        };
        for soldier in iter {
            counts.add(soldier.status);
        }
        counts
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatusCounts {
    pub home: usize,
    pub guard: usize,
    pub other: usize,
}

impl StatusCounts {
    pub fn add(&mut self, status: Status) {
        match status {
            Status::Home => self.home += 1,
            Status::Guard => self.guard += 1,
            Status::Other => self.other += 1,
        }
    }

    pub fn get(&self, status: Status) -> usize {
        match status {
            Status::Home => self.home,
            Status::Guard => self.guard,
            Status::Other => self.other,
        }
    }

    pub fn total(&self) -> usize {
        self.home + self.guard + self.other
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::status::map_raw_status_to_structured;

    fn soldier(id: &str, first: &str, platoon: &str, raw: &str) -> Soldier {
        Soldier::new(id, first, "Test", platoon, map_raw_status_to_structured(raw))
    }

    fn sample_roster() -> Roster {
        let mut roster = Roster::new();
        roster.load(vec![
            soldier("1000001", "Avi", "1", "בית"),
            soldier("1000002", "Beni", "1", "משמר"),
            soldier("1000003", "Gila", "2", "קורס"),
        ]);
        roster
    }

    fn form(id: &str, first: &str, platoon: &str) -> SoldierForm {
        SoldierForm {
            id: id.to_string(),
            first_name: first.to_string(),
            last_name: "Test".to_string(),
            platoon: platoon.to_string(),
            status: Some(Status::Home),
            ..Default::default()
        }
    }

    #[test]
    fn test_fresh_load_has_no_changes() {
        let roster = sample_roster();
        assert!(roster.changed_soldiers().is_empty());
        assert!(!roster.has_changes());
    }

    #[test]
    fn test_status_change_is_detected() {
        let mut roster = sample_roster();
        roster.set_status("1000001", Status::Guard, None).unwrap();

        let changed = roster.changed_soldiers();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, "1000001");
    }

    #[test]
    fn test_custom_status_change_is_detected() {
        let mut roster = sample_roster();
        roster
            .set_status("1000003", Status::Other, Some("חופשה".to_string()))
            .unwrap();
        assert_eq!(roster.changed_soldiers().len(), 1);
    }

    #[test]
    fn test_selection_is_not_a_change() {
        let mut roster = sample_roster();
        roster.toggle_selected("1000002").unwrap();
        roster.select_all_filtered(true);
        assert_eq!(roster.selected().len(), 3);
        assert!(roster.changed_soldiers().is_empty());
    }

    #[test]
    fn test_setting_same_status_is_not_a_change() {
        let mut roster = sample_roster();
        roster.set_status("1000002", Status::Guard, None).unwrap();
        assert!(roster.changed_soldiers().is_empty());
    }

    #[test]
    fn test_manual_soldier_counts_as_changed() {
        let mut roster = sample_roster();
        let added = roster.add_manual(&form("1000004", "Dov", "2")).unwrap();
        assert_eq!(added.is_manually_added, Some(true));

        let changed = roster.changed_soldiers();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].id, "1000004");
    }

    #[test]
    fn test_rename_breaks_identity_and_counts_as_changed() {
        let mut roster = sample_roster();
        roster.update_soldier("1000001", &form("1000001", "Avraham", "1")).unwrap();

        let changed = roster.changed_soldiers();
        assert_eq!(changed.len(), 1);
        assert_eq!(changed[0].name, "Avraham Test");
    }

    fn snapshot(roster: &Roster) -> Vec<Soldier> {
        roster.changed_soldiers().into_iter().cloned().collect()
    }

    #[test]
    fn test_mark_synced_resets_baseline() {
        let mut roster = sample_roster();
        roster.set_notes("1000002", "night shift").unwrap();
        assert!(roster.has_changes());
        let sent = snapshot(&roster);
        roster.mark_synced(&sent);
        assert!(!roster.has_changes());
        assert_eq!(
            roster.baseline().iter().find(|s| s.id == "1000002").unwrap().notes.as_deref(),
            Some("night shift")
        );
    }

    #[test]
    fn test_edits_after_snapshot_stay_changed() {
        let mut roster = sample_roster();
        roster.set_notes("1000002", "night shift").unwrap();
        let sent = snapshot(&roster);

        // Edited again while the write was in flight, plus an unrelated edit
        roster.set_notes("1000002", "day shift").unwrap();
        roster.set_status("1000001", Status::Guard, None).unwrap();
        roster.mark_synced(&sent);

        let changed: Vec<&str> = roster.changed_soldiers().iter().map(|s| s.id.as_str()).collect();
        assert_eq!(changed, vec!["1000001", "1000002"]);
        assert_eq!(roster.get("1000002").unwrap().notes.as_deref(), Some("day shift"));
    }

    #[test]
    fn test_synced_rename_replaces_old_identity() {
        let mut roster = sample_roster();
        roster.update_soldier("1000001", &form("1000001", "Avraham", "1")).unwrap();
        let sent = snapshot(&roster);
        roster.mark_synced(&sent);
        assert!(!roster.has_changes());

        roster.discard_changes();
        assert_eq!(roster.get("1000001").unwrap().name, "Avraham Test");
        assert_eq!(roster.len(), 3);
    }

    #[test]
    fn test_discard_changes_keeps_selection() {
        let mut roster = sample_roster();
        roster.toggle_selected("1000001").unwrap();
        roster.set_status("1000001", Status::Guard, None).unwrap();
        roster.discard_changes();

        let avi = roster.get("1000001").unwrap();
        assert_eq!(avi.status, Status::Home);
        assert!(avi.is_selected);
    }

    #[test]
    fn test_add_manual_rejects_duplicates_and_invalid() {
        let mut roster = sample_roster();
        assert_eq!(
            roster.add_manual(&form("1000001", "Avi", "1")).unwrap_err(),
            RosterError::DuplicateId("1000001".to_string())
        );
        assert!(matches!(
            roster.add_manual(&form("12", "", "1")),
            Err(RosterError::Invalid(_))
        ));
    }

    #[test]
    fn test_update_rejects_id_collision() {
        let mut roster = sample_roster();
        let err = roster
            .update_soldier("1000001", &form("1000002", "Avi", "1"))
            .unwrap_err();
        assert_eq!(err, RosterError::DuplicateId("1000002".to_string()));
    }

    #[test]
    fn test_remove_and_not_found() {
        let mut roster = sample_roster();
        assert_eq!(roster.remove("1000002").unwrap().id, "1000002");
        assert_eq!(roster.len(), 2);
        assert_eq!(
            roster.set_status("1000002", Status::Home, None).unwrap_err(),
            RosterError::NotFound("1000002".to_string())
        );
    }

    #[test]
    fn test_bulk_status_for_selected() {
        let mut roster = sample_roster();
        roster.filter.platoon = Some("1".to_string());
        roster.select_all_filtered(true);
        let updated = roster.set_status_for_selected(Status::Other, Some("שטח".to_string()));

        assert_eq!(updated, 2);
        assert_eq!(roster.get("1000001").unwrap().raw_status(), "שטח");
        assert_eq!(roster.get("1000003").unwrap().raw_status(), "קורס");
        assert_eq!(roster.changed_soldiers().len(), 2);
    }

    #[test]
    fn test_filter_cycles_and_counts() {
        let mut roster = sample_roster();
        assert_eq!(roster.platoons(), vec!["1".to_string(), "2".to_string()]);

        roster.cycle_platoon_filter();
        assert_eq!(roster.filter.platoon.as_deref(), Some("1"));
        assert_eq!(roster.filtered().len(), 2);
        roster.cycle_platoon_filter();
        assert_eq!(roster.filter.platoon.as_deref(), Some("2"));
        roster.cycle_platoon_filter();
        assert_eq!(roster.filter.platoon, None);

        roster.cycle_status_filter();
        assert_eq!(roster.filter.status, Some(Status::Home));
        assert_eq!(roster.status_counts(true).total(), 1);

        let all = roster.status_counts(false);
        assert_eq!((all.home, all.guard, all.other), (1, 1, 1));
        assert_eq!(all.get(Status::Guard), 1);
    }
}
