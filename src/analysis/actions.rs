//! Action item queries.
//!
//! Overdue is never stored: it is derived from the due date every time
//! an action is read.

use crate::models::{ActionItem, ActionStatus, Deal};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use super::aggregator::{rank_by, SortDirection};

/// Counts shown on the action queue.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionStats {
    pub total: usize,
    pub pending: usize,
    pub in_progress: usize,
    pub completed: usize,
    pub overdue: usize,
}

/// Actions attached to a deal, in dataset order.
pub fn actions_for_deal<'a>(actions: &'a [ActionItem], deal_id: &str) -> Vec<&'a ActionItem> {
    actions.iter().filter(|a| a.deal_id == deal_id).collect()
}

/// Not completed and due before `today`.
pub fn is_overdue(action: &ActionItem, today: NaiveDate) -> bool {
    action.status != ActionStatus::Completed && action.due_date < today
}

/// Status to display: overdue when [`is_overdue`], else the stored status.
///
/// A stored `overdue` whose due date has not passed falls back to pending.
pub fn effective_status(action: &ActionItem, today: NaiveDate) -> ActionStatus {
    if is_overdue(action, today) {
        ActionStatus::Overdue
    } else if action.status == ActionStatus::Overdue {
        ActionStatus::Pending
    } else {
        action.status
    }
}

/// Filter by effective status and owner, soonest due first.
pub fn filter_actions<'a>(
    actions: &'a [ActionItem],
    status: Option<ActionStatus>,
    owner: Option<&str>,
    today: NaiveDate,
) -> Vec<&'a ActionItem> {
    let matching: Vec<&ActionItem> = actions
        .iter()
        .filter(|a| status.map_or(true, |s| effective_status(a, today) == s))
        .filter(|a| owner.map_or(true, |o| a.owner == o))
        .collect();

    rank_by(matching, |a| a.due_date, SortDirection::Ascending)
}

/// Tally actions by effective status.
pub fn action_stats(actions: &[ActionItem], today: NaiveDate) -> ActionStats {
    let mut stats = ActionStats {
        total: actions.len(),
        ..ActionStats::default()
    };

    for action in actions {
        match effective_status(action, today) {
            ActionStatus::Pending => stats.pending += 1,
            ActionStatus::InProgress => stats.in_progress += 1,
            ActionStatus::Completed => stats.completed += 1,
            ActionStatus::Overdue => stats.overdue += 1,
        }
    }

    stats
}

/// Actions whose deal id does not exist in `deals`.
pub fn dangling_action_refs<'a>(actions: &'a [ActionItem], deals: &[Deal]) -> Vec<&'a ActionItem> {
    let known: HashSet<&str> = deals.iter().map(|d| d.id.as_str()).collect();
    actions
        .iter()
        .filter(|a| !known.contains(a.deal_id.as_str()))
        .collect()
}

/// Distinct action owners, first appearance order.
pub fn action_owners(actions: &[ActionItem]) -> Vec<&str> {
    let mut seen = HashSet::new();
    actions
        .iter()
        .map(|a| a.owner.as_str())
        .filter(|owner| seen.insert(*owner))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::aggregator::tests::create_test_deal;
    use crate::models::Stage;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn create_test_action(
        id: &str,
        deal_id: &str,
        due: NaiveDate,
        status: ActionStatus,
    ) -> ActionItem {
        ActionItem {
            id: id.to_string(),
            deal_id: deal_id.to_string(),
            deal_name: "Test deal".to_string(),
            action: "Confirm close date with customer".to_string(),
            owner: "Jim Macdonell".to_string(),
            due_date: due,
            status,
        }
    }

    #[test]
    fn test_actions_for_deal() {
        let actions = vec![
            create_test_action("a1", "deal-001", date(2026, 2, 10), ActionStatus::Pending),
            create_test_action("a2", "deal-002", date(2026, 2, 11), ActionStatus::Pending),
            create_test_action("a3", "deal-001", date(2026, 2, 9), ActionStatus::Completed),
        ];

        let ids: Vec<&str> = actions_for_deal(&actions, "deal-001")
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(ids, vec!["a1", "a3"]);
        assert!(actions_for_deal(&actions, "deal-404").is_empty());
    }

    #[test]
    fn test_overdue_is_derived() {
        let today = date(2026, 2, 10);
        let late = create_test_action("a1", "d", date(2026, 2, 9), ActionStatus::Pending);
        let due_today = create_test_action("a2", "d", today, ActionStatus::InProgress);
        let done = create_test_action("a3", "d", date(2026, 1, 1), ActionStatus::Completed);
        let stale_flag = create_test_action("a4", "d", date(2026, 3, 1), ActionStatus::Overdue);

        assert!(is_overdue(&late, today));
        assert!(!is_overdue(&due_today, today));
        assert!(!is_overdue(&done, today));

        assert_eq!(effective_status(&late, today), ActionStatus::Overdue);
        assert_eq!(effective_status(&due_today, today), ActionStatus::InProgress);
        assert_eq!(effective_status(&done, today), ActionStatus::Completed);
        assert_eq!(effective_status(&stale_flag, today), ActionStatus::Pending);
        assert_eq!(late.status, ActionStatus::Pending);
    }

    #[test]
    fn test_filter_and_stats() {
        let today = date(2026, 2, 10);
        let mut other_owner =
            create_test_action("a3", "deal-003", date(2026, 2, 12), ActionStatus::Pending);
        other_owner.owner = "Marcus Dinan".to_string();

        let actions = vec![
            create_test_action("a1", "deal-001", date(2026, 2, 15), ActionStatus::Pending),
            create_test_action("a2", "deal-002", date(2026, 2, 1), ActionStatus::Pending),
            other_owner,
            create_test_action("a4", "deal-004", date(2026, 2, 11), ActionStatus::Completed),
        ];

        let all: Vec<&str> = filter_actions(&actions, None, None, today)
            .iter()
            .map(|a| a.id.as_str())
            .collect();
        assert_eq!(all, vec!["a2", "a4", "a3", "a1"]);

        let pending_jim: Vec<&str> =
            filter_actions(&actions, Some(ActionStatus::Pending), Some("Jim Macdonell"), today)
                .iter()
                .map(|a| a.id.as_str())
                .collect();
        assert_eq!(pending_jim, vec!["a1"]);

        let stats = action_stats(&actions, today);
        assert_eq!(stats.total, 4);
        assert_eq!(stats.pending, 2);
        assert_eq!(stats.completed, 1);
        assert_eq!(stats.overdue, 1);

        assert_eq!(action_owners(&actions), vec!["Jim Macdonell", "Marcus Dinan"]);
    }

    #[test]
    fn test_dangling_refs() {
        let deals = vec![create_test_deal("deal-001", Stage::Commit, 10.0)];
        let actions = vec![
            create_test_action("a1", "deal-001", date(2026, 2, 10), ActionStatus::Pending),
            create_test_action("a2", "deal-999", date(2026, 2, 10), ActionStatus::Pending),
        ];

        let dangling = dangling_action_refs(&actions, &deals);
        assert_eq!(dangling.len(), 1);
        assert_eq!(dangling[0].deal_id, "deal-999");
    }
}
