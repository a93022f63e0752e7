//! Coverage rule store
//!
//! Pure data access for coverage rules plus the append-only change history.
//! The store enforces the uniqueness invariants (one active general rule per
//! plan/category, one active rule per plan/category/item-code); it contains
//! no pricing logic.

use std::collections::HashMap;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use core_kernel::{ActorId, PlanId, RuleId, ServiceCategory};

use crate::error::CoverageError;
use crate::rule::CoverageRule;

/// What happened to a rule at a point in its history
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleEvent {
    Created,
    Updated,
    Deactivated,
}

/// One append-only history entry; `snapshot` is the rule as it stood
/// immediately after the event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleHistoryEntry {
    pub rule_id: RuleId,
    pub version: u32,
    pub event: RuleEvent,
    pub snapshot: CoverageRule,
    pub actor_id: Option<ActorId>,
    pub recorded_at: DateTime<Utc>,
}

/// In-memory rule store with history
#[derive(Debug, Default)]
pub struct CoverageRuleStore {
    rules: HashMap<RuleId, CoverageRule>,
    history: Vec<RuleHistoryEntry>,
}

impl CoverageRuleStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a rule, enforcing the uniqueness invariants
    pub fn add_rule(
        &mut self,
        rule: CoverageRule,
        actor_id: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> Result<RuleId, CoverageError> {
        self.validate(&rule, None)?;

        let id = rule.id;
        self.history.push(RuleHistoryEntry {
            rule_id: id,
            version: rule.version,
            event: RuleEvent::Created,
            snapshot: rule.clone(),
            actor_id,
            recorded_at: now,
        });
        self.rules.insert(id, rule);
        Ok(id)
    }

    /// Applies a mutation to a rule. The change is validated against the
    /// uniqueness invariants before it is committed; the superseded state is
    /// never lost because every committed version is snapshotted in the
    /// history.
    pub fn update_rule(
        &mut self,
        rule_id: RuleId,
        mutate: impl FnOnce(&mut CoverageRule),
        actor_id: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> Result<u32, CoverageError> {
        let current = self
            .rules
            .get(&rule_id)
            .ok_or(CoverageError::RuleNotFound(rule_id))?;

        let mut updated = current.clone();
        mutate(&mut updated);
        updated.id = rule_id;
        updated.version = current.version + 1;
        self.validate(&updated, Some(rule_id))?;

        self.history.push(RuleHistoryEntry {
            rule_id,
            version: updated.version,
            event: RuleEvent::Updated,
            snapshot: updated.clone(),
            actor_id,
            recorded_at: now,
        });
        self.rules.insert(rule_id, updated.clone());
        Ok(updated.version)
    }

    /// Deactivates a rule; the resolver stops seeing it immediately
    pub fn deactivate_rule(
        &mut self,
        rule_id: RuleId,
        actor_id: Option<ActorId>,
        now: DateTime<Utc>,
    ) -> Result<(), CoverageError> {
        self.update_rule(rule_id, |rule| rule.active = false, actor_id, now)
            .map(|_| ())?;
        // Rewrite the event tag: this was a deactivation, not a field edit
        if let Some(last) = self.history.last_mut() {
            last.event = RuleEvent::Deactivated;
        }
        Ok(())
    }

    pub fn get(&self, rule_id: RuleId) -> Option<&CoverageRule> {
        self.rules.get(&rule_id)
    }

    /// Active item-specific rule effective on `as_of`, newest window first
    pub fn find_item_rule(
        &self,
        plan_id: PlanId,
        category: &ServiceCategory,
        item_code: &str,
        as_of: NaiveDate,
    ) -> Option<&CoverageRule> {
        self.rules
            .values()
            .filter(|r| {
                r.plan_id == plan_id
                    && &r.category == category
                    && r.item_code.as_deref() == Some(item_code)
                    && r.is_effective_on(as_of)
            })
            .max_by_key(|r| r.effective_from)
    }

    /// Active general rule for the category effective on `as_of`
    pub fn find_general_rule(
        &self,
        plan_id: PlanId,
        category: &ServiceCategory,
        as_of: NaiveDate,
    ) -> Option<&CoverageRule> {
        self.rules
            .values()
            .filter(|r| {
                r.plan_id == plan_id
                    && &r.category == category
                    && r.item_code.is_none()
                    && r.is_effective_on(as_of)
            })
            .max_by_key(|r| r.effective_from)
    }

    /// Full append-only history for one rule, oldest first
    pub fn history_for(&self, rule_id: RuleId) -> Vec<&RuleHistoryEntry> {
        self.history
            .iter()
            .filter(|e| e.rule_id == rule_id)
            .collect()
    }

    pub fn rule_count(&self) -> usize {
        self.rules.len()
    }

    fn validate(&self, rule: &CoverageRule, existing_id: Option<RuleId>) -> Result<(), CoverageError> {
        if let Some(to) = rule.effective_to {
            if rule.effective_from > to {
                return Err(CoverageError::InvertedEffectiveWindow {
                    effective_from: rule.effective_from,
                    effective_to: to,
                });
            }
        }

        if let Some(code) = &rule.item_code {
            if code.trim().is_empty() {
                return Err(CoverageError::MalformedRule(
                    "item_code must not be blank; omit it for a general rule".to_string(),
                ));
            }
        }

        if !rule.active {
            return Ok(());
        }

        // At most one active rule per (plan, category, item_code) slot
        let clash = self.rules.values().any(|other| {
            Some(other.id) != existing_id
                && other.active
                && other.plan_id == rule.plan_id
                && other.category == rule.category
                && other.item_code == rule.item_code
        });

        if clash {
            return Err(match &rule.item_code {
                None => CoverageError::DuplicateGeneralRule {
                    plan_id: rule.plan_id,
                    category: rule.category.clone(),
                },
                Some(code) => CoverageError::DuplicateItemRule {
                    plan_id: rule.plan_id,
                    category: rule.category.clone(),
                    item_code: code.clone(),
                },
            });
        }

        Ok(())
    }
}
