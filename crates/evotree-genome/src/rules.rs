//! Runtime switches for condition and action opcodes.

use crate::opcode::{Action, Condition};
use evotree_core::RulesConfig;
use serde::{Deserialize, Serialize};

/// Enabled opcodes as bitmasks indexed by opcode table position.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GeneticRules {
    conditions: u32,
    actions: u8,
}

impl Default for GeneticRules {
    fn default() -> Self {
        Self::all()
    }
}

impl GeneticRules {
    pub fn all() -> Self {
        Self {
            conditions: (1u32 << Condition::ALL.len()) - 1,
            actions: u8::MAX,
        }
    }

    pub fn from_config(config: &RulesConfig) -> Self {
        let mut rules = Self::all();
        for condition in config.disabled_conditions.iter().filter_map(|c| Condition::from_code(*c)) {
            rules.disable_condition(condition);
        }
        for action in config.disabled_actions.iter().filter_map(|c| Action::from_code(*c)) {
            rules.disable_action(action);
        }
        rules
    }

    pub fn is_condition_enabled(&self, condition: Condition) -> bool {
        self.conditions & (1 << condition.index()) != 0
    }

    pub fn is_action_enabled(&self, action: Action) -> bool {
        self.actions & (1 << action.index()) != 0
    }

    /// The condition encoded by `code`, if it is a valid and enabled opcode.
    pub fn active_condition(&self, code: i8) -> Option<Condition> {
        Condition::from_code(code).filter(|c| self.is_condition_enabled(*c))
    }

    /// The action encoded by `code`, if it is a valid and enabled opcode.
    pub fn active_action(&self, code: i8) -> Option<Action> {
        Action::from_code(code).filter(|a| self.is_action_enabled(*a))
    }

    pub fn disable_condition(&mut self, condition: Condition) {
        self.conditions &= !(1 << condition.index());
    }

    pub fn disable_action(&mut self, action: Action) {
        self.actions &= !(1 << action.index());
    }
}
