//! Condition and action opcodes.
//!
//! Opcodes live in the negative gene values: the opcode at table index `i`
//! is encoded as `-1 - i`. Non-negative values are gene indices.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Condition {
    False,
    True,
    ShootHeightLess,
    ShootHeightEquals,
    ShootHeightMore,
    LightLess,
    LightMore,
    TreeHeightLess,
    TreeHeightMore,
    TreeSizeLess,
    TreeSizeMore,
    TreeEnergyLess,
    TreeEnergyMore,
    BranchLengthLess,
    BranchLengthEquals,
    BranchLengthMore,
    TreeLifetimeLess,
    TreeLifetimeMore,
    IsBlockedToSprout,
    IsNotBlockedToSprout,
    IsBlocked,
    IsNotBlocked,
}

impl Condition {
    pub const ALL: [Condition; 22] = [
        Condition::False,
        Condition::True,
        Condition::ShootHeightLess,
        Condition::ShootHeightEquals,
        Condition::ShootHeightMore,
        Condition::LightLess,
        Condition::LightMore,
        Condition::TreeHeightLess,
        Condition::TreeHeightMore,
        Condition::TreeSizeLess,
        Condition::TreeSizeMore,
        Condition::TreeEnergyLess,
        Condition::TreeEnergyMore,
        Condition::BranchLengthLess,
        Condition::BranchLengthEquals,
        Condition::BranchLengthMore,
        Condition::TreeLifetimeLess,
        Condition::TreeLifetimeMore,
        Condition::IsBlockedToSprout,
        Condition::IsNotBlockedToSprout,
        Condition::IsBlocked,
        Condition::IsNotBlocked,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn code(self) -> i8 {
        -1 - self as i8
    }

    pub fn from_code(code: i8) -> Option<Condition> {
        table_index(code).and_then(|i| Self::ALL.get(i).copied())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Action {
    DoNothing,
    BecomeSeed,
    DropSeed,
    BecomeWood,
    DecreaseTreeLifetime,
    Die,
    IncreaseAbsorption,
    DecreaseAbsorption,
}

impl Action {
    pub const ALL: [Action; 8] = [
        Action::DoNothing,
        Action::BecomeSeed,
        Action::DropSeed,
        Action::BecomeWood,
        Action::DecreaseTreeLifetime,
        Action::Die,
        Action::IncreaseAbsorption,
        Action::DecreaseAbsorption,
    ];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn code(self) -> i8 {
        -1 - self as i8
    }

    pub fn from_code(code: i8) -> Option<Action> {
        table_index(code).and_then(|i| Self::ALL.get(i).copied())
    }
}

fn table_index(code: i8) -> Option<usize> {
    if code < 0 {
        Some((-1 - code as i32) as usize)
    } else {
        None
    }
}
