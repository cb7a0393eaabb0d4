#[macro_use]
mod macros;

pub mod attributes;
pub mod character;
pub mod optimize;
pub mod results;
pub mod settings;

pub use crate::attributes::{
    round_even, Attribute, Attributes, Condition, PerCondition, INDICATORS, INFUSION_BONUS,
};
pub use crate::character::{Character, CondiCache};
pub use crate::optimize::engine::Optimizer;
pub use crate::optimize::list::{character_lt, ResultList};
pub use crate::optimize::{Progress, Step};
pub use crate::results::{calc_results, CoefficientDetails, ResultProperties};
pub use crate::settings::{
    Affix, ConversionSource, DamageKey, DamageMultipliers, InfusionMode, MinimalSettings,
    Modifiers, Settings, SettingsError, SymmetryRule,
};
