use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::attributes::{Attribute, Attributes, Condition, PerCondition};

/// A stat preset selectable for a gear slot. The numeric id doubles as the
/// canonical order used for symmetry breaking.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Affix(pub u16);

/// One entry of the damage distribution: either strike damage or a specific
/// condition.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum DamageKey {
    Power,
    Condition(Condition),
}

impl DamageKey {
    pub fn name(self) -> &'static str {
        match self {
            DamageKey::Power => "Power",
            DamageKey::Condition(condition) => condition.name(),
        }
    }

    pub fn coefficient_attribute(self) -> Attribute {
        match self {
            DamageKey::Power => Attribute::PowerCoefficient,
            DamageKey::Condition(condition) => condition.coefficient_attribute(),
        }
    }

    pub fn dps_attribute(self) -> Attribute {
        match self {
            DamageKey::Power => Attribute::PowerDps,
            DamageKey::Condition(condition) => condition.dps_attribute(),
        }
    }
}

/// Source side of a post-buff conversion.
#[derive(Clone, Copy, PartialEq, Debug, Serialize, Deserialize)]
pub enum ConversionSource {
    Attribute(Attribute),
    /// Reads `clamp(Critical Chance - offset, 0, 1)`. An offset of zero is the
    /// plain clamped critical chance.
    ClampedCritChance { offset: f64 },
}

/// Final damage multipliers, all defaulting to 1.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DamageMultipliers {
    pub outgoing_strike_damage: f64,
    pub outgoing_condition_damage: f64,
    pub outgoing_siphon_damage: f64,
    pub outgoing_critical_damage: f64,
    pub outgoing_phantasm_damage: f64,
    pub outgoing_phantasm_critical_damage: f64,
    pub outgoing_alt_damage: f64,
    pub outgoing_alt_critical_damage: f64,
    pub incoming_strike_damage: f64,
    pub condition: PerCondition<f64>,
}

impl Default for DamageMultipliers {
    fn default() -> DamageMultipliers {
        DamageMultipliers {
            outgoing_strike_damage: 1.0,
            outgoing_condition_damage: 1.0,
            outgoing_siphon_damage: 1.0,
            outgoing_critical_damage: 1.0,
            outgoing_phantasm_damage: 1.0,
            outgoing_phantasm_critical_damage: 1.0,
            outgoing_alt_damage: 1.0,
            outgoing_alt_critical_damage: 1.0,
            incoming_strike_damage: 1.0,
            condition: 1.0.into(),
        }
    }
}

/// Preprocessed modifier bundle. The decision of which traits, runes and
/// buffs apply has already been made by the caller; this is the flattened
/// outcome the evaluation pipeline consumes.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Modifiers {
    /// Percent-of-source conversions applied before buffs, reading the
    /// unbuffed base attributes.
    pub convert: Vec<(Attribute, Vec<(Attribute, f64)>)>,
    /// Flat additive bonuses.
    pub buff: Vec<(Attribute, f64)>,
    /// Conversions applied after buffs and derived stats.
    pub convert_after_buffs: Vec<(Attribute, Vec<(ConversionSource, f64)>)>,
    pub damage_multiplier: DamageMultipliers,
    /// Healing bonus scaling with Healing Power and Concentration.
    pub bountiful_maintenance_oil: bool,
}

/// How infusion slots are distributed between the primary and secondary
/// infusion attributes.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub enum InfusionMode {
    None,
    Primary,
    Few,
    Secondary,
    SecondaryNoDuplicates,
}

impl FromStr for InfusionMode {
    type Err = SettingsError;

    fn from_str(s: &str) -> Result<InfusionMode, SettingsError> {
        match s {
            "None" => Ok(InfusionMode::None),
            "Primary" => Ok(InfusionMode::Primary),
            "Few" => Ok(InfusionMode::Few),
            "Secondary" => Ok(InfusionMode::Secondary),
            "SecondaryNoDuplicates" => Ok(InfusionMode::SecondaryNoDuplicates),
            other => Err(SettingsError::UnknownInfusionMode(other.to_owned())),
        }
    }
}

/// A group of interchangeable slots. When the prefix reaches length `at`, any
/// listed pair holding affixes out of canonical order is skipped, because the
/// ordered twin of that prefix is enumerated anyway.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SymmetryRule {
    pub at: usize,
    pub compare: Vec<(usize, usize)>,
}

impl SymmetryRule {
    /// Rules for the standard fourteen-slot layout: six armor pieces with
    /// interchangeable shoulders/gloves/boots, two rings, two accessories and
    /// two weapons. A forced group keeps its slots distinguishable and gets
    /// no rule.
    pub fn standard_layout(
        forced_armor: bool,
        forced_ring: bool,
        forced_acc: bool,
        forced_wep: bool,
    ) -> Vec<SymmetryRule> {
        let mut rules = Vec::new();
        if !forced_armor {
            rules.push(SymmetryRule { at: 6, compare: vec![(1, 3), (3, 5)] });
        }
        if !forced_ring {
            rules.push(SymmetryRule { at: 9, compare: vec![(7, 8)] });
        }
        if !forced_acc {
            rules.push(SymmetryRule { at: 11, compare: vec![(9, 10)] });
        }
        if !forced_wep {
            rules.push(SymmetryRule { at: 14, compare: vec![(12, 13)] });
        }
        rules
    }
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("unknown infusion mode `{0}`")]
    UnknownInfusionMode(String),
    #[error("infusion mode {mode:?} requires a {role} infusion attribute")]
    MissingInfusionAttribute {
        mode: InfusionMode,
        role: &'static str,
    },
    #[error("per-{role} infusion cap {cap} exceeds the total of {max}")]
    InfusionCapTooLarge {
        role: &'static str,
        cap: u32,
        max: u32,
    },
    #[error("{slots} slots declared but affix tables carry {affixes} and {stats} entries")]
    SlotMismatch {
        slots: usize,
        affixes: usize,
        stats: usize,
    },
    #[error("slot {slot} offers {affixes} affixes but {stats} stat entries")]
    AffixStatsMismatch {
        slot: usize,
        affixes: usize,
        stats: usize,
    },
    #[error("slot {slot} offers no affixes")]
    EmptySlot { slot: usize },
    #[error("symmetry rule at prefix length {at} references slot {index} outside the prefix")]
    BadSymmetryRule { at: usize, index: usize },
    #[error("`{0}` is not a rankable objective")]
    UnsupportedObjective(Attribute),
}

/// Immutable, pre-validated optimizer input. Built once per search; the
/// engine fills in the derived lookup tables during construction.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub profession: String,
    /// Number of gear slots; indexes `affixes_array` and `affix_stats_array`.
    pub slots: usize,
    /// The user-selected affix pool. Empty means there is nothing to search.
    pub affixes: Vec<Affix>,
    /// Display names by affix id.
    pub affix_names: Vec<String>,
    /// Selectable affixes per slot.
    pub affixes_array: Vec<Vec<Affix>>,
    /// Stat bonuses per slot and per selectable affix, already scaled by the
    /// slot's stat weight.
    pub affix_stats_array: Vec<Vec<Vec<(Attribute, f64)>>>,
    pub base_attributes: Attributes,
    pub modifiers: Modifiers,
    /// Skill coefficients per damage source. Condition entries with a
    /// positive coefficient mark the conditions worth evaluating.
    pub distribution: Vec<(DamageKey, f64)>,
    /// Objective attribute: Damage, Survivability or Healing.
    pub rankby: Attribute,
    pub max_results: usize,

    pub infusion_mode: InfusionMode,
    pub primary_infusion: Option<Attribute>,
    pub secondary_infusion: Option<Attribute>,
    pub max_infusions: u32,
    pub primary_max_infusions: u32,
    pub secondary_max_infusions: u32,

    /// Constraint bounds; all comparisons are strict. Percent-valued bounds
    /// (boon duration, critical chance) are given in whole percent.
    pub min_boon_duration: Option<f64>,
    pub min_healing_power: Option<f64>,
    pub min_toughness: Option<f64>,
    pub max_toughness: Option<f64>,
    pub min_health: Option<f64>,
    pub min_crit_chance: Option<f64>,

    /// Fraction of skill casts per torment tick.
    pub attack_rate: f64,
    /// Fraction of combat time spent moving.
    pub movement_uptime: f64,
    pub disable_condi_result_cache: bool,
    pub symmetry: Vec<SymmetryRule>,

    /// Conditions with a positive distribution coefficient; filled during
    /// engine construction.
    #[serde(skip)]
    pub relevant_conditions: Vec<Condition>,
    /// `runs_after_this_slot[k]` is the number of leaves below a prefix of
    /// length `k`; filled during engine construction.
    #[serde(skip)]
    pub runs_after_this_slot: Vec<u64>,
}

impl Default for Settings {
    fn default() -> Settings {
        Settings {
            profession: String::new(),
            slots: 0,
            affixes: Vec::new(),
            affix_names: Vec::new(),
            affixes_array: Vec::new(),
            affix_stats_array: Vec::new(),
            base_attributes: Attributes::new(),
            modifiers: Modifiers::default(),
            distribution: Vec::new(),
            rankby: Attribute::Damage,
            max_results: 50,
            infusion_mode: InfusionMode::None,
            primary_infusion: None,
            secondary_infusion: None,
            max_infusions: 18,
            primary_max_infusions: 18,
            secondary_max_infusions: 18,
            min_boon_duration: None,
            min_healing_power: None,
            min_toughness: None,
            max_toughness: None,
            min_health: None,
            min_crit_chance: None,
            attack_rate: 0.0,
            movement_uptime: 0.0,
            disable_condi_result_cache: false,
            symmetry: Vec::new(),
            relevant_conditions: Vec::new(),
            runs_after_this_slot: Vec::new(),
        }
    }
}

impl Settings {
    /// Validates the slot layout and infusion configuration, then fills the
    /// derived lookup tables. The engine calls this during construction;
    /// standalone evaluation of a `Character` needs it done up front.
    pub fn prepare(&mut self) -> Result<(), SettingsError> {
        if self.affixes_array.len() != self.slots || self.affix_stats_array.len() != self.slots {
            return Err(SettingsError::SlotMismatch {
                slots: self.slots,
                affixes: self.affixes_array.len(),
                stats: self.affix_stats_array.len(),
            });
        }
        for (slot, options) in self.affixes_array.iter().enumerate() {
            if options.is_empty() {
                return Err(SettingsError::EmptySlot { slot });
            }
            if self.affix_stats_array[slot].len() != options.len() {
                return Err(SettingsError::AffixStatsMismatch {
                    slot,
                    affixes: options.len(),
                    stats: self.affix_stats_array[slot].len(),
                });
            }
        }
        for rule in &self.symmetry {
            if rule.at > self.slots {
                return Err(SettingsError::BadSymmetryRule { at: rule.at, index: rule.at });
            }
            for &(i, j) in &rule.compare {
                let out_of_prefix = i.max(j);
                if out_of_prefix >= rule.at {
                    return Err(SettingsError::BadSymmetryRule {
                        at: rule.at,
                        index: out_of_prefix,
                    });
                }
            }
        }

        match self.rankby {
            Attribute::Damage | Attribute::Survivability | Attribute::Healing => {}
            other => return Err(SettingsError::UnsupportedObjective(other)),
        }

        let mode = self.infusion_mode;
        if mode != InfusionMode::None {
            if self.primary_infusion.is_none() {
                return Err(SettingsError::MissingInfusionAttribute { mode, role: "primary" });
            }
            let needs_secondary = matches!(
                mode,
                InfusionMode::Few | InfusionMode::Secondary | InfusionMode::SecondaryNoDuplicates
            );
            if needs_secondary && self.secondary_infusion.is_none() {
                return Err(SettingsError::MissingInfusionAttribute { mode, role: "secondary" });
            }
            if self.primary_max_infusions > self.max_infusions {
                return Err(SettingsError::InfusionCapTooLarge {
                    role: "primary",
                    cap: self.primary_max_infusions,
                    max: self.max_infusions,
                });
            }
            if needs_secondary && self.secondary_max_infusions > self.max_infusions {
                return Err(SettingsError::InfusionCapTooLarge {
                    role: "secondary",
                    cap: self.secondary_max_infusions,
                    max: self.max_infusions,
                });
            }
        }

        self.relevant_conditions = self
            .distribution
            .iter()
            .filter_map(|&(key, coefficient)| match key {
                DamageKey::Condition(condition) if coefficient > 0.0 => Some(condition),
                _ => None,
            })
            .collect();

        let mut runs = vec![1u64; self.slots + 1];
        for k in (0..self.slots).rev() {
            runs[k] = runs[k + 1] * self.affixes_array[k].len() as u64;
        }
        self.runs_after_this_slot = runs;

        Ok(())
    }

    pub fn affix_name(&self, affix: Affix) -> &str {
        self.affix_names
            .get(affix.0 as usize)
            .map(String::as_str)
            .unwrap_or("?")
    }
}

/// The projection of the form state the display layer needs alongside raw
/// results. The engine stores it untouched.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct MinimalSettings {
    pub profession: String,
    pub specialization: String,
    pub weapon_type: String,
    pub applied_modifiers: Vec<String>,
    pub rankby: Attribute,
    pub should_display_extras: bool,
    pub extras_combination: serde_json::Value,
    pub cached_form_state: serde_json::Value,
}

impl Default for MinimalSettings {
    fn default() -> MinimalSettings {
        MinimalSettings {
            profession: String::new(),
            specialization: String::new(),
            weapon_type: String::new(),
            applied_modifiers: Vec::new(),
            rankby: Attribute::Damage,
            should_display_extras: false,
            extras_combination: serde_json::Value::Null,
            cached_form_state: serde_json::Value::Null,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn one_slot_settings() -> Settings {
        Settings {
            slots: 1,
            affixes: vec![Affix(0)],
            affixes_array: vec![vec![Affix(0)]],
            affix_stats_array: vec![vec![vec![(Attribute::Power, 100.0)]]],
            ..Settings::default()
        }
    }

    #[test]
    fn test_infusion_mode_parsing() {
        assert_eq!("Primary".parse::<InfusionMode>().unwrap(), InfusionMode::Primary);
        assert_eq!(
            "SecondaryNoDuplicates".parse::<InfusionMode>().unwrap(),
            InfusionMode::SecondaryNoDuplicates
        );
        assert!(matches!(
            "Tertiary".parse::<InfusionMode>(),
            Err(SettingsError::UnknownInfusionMode(name)) if name == "Tertiary"
        ));
    }

    #[test]
    fn test_prepare_fills_derived_tables() {
        let mut settings = Settings {
            slots: 2,
            affixes: vec![Affix(0), Affix(1)],
            affixes_array: vec![vec![Affix(0), Affix(1)], vec![Affix(0)]],
            affix_stats_array: vec![vec![vec![], vec![]], vec![vec![]]],
            distribution: vec![
                (DamageKey::Power, 1.0),
                (DamageKey::Condition(Condition::Bleeding), 0.8),
                (DamageKey::Condition(Condition::Poison), 0.0),
            ],
            ..Settings::default()
        };
        settings.prepare().unwrap();
        assert_eq!(settings.relevant_conditions, vec![Condition::Bleeding]);
        assert_eq!(settings.runs_after_this_slot, vec![2, 1, 1]);
    }

    #[test]
    fn test_prepare_rejects_bad_layout() {
        let mut settings = one_slot_settings();
        settings.affixes_array.push(vec![Affix(1)]);
        assert!(matches!(
            settings.prepare(),
            Err(SettingsError::SlotMismatch { .. })
        ));

        let mut settings = one_slot_settings();
        settings.affixes_array[0].clear();
        settings.affix_stats_array[0].clear();
        assert!(matches!(settings.prepare(), Err(SettingsError::EmptySlot { slot: 0 })));
    }

    #[test]
    fn test_prepare_rejects_bad_symmetry_rule() {
        let mut settings = one_slot_settings();
        settings.symmetry = vec![SymmetryRule { at: 1, compare: vec![(0, 1)] }];
        assert!(matches!(
            settings.prepare(),
            Err(SettingsError::BadSymmetryRule { at: 1, index: 1 })
        ));
    }

    #[test]
    fn test_prepare_rejects_incomplete_infusion_config() {
        let mut settings = one_slot_settings();
        settings.infusion_mode = InfusionMode::Secondary;
        settings.primary_infusion = Some(Attribute::Power);
        assert!(matches!(
            settings.prepare(),
            Err(SettingsError::MissingInfusionAttribute { role: "secondary", .. })
        ));

        settings.secondary_infusion = Some(Attribute::Precision);
        settings.primary_max_infusions = 20;
        assert!(matches!(
            settings.prepare(),
            Err(SettingsError::InfusionCapTooLarge { role: "primary", .. })
        ));
    }

    #[test]
    fn test_prepare_rejects_unrankable_objective() {
        let mut settings = one_slot_settings();
        settings.rankby = Attribute::Toughness;
        assert!(matches!(
            settings.prepare(),
            Err(SettingsError::UnsupportedObjective(Attribute::Toughness))
        ));
    }

    #[test]
    fn test_standard_layout_skips_forced_groups() {
        let rules = SymmetryRule::standard_layout(false, false, false, false);
        assert_eq!(rules.len(), 4);
        assert_eq!(rules[0].at, 6);
        assert_eq!(rules[0].compare, vec![(1, 3), (3, 5)]);

        let rules = SymmetryRule::standard_layout(true, false, true, false);
        assert_eq!(rules.iter().map(|r| r.at).collect::<Vec<_>>(), vec![9, 14]);
    }
}
