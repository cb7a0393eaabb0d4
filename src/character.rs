use std::collections::HashMap;

use serde::Serialize;

use crate::attributes::{round_even, Attribute, Attributes, Condition};
use crate::results::ResultProperties;
use crate::settings::{Affix, ConversionSource, Settings};

/// Standard target armor, the same value the in-game tooltips assume.
const TARGET_ARMOR: f64 = 2597.0;

/// Divisor turning effective health into the survivability indicator.
const SURVIVABILITY_SCALE: f64 = 1967.0;

/// Memoized condition damage scores keyed by the two stats the condition
/// loop depends on. Only the fast evaluation path reads or writes it; the
/// unrounded final pass always recomputes.
#[derive(Debug, Default)]
pub struct CondiCache {
    entries: HashMap<(u64, u64), f64>,
}

impl CondiCache {
    pub fn key(attributes: &Attributes) -> (u64, u64) {
        (
            attributes.get(Attribute::Expertise).round() as u64,
            attributes.get(Attribute::ConditionDamage).round() as u64,
        )
    }

    pub fn get(&self, key: (u64, u64)) -> Option<f64> {
        self.entries.get(&key).copied()
    }

    pub fn insert(&mut self, key: (u64, u64), score: f64) {
        self.entries.insert(key, score);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// One candidate gear assignment under evaluation. Owns its attribute
/// arrays; the settings are threaded through the evaluation calls instead of
/// being stored.
#[derive(Clone, Debug, Serialize)]
pub struct Character {
    pub id: String,
    pub gear: Vec<Affix>,
    /// Stat bonuses accumulated from the chosen affixes alone.
    pub gear_stats: Attributes,
    /// Settings base plus gear stats plus any infusions.
    pub base_attributes: Attributes,
    /// Filled by `calc_stats`; garbage until then.
    pub attributes: Attributes,
    pub valid: bool,
    pub infusions: Vec<(Attribute, u32)>,
    pub results: Option<ResultProperties>,
}

impl Character {
    pub fn with_gear(settings: &Settings, gear: Vec<Affix>, gear_stats: Attributes) -> Character {
        let mut base_attributes = settings.base_attributes.clone();
        base_attributes += &gear_stats;
        Character {
            id: String::new(),
            gear,
            gear_stats,
            base_attributes,
            attributes: Attributes::new(),
            valid: true,
            infusions: Vec::new(),
            results: None,
        }
    }

    pub fn rank_score(&self, settings: &Settings) -> f64 {
        self.attributes.get(settings.rankby)
    }

    /// Derives the full attribute set from the base attributes: conversions,
    /// buffs, derived stats, then post-buff conversions. Point attributes
    /// written by conversions are rounded half-to-even unless `no_rounding`.
    pub fn calc_stats(&mut self, settings: &Settings, no_rounding: bool) {
        self.attributes = self.base_attributes.clone();

        let round = |value: f64| if no_rounding { value } else { round_even(value) };

        let modifiers = &settings.modifiers;
        for (target, sources) in &modifiers.convert {
            for &(source, percent) in sources {
                let mut delta = self.base_attributes.get(source) * percent;
                if target.is_point() {
                    delta = round(delta);
                }
                self.attributes.add(*target, delta);
            }
        }

        for &(attribute, bonus) in &modifiers.buff {
            self.attributes.add(attribute, bonus);
        }

        let attributes = &mut self.attributes;
        attributes.add(
            Attribute::CriticalChance,
            (attributes.get(Attribute::Precision) - 1000.0) / 2100.0,
        );
        attributes.add(
            Attribute::CriticalDamage,
            attributes.get(Attribute::Ferocity) / 1500.0,
        );
        attributes.add(
            Attribute::BoonDuration,
            attributes.get(Attribute::Concentration) / 1500.0,
        );
        attributes.set(
            Attribute::Health,
            round(
                (attributes.get(Attribute::Health) + attributes.get(Attribute::Vitality) * 10.0)
                    * (1.0 + attributes.get(Attribute::MaximumHealth)),
            ),
        );

        // A second strike damage source scales either with the phantasm
        // stats (mesmers) or with the alternate attribute set.
        if settings.profession == "Mesmer" {
            attributes.add(
                Attribute::CloneCriticalChance,
                (attributes.get(Attribute::Precision) - 1000.0) / 2100.0,
            );
            attributes.add(
                Attribute::PhantasmCriticalChance,
                (attributes.get(Attribute::Precision) - 1000.0) / 2100.0,
            );
            attributes.add(
                Attribute::PhantasmCriticalDamage,
                attributes.get(Attribute::Ferocity) / 1500.0,
            );
        } else if attributes.get(Attribute::Power2Coefficient) > 0.0 {
            attributes.add(Attribute::AltPower, attributes.get(Attribute::Power));
            attributes.add(
                Attribute::AltCriticalChance,
                attributes.get(Attribute::CriticalChance)
                    + attributes.get(Attribute::AltPrecision) / 2100.0,
            );
            attributes.add(
                Attribute::AltCriticalDamage,
                attributes.get(Attribute::CriticalDamage)
                    + attributes.get(Attribute::AltFerocity) / 1500.0,
            );
        }

        for (target, sources) in &modifiers.convert_after_buffs {
            for &(source, percent) in sources {
                let value = match source {
                    ConversionSource::ClampedCritChance { offset } => {
                        (attributes.get(Attribute::CriticalChance) - offset).clamp(0.0, 1.0)
                    }
                    ConversionSource::Attribute(
                        attribute @ (Attribute::CloneCriticalChance
                        | Attribute::PhantasmCriticalChance),
                    ) => attributes.get(attribute).clamp(0.0, 1.0),
                    ConversionSource::Attribute(attribute) => attributes.get(attribute),
                };
                let mut delta = value * percent;
                if target.is_point() {
                    delta = round(delta);
                }
                attributes.add(*target, delta);
            }
        }
    }

    /// Marks the character invalid and reports it when any configured bound
    /// is violated. All comparisons are strict.
    pub fn is_invalid(&mut self, settings: &Settings) -> bool {
        let attributes = &self.attributes;
        let violated = settings
            .min_boon_duration
            .is_some_and(|min| attributes.get(Attribute::BoonDuration) < min / 100.0)
            || settings
                .min_healing_power
                .is_some_and(|min| attributes.get(Attribute::HealingPower) < min)
            || settings
                .min_toughness
                .is_some_and(|min| attributes.get(Attribute::Toughness) < min)
            || settings
                .max_toughness
                .is_some_and(|max| attributes.get(Attribute::Toughness) > max)
            || settings
                .min_health
                .is_some_and(|min| attributes.get(Attribute::Health) < min)
            || settings
                .min_crit_chance
                .is_some_and(|min| attributes.get(Attribute::CriticalChance) < min / 100.0);
        if violated {
            self.valid = false;
        }
        violated
    }

    pub fn calc_power(&mut self, settings: &Settings) -> f64 {
        let multipliers = &settings.modifiers.damage_multiplier;
        let attributes = &mut self.attributes;

        let crit_damage =
            attributes.get(Attribute::CriticalDamage) * multipliers.outgoing_critical_damage;
        let crit_chance = attributes.get(Attribute::CriticalChance).clamp(0.0, 1.0);

        attributes.set(
            Attribute::EffectivePower,
            attributes.get(Attribute::Power)
                * (1.0 + crit_chance * (crit_damage - 1.0))
                * multipliers.outgoing_strike_damage,
        );
        attributes.set(
            Attribute::NonCritEffectivePower,
            attributes.get(Attribute::Power) * multipliers.outgoing_strike_damage,
        );

        let mut power_damage = attributes.get(Attribute::PowerCoefficient) / TARGET_ARMOR
            * attributes.get(Attribute::EffectivePower)
            + attributes.get(Attribute::NonCritPowerCoefficient) / TARGET_ARMOR
                * attributes.get(Attribute::NonCritEffectivePower);
        attributes.set(Attribute::PowerDps, power_damage);

        if attributes.get(Attribute::Power2Coefficient) > 0.0 {
            let second_damage = if settings.profession == "Mesmer" {
                let crit_damage = attributes.get(Attribute::PhantasmCriticalDamage)
                    * multipliers.outgoing_phantasm_critical_damage;
                let crit_chance = attributes
                    .get(Attribute::PhantasmCriticalChance)
                    .clamp(0.0, 1.0);
                attributes.set(
                    Attribute::PhantasmEffectivePower,
                    attributes.get(Attribute::Power)
                        * (1.0 + crit_chance * (crit_damage - 1.0))
                        * multipliers.outgoing_phantasm_damage,
                );
                attributes.get(Attribute::Power2Coefficient) / TARGET_ARMOR
                    * attributes.get(Attribute::PhantasmEffectivePower)
            } else {
                let crit_damage = attributes.get(Attribute::AltCriticalDamage)
                    * multipliers.outgoing_alt_critical_damage;
                let crit_chance = attributes.get(Attribute::AltCriticalChance).clamp(0.0, 1.0);
                attributes.set(
                    Attribute::AltEffectivePower,
                    attributes.get(Attribute::AltPower)
                        * (1.0 + crit_chance * (crit_damage - 1.0))
                        * multipliers.outgoing_strike_damage
                        * multipliers.outgoing_alt_damage,
                );
                attributes.get(Attribute::Power2Coefficient) / TARGET_ARMOR
                    * attributes.get(Attribute::AltEffectivePower)
            };
            attributes.set(Attribute::Power2Dps, second_damage);
            power_damage += second_damage;
        } else {
            attributes.set(Attribute::Power2Dps, 0.0);
        }

        let siphon_damage = attributes.get(Attribute::SiphonBaseCoefficient)
            * multipliers.outgoing_siphon_damage;
        attributes.set(Attribute::SiphonDps, siphon_damage);

        power_damage + siphon_damage
    }

    pub fn calc_condi(&mut self, settings: &Settings, conditions: &[Condition]) -> f64 {
        let multipliers = &settings.modifiers.damage_multiplier;
        let attributes = &mut self.attributes;

        attributes.add(
            Attribute::ConditionDuration,
            attributes.get(Attribute::Expertise) / 1500.0,
        );

        let mut condi_score = 0.0;
        for &condition in conditions {
            let condition_damage = attributes.get(Attribute::ConditionDamage);
            let mult =
                multipliers.outgoing_condition_damage * multipliers.condition[condition];
            let tick = |special: bool| {
                let (base, factor) = condition.tick_params(special);
                (factor * condition_damage + base) * mult
            };

            let damage = match condition {
                Condition::Torment => {
                    tick(false) * (1.0 - settings.movement_uptime)
                        + tick(true) * settings.movement_uptime
                }
                Condition::Confusion => tick(false) + tick(true) * settings.attack_rate,
                _ => tick(false),
            };
            attributes.set(condition.damage_attribute(), damage);

            let duration = 1.0
                + (attributes.get(condition.duration_attribute())
                    + attributes.get(Attribute::ConditionDuration))
                .clamp(0.0, 1.0);

            let stacks = attributes.get(condition.coefficient_attribute()) * duration;
            attributes.set(condition.stacks_attribute(), stacks);

            let dps = stacks * damage;
            attributes.set(condition.dps_attribute(), dps);
            condi_score += dps;
        }
        condi_score
    }

    pub fn calc_survivability(&mut self, settings: &Settings) {
        let multipliers = &settings.modifiers.damage_multiplier;
        let attributes = &mut self.attributes;

        attributes.add(Attribute::Armor, attributes.get(Attribute::Toughness));
        attributes.set(
            Attribute::EffectiveHealth,
            attributes.get(Attribute::Health) * attributes.get(Attribute::Armor)
                / multipliers.incoming_strike_damage,
        );
        attributes.set(
            Attribute::Survivability,
            attributes.get(Attribute::EffectiveHealth) / SURVIVABILITY_SCALE,
        );
    }

    pub fn calc_healing(&mut self, settings: &Settings) {
        let attributes = &mut self.attributes;

        // Representative healing skill: 390 base, 0.3 coefficient.
        let mut effective_healing = (attributes.get(Attribute::HealingPower) * 0.3 + 390.0)
            * (1.0 + attributes.get(Attribute::OutgoingHealing));
        if settings.modifiers.bountiful_maintenance_oil {
            let bonus = (attributes.get(Attribute::HealingPower) * 0.6
                + attributes.get(Attribute::Concentration) * 0.8)
                / 10000.0;
            effective_healing *= 1.0 + bonus;
        }
        attributes.set(Attribute::EffectiveHealing, effective_healing);
        attributes.set(Attribute::Healing, effective_healing);
    }

    /// Full evaluation: all four score families, every intermediate stored.
    /// Returns false when the character fails a constraint.
    pub fn update_attributes(&mut self, settings: &Settings, no_rounding: bool) -> bool {
        self.calc_stats(settings, no_rounding);
        if self.is_invalid(settings) {
            return false;
        }

        let power_score = self.calc_power(settings);
        let condi_score = self.calc_condi(settings, &settings.relevant_conditions);
        self.attributes.set(
            Attribute::Damage,
            power_score + condi_score + self.attributes.get(Attribute::FlatDps),
        );

        self.calc_survivability(settings);
        self.calc_healing(settings);
        true
    }

    /// Hot-loop evaluation: computes only what the ranking objective needs,
    /// consulting the condition damage cache where possible.
    pub fn update_attributes_fast(
        &mut self,
        settings: &Settings,
        skip_validation: bool,
        cache: &mut CondiCache,
    ) -> bool {
        self.calc_stats(settings, false);
        if !skip_validation && self.is_invalid(settings) {
            return false;
        }

        match settings.rankby {
            Attribute::Damage => {
                let power_score = self.calc_power(settings);
                let condi_score = if settings.relevant_conditions.is_empty() {
                    0.0
                } else if settings.disable_condi_result_cache {
                    self.calc_condi(settings, &settings.relevant_conditions)
                } else {
                    let key = CondiCache::key(&self.attributes);
                    match cache.get(key) {
                        Some(score) => score,
                        None => {
                            let score = self.calc_condi(settings, &settings.relevant_conditions);
                            cache.insert(key, score);
                            score
                        }
                    }
                };
                self.attributes.set(
                    Attribute::Damage,
                    power_score + condi_score + self.attributes.get(Attribute::FlatDps),
                );
            }
            Attribute::Survivability => self.calc_survivability(settings),
            Attribute::Healing => self.calc_healing(settings),
            other => unreachable!("objective {other:?} is rejected at construction"),
        }
        true
    }
}
