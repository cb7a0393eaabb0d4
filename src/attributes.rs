use std::fmt;
use std::ops::{AddAssign, Index, IndexMut};

use serde::de::{self, MapAccess, Visitor};
use serde::ser::SerializeMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

attribute_registry! {
    #[derive(Clone, Copy, PartialEq, Eq, Debug, Hash)]
    pub enum Attribute {
        point {
            pub Power, "Power";
            pub Precision, "Precision";
            pub Toughness, "Toughness";
            pub Vitality, "Vitality";
            pub Ferocity, "Ferocity";
            pub ConditionDamage, "Condition Damage";
            pub Expertise, "Expertise";
            pub Concentration, "Concentration";
            pub HealingPower, "Healing Power";
            pub AgonyResistance, "Agony Resistance";
        }
        derived {
            pub Health, "Health";
            pub Armor, "Armor";
            pub CriticalChance, "Critical Chance";
            pub CriticalDamage, "Critical Damage";
            pub ConditionDuration, "Condition Duration";
            pub BoonDuration, "Boon Duration";
            pub MaximumHealth, "Maximum Health";
            pub OutgoingHealing, "Outgoing Healing";

            pub BleedingCoefficient, "Bleeding Coefficient";
            pub BleedingDuration, "Bleeding Duration";
            pub BleedingDamage, "Bleeding Damage";
            pub BleedingStacks, "Bleeding Stacks";
            pub BleedingDps, "Bleeding DPS";
            pub BurningCoefficient, "Burning Coefficient";
            pub BurningDuration, "Burning Duration";
            pub BurningDamage, "Burning Damage";
            pub BurningStacks, "Burning Stacks";
            pub BurningDps, "Burning DPS";
            pub ConfusionCoefficient, "Confusion Coefficient";
            pub ConfusionDuration, "Confusion Duration";
            pub ConfusionDamage, "Confusion Damage";
            pub ConfusionStacks, "Confusion Stacks";
            pub ConfusionDps, "Confusion DPS";
            pub PoisonCoefficient, "Poison Coefficient";
            pub PoisonDuration, "Poison Duration";
            pub PoisonDamage, "Poison Damage";
            pub PoisonStacks, "Poison Stacks";
            pub PoisonDps, "Poison DPS";
            pub TormentCoefficient, "Torment Coefficient";
            pub TormentDuration, "Torment Duration";
            pub TormentDamage, "Torment Damage";
            pub TormentStacks, "Torment Stacks";
            pub TormentDps, "Torment DPS";

            pub PowerCoefficient, "Power Coefficient";
            pub NonCritPowerCoefficient, "NonCrit Power Coefficient";
            pub Power2Coefficient, "Power2 Coefficient";
            pub SiphonBaseCoefficient, "Siphon Base Coefficient";
            pub FlatDps, "Flat DPS";

            pub EffectivePower, "Effective Power";
            pub NonCritEffectivePower, "NonCrit Effective Power";
            pub PowerDps, "Power DPS";
            pub Power2Dps, "Power2 DPS";
            pub SiphonDps, "Siphon DPS";
            pub Damage, "Damage";

            pub EffectiveHealth, "Effective Health";
            pub Survivability, "Survivability";
            pub EffectiveHealing, "Effective Healing";
            pub Healing, "Healing";

            pub AltPower, "Alt Power";
            pub AltPrecision, "Alt Precision";
            pub AltFerocity, "Alt Ferocity";
            pub AltCriticalChance, "Alt Critical Chance";
            pub AltCriticalDamage, "Alt Critical Damage";
            pub AltEffectivePower, "Alt Effective Power";
            pub CloneCriticalChance, "Clone Critical Chance";
            pub PhantasmCriticalChance, "Phantasm Critical Chance";
            pub PhantasmCriticalDamage, "Phantasm Critical Damage";
            pub PhantasmEffectivePower, "Phantasm Effective Power";
        }
    }
}

/// Attributes shown as headline numbers on a finished result.
pub const INDICATORS: &[Attribute] = &[
    Attribute::Damage,
    Attribute::Survivability,
    Attribute::Healing,
];

/// Stat points granted by a single infusion.
pub const INFUSION_BONUS: f64 = 5.0;

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl Serialize for Attribute {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.name())
    }
}

impl<'de> Deserialize<'de> for Attribute {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Attribute, D::Error> {
        let name = String::deserialize(deserializer)?;
        Attribute::from_name(&name)
            .ok_or_else(|| de::Error::custom(format!("unknown attribute `{name}`")))
    }
}

/// Dense attribute storage. Every attribute the evaluation pipeline can touch
/// has a fixed index, so an absent stat simply reads as zero.
#[derive(Clone, Debug, PartialEq)]
pub struct Attributes([f64; Attribute::COUNT]);

impl Attributes {
    pub fn new() -> Attributes {
        Attributes([0.0; Attribute::COUNT])
    }

    pub fn from_pairs(pairs: &[(Attribute, f64)]) -> Attributes {
        let mut attributes = Attributes::new();
        for &(attribute, value) in pairs {
            attributes.set(attribute, value);
        }
        attributes
    }

    pub fn get(&self, attribute: Attribute) -> f64 {
        self.0[attribute as usize]
    }

    pub fn set(&mut self, attribute: Attribute, value: f64) {
        self.0[attribute as usize] = value;
    }

    pub fn add(&mut self, attribute: Attribute, value: f64) {
        self.0[attribute as usize] += value;
    }
}

impl Default for Attributes {
    fn default() -> Attributes {
        Attributes::new()
    }
}

impl Index<Attribute> for Attributes {
    type Output = f64;
    fn index(&self, attribute: Attribute) -> &f64 {
        &self.0[attribute as usize]
    }
}

impl IndexMut<Attribute> for Attributes {
    fn index_mut(&mut self, attribute: Attribute) -> &mut f64 {
        &mut self.0[attribute as usize]
    }
}

impl AddAssign<&Attributes> for Attributes {
    fn add_assign(&mut self, other: &Attributes) {
        for i in 0..Attribute::COUNT {
            self.0[i] += other.0[i];
        }
    }
}

impl Serialize for Attributes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let entries = Attribute::iter().filter(|&a| self.get(a) != 0.0);
        let mut map = serializer.serialize_map(None)?;
        for attribute in entries {
            map.serialize_entry(attribute.name(), &self.get(attribute))?;
        }
        map.end()
    }
}

impl<'de> Deserialize<'de> for Attributes {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Attributes, D::Error> {
        struct AttributesVisitor;

        impl<'de> Visitor<'de> for AttributesVisitor {
            type Value = Attributes;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str("a map from attribute names to numbers")
            }

            fn visit_map<A: MapAccess<'de>>(self, mut access: A) -> Result<Attributes, A::Error> {
                let mut attributes = Attributes::new();
                while let Some((attribute, value)) = access.next_entry::<Attribute, f64>()? {
                    attributes.set(attribute, value);
                }
                Ok(attributes)
            }
        }

        deserializer.deserialize_map(AttributesVisitor)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
pub enum Condition {
    Bleeding,
    Burning,
    Confusion,
    Poison,
    Torment,
}

impl Condition {
    pub const COUNT: usize = 5;

    pub fn iter() -> impl Iterator<Item = Condition> {
        [
            Condition::Bleeding,
            Condition::Burning,
            Condition::Confusion,
            Condition::Poison,
            Condition::Torment,
        ]
        .into_iter()
    }

    pub fn name(self) -> &'static str {
        match self {
            Condition::Bleeding => "Bleeding",
            Condition::Burning => "Burning",
            Condition::Confusion => "Confusion",
            Condition::Poison => "Poison",
            Condition::Torment => "Torment",
        }
    }

    /// `(base, factor)` of one damage tick: `base + factor * Condition Damage`.
    /// The `special` variant is the on-skill-use tick for confusion and the
    /// while-moving tick for torment; other conditions have a single form.
    pub fn tick_params(self, special: bool) -> (f64, f64) {
        match (self, special) {
            (Condition::Bleeding, _) => (22.0, 0.06),
            (Condition::Burning, _) => (131.0, 0.155),
            (Condition::Confusion, false) => (11.0, 0.03),
            (Condition::Confusion, true) => (49.5, 0.0975),
            (Condition::Poison, _) => (33.5, 0.06),
            (Condition::Torment, false) => (31.8, 0.09),
            (Condition::Torment, true) => (22.0, 0.06),
        }
    }

    pub fn coefficient_attribute(self) -> Attribute {
        match self {
            Condition::Bleeding => Attribute::BleedingCoefficient,
            Condition::Burning => Attribute::BurningCoefficient,
            Condition::Confusion => Attribute::ConfusionCoefficient,
            Condition::Poison => Attribute::PoisonCoefficient,
            Condition::Torment => Attribute::TormentCoefficient,
        }
    }

    pub fn duration_attribute(self) -> Attribute {
        match self {
            Condition::Bleeding => Attribute::BleedingDuration,
            Condition::Burning => Attribute::BurningDuration,
            Condition::Confusion => Attribute::ConfusionDuration,
            Condition::Poison => Attribute::PoisonDuration,
            Condition::Torment => Attribute::TormentDuration,
        }
    }

    pub fn damage_attribute(self) -> Attribute {
        match self {
            Condition::Bleeding => Attribute::BleedingDamage,
            Condition::Burning => Attribute::BurningDamage,
            Condition::Confusion => Attribute::ConfusionDamage,
            Condition::Poison => Attribute::PoisonDamage,
            Condition::Torment => Attribute::TormentDamage,
        }
    }

    pub fn stacks_attribute(self) -> Attribute {
        match self {
            Condition::Bleeding => Attribute::BleedingStacks,
            Condition::Burning => Attribute::BurningStacks,
            Condition::Confusion => Attribute::ConfusionStacks,
            Condition::Poison => Attribute::PoisonStacks,
            Condition::Torment => Attribute::TormentStacks,
        }
    }

    pub fn dps_attribute(self) -> Attribute {
        match self {
            Condition::Bleeding => Attribute::BleedingDps,
            Condition::Burning => Attribute::BurningDps,
            Condition::Confusion => Attribute::ConfusionDps,
            Condition::Poison => Attribute::PoisonDps,
            Condition::Torment => Attribute::TormentDps,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Debug, Default, Serialize, Deserialize)]
pub struct PerCondition<T> {
    pub bleeding: T,
    pub burning: T,
    pub confusion: T,
    pub poison: T,
    pub torment: T,
}

impl<T: Copy> PerCondition<T> {
    pub fn from_fn<F: FnMut(Condition) -> T>(mut f: F) -> PerCondition<T> {
        PerCondition {
            bleeding: f(Condition::Bleeding),
            burning: f(Condition::Burning),
            confusion: f(Condition::Confusion),
            poison: f(Condition::Poison),
            torment: f(Condition::Torment),
        }
    }
}

impl<T: Copy> From<T> for PerCondition<T> {
    fn from(x: T) -> PerCondition<T> {
        PerCondition::from_fn(|_| x)
    }
}

impl<T> Index<Condition> for PerCondition<T> {
    type Output = T;
    fn index(&self, condition: Condition) -> &T {
        match condition {
            Condition::Bleeding => &self.bleeding,
            Condition::Burning => &self.burning,
            Condition::Confusion => &self.confusion,
            Condition::Poison => &self.poison,
            Condition::Torment => &self.torment,
        }
    }
}

impl<T> IndexMut<Condition> for PerCondition<T> {
    fn index_mut(&mut self, condition: Condition) -> &mut T {
        match condition {
            Condition::Bleeding => &mut self.bleeding,
            Condition::Burning => &mut self.burning,
            Condition::Confusion => &mut self.confusion,
            Condition::Poison => &mut self.poison,
            Condition::Torment => &mut self.torment,
        }
    }
}

/// Round to the nearest integer, ties going to the even neighbor. Matches the
/// in-game rounding of converted stat points.
pub fn round_even(value: f64) -> f64 {
    let floor = value.floor();
    if value - floor == 0.5 {
        if (floor as i64) % 2 == 0 {
            floor
        } else {
            floor + 1.0
        }
    } else {
        value.round()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_even_ties() {
        assert_eq!(round_even(0.5), 0.0);
        assert_eq!(round_even(1.5), 2.0);
        assert_eq!(round_even(2.5), 2.0);
        assert_eq!(round_even(3.5), 4.0);
        assert_eq!(round_even(-2.5), -2.0);
    }

    #[test]
    fn test_round_even_plain() {
        assert_eq!(round_even(1.2), 1.0);
        assert_eq!(round_even(1.7), 2.0);
        assert_eq!(round_even(3.0), 3.0);
    }

    #[test]
    fn test_round_even_parity_is_magnitude_independent() {
        for k in 0..50 {
            let offset = 2.0 * k as f64;
            assert_eq!(round_even(0.5 + offset), offset);
            assert_eq!(round_even(1.5 + offset), 2.0 + offset);
        }
    }

    #[test]
    fn test_point_attributes_precede_derived() {
        assert!(Attribute::Power.is_point());
        assert!(Attribute::AgonyResistance.is_point());
        assert!(!Attribute::CriticalChance.is_point());
        assert!(!Attribute::Damage.is_point());
        assert_eq!(Attribute::POINT_COUNT, 10);
    }

    #[test]
    fn test_attribute_names_round_trip() {
        for attribute in Attribute::iter() {
            assert_eq!(Attribute::from_name(attribute.name()), Some(attribute));
        }
    }

    #[test]
    fn test_attributes_default_to_zero() {
        let attributes = Attributes::new();
        for attribute in Attribute::iter() {
            assert_eq!(attributes.get(attribute), 0.0);
        }
    }

    #[test]
    fn test_attributes_serialize_skips_zeroes() {
        let attributes = Attributes::from_pairs(&[(Attribute::Power, 1000.0)]);
        let json = serde_json::to_value(&attributes).unwrap();
        assert_eq!(json, serde_json::json!({ "Power": 1000.0 }));

        let parsed: Attributes = serde_json::from_value(json).unwrap();
        assert_eq!(parsed, attributes);
    }

    #[test]
    fn test_condition_attribute_families() {
        for condition in Condition::iter() {
            assert!(condition
                .dps_attribute()
                .name()
                .starts_with(condition.name()));
            assert!(!condition.coefficient_attribute().is_point());
        }
    }
}
