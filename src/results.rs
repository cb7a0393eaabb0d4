use serde::Serialize;

use crate::attributes::{Attribute, Attributes, INDICATORS};
use crate::character::Character;
use crate::settings::{DamageKey, Settings};

/// Linear response of one damage source to its skill coefficient:
/// `dps(c) = slope * c + intercept`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct CoefficientDetails {
    pub slope: f64,
    pub intercept: f64,
}

/// Display payload computed for characters that made it into the result
/// list.
#[derive(Clone, Debug, Serialize)]
pub struct ResultProperties {
    /// The objective attribute's value.
    pub value: f64,
    pub indicators: Vec<(Attribute, String)>,
    /// Damage gained by adding five points of each offensive base stat.
    pub effective_positive_values: Vec<(Attribute, f64)>,
    /// Damage lost by removing five points of each offensive base stat.
    pub effective_negative_values: Vec<(Attribute, f64)>,
    pub effective_damage_distribution: Vec<(DamageKey, String)>,
    pub damage_breakdown: Vec<(DamageKey, String)>,
    pub coefficient_helper: Vec<(DamageKey, CoefficientDetails)>,
}

const SENSITIVITY_ATTRIBUTES: [Attribute; 5] = [
    Attribute::Power,
    Attribute::Precision,
    Attribute::Ferocity,
    Attribute::ConditionDamage,
    Attribute::Expertise,
];

pub fn calc_results(character: &Character, settings: &Settings) -> ResultProperties {
    let attributes = &character.attributes;
    let value = attributes.get(settings.rankby);

    let indicators = INDICATORS
        .iter()
        .map(|&attribute| (attribute, format_locale(attributes.get(attribute), 4)))
        .collect();

    let damage = attributes.get(Attribute::Damage);

    let mut effective_positive_values = Vec::with_capacity(SENSITIVITY_ATTRIBUTES.len());
    let mut effective_negative_values = Vec::with_capacity(SENSITIVITY_ATTRIBUTES.len());
    for attribute in SENSITIVITY_ATTRIBUTES {
        let mut raised = character.clone();
        raised.base_attributes.add(attribute, 5.0);
        raised.update_attributes(settings, true);
        effective_positive_values.push((
            attribute,
            round_dp(raised.attributes.get(Attribute::Damage) - damage, 5),
        ));

        let mut lowered = character.clone();
        let reduced = (lowered.base_attributes.get(attribute) - 5.0).max(0.0);
        lowered.base_attributes.set(attribute, reduced);
        lowered.update_attributes(settings, true);
        effective_negative_values.push((
            attribute,
            round_dp(lowered.attributes.get(Attribute::Damage) - damage, 5),
        ));
    }

    let mut effective_damage_distribution = Vec::with_capacity(settings.distribution.len());
    let mut damage_breakdown = Vec::with_capacity(settings.distribution.len());
    for &(key, _) in &settings.distribution {
        let dps = attributes.get(key.dps_attribute());
        effective_damage_distribution.push((key, format!("{:.1}%", dps / damage * 100.0)));
        damage_breakdown.push((key, format_locale(dps, 2)));
    }

    // Evaluate twice with every distribution coefficient forced to the same
    // value; per source, the two samples pin down the linear response.
    let eval_with_coefficients = |coefficient: f64| -> Attributes {
        let mut probe = character.clone();
        for &(key, _) in &settings.distribution {
            probe
                .base_attributes
                .set(key.coefficient_attribute(), coefficient);
        }
        probe.update_attributes(settings, true);
        probe.attributes
    };
    let at_zero = eval_with_coefficients(0.0);
    let at_one = eval_with_coefficients(1.0);
    let coefficient_helper = settings
        .distribution
        .iter()
        .map(|&(key, _)| {
            let dps_attribute = key.dps_attribute();
            let intercept = at_zero.get(dps_attribute);
            let slope = at_one.get(dps_attribute) - intercept;
            (key, CoefficientDetails { slope, intercept })
        })
        .collect();

    ResultProperties {
        value,
        indicators,
        effective_positive_values,
        effective_negative_values,
        effective_damage_distribution,
        damage_breakdown,
        coefficient_helper,
    }
}

pub(crate) fn round_dp(value: f64, decimals: i32) -> f64 {
    let scale = 10f64.powi(decimals);
    (value * scale).round() / scale
}

/// Formats with thousands separators and at most `max_decimals` fraction
/// digits, trailing zeros trimmed.
pub(crate) fn format_locale(value: f64, max_decimals: usize) -> String {
    let formatted = format!("{value:.max_decimals$}");
    let (int_part, frac_part) = match formatted.split_once('.') {
        Some((int_part, frac_part)) => (int_part, frac_part.trim_end_matches('0')),
        None => (formatted.as_str(), ""),
    };
    let (sign, digits) = match int_part.strip_prefix('-') {
        Some(digits) => ("-", digits),
        None => ("", int_part),
    };

    let mut out = String::with_capacity(formatted.len() + digits.len() / 3 + 1);
    out.push_str(sign);
    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(digit);
    }
    if !frac_part.is_empty() {
        out.push('.');
        out.push_str(frac_part);
    }
    out
}
