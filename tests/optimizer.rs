//! End-to-end tests of the search engine: seed scenarios, symmetry pruning,
//! infusion strategies and the progress protocol, all through the public API.

use std::collections::BTreeSet;

use affix_opt::{
    character_lt, Affix, Attribute, Attributes, InfusionMode, MinimalSettings, Optimizer, Settings,
    SettingsError, Step, SymmetryRule,
};

/// Base attributes of a plain power build with no crit: one point of power
/// coefficient per point of power.
fn power_base() -> Attributes {
    Attributes::from_pairs(&[
        (Attribute::Power, 1000.0),
        (Attribute::Precision, 1000.0),
        (Attribute::CriticalDamage, 1.5),
        (Attribute::PowerCoefficient, 2597.0),
    ])
}

/// Two-affix stat tables: affix 0 grants pure power, affix 1 a power and
/// precision split.
fn two_affix_tables(slots: usize) -> (Vec<Vec<Affix>>, Vec<Vec<Vec<(Attribute, f64)>>>) {
    let affixes = vec![Affix(0), Affix(1)];
    let stats = vec![
        vec![(Attribute::Power, 100.0)],
        vec![(Attribute::Power, 50.0), (Attribute::Precision, 50.0)],
    ];
    (
        vec![affixes; slots],
        vec![stats; slots],
    )
}

fn run_to_completion(settings: Settings) -> (Vec<affix_opt::Character>, u64) {
    let mut optimizer = Optimizer::new(settings, MinimalSettings::default()).unwrap();
    let progress = optimizer.run();
    assert!(progress.is_changed);
    (progress.new_list.unwrap(), progress.calculation_runs)
}

#[test]
fn test_empty_affix_selection_terminates_immediately() {
    let settings = Settings {
        slots: 3,
        affixes: Vec::new(),
        ..Settings::default()
    };
    let mut optimizer = Optimizer::new(settings, MinimalSettings::default()).unwrap();

    match optimizer.step() {
        Step::Done(progress) => {
            assert!(progress.is_changed);
            assert_eq!(progress.calculation_runs, 0);
            let list = progress.new_list.expect("terminal report carries the list");
            assert!(list.is_empty());
        }
        Step::Progress(_) => panic!("expected immediate completion"),
    }
}

#[test]
fn test_single_slot_single_affix() {
    let settings = Settings {
        slots: 1,
        affixes: vec![Affix(0)],
        affixes_array: vec![vec![Affix(0)]],
        affix_stats_array: vec![vec![vec![(Attribute::Power, 100.0)]]],
        base_attributes: Attributes::from_pairs(&[
            (Attribute::Power, 1000.0),
            (Attribute::Precision, 1000.0),
            (Attribute::PowerCoefficient, 2597.0),
        ]),
        ..Settings::default()
    };
    let (list, runs) = run_to_completion(settings);

    assert_eq!(runs, 1);
    assert_eq!(list.len(), 1);
    let character = &list[0];
    assert_eq!(character.gear, vec![Affix(0)]);
    assert_eq!(character.attributes.get(Attribute::Power), 1100.0);
    assert_eq!(character.attributes.get(Attribute::EffectivePower), 1100.0);
    assert_eq!(character.attributes.get(Attribute::PowerDps), 1100.0);
    assert_eq!(character.attributes.get(Attribute::Damage), 1100.0);
    assert!(character.valid);
    assert!(character.results.is_some());
    assert!(character.id.starts_with("0 ("));
}

#[test]
fn test_symmetry_pruning_skips_unordered_twins() {
    let (affixes_array, affix_stats_array) = two_affix_tables(2);
    let settings = Settings {
        slots: 2,
        affixes: vec![Affix(0), Affix(1)],
        affixes_array,
        affix_stats_array,
        base_attributes: power_base(),
        symmetry: vec![SymmetryRule { at: 2, compare: vec![(0, 1)] }],
        ..Settings::default()
    };
    let (list, runs) = run_to_completion(settings);

    // Four raw leaves; the out-of-order (B, A) twin is skipped but still
    // counted as one estimated run.
    assert_eq!(runs, 4);
    assert_eq!(list.len(), 3);
    let gears: BTreeSet<Vec<Affix>> = list.iter().map(|c| c.gear.clone()).collect();
    assert!(gears.contains(&vec![Affix(0), Affix(0)]));
    assert!(gears.contains(&vec![Affix(0), Affix(1)]));
    assert!(gears.contains(&vec![Affix(1), Affix(1)]));
}

#[test]
fn test_symmetry_pruning_preserves_gear_multisets() {
    let multisets = |symmetric: bool| -> BTreeSet<Vec<Affix>> {
        let (affixes_array, affix_stats_array) = two_affix_tables(2);
        let settings = Settings {
            slots: 2,
            affixes: vec![Affix(0), Affix(1)],
            affixes_array,
            affix_stats_array,
            base_attributes: power_base(),
            symmetry: if symmetric {
                vec![SymmetryRule { at: 2, compare: vec![(0, 1)] }]
            } else {
                Vec::new()
            },
            ..Settings::default()
        };
        let (list, _) = run_to_completion(settings);
        list.iter()
            .map(|c| {
                let mut gear = c.gear.clone();
                gear.sort();
                gear
            })
            .collect()
    };

    assert_eq!(multisets(true), multisets(false));
}

#[test]
fn test_affix_order_does_not_change_the_outcome() {
    let run = |flip: bool| {
        let mut affixes = vec![Affix(0), Affix(1)];
        let mut stats = vec![
            vec![(Attribute::Power, 100.0)],
            vec![(Attribute::Power, 50.0), (Attribute::Precision, 50.0)],
        ];
        if flip {
            affixes.reverse();
            stats.reverse();
        }
        let settings = Settings {
            slots: 2,
            affixes: affixes.clone(),
            affixes_array: vec![affixes; 2],
            affix_stats_array: vec![stats; 2],
            base_attributes: power_base(),
            ..Settings::default()
        };
        run_to_completion(settings).0
    };

    let straight = run(false);
    let flipped = run(true);

    let scores = |list: &[affix_opt::Character]| -> Vec<f64> {
        list.iter()
            .map(|c| c.attributes.get(Attribute::Damage))
            .collect()
    };
    assert_eq!(scores(&straight), scores(&flipped));

    let multisets = |list: &[affix_opt::Character]| -> BTreeSet<Vec<Affix>> {
        list.iter()
            .map(|c| {
                let mut gear = c.gear.clone();
                gear.sort();
                gear
            })
            .collect()
    };
    assert_eq!(multisets(&straight), multisets(&flipped));
}

#[test]
fn test_final_list_is_sorted_and_bounded() {
    let (affixes_array, affix_stats_array) = two_affix_tables(4);
    let settings = Settings {
        slots: 4,
        affixes: vec![Affix(0), Affix(1)],
        affixes_array,
        affix_stats_array,
        base_attributes: power_base(),
        max_results: 5,
        ..Settings::default()
    };
    let (list, runs) = run_to_completion(settings);

    assert_eq!(runs, 16);
    assert_eq!(list.len(), 5);
    for pair in list.windows(2) {
        assert!(!character_lt(&pair[0], &pair[1], Attribute::Damage));
    }
}

fn secondary_infusion_settings(mode: InfusionMode) -> Settings {
    Settings {
        slots: 1,
        affixes: vec![Affix(0)],
        affixes_array: vec![vec![Affix(0)]],
        affix_stats_array: vec![vec![vec![]]],
        base_attributes: power_base(),
        infusion_mode: mode,
        primary_infusion: Some(Attribute::Power),
        secondary_infusion: Some(Attribute::Precision),
        max_infusions: 18,
        primary_max_infusions: 18,
        secondary_max_infusions: 18,
        ..Settings::default()
    }
}

#[test]
fn test_secondary_infusions_insert_every_distinct_split() {
    let (list, _) = run_to_completion(secondary_infusion_settings(InfusionMode::Secondary));

    // Nineteen splits of eighteen infusions, every score distinct.
    assert_eq!(list.len(), 19);
    for character in &list {
        let total: u32 = character.infusions.iter().map(|&(_, count)| count).sum();
        assert_eq!(total, 18);
    }
    // The all-primary split wins: 1090 power, no crit chance gained.
    assert_eq!(list[0].attributes.get(Attribute::Damage), 1090.0);
    assert_eq!(list[0].infusions, vec![(Attribute::Power, 18), (Attribute::Precision, 0)]);
}

#[test]
fn test_secondary_no_duplicates_inserts_only_the_best_split() {
    let (list, _) =
        run_to_completion(secondary_infusion_settings(InfusionMode::SecondaryNoDuplicates));

    assert_eq!(list.len(), 1);
    assert_eq!(list[0].attributes.get(Attribute::Damage), 1090.0);
    assert_eq!(list[0].infusions, vec![(Attribute::Power, 18), (Attribute::Precision, 0)]);
}

#[test]
fn test_primary_and_few_infusion_modes() {
    let mut settings = secondary_infusion_settings(InfusionMode::Primary);
    settings.primary_max_infusions = 10;
    let (list, _) = run_to_completion(settings);
    assert_eq!(list.len(), 1);
    assert_eq!(list[0].infusions, vec![(Attribute::Power, 10)]);
    assert_eq!(list[0].attributes.get(Attribute::Power), 1050.0);

    let mut settings = secondary_infusion_settings(InfusionMode::Few);
    settings.primary_max_infusions = 10;
    settings.secondary_max_infusions = 8;
    let (list, _) = run_to_completion(settings);
    assert_eq!(list.len(), 1);
    assert_eq!(
        list[0].infusions,
        vec![(Attribute::Power, 10), (Attribute::Precision, 8)]
    );
    assert_eq!(list[0].attributes.get(Attribute::Power), 1050.0);
    assert_eq!(list[0].attributes.get(Attribute::Precision), 1040.0);
}

#[test]
fn test_accepted_characters_reevaluate_identically() {
    let (affixes_array, affix_stats_array) = two_affix_tables(3);
    let settings = Settings {
        slots: 3,
        affixes: vec![Affix(0), Affix(1)],
        affixes_array,
        affix_stats_array,
        base_attributes: power_base(),
        ..Settings::default()
    };
    let mut optimizer = Optimizer::new(settings.clone(), MinimalSettings::default()).unwrap();
    optimizer.run();

    let mut prepared = settings;
    prepared.prepare().unwrap();
    for character in optimizer.list() {
        let mut again = character.clone();
        again.update_attributes(&prepared, false);
        assert_eq!(
            again.attributes.get(Attribute::Damage),
            character.attributes.get(Attribute::Damage),
            "re-evaluation must be bit-identical"
        );
    }
}

#[test]
fn test_constraint_violations_never_reach_the_list() {
    let (affixes_array, affix_stats_array) = two_affix_tables(2);
    let settings = Settings {
        slots: 2,
        affixes: vec![Affix(0), Affix(1)],
        affixes_array,
        affix_stats_array,
        base_attributes: power_base(),
        // Only gear with at least 50 precision from affixes passes.
        min_crit_chance: Some(2.0),
        ..Settings::default()
    };
    let (list, runs) = run_to_completion(settings);

    assert_eq!(runs, 4);
    assert_eq!(list.len(), 3);
    for character in &list {
        assert!(character.valid);
        assert!(character.attributes.get(Attribute::CriticalChance) >= 0.02);
    }
}

#[test]
fn test_construction_rejects_broken_layout() {
    let settings = Settings {
        slots: 2,
        affixes: vec![Affix(0)],
        affixes_array: vec![vec![Affix(0)]],
        affix_stats_array: vec![vec![vec![]]],
        ..Settings::default()
    };
    match Optimizer::new(settings, MinimalSettings::default()).map(|_| ()) {
        Err(SettingsError::SlotMismatch { slots: 2, .. }) => {}
        Ok(()) => panic!("expected a slot mismatch"),
        Err(other) => panic!("expected a slot mismatch, got {other}"),
    }
}

#[test]
fn test_step_after_done_stays_done() {
    let settings = Settings {
        slots: 1,
        affixes: vec![Affix(0)],
        affixes_array: vec![vec![Affix(0)]],
        affix_stats_array: vec![vec![vec![(Attribute::Power, 100.0)]]],
        base_attributes: power_base(),
        ..Settings::default()
    };
    let mut optimizer = Optimizer::new(settings, MinimalSettings::default()).unwrap();
    optimizer.run();

    match optimizer.step() {
        Step::Done(progress) => {
            assert!(!progress.is_changed);
            assert!(progress.new_list.is_none());
        }
        Step::Progress(_) => panic!("a finished search must stay finished"),
    }
}
