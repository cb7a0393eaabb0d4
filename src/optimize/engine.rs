use std::time::{Duration, Instant};

use rand::distributions::Alphanumeric;
use rand::Rng;
use tracing::{debug, trace};

use crate::attributes::Attributes;
use crate::character::{Character, CondiCache};
use crate::optimize::list::ResultList;
use crate::optimize::{Progress, Step};
use crate::results::calc_results;
use crate::settings::{Affix, MinimalSettings, Settings, SettingsError};

/// How often the yield clock is consulted, in loop iterations.
const CYCLES_PER_CLOCK_CHECK: u64 = 1000;
/// Minimum wall-clock time between progress reports.
const YIELD_INTERVAL: Duration = Duration::from_millis(90);

/// Exhaustive search over gear slot assignments. The search runs as an
/// explicit depth-first traversal over two aligned stacks so it can hand
/// control back to the driver between batches of work; the driver resumes by
/// calling `step` again or cancels by dropping the instance.
pub struct Optimizer {
    pub(crate) settings: Settings,
    minimal_settings: MinimalSettings,
    pub(crate) list: ResultList,
    pub(crate) condi_cache: CondiCache,
    /// Gear prefixes awaiting expansion, deepest on top.
    gear_stack: Vec<Vec<Affix>>,
    /// Accumulated affix stats, aligned with `gear_stack`.
    stats_stack: Vec<Attributes>,
    calculation_runs: u64,
    cycles: u64,
    timer: Instant,
    id_counter: u64,
    random_id: String,
    empty: bool,
    finished: bool,
}

impl Optimizer {
    pub fn new(
        mut settings: Settings,
        minimal_settings: MinimalSettings,
    ) -> Result<Optimizer, SettingsError> {
        let empty = settings.affixes.is_empty();
        if !empty {
            settings.prepare()?;
        }

        let random_id: String = rand::thread_rng()
            .sample_iter(&Alphanumeric)
            .take(6)
            .map(char::from)
            .collect();

        let (gear_stack, stats_stack) = if empty {
            (Vec::new(), Vec::new())
        } else {
            (
                vec![Vec::with_capacity(settings.slots)],
                vec![Attributes::new()],
            )
        };

        debug!(
            slots = settings.slots,
            affixes = settings.affixes.len(),
            total_combinations = settings.runs_after_this_slot.first().copied().unwrap_or(0),
            rankby = %settings.rankby,
            "starting gear search"
        );

        let list = ResultList::new(settings.max_results, settings.rankby);
        Ok(Optimizer {
            settings,
            minimal_settings,
            list,
            condi_cache: CondiCache::default(),
            gear_stack,
            stats_stack,
            calculation_runs: 0,
            cycles: 0,
            timer: Instant::now(),
            id_counter: 0,
            random_id,
            empty,
            finished: false,
        })
    }

    /// Runs the search until the next yield point. Returns `Step::Progress`
    /// when there is more work and `Step::Done` with the final report when
    /// the space is exhausted.
    pub fn step(&mut self) -> Step {
        if self.empty && !self.finished {
            self.finished = true;
            debug!("affix selection is empty, nothing to search");
            return Step::Done(Progress {
                is_changed: true,
                calculation_runs: 0,
                new_list: Some(Vec::new()),
            });
        }
        if self.finished {
            return Step::Done(Progress {
                is_changed: false,
                calculation_runs: self.calculation_runs,
                new_list: None,
            });
        }

        loop {
            self.cycles += 1;
            if self.cycles % CYCLES_PER_CLOCK_CHECK == 0 && self.timer.elapsed() >= YIELD_INTERVAL {
                let is_changed = self.list.is_changed();
                let progress = Progress {
                    is_changed,
                    calculation_runs: self.calculation_runs,
                    new_list: is_changed.then(|| self.list.characters().to_vec()),
                };
                self.list.reset_changed();
                self.timer = Instant::now();
                return Step::Progress(progress);
            }

            let Some(mut gear) = self.gear_stack.pop() else {
                break;
            };
            let mut stats = self
                .stats_stack
                .pop()
                .expect("gear and stats stacks stay aligned");
            let depth = gear.len();

            if self.should_prune(&gear) {
                self.calculation_runs += self.settings.runs_after_this_slot[depth];
                continue;
            }

            if depth == self.settings.slots {
                self.calculation_runs += 1;
                self.test_character(gear, stats);
                continue;
            }

            let options = &self.settings.affixes_array[depth];
            let bonuses = &self.settings.affix_stats_array[depth];
            for i in 1..options.len() {
                let mut next_gear = gear.clone();
                next_gear.push(options[i]);
                let mut next_stats = stats.clone();
                for &(attribute, bonus) in &bonuses[i] {
                    next_stats.add(attribute, bonus);
                }
                self.gear_stack.push(next_gear);
                self.stats_stack.push(next_stats);
            }
            // The first alternative reuses the popped arrays and goes on top,
            // so it is explored next.
            gear.push(options[0]);
            for &(attribute, bonus) in &bonuses[0] {
                stats.add(attribute, bonus);
            }
            self.gear_stack.push(gear);
            self.stats_stack.push(stats);
        }

        self.finished = true;
        debug!(
            calculation_runs = self.calculation_runs,
            results = self.list.len(),
            "gear search finished"
        );
        Step::Done(Progress {
            is_changed: true,
            calculation_runs: self.calculation_runs,
            new_list: Some(self.list.characters().to_vec()),
        })
    }

    /// Drives `step` to completion and returns the final report.
    pub fn run(&mut self) -> Progress {
        loop {
            if let Step::Done(progress) = self.step() {
                return progress;
            }
        }
    }

    /// A prefix whose interchangeable slots hold affixes out of canonical
    /// order is dropped; the ordered twin covers the same gear multiset.
    fn should_prune(&self, gear: &[Affix]) -> bool {
        let depth = gear.len();
        self.settings.symmetry.iter().any(|rule| {
            rule.at == depth && rule.compare.iter().any(|&(i, j)| gear[i] > gear[j])
        })
    }

    fn test_character(&mut self, gear: Vec<Affix>, gear_stats: Attributes) {
        let mut character = Character::with_gear(&self.settings, gear, gear_stats);
        self.apply_infusions(&mut character);
    }

    /// Admission path for an evaluated candidate: cheap rejection against the
    /// current bar, then the full evaluation and display payload, then the
    /// sorted insert.
    pub(crate) fn insert_character(&mut self, character: &mut Character) {
        if !character.valid {
            return;
        }
        let worst_score = self.list.worst_score();
        if worst_score > 0.0 && character.rank_score(&self.settings) < worst_score {
            return;
        }

        character.update_attributes(&self.settings, false);
        character.results = Some(calc_results(character, &self.settings));
        character.id = format!("{} ({})", self.id_counter, self.random_id);
        self.id_counter += 1;

        if self.list.insert(character.clone()) {
            trace!(
                id = %character.id,
                score = character.rank_score(&self.settings),
                "result accepted"
            );
        }
    }

    pub fn list(&self) -> &[Character] {
        self.list.characters()
    }

    pub fn into_list(self) -> Vec<Character> {
        self.list.into_characters()
    }

    pub fn calculation_runs(&self) -> u64 {
        self.calculation_runs
    }

    /// Size of the unpruned search space.
    pub fn total_combinations(&self) -> u64 {
        self.settings.runs_after_this_slot.first().copied().unwrap_or(0)
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    pub fn minimal_settings(&self) -> &MinimalSettings {
        &self.minimal_settings
    }
}
