use crate::attributes::{Attribute, INFUSION_BONUS};
use crate::character::Character;
use crate::optimize::engine::Optimizer;
use crate::optimize::list::character_lt;
use crate::settings::InfusionMode;

fn add_infusions(character: &mut Character, attribute: Attribute, count: u32) {
    character.infusions.push((attribute, count));
    character
        .base_attributes
        .add(attribute, count as f64 * INFUSION_BONUS);
}

impl Optimizer {
    /// Applies the configured infusion strategy to a fully geared candidate,
    /// evaluating and inserting the resulting character(s).
    pub(crate) fn apply_infusions(&mut self, character: &mut Character) {
        match self.settings.infusion_mode {
            InfusionMode::None => {
                character.update_attributes_fast(&self.settings, false, &mut self.condi_cache);
                self.insert_character(character);
            }
            InfusionMode::Primary => {
                let primary = self
                    .settings
                    .primary_infusion
                    .expect("validated at construction");
                add_infusions(character, primary, self.settings.primary_max_infusions);
                character.update_attributes_fast(&self.settings, false, &mut self.condi_cache);
                self.insert_character(character);
            }
            InfusionMode::Few => {
                let primary = self
                    .settings
                    .primary_infusion
                    .expect("validated at construction");
                let secondary = self
                    .settings
                    .secondary_infusion
                    .expect("validated at construction");
                add_infusions(character, primary, self.settings.primary_max_infusions);
                add_infusions(character, secondary, self.settings.secondary_max_infusions);
                character.update_attributes_fast(&self.settings, false, &mut self.condi_cache);
                self.insert_character(character);
            }
            InfusionMode::Secondary => self.apply_infusions_secondary(character, false),
            InfusionMode::SecondaryNoDuplicates => self.apply_infusions_secondary(character, true),
        }
    }

    /// Walks every split of the infusion budget between the primary and
    /// secondary attribute, primary-heavy first. With `keep_best_only` a
    /// single winner is inserted, otherwise every distinct-scoring valid
    /// split is.
    fn apply_infusions_secondary(&mut self, character: &mut Character, keep_best_only: bool) {
        let primary = self
            .settings
            .primary_infusion
            .expect("validated at construction");
        let secondary = self
            .settings
            .secondary_infusion
            .expect("validated at construction");

        if self.list.worst_score() > 0.0 && !self.test_infusion_usefulness(character) {
            return;
        }

        let secondary_max = self.settings.secondary_max_infusions;
        let mut primary_count = self.settings.primary_max_infusions;
        let mut secondary_count = self.settings.max_infusions - primary_count;

        let mut previous_score: Option<f64> = None;
        let mut best: Option<Character> = None;
        while secondary_count <= secondary_max {
            let mut candidate = character.clone();
            add_infusions(&mut candidate, primary, primary_count);
            add_infusions(&mut candidate, secondary, secondary_count);

            if candidate.update_attributes_fast(&self.settings, false, &mut self.condi_cache) {
                if keep_best_only {
                    let better = best
                        .as_ref()
                        .map_or(true, |b| character_lt(b, &candidate, self.settings.rankby));
                    if better {
                        best = Some(candidate);
                    }
                } else {
                    let score = candidate.rank_score(&self.settings);
                    if previous_score != Some(score) {
                        self.insert_character(&mut candidate);
                        previous_score = Some(score);
                    }
                }
            }

            if primary_count == 0 {
                break;
            }
            primary_count -= 1;
            secondary_count += 1;
        }

        if let Some(mut best) = best {
            self.insert_character(&mut best);
        }
    }

    /// Cheap upper-bound check: even with the full infusion budget in both
    /// attributes at once, does the candidate beat the current bar?
    fn test_infusion_usefulness(&mut self, character: &Character) -> bool {
        let primary = self
            .settings
            .primary_infusion
            .expect("validated at construction");
        let secondary = self
            .settings
            .secondary_infusion
            .expect("validated at construction");

        let extra = self.settings.max_infusions as f64 * INFUSION_BONUS;
        let mut probe = character.clone();
        probe.base_attributes.add(primary, extra);
        probe.base_attributes.add(secondary, extra);
        probe.update_attributes_fast(&self.settings, true, &mut self.condi_cache);
        probe.rank_score(&self.settings) > self.list.worst_score()
    }
}
