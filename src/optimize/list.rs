use crate::attributes::Attribute;
use crate::character::Character;

/// Returns true when `b` strictly outranks `a` under the given objective.
/// Damage ranking breaks ties by survivability, the defensive objectives
/// break ties by damage.
pub fn character_lt(a: &Character, b: &Character, rankby: Attribute) -> bool {
    let score_a = a.attributes.get(rankby);
    let score_b = b.attributes.get(rankby);
    if score_a == score_b {
        let tiebreak = match rankby {
            Attribute::Damage => Attribute::Survivability,
            _ => Attribute::Damage,
        };
        return a.attributes.get(tiebreak) < b.attributes.get(tiebreak);
    }
    score_a < score_b
}

/// Bounded list of the best characters seen so far, sorted best first. Once
/// full, the score of the last entry is the bar a newcomer has to clear.
#[derive(Debug)]
pub struct ResultList {
    max_results: usize,
    rankby: Attribute,
    characters: Vec<Character>,
    worst_score: f64,
    is_changed: bool,
}

impl ResultList {
    pub fn new(max_results: usize, rankby: Attribute) -> ResultList {
        ResultList {
            max_results,
            rankby,
            characters: Vec::with_capacity(max_results),
            worst_score: 0.0,
            is_changed: false,
        }
    }

    /// Inserts keeping the list sorted; equal entries keep their arrival
    /// order. Returns false when the candidate lands past the capacity.
    pub fn insert(&mut self, character: Character) -> bool {
        let mut position = self.characters.len();
        while position > 0 && character_lt(&self.characters[position - 1], &character, self.rankby)
        {
            position -= 1;
        }
        if position >= self.max_results {
            return false;
        }

        self.characters.insert(position, character);
        self.characters.truncate(self.max_results);
        if self.characters.len() == self.max_results {
            self.worst_score = self.characters[self.max_results - 1]
                .attributes
                .get(self.rankby);
        }
        self.is_changed = true;
        true
    }

    pub fn worst_score(&self) -> f64 {
        self.worst_score
    }

    pub fn is_changed(&self) -> bool {
        self.is_changed
    }

    pub(crate) fn reset_changed(&mut self) {
        self.is_changed = false;
    }

    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn into_characters(self) -> Vec<Character> {
        self.characters
    }

    pub fn len(&self) -> usize {
        self.characters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.characters.is_empty()
    }
}
