//! Word detective: the child taps the word in a sentence that plays a given role.

use crate::domain::WordDetectiveItem;

const STRIPPED: &[char] = &['.', ',', '!', '?', ';', ':', '"', '\''];

/// Drop surrounding punctuation marks and lowercase.
pub fn clean_word(word: &str) -> String {
  word.chars().filter(|c| !STRIPPED.contains(c)).collect::<String>().to_lowercase()
}

pub fn is_target(item: &WordDetectiveItem, picked: &str) -> bool {
  clean_word(picked) == item.target_word.to_lowercase()
}
