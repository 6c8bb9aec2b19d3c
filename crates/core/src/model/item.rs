use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ItemId;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ItemError {
    #[error("prompt must not be empty")]
    EmptyPrompt,

    #[error("multiple-choice items need at least two options, got {got}")]
    TooFewOptions { got: usize },

    #[error("correct index {index} is out of range for {options} options")]
    CorrectIndexOutOfRange { index: usize, options: usize },

    #[error("spoken-repetition items must not carry options")]
    UnexpectedOptions,
}

/// How an item is answered and graded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemKind {
    /// Pick one option; graded against `correct_index`.
    MultipleChoice,
    /// Repeat the prompted sentence aloud; graded against a transcript.
    SpokenRepetition,
}

/// One question/prompt plus its grading rule. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Item {
    id: ItemId,
    prompt: String,
    kind: ItemKind,
    options: Vec<String>,
    correct_index: usize,
    explanation: String,
    category: String,
}

impl Item {
    /// Build a multiple-choice item.
    ///
    /// # Errors
    ///
    /// Returns `ItemError` when the prompt is empty, fewer than two options
    /// are given, or `correct_index` does not address an option.
    pub fn multiple_choice(
        id: ItemId,
        prompt: impl Into<String>,
        options: Vec<String>,
        correct_index: usize,
        explanation: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Self, ItemError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(ItemError::EmptyPrompt);
        }
        if options.len() < 2 {
            return Err(ItemError::TooFewOptions { got: options.len() });
        }
        if correct_index >= options.len() {
            return Err(ItemError::CorrectIndexOutOfRange {
                index: correct_index,
                options: options.len(),
            });
        }
        Ok(Self {
            id,
            prompt,
            kind: ItemKind::MultipleChoice,
            options,
            correct_index,
            explanation: explanation.into(),
            category: category.into(),
        })
    }

    /// Build a spoken-repetition item. The options list is always empty.
    ///
    /// # Errors
    ///
    /// Returns `ItemError::EmptyPrompt` when the prompt is empty.
    pub fn spoken_repetition(
        id: ItemId,
        prompt: impl Into<String>,
        explanation: impl Into<String>,
        category: impl Into<String>,
    ) -> Result<Self, ItemError> {
        let prompt = prompt.into();
        if prompt.trim().is_empty() {
            return Err(ItemError::EmptyPrompt);
        }
        Ok(Self {
            id,
            prompt,
            kind: ItemKind::SpokenRepetition,
            options: Vec::new(),
            correct_index: 0,
            explanation: explanation.into(),
            category: category.into(),
        })
    }

    /// Rehydrate an item from persisted fields.
    ///
    /// # Errors
    ///
    /// Returns `ItemError` when the field combination violates the kind's
    /// shape (see the kind-specific constructors).
    pub fn from_persisted(
        id: ItemId,
        prompt: String,
        kind: ItemKind,
        options: Vec<String>,
        correct_index: usize,
        explanation: String,
        category: String,
    ) -> Result<Self, ItemError> {
        match kind {
            ItemKind::MultipleChoice => {
                Self::multiple_choice(id, prompt, options, correct_index, explanation, category)
            }
            ItemKind::SpokenRepetition => {
                if !options.is_empty() {
                    return Err(ItemError::UnexpectedOptions);
                }
                Self::spoken_repetition(id, prompt, explanation, category)
            }
        }
    }

    #[must_use]
    pub fn id(&self) -> ItemId {
        self.id
    }

    #[must_use]
    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    #[must_use]
    pub fn kind(&self) -> ItemKind {
        self.kind
    }

    #[must_use]
    pub fn options(&self) -> &[String] {
        &self.options
    }

    /// Index of the correct option. Meaningful for multiple-choice only.
    #[must_use]
    pub fn correct_index(&self) -> usize {
        self.correct_index
    }

    #[must_use]
    pub fn explanation(&self) -> &str {
        &self.explanation
    }

    #[must_use]
    pub fn category(&self) -> &str {
        &self.category
    }
}

/// Ordered, immutable sequence of items handed to a session.
///
/// Selection by topic/level happens outside the core; the bank is whatever
/// the caller resolved.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ItemBank {
    items: Vec<Item>,
}

impl ItemBank {
    #[must_use]
    pub fn new(items: Vec<Item>) -> Self {
        Self { items }
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Item> {
        self.items.get(index)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    #[must_use]
    pub fn items(&self) -> &[Item] {
        &self.items
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> Vec<String> {
        vec!["cat".into(), "dog".into(), "bird".into()]
    }

    #[test]
    fn multiple_choice_validates_correct_index() {
        let err = Item::multiple_choice(ItemId::new(1), "Pick one", options(), 3, "", "animals")
            .unwrap_err();
        assert_eq!(
            err,
            ItemError::CorrectIndexOutOfRange {
                index: 3,
                options: 3
            }
        );
    }

    #[test]
    fn multiple_choice_needs_two_options() {
        let err = Item::multiple_choice(
            ItemId::new(1),
            "Pick one",
            vec!["only".into()],
            0,
            "",
            "animals",
        )
        .unwrap_err();
        assert_eq!(err, ItemError::TooFewOptions { got: 1 });
    }

    #[test]
    fn spoken_repetition_has_no_options() {
        let item =
            Item::spoken_repetition(ItemId::new(2), "Repeat: I see a cat", "", "sentences").unwrap();
        assert!(item.options().is_empty());
        assert_eq!(item.kind(), ItemKind::SpokenRepetition);
    }

    #[test]
    fn from_persisted_rejects_options_on_spoken() {
        let err = Item::from_persisted(
            ItemId::new(3),
            "Repeat: hi".into(),
            ItemKind::SpokenRepetition,
            vec!["hi".into()],
            0,
            String::new(),
            String::new(),
        )
        .unwrap_err();
        assert_eq!(err, ItemError::UnexpectedOptions);
    }

    #[test]
    fn bank_indexing() {
        let bank = ItemBank::new(vec![
            Item::multiple_choice(ItemId::new(1), "Q1", options(), 0, "", "a").unwrap(),
            Item::spoken_repetition(ItemId::new(2), "Repeat: hello there", "", "b").unwrap(),
        ]);
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.get(1).unwrap().id(), ItemId::new(2));
        assert!(bank.get(2).is_none());
    }
}
