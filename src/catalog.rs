//! Question catalog — categories and their fixed question lists.
//!
//! The catalog is loaded once at startup (built-in set or a JSON file) and
//! validated before any conversation can start: no empty catalog, no
//! category without questions, no question without options.

use std::path::Path;

use serde::Deserialize;

use crate::error::CatalogError;

/// One question: a prompt and the ordered labels the respondent picks from.
///
/// Option labels double as the persisted value.
#[derive(Debug, Clone, Deserialize)]
pub struct Question {
    pub prompt: String,
    pub options: Vec<String>,
}

/// A category: the branch a respondent selects, which fixes the question
/// list for the rest of the conversation.
#[derive(Debug, Clone, Deserialize)]
pub struct Category {
    /// Stable key carried in callback tokens.
    pub key: String,
    /// Human-readable button label.
    pub label: String,
    pub questions: Vec<Question>,
}

/// The full catalog. Category order is the order buttons are shown in.
#[derive(Debug, Clone, Deserialize)]
pub struct Catalog {
    categories: Vec<Category>,
}

impl Catalog {
    /// Build a catalog from pre-assembled categories and validate it.
    pub fn new(categories: Vec<Category>) -> Result<Self, CatalogError> {
        let catalog = Self { categories };
        catalog.validate()?;
        Ok(catalog)
    }

    /// Load and validate a catalog from a JSON file.
    pub fn from_path(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path)?;
        let catalog: Catalog = serde_json::from_str(&raw)?;
        catalog.validate()?;
        Ok(catalog)
    }

    /// The built-in survey shipped with the bot.
    pub fn builtin() -> Self {
        let raw = include_str!("catalog_default.json");
        let catalog: Catalog =
            serde_json::from_str(raw).expect("built-in catalog must parse");
        catalog
            .validate()
            .expect("built-in catalog must be valid");
        catalog
    }

    /// Reject catalogs a session could get stuck in.
    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.categories.is_empty() {
            return Err(CatalogError::Empty);
        }
        let mut seen = std::collections::HashSet::new();
        for category in &self.categories {
            if !seen.insert(category.key.as_str()) {
                return Err(CatalogError::DuplicateCategory(category.key.clone()));
            }
            if category.questions.is_empty() {
                return Err(CatalogError::EmptyCategory(category.key.clone()));
            }
            for (index, question) in category.questions.iter().enumerate() {
                if question.options.is_empty() {
                    return Err(CatalogError::NoOptions {
                        category: category.key.clone(),
                        index,
                    });
                }
            }
        }
        Ok(())
    }

    /// All categories, in display order.
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// The question list governing a category.
    ///
    /// `CategoryNotFound` here means the engine and the catalog disagree
    /// about which keys exist — fatal for that session, never retried.
    pub fn questions_for(&self, key: &str) -> Result<&[Question], CatalogError> {
        self.categories
            .iter()
            .find(|c| c.key == key)
            .map(|c| c.questions.as_slice())
            .ok_or_else(|| CatalogError::CategoryNotFound(key.to_string()))
    }

    pub fn contains(&self, key: &str) -> bool {
        self.categories.iter().any(|c| c.key == key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn question(prompt: &str, options: &[&str]) -> Question {
        Question {
            prompt: prompt.to_string(),
            options: options.iter().map(|s| s.to_string()).collect(),
        }
    }

    fn category(key: &str, questions: Vec<Question>) -> Category {
        Category {
            key: key.to_string(),
            label: key.to_string(),
            questions,
        }
    }

    // ── Validation ──────────────────────────────────────────────────

    #[test]
    fn builtin_catalog_is_valid() {
        let catalog = Catalog::builtin();
        assert!(!catalog.categories().is_empty());
        for cat in catalog.categories() {
            assert!(!cat.questions.is_empty(), "{} has no questions", cat.key);
        }
    }

    #[test]
    fn empty_catalog_rejected() {
        assert!(matches!(Catalog::new(vec![]), Err(CatalogError::Empty)));
    }

    #[test]
    fn category_without_questions_rejected() {
        let err = Catalog::new(vec![category("lonely", vec![])]).unwrap_err();
        assert!(matches!(err, CatalogError::EmptyCategory(key) if key == "lonely"));
    }

    #[test]
    fn question_without_options_rejected() {
        let err = Catalog::new(vec![category(
            "broken",
            vec![question("ok?", &["yes"]), question("and?", &[])],
        )])
        .unwrap_err();
        assert!(
            matches!(err, CatalogError::NoOptions { category, index } if category == "broken" && index == 1)
        );
    }

    #[test]
    fn duplicate_category_rejected() {
        let err = Catalog::new(vec![
            category("twice", vec![question("a?", &["x"])]),
            category("twice", vec![question("b?", &["y"])]),
        ])
        .unwrap_err();
        assert!(matches!(err, CatalogError::DuplicateCategory(key) if key == "twice"));
    }

    // ── Lookup ──────────────────────────────────────────────────────

    #[test]
    fn questions_for_finds_category() {
        let catalog = Catalog::new(vec![
            category("a", vec![question("one?", &["1"])]),
            category("b", vec![question("two?", &["2"]), question("three?", &["3"])]),
        ])
        .unwrap();

        assert_eq!(catalog.questions_for("b").unwrap().len(), 2);
        assert!(catalog.contains("a"));
        assert!(!catalog.contains("c"));
    }

    #[test]
    fn questions_for_unknown_category() {
        let catalog = Catalog::new(vec![category("a", vec![question("q?", &["o"])])]).unwrap();
        let err = catalog.questions_for("ghost").unwrap_err();
        assert!(matches!(err, CatalogError::CategoryNotFound(key) if key == "ghost"));
    }

    #[test]
    fn category_order_is_preserved() {
        let catalog = Catalog::new(vec![
            category("z", vec![question("q?", &["o"])]),
            category("a", vec![question("q?", &["o"])]),
            category("m", vec![question("q?", &["o"])]),
        ])
        .unwrap();
        let keys: Vec<_> = catalog.categories().iter().map(|c| c.key.as_str()).collect();
        assert_eq!(keys, ["z", "a", "m"]);
    }

    // ── File loading ────────────────────────────────────────────────

    #[test]
    fn from_path_loads_and_validates() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{
                "categories": [
                    {{
                        "key": "pets",
                        "label": "Pets 🐾",
                        "questions": [
                            {{"prompt": "Cats or dogs?", "options": ["Cats", "Dogs"]}}
                        ]
                    }}
                ]
            }}"#
        )
        .unwrap();

        let catalog = Catalog::from_path(file.path()).unwrap();
        assert_eq!(catalog.categories().len(), 1);
        assert_eq!(catalog.questions_for("pets").unwrap()[0].options[1], "Dogs");
    }

    #[test]
    fn from_path_rejects_invalid_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"categories": []}}"#).unwrap();
        assert!(matches!(
            Catalog::from_path(file.path()),
            Err(CatalogError::Empty)
        ));
    }

    #[test]
    fn from_path_missing_file() {
        let err = Catalog::from_path(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, CatalogError::Io(_)));
    }
}
