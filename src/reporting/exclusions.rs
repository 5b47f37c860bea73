use std::collections::BTreeSet;

use crate::domain::order::normalize_product_name;

/// Demo, test and retired catalog entries that stay out of the product reports.
const CATALOG_EXCLUSIONS: &[&str] = &[
    "demo product",
    "ll test",
    "this is a course title",
    "elementa digital student textbook - 1 - 10 seats",
    "elementa digital student textbook - 100 seats",
    "elementa digital student textbook - 25 seats",
    "elementa digital student textbook - 50 seats",
    "elementa digital student textbook - individual",
    "elementa digital student textbook - individual - annual",
    "elementa presentations - 100 seats",
    "elementa presentations - individual",
    "aequora",
    "aequora - 1 - 10 seats",
    "aequora - 25 seats",
    "living latin (beta) - 2 seats",
    "living latin (beta) - 6 seats",
    "living latin - individual chinese version",
    "living latin - individual",
    "living latin in rome - 1 - 10 seats",
    "living latin in rome - 100 seats",
    "living latin in rome - 25 seats",
    "living latin in rome - 50 seats",
    "elementa - 1 - 10 seats",
    "elementa - 100 seats",
    "demo product 2 - 1 - 10 seats",
    "ll test - 1 - 10 seats",
    "this is a course title - 1 - 10 seats",
    "this is a course title - 25 seats",
];

/// Product names excluded from the pivot and customer reports, matched on the
/// whole name after case and whitespace normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExclusionList {
    names: BTreeSet<String>,
}

impl ExclusionList {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            names: names
                .into_iter()
                .map(|n| normalize_product_name(n.as_ref()))
                .filter(|n| !n.is_empty())
                .collect(),
        }
    }

    pub fn empty() -> Self {
        Self::new(std::iter::empty::<&str>())
    }

    /// Parse a JSON array of product names.
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        let names: Vec<String> = serde_json::from_str(raw)?;
        Ok(Self::new(names))
    }

    pub fn is_excluded(&self, product_name: &str) -> bool {
        self.names.contains(&normalize_product_name(product_name))
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl Default for ExclusionList {
    fn default() -> Self {
        Self::new(CATALOG_EXCLUSIONS.iter().copied())
    }
}
