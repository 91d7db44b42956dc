//! The fixed set of transaction categories and their display colors.

use std::{fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

/// The error returned when a string does not name a known category.
#[derive(thiserror::Error, Debug, PartialEq)]
#[error("{0} is not a valid category")]
pub struct ParseCategoryError(pub String);

/// A category for classifying transactions.
///
/// The ten expense categories plus the special `income` category, used both
/// for validation and for grouping the expense analytics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Food,
    Transportation,
    Housing,
    Utilities,
    Healthcare,
    Entertainment,
    Shopping,
    Education,
    Travel,
    Other,
    /// The only category valid for income transactions.
    Income,
}

/// Every category, in display order.
pub const ALL_CATEGORIES: [Category; 11] = [
    Category::Food,
    Category::Transportation,
    Category::Housing,
    Category::Utilities,
    Category::Healthcare,
    Category::Entertainment,
    Category::Shopping,
    Category::Education,
    Category::Travel,
    Category::Other,
    Category::Income,
];

impl Category {
    /// The lowercase name used in the API and the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Food => "food",
            Category::Transportation => "transportation",
            Category::Housing => "housing",
            Category::Utilities => "utilities",
            Category::Healthcare => "healthcare",
            Category::Entertainment => "entertainment",
            Category::Shopping => "shopping",
            Category::Education => "education",
            Category::Travel => "travel",
            Category::Other => "other",
            Category::Income => "income",
        }
    }

    /// The hex color used for this category in the expenses pie chart.
    ///
    /// Categories without their own entry in the palette fall back to the
    /// color of [Category::Other].
    pub fn color(&self) -> &'static str {
        match self {
            Category::Food => "#FF6B6B",
            Category::Transportation => "#4ECDC4",
            Category::Housing => "#45B7D1",
            Category::Utilities => "#96CEB4",
            Category::Healthcare => "#FFEAA7",
            Category::Entertainment => "#DDA0DD",
            Category::Shopping => "#98D8C8",
            Category::Education => "#F7DC6F",
            Category::Travel => "#BB8FCE",
            Category::Other | Category::Income => "#AED6F1",
        }
    }
}

impl FromStr for Category {
    type Err = ParseCategoryError;

    fn from_str(name: &str) -> Result<Self, Self::Err> {
        ALL_CATEGORIES
            .into_iter()
            .find(|category| category.as_str() == name)
            .ok_or_else(|| ParseCategoryError(name.to_owned()))
    }
}

impl Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
