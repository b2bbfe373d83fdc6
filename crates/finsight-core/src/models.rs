//! Domain models for Finsight

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Maximum accepted transaction amount in dollars
pub const MAX_TRANSACTION_AMOUNT: f64 = 1_000_000.0;

/// Maximum accepted description length after sanitization
pub const MAX_DESCRIPTION_LEN: usize = 200;

/// Maximum accepted user id length
pub const MAX_USER_ID_LEN: usize = 50;

/// Spending categories
///
/// Closed set: a transaction's category is either one of these labels
/// (user-supplied) or predicted by the categorizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "Food & Dining")]
    FoodDining,
    #[serde(rename = "Shopping")]
    Shopping,
    #[serde(rename = "Transportation")]
    Transportation,
    #[serde(rename = "Bills & Utilities")]
    BillsUtilities,
    #[serde(rename = "Entertainment")]
    Entertainment,
    #[serde(rename = "Healthcare")]
    Healthcare,
    #[serde(rename = "Travel")]
    Travel,
    #[serde(rename = "Education")]
    Education,
    #[serde(rename = "Investment")]
    Investment,
    #[serde(rename = "Income")]
    Income,
    #[serde(rename = "Transfer")]
    Transfer,
    #[serde(rename = "Other")]
    Other,
}

/// All categories in fixed order
///
/// The one-hot encoding in the predictor indexes into this order, so it
/// must stay stable.
pub const ALL_CATEGORIES: [Category; 12] = [
    Category::FoodDining,
    Category::Shopping,
    Category::Transportation,
    Category::BillsUtilities,
    Category::Entertainment,
    Category::Healthcare,
    Category::Travel,
    Category::Education,
    Category::Investment,
    Category::Income,
    Category::Transfer,
    Category::Other,
];

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FoodDining => "Food & Dining",
            Self::Shopping => "Shopping",
            Self::Transportation => "Transportation",
            Self::BillsUtilities => "Bills & Utilities",
            Self::Entertainment => "Entertainment",
            Self::Healthcare => "Healthcare",
            Self::Travel => "Travel",
            Self::Education => "Education",
            Self::Investment => "Investment",
            Self::Income => "Income",
            Self::Transfer => "Transfer",
            Self::Other => "Other",
        }
    }

    /// Position in [`ALL_CATEGORIES`], used for one-hot feature encoding
    pub fn index(&self) -> usize {
        ALL_CATEGORIES.iter().position(|c| c == self).unwrap_or(0)
    }
}

impl std::str::FromStr for Category {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "Food & Dining" => Ok(Self::FoodDining),
            "Shopping" => Ok(Self::Shopping),
            "Transportation" => Ok(Self::Transportation),
            "Bills & Utilities" => Ok(Self::BillsUtilities),
            "Entertainment" => Ok(Self::Entertainment),
            "Healthcare" => Ok(Self::Healthcare),
            "Travel" => Ok(Self::Travel),
            "Education" => Ok(Self::Education),
            "Investment" => Ok(Self::Investment),
            "Income" => Ok(Self::Income),
            "Transfer" => Ok(Self::Transfer),
            "Other" => Ok(Self::Other),
            _ => Err(format!("Unknown category: {}", s)),
        }
    }
}

impl std::fmt::Display for Category {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A financial transaction
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Transaction {
    pub id: i64,
    pub user_id: String,
    /// Always non-negative; `is_income` distinguishes direction
    pub amount: f64,
    pub description: String,
    /// User-supplied or predicted, set at creation time
    pub category: Option<Category>,
    /// What the categorizer predicted (kept even when the user supplied one)
    pub predicted_category: Option<Category>,
    /// Categorizer confidence in [0, 1]
    pub confidence_score: Option<f64>,
    pub date: DateTime<Utc>,
    pub is_income: bool,
    /// Flipped false -> true when anomaly detection flags this row
    pub is_anomaly: bool,
    /// Hash for deduplication
    pub content_hash: String,
    pub created_at: DateTime<Utc>,
}

/// A new transaction before DB insertion
#[derive(Debug, Clone, Deserialize)]
pub struct NewTransaction {
    pub user_id: String,
    pub amount: f64,
    pub description: String,
    pub category: Option<Category>,
    pub predicted_category: Option<Category>,
    pub confidence_score: Option<f64>,
    pub date: DateTime<Utc>,
    pub is_income: bool,
}

impl NewTransaction {
    /// Content hash over the identifying fields, for duplicate detection
    pub fn content_hash(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.user_id.as_bytes());
        hasher.update(self.date.to_rfc3339().as_bytes());
        hasher.update(self.description.as_bytes());
        hasher.update(format!("{:.2}", self.amount).as_bytes());
        hasher.update([self.is_income as u8]);
        hex::encode(hasher.finalize())
    }
}

/// Validate a transaction amount: non-negative, capped
pub fn validate_amount(amount: f64) -> bool {
    amount.is_finite() && (0.0..=MAX_TRANSACTION_AMOUNT).contains(&amount)
}

/// Validate a user id: non-empty, bounded, alphanumeric plus `_` and `-`
pub fn validate_user_id(user_id: &str) -> bool {
    !user_id.is_empty()
        && user_id.len() <= MAX_USER_ID_LEN
        && user_id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
}

/// Strip non-printable characters and bound the length
pub fn sanitize_description(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_control())
        .take(MAX_DESCRIPTION_LEN)
        .collect::<String>()
        .trim()
        .to_string()
}

/// Severity of a detected anomaly, from the forest score
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnomalySeverity {
    Low,
    Medium,
    High,
}

impl AnomalySeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for AnomalySeverity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Coarse fraud-risk tier, from the point-scoring heuristic
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Investment risk tolerance for recommendation profiles
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskTolerance {
    Conservative,
    Moderate,
    Aggressive,
}

impl RiskTolerance {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Conservative => "conservative",
            Self::Moderate => "moderate",
            Self::Aggressive => "aggressive",
        }
    }
}

impl std::str::FromStr for RiskTolerance {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "conservative" => Ok(Self::Conservative),
            "moderate" => Ok(Self::Moderate),
            "aggressive" => Ok(Self::Aggressive),
            _ => Err(format!("Unknown risk tolerance: {}", s)),
        }
    }
}

impl std::fmt::Display for RiskTolerance {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
