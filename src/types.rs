use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use tabled::Tabled;

/// Columns the loader refuses to run without.
pub const REQUIRED_COLUMNS: [&str; 8] = [
    "Subscription Type",
    "Gender",
    "Country",
    "Age",
    "Device",
    "Monthly Revenue",
    "Join Date",
    "Last Payment Date",
];

#[derive(Debug, Deserialize)]
pub struct RawRow {
    #[serde(rename = "User ID", default)]
    pub user_id: Option<String>,
    #[serde(rename = "Subscription Type")]
    pub subscription_type: String,
    #[serde(rename = "Monthly Revenue")]
    pub monthly_revenue: String,
    #[serde(rename = "Join Date")]
    pub join_date: String,
    #[serde(rename = "Last Payment Date")]
    pub last_payment_date: String,
    #[serde(rename = "Country")]
    pub country: String,
    #[serde(rename = "Age")]
    pub age: String,
    #[serde(rename = "Gender")]
    pub gender: String,
    #[serde(rename = "Device")]
    pub device: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SubscriptionRecord {
    pub user_id: Option<String>,
    pub subscription_type: String,
    pub monthly_revenue: f64,
    pub join_date: NaiveDate,
    pub last_payment_date: NaiveDate,
    pub country: String,
    pub age: i32,
    pub gender: String,
    pub device: String,
}

/// Ordered age buckets, right-inclusive on the upper bound.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum AgeGroup {
    UpTo18,
    From19To25,
    From26To35,
    From36To45,
    From46To55,
    From56To65,
    Over65,
}

impl AgeGroup {
    pub const ALL: [AgeGroup; 7] = [
        AgeGroup::UpTo18,
        AgeGroup::From19To25,
        AgeGroup::From26To35,
        AgeGroup::From36To45,
        AgeGroup::From46To55,
        AgeGroup::From56To65,
        AgeGroup::Over65,
    ];

    pub fn label(self) -> &'static str {
        match self {
            AgeGroup::UpTo18 => "0-18",
            AgeGroup::From19To25 => "19-25",
            AgeGroup::From26To35 => "26-35",
            AgeGroup::From36To45 => "36-45",
            AgeGroup::From46To55 => "46-55",
            AgeGroup::From56To65 => "56-65",
            AgeGroup::Over65 => "65+",
        }
    }

    /// Inclusive upper bound used as the membership test.
    pub fn upper_bound(self) -> i32 {
        match self {
            AgeGroup::UpTo18 => 18,
            AgeGroup::From19To25 => 25,
            AgeGroup::From26To35 => 35,
            AgeGroup::From36To45 => 45,
            AgeGroup::From46To55 => 55,
            AgeGroup::From56To65 => 65,
            AgeGroup::Over65 => 100,
        }
    }
}

impl fmt::Display for AgeGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Calendar month of a join date, ordered chronologically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct JoinMonth {
    pub year: i32,
    pub month: u32,
}

impl fmt::Display for JoinMonth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:04}-{:02}", self.year, self.month)
    }
}

/// Two-key contingency table. `rows` follow sorted key order and every row
/// has one value per entry in `columns`.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Crosstab {
    pub row_label: String,
    pub columns: Vec<String>,
    pub rows: Vec<(String, Vec<f64>)>,
}

#[cfg(test)]
impl Crosstab {
    pub fn row(&self, key: &str) -> Option<&[f64]> {
        self.rows
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_slice())
    }

    pub fn cell(&self, row: &str, column: &str) -> Option<f64> {
        let idx = self.columns.iter().position(|c| c == column)?;
        self.row(row).map(|values| values[idx])
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupValue {
    pub group: String,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Share {
    pub group: String,
    pub count: usize,
    pub percent: f64,
}

/// Category holding the largest share inside one plan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Leader {
    pub plan: String,
    pub leader: String,
    pub percent: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RecentPayments {
    pub reference_date: Option<NaiveDate>,
    pub within_30_days: f64,
    pub within_90_days: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyCount {
    pub month: JoinMonth,
    pub signups: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ArpuRow {
    pub country: String,
    pub plan: String,
    pub subscribers: usize,
    pub revenue: f64,
    pub arpu: f64,
}

#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    pub total_subscribers: usize,
    pub plans: usize,
    pub countries: usize,
    pub total_monthly_revenue: f64,
    pub average_tenure_days: f64,
    pub revenue_subscriber_correlation: f64,
}

// Display rows: numbers are pre-formatted so the console and CSV exports match.

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct GroupValueRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Value")]
    #[tabled(rename = "Value")]
    pub value: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ShareRow {
    #[serde(rename = "Group")]
    #[tabled(rename = "Group")]
    pub group: String,
    #[serde(rename = "Count")]
    #[tabled(rename = "Count")]
    pub count: String,
    #[serde(rename = "Percent")]
    #[tabled(rename = "Percent")]
    pub percent: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct LeaderRow {
    #[serde(rename = "SubscriptionType")]
    #[tabled(rename = "SubscriptionType")]
    pub plan: String,
    #[serde(rename = "Leader")]
    #[tabled(rename = "Leader")]
    pub leader: String,
    #[serde(rename = "Percent")]
    #[tabled(rename = "Percent")]
    pub percent: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct MonthlyCountRow {
    #[serde(rename = "JoinMonth")]
    #[tabled(rename = "JoinMonth")]
    pub month: String,
    #[serde(rename = "Signups")]
    #[tabled(rename = "Signups")]
    pub signups: String,
}

#[derive(Debug, Serialize, Tabled, Clone)]
pub struct ArpuDisplayRow {
    #[serde(rename = "Country")]
    #[tabled(rename = "Country")]
    pub country: String,
    #[serde(rename = "SubscriptionType")]
    #[tabled(rename = "SubscriptionType")]
    pub plan: String,
    #[serde(rename = "Subscribers")]
    #[tabled(rename = "Subscribers")]
    pub subscribers: String,
    #[serde(rename = "Revenue")]
    #[tabled(rename = "Revenue")]
    pub revenue: String,
    #[serde(rename = "ARPU")]
    #[tabled(rename = "ARPU")]
    pub arpu: String,
}
