//! Domain models for Coffer
//!
//! The raw ledger types mirror the vault's stored JSON (camelCase wire
//! names, unknown fields tolerated). The `Sanitized*` types are the only
//! shapes allowed to leave the vault: their fields are enumerated here, so
//! identifying data cannot ride along by construction.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransactionType {
    Income,
    Expense,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Income => "income",
            Self::Expense => "expense",
        }
    }
}

impl std::fmt::Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single ledger transaction as stored in the vault.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Transaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    /// Signed amount as recorded.
    pub amount: f64,
    pub category: String,
    /// Calendar date string, best-effort `YYYY-MM-DD`.
    pub date: String,
    // Identifying fields live in the vault only; no sanitizer copies them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_name: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BudgetPeriod {
    Daily,
    Weekly,
    Biweekly,
    Semimonthly,
    Monthly,
    Yearly,
}

impl BudgetPeriod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Daily => "daily",
            Self::Weekly => "weekly",
            Self::Biweekly => "biweekly",
            Self::Semimonthly => "semimonthly",
            Self::Monthly => "monthly",
            Self::Yearly => "yearly",
        }
    }
}

impl std::fmt::Display for BudgetPeriod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Budget {
    pub category: String,
    pub limit: f64,
    pub period: BudgetPeriod,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Goal {
    /// Free-text label; replaced by an ordinal before export.
    #[serde(default)]
    pub name: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub target_date: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DebtType {
    CreditCard,
    Loan,
    Mortgage,
    Other,
}

impl DebtType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::CreditCard => "credit-card",
            Self::Loan => "loan",
            Self::Mortgage => "mortgage",
            Self::Other => "other",
        }
    }
}

impl std::fmt::Display for DebtType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Debt {
    #[serde(rename = "type")]
    pub kind: DebtType,
    pub balance: f64,
    pub interest_rate: f64,
    pub minimum_payment: f64,
    /// Free-text label ("Chase Sapphire"); never exported.
    #[serde(default)]
    pub name: String,
}

/// Everything the vault stores; the unit of encryption and sync.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ledger {
    pub transactions: Vec<Transaction>,
    pub budgets: Vec<Budget>,
    pub goals: Vec<Goal>,
    pub debts: Vec<Debt>,
}

// ── Sanitized shapes ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedTransaction {
    #[serde(rename = "type")]
    pub kind: TransactionType,
    pub rounded_amount: f64,
    pub category: String,
    /// `YYYY-MM`
    pub period: String,
    /// 1–5, `ceil(day_of_month / 7)`
    pub week_of_period: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinancialSummary {
    pub period: String,
    pub total_income: f64,
    pub total_expenses: f64,
    pub net_savings: f64,
    pub spending_by_category: BTreeMap<String, f64>,
    pub income_by_category: BTreeMap<String, f64>,
    pub transaction_count: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedBudget {
    pub category: String,
    pub limit: f64,
    pub spent: f64,
    pub percent_used: i64,
    pub period: BudgetPeriod,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedGoal {
    /// Ordinal label ("Goal 1"), never the user's own wording.
    pub label: String,
    pub target_amount: f64,
    pub current_amount: f64,
    pub percent_complete: i64,
    pub months_remaining: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedDebt {
    #[serde(rename = "type")]
    pub kind: DebtType,
    pub balance: f64,
    pub interest_rate: f64,
    pub minimum_payment: f64,
}

/// The root aggregate released to the AI consumer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SanitizedAiContext {
    pub current_period: FinancialSummary,
    pub previous_period: FinancialSummary,
    pub recent_transactions: Vec<SanitizedTransaction>,
    pub budgets: Vec<SanitizedBudget>,
    pub goals: Vec<SanitizedGoal>,
    pub debts: Vec<SanitizedDebt>,
    pub currency_symbol: String,
}
