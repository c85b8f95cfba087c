//! coffer-privacy: the sanitization pipeline for AI-bound financial data
//!
//! Raw ledger records never leave the vault. Before any external consumer
//! sees them they pass through three stages:
//!
//! 1. [`sanitize`] — rounding, time-bucketing and aggregation into coarse,
//!    non-identifying shapes.
//! 2. [`validate`] — a recursive forbidden-field gate that fails closed if
//!    a sanitizer regression ever lets an identifying key through.
//! 3. [`prompt`] — deterministic rendering into the text block handed to
//!    the model.

pub mod dates;
pub mod models;
pub mod prompt;
pub mod sanitize;
pub mod validate;

pub use dates::{date_to_period, parse_local_date, period_of, week_of_month};
pub use models::{
    Budget, BudgetPeriod, Debt, DebtType, FinancialSummary, Goal, Ledger, SanitizedAiContext,
    SanitizedBudget, SanitizedDebt, SanitizedGoal, SanitizedTransaction, Transaction,
    TransactionType,
};
pub use prompt::format_context;
pub use sanitize::{
    generate_financial_summary, round_amount, sanitize_budget, sanitize_debt, sanitize_goal,
    sanitize_prompt_context, sanitize_transaction, sanitize_transactions,
};
pub use validate::{validate_context, validate_value, SanitizationBreach, FORBIDDEN_FIELDS};
