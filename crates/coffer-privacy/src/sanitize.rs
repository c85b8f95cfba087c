//! Sanitizers: rounding, time-bucketing and aggregation
//!
//! Every function here maps a raw vault record to its exportable shape.
//! The rules are lossy on purpose:
//!
//! - amounts are rounded to coarse buckets (nearest 5 / 10 / 50 by
//!   magnitude) so exact figures cannot fingerprint a person,
//! - dates collapse to a `YYYY-MM` period plus a week-of-month bucket,
//! - free-text labels (goal names, debt names, merchants) are dropped or
//!   replaced with ordinals,
//! - derived ratios (budget percentUsed, goal percentComplete) are
//!   computed from the raw figures *before* rounding, so the coarse
//!   outputs stay mutually consistent with the ratio a user would see.

use std::collections::BTreeMap;

use chrono::{Datelike, Months, NaiveDate};

use crate::dates::{date_to_period, parse_local_date, period_of, week_of_month};
use crate::models::{
    Budget, Debt, FinancialSummary, Goal, Ledger, SanitizedAiContext, SanitizedBudget,
    SanitizedDebt, SanitizedGoal, SanitizedTransaction, Transaction, TransactionType,
};

/// Round a signed amount to a privacy bucket.
///
/// Magnitudes under 100 snap to the nearest 5, under 1000 to the nearest
/// 10, and everything else to the nearest 50. The sign is stripped before
/// rounding and reapplied after, so `-47` mirrors `47` exactly. Ties round
/// away from zero (`12.5` goes to `15`).
pub fn round_amount(amount: f64) -> f64 {
    let abs = amount.abs();
    let rounded = if abs < 100.0 {
        (abs / 5.0).round() * 5.0
    } else if abs < 1000.0 {
        (abs / 10.0).round() * 10.0
    } else {
        (abs / 50.0).round() * 50.0
    };
    if amount < 0.0 {
        -rounded
    } else {
        rounded
    }
}

/// Reduce one transaction to type, coarse amount, category and time bucket.
pub fn sanitize_transaction(tx: &Transaction) -> SanitizedTransaction {
    SanitizedTransaction {
        kind: tx.kind,
        rounded_amount: round_amount(tx.amount),
        category: tx.category.clone(),
        period: date_to_period(&tx.date),
        week_of_period: week_of_month(&tx.date),
    }
}

pub fn sanitize_transactions(transactions: &[Transaction]) -> Vec<SanitizedTransaction> {
    transactions.iter().map(sanitize_transaction).collect()
}

/// Aggregate one period's transactions into a coarse summary.
///
/// Amounts are summed at full precision per category and per type, then
/// rounded once at the end; rounding each transaction first would let
/// bucket error accumulate. Expenses keep their stored sign, so net
/// savings is simply `income - expenses`.
pub fn generate_financial_summary(transactions: &[Transaction], period: &str) -> FinancialSummary {
    let mut total_income = 0.0;
    let mut total_expenses = 0.0;
    let mut spending_by_category: BTreeMap<String, f64> = BTreeMap::new();
    let mut income_by_category: BTreeMap<String, f64> = BTreeMap::new();
    let mut transaction_count = 0;

    for tx in transactions {
        if date_to_period(&tx.date) != period {
            continue;
        }
        transaction_count += 1;
        match tx.kind {
            TransactionType::Income => {
                total_income += tx.amount;
                *income_by_category.entry(tx.category.clone()).or_insert(0.0) += tx.amount;
            }
            TransactionType::Expense => {
                total_expenses += tx.amount;
                *spending_by_category
                    .entry(tx.category.clone())
                    .or_insert(0.0) += tx.amount;
            }
        }
    }

    for amount in spending_by_category.values_mut() {
        *amount = round_amount(*amount);
    }
    for amount in income_by_category.values_mut() {
        *amount = round_amount(*amount);
    }

    FinancialSummary {
        period: period.to_string(),
        total_income: round_amount(total_income),
        total_expenses: round_amount(total_expenses),
        net_savings: round_amount(total_income - total_expenses),
        spending_by_category,
        income_by_category,
        transaction_count,
    }
}

/// Sanitize a budget against the amount actually spent this period.
///
/// `percent_used` comes from the raw spent/limit pair so it still matches
/// what the user's own budget screen shows; the exported `limit` and
/// `spent` figures are rounded independently. A non-positive limit yields
/// 0% rather than a division blowup.
pub fn sanitize_budget(budget: &Budget, spent: f64) -> SanitizedBudget {
    let percent_used = if budget.limit > 0.0 {
        (spent / budget.limit * 100.0).round() as i64
    } else {
        0
    };

    SanitizedBudget {
        category: budget.category.clone(),
        limit: round_amount(budget.limit),
        spent: round_amount(spent),
        percent_used,
        period: budget.period,
    }
}

/// Sanitize a goal, replacing its free-text name with an ordinal label.
///
/// `months_remaining` is whole calendar months from `today` to the target
/// date (day-of-month ignored), floored at zero for overdue goals. An
/// unparseable target date counts as due now.
pub fn sanitize_goal(goal: &Goal, index: usize, today: NaiveDate) -> SanitizedGoal {
    let percent_complete = if goal.target_amount > 0.0 {
        (goal.current_amount / goal.target_amount * 100.0).round() as i64
    } else {
        0
    };

    let target = parse_local_date(&goal.target_date).unwrap_or(today);
    let months = (target.year() - today.year()) * 12 + (target.month() as i32 - today.month() as i32);

    SanitizedGoal {
        label: format!("Goal {}", index + 1),
        target_amount: round_amount(goal.target_amount),
        current_amount: round_amount(goal.current_amount),
        percent_complete,
        months_remaining: months.max(0) as u32,
    }
}

/// Sanitize a debt: keep the structural type, drop the account name.
pub fn sanitize_debt(debt: &Debt) -> SanitizedDebt {
    SanitizedDebt {
        kind: debt.kind,
        balance: round_amount(debt.balance),
        interest_rate: debt.interest_rate,
        minimum_payment: round_amount(debt.minimum_payment),
    }
}

/// Build the full AI context from a ledger.
///
/// Includes summaries for the current and previous calendar months (month
/// arithmetic, so January's predecessor is last December), the trailing
/// 30 days of transactions (inclusive at exactly 30 days before `today`),
/// and sanitized budgets, goals and debts. Budget spend is the sum of the
/// category's current-month expenses.
pub fn sanitize_prompt_context(
    ledger: &Ledger,
    currency_symbol: &str,
    today: NaiveDate,
) -> SanitizedAiContext {
    let current_period = period_of(today);
    let previous_period = period_of(
        today
            .checked_sub_months(Months::new(1))
            .unwrap_or(NaiveDate::MIN),
    );

    let mut spent_by_category: BTreeMap<&str, f64> = BTreeMap::new();
    for tx in &ledger.transactions {
        if tx.kind == TransactionType::Expense && date_to_period(&tx.date) == current_period {
            *spent_by_category.entry(tx.category.as_str()).or_insert(0.0) += tx.amount;
        }
    }

    let cutoff = today
        .checked_sub_days(chrono::Days::new(30))
        .unwrap_or(NaiveDate::MIN);
    let recent_transactions = ledger
        .transactions
        .iter()
        .filter(|tx| parse_local_date(&tx.date).unwrap_or(today) >= cutoff)
        .map(sanitize_transaction)
        .collect();

    SanitizedAiContext {
        current_period: generate_financial_summary(&ledger.transactions, &current_period),
        previous_period: generate_financial_summary(&ledger.transactions, &previous_period),
        recent_transactions,
        budgets: ledger
            .budgets
            .iter()
            .map(|budget| {
                let spent = spent_by_category
                    .get(budget.category.as_str())
                    .copied()
                    .unwrap_or(0.0);
                sanitize_budget(budget, spent)
            })
            .collect(),
        goals: ledger
            .goals
            .iter()
            .enumerate()
            .map(|(index, goal)| sanitize_goal(goal, index, today))
            .collect(),
        debts: ledger.debts.iter().map(sanitize_debt).collect(),
        currency_symbol: currency_symbol.to_string(),
    }
}
