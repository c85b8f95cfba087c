//! Prompt rendering
//!
//! Turns a sanitized context into the fixed text block handed to the
//! model. The layout is a wire format shared with other vault clients:
//! section headers, indentation, status glyphs and number grouping must
//! not drift, or downstream prompt caching and eval fixtures break.

use crate::models::SanitizedAiContext;

/// Render the sanitized context as the model-facing text block.
///
/// Sections with no content are omitted entirely, headers are separated
/// by blank lines, and spending categories are listed largest first.
pub fn format_context(context: &SanitizedAiContext) -> String {
    let sym = &context.currency_symbol;
    let curr = &context.current_period;
    let mut lines: Vec<String> = Vec::new();

    lines.push(format!("=== Financial Summary ({}) ===", curr.period));
    lines.push(format!("Income: {sym}{}", group_digits(curr.total_income)));
    lines.push(format!(
        "Expenses: {sym}{}",
        group_digits(curr.total_expenses)
    ));
    lines.push(format!("Net: {sym}{}", group_digits(curr.net_savings)));
    lines.push(format!("Transactions: {}", curr.transaction_count));

    let mut categories: Vec<_> = curr.spending_by_category.iter().collect();
    categories.sort_by(|a, b| b.1.total_cmp(a.1));
    if !categories.is_empty() {
        lines.push("\nSpending by Category:".into());
        for (category, amount) in categories {
            lines.push(format!("  - {category}: {sym}{}", group_digits(*amount)));
        }
    }

    if !context.budgets.is_empty() {
        lines.push("\n=== Budget Status ===".into());
        for budget in &context.budgets {
            let status = match budget.percent_used {
                p if p >= 100 => "⚠️ OVER",
                p if p >= 80 => "⚠️ WARNING",
                _ => "✓",
            };
            lines.push(format!(
                "  {}: {}% used ({sym}{}/{sym}{}) {status}",
                budget.category, budget.percent_used, budget.spent, budget.limit
            ));
        }
    }

    if !context.goals.is_empty() {
        lines.push("\n=== Goals ===".into());
        for goal in &context.goals {
            lines.push(format!(
                "  {}: {}% complete, {} months remaining",
                goal.label, goal.percent_complete, goal.months_remaining
            ));
        }
    }

    if !context.debts.is_empty() {
        lines.push("\n=== Debts ===".into());
        for debt in &context.debts {
            lines.push(format!(
                "  {}: {sym}{} at {}% APR",
                debt.kind,
                group_digits(debt.balance),
                debt.interest_rate
            ));
        }
    }

    lines.join("\n")
}

/// Comma-group the integer digits of a number: `15250` -> `"15,250"`.
///
/// The sign stays in front of the digits, after the currency symbol the
/// caller prepends. Sanitized amounts are whole bucket multiples, so a
/// fractional part is rare but carried through untouched.
fn group_digits(value: f64) -> String {
    let raw = format!("{value}");
    let (sign, rest) = match raw.strip_prefix('-') {
        Some(rest) => ("-", rest),
        None => ("", raw.as_str()),
    };
    let (int_part, frac_part) = match rest.split_once('.') {
        Some((int_part, frac)) => (int_part, Some(frac)),
        None => (rest, None),
    };

    let mut grouped = String::with_capacity(raw.len() + int_part.len() / 3);
    grouped.push_str(sign);
    for (i, digit) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }
    if let Some(frac) = frac_part {
        grouped.push('.');
        grouped.push_str(frac);
    }
    grouped
}
