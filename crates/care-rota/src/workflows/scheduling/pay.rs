use chrono::NaiveDateTime;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

pub(crate) const MONEY_SCALE: u32 = 2;

/// Break allowance attached to a shift definition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BreakPolicy {
    pub minutes: u32,
    pub paid: bool,
}

/// Pay rules applied to worked time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PayPolicy {
    pub overtime_multiplier: Decimal,
}

impl Default for PayPolicy {
    fn default() -> Self {
        Self {
            overtime_multiplier: Decimal::new(15, 1),
        }
    }
}

/// Pay for one slot of a shift as advertised.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlannedPay {
    pub scheduled_hours: Decimal,
    pub billable_hours: Decimal,
    pub total_pay: Decimal,
}

/// Pay for time actually worked, split at the scheduled-hours threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualPay {
    pub worked_hours: Decimal,
    pub regular_hours: Decimal,
    pub overtime_hours: Decimal,
    pub total_pay: Decimal,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DurationError {
    #[error("{span} minutes between {start} and {end} less a {break_minutes} minute break leaves no payable time")]
    NonPositive {
        start: NaiveDateTime,
        end: NaiveDateTime,
        span: i64,
        break_minutes: u32,
    },
}

/// Round half-up to pennies (and to hundredths of an hour).
pub fn round_money(value: Decimal) -> Decimal {
    value.round_dp_with_strategy(MONEY_SCALE, RoundingStrategy::MidpointAwayFromZero)
}

/// Hours between two instants after deducting a break.
fn net_hours(
    start: NaiveDateTime,
    end: NaiveDateTime,
    deducted_break: u32,
) -> Result<Decimal, DurationError> {
    let span = (end - start).num_minutes();
    let net = span - i64::from(deducted_break);
    if net <= 0 {
        return Err(DurationError::NonPositive {
            start,
            end,
            span,
            break_minutes: deducted_break,
        });
    }
    Ok(minutes_to_hours(net))
}

fn minutes_to_hours(minutes: i64) -> Decimal {
    Decimal::from(minutes) / Decimal::from(60)
}

/// Planned duration of a shift, used as the overtime threshold for its timesheets.
pub fn scheduled_hours(start: NaiveDateTime, end: NaiveDateTime) -> Decimal {
    minutes_to_hours((end - start).num_minutes().max(0))
}

/// Pay for a shift definition. A break only reduces billable hours when it is unpaid.
pub fn planned_pay(
    start: NaiveDateTime,
    end: NaiveDateTime,
    break_policy: BreakPolicy,
    hourly_rate: Decimal,
) -> Result<PlannedPay, DurationError> {
    let deducted = if break_policy.paid {
        0
    } else {
        break_policy.minutes
    };
    let billable = net_hours(start, end, deducted)?;

    Ok(PlannedPay {
        scheduled_hours: round_money(scheduled_hours(start, end)),
        billable_hours: round_money(billable),
        total_pay: round_money(billable * hourly_rate),
    })
}

/// Pay for a worked period. The break always comes off attendance time; hours beyond
/// `scheduled_hours` are paid at the overtime multiplier.
pub fn actual_pay(
    clock_in: NaiveDateTime,
    clock_out: NaiveDateTime,
    break_minutes: u32,
    scheduled_hours: Decimal,
    hourly_rate: Decimal,
    policy: &PayPolicy,
) -> Result<ActualPay, DurationError> {
    let worked = net_hours(clock_in, clock_out, break_minutes)?;
    let overtime = round_money((worked - scheduled_hours).max(Decimal::ZERO));
    let regular = worked - overtime;
    let total = regular * hourly_rate + overtime * hourly_rate * policy.overtime_multiplier;

    // only overtime and the total are exact to the penny; the other hours are rounded for display
    Ok(ActualPay {
        worked_hours: round_money(worked),
        regular_hours: round_money(regular),
        overtime_hours: overtime,
        total_pay: round_money(total),
    })
}
