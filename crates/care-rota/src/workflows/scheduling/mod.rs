//! Schedule normalization and the single pay calculator shared by shift creation, timesheets,
//! and every preview surface (HTTP quote endpoint, CLI).

pub mod normalizer;
pub mod pay;

pub use normalizer::{
    normalize, resolve_clock_pair, CanonicalSchedule, ClockTime, ScheduleError, ScheduleInput,
    ScheduleLimits,
};
pub use pay::{
    actual_pay, planned_pay, round_money, scheduled_hours, ActualPay, BreakPolicy, DurationError,
    PayPolicy, PlannedPay,
};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Priced view of a shift definition: resolved instants, per-slot pay, and the cost of every slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftQuote {
    pub schedule: CanonicalSchedule,
    pub pay: PlannedPay,
    pub quantity: u32,
    pub total_cost: Decimal,
}

impl From<DurationError> for ScheduleError {
    fn from(value: DurationError) -> Self {
        match value {
            DurationError::NonPositive {
                span,
                break_minutes,
                ..
            } => ScheduleError::BreakTooLong {
                break_minutes,
                duration_minutes: span,
            },
        }
    }
}

/// Normalize and price a shift. Creation and previews both go through here.
pub fn quote_shift(
    input: &ScheduleInput,
    break_policy: BreakPolicy,
    hourly_rate: Decimal,
    quantity: u32,
    limits: &ScheduleLimits,
) -> Result<ShiftQuote, ScheduleError> {
    if hourly_rate <= Decimal::ZERO {
        return Err(ScheduleError::NonPositiveRate { rate: hourly_rate });
    }
    if hourly_rate.normalize().scale() > pay::MONEY_SCALE {
        return Err(ScheduleError::SubPennyRate { rate: hourly_rate });
    }
    if quantity == 0 {
        return Err(ScheduleError::ZeroQuantity);
    }

    let schedule = normalize(input, limits)?;
    let duration_minutes = schedule.duration_minutes();
    if i64::from(break_policy.minutes) >= duration_minutes {
        return Err(ScheduleError::BreakTooLong {
            break_minutes: break_policy.minutes,
            duration_minutes,
        });
    }

    let pay = planned_pay(schedule.start, schedule.end, break_policy, hourly_rate)?;

    Ok(ShiftQuote {
        schedule,
        pay,
        quantity,
        total_cost: round_money(pay.total_pay * Decimal::from(quantity)),
    })
}

/// Worked-time estimate for a timesheet that has not been stored yet.
pub fn quote_worked_time(
    work_date: NaiveDate,
    clock_in: ClockTime,
    clock_out: ClockTime,
    break_minutes: u32,
    scheduled: Decimal,
    hourly_rate: Decimal,
    policy: &PayPolicy,
) -> Result<(CanonicalSchedule, ActualPay), DurationError> {
    let period = resolve_clock_pair(work_date, clock_in, clock_out);
    let pay = actual_pay(
        period.start,
        period.end,
        break_minutes,
        scheduled,
        hourly_rate,
        policy,
    )?;
    Ok((period, pay))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input() -> ScheduleInput {
        ScheduleInput {
            date: NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date"),
            start: "20:00".parse().expect("clock"),
            end: "08:00".parse().expect("clock"),
            ends_next_day: None,
        }
    }

    #[test]
    fn quote_prices_every_slot() {
        let quote = quote_shift(
            &input(),
            BreakPolicy {
                minutes: 30,
                paid: false,
            },
            "16.50".parse().expect("rate"),
            3,
            &ScheduleLimits::default(),
        )
        .expect("valid quote");

        assert!(quote.schedule.rollover);
        assert_eq!(quote.pay.billable_hours, "11.5".parse::<Decimal>().unwrap());
        assert_eq!(quote.pay.total_pay, "189.75".parse::<Decimal>().unwrap());
        assert_eq!(quote.total_cost, "569.25".parse::<Decimal>().unwrap());
    }

    #[test]
    fn quote_rejects_invalid_definitions() {
        let limits = ScheduleLimits::default();
        assert_eq!(
            quote_shift(&input(), BreakPolicy::default(), Decimal::ZERO, 1, &limits),
            Err(ScheduleError::NonPositiveRate {
                rate: Decimal::ZERO
            })
        );
        let sub_penny: Decimal = "15.005".parse().expect("rate");
        assert_eq!(
            quote_shift(&input(), BreakPolicy::default(), sub_penny, 1, &limits),
            Err(ScheduleError::SubPennyRate { rate: sub_penny })
        );
        let padded: Decimal = "15.5000".parse().expect("rate");
        assert!(quote_shift(&input(), BreakPolicy::default(), padded, 1, &limits).is_ok());
        assert_eq!(
            quote_shift(&input(), BreakPolicy::default(), Decimal::ONE, 0, &limits),
            Err(ScheduleError::ZeroQuantity)
        );
        assert!(matches!(
            quote_shift(
                &input(),
                BreakPolicy {
                    minutes: 720,
                    paid: true
                },
                Decimal::ONE,
                1,
                &limits
            ),
            Err(ScheduleError::BreakTooLong { .. })
        ));
    }

    #[test]
    fn worked_time_quote_resolves_rollover() {
        let (period, pay) = quote_worked_time(
            NaiveDate::from_ymd_opt(2025, 3, 10).expect("valid date"),
            "20:30".parse().expect("clock"),
            "06:30".parse().expect("clock"),
            30,
            Decimal::from(8),
            "15.00".parse().expect("rate"),
            &PayPolicy::default(),
        )
        .expect("valid worked time");

        assert!(period.rollover);
        assert_eq!(pay.total_pay, "153.75".parse::<Decimal>().unwrap());
    }
}
