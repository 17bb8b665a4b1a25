use crate::infra::{parse_clock, parse_date, parse_money};
use care_rota::config::AppConfig;
use care_rota::error::AppError;
use care_rota::workflows::scheduling::{
    quote_shift, quote_worked_time, ActualPay, BreakPolicy, ClockTime, ScheduleInput, ShiftQuote,
};
use care_rota::workflows::staffing::{StaffingConfig, StaffingError};
use chrono::NaiveDate;
use clap::Args;
use rust_decimal::Decimal;

#[derive(Args, Debug)]
pub(crate) struct ShiftQuoteArgs {
    /// Calendar date the shift starts on (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: NaiveDate,
    /// Start time (HH:MM)
    #[arg(long, value_parser = parse_clock)]
    pub(crate) start: ClockTime,
    /// End time (HH:MM); an end before the start rolls into the next day
    #[arg(long, value_parser = parse_clock)]
    pub(crate) end: ClockTime,
    /// Force the end onto the following day even when it is later than the start
    #[arg(long)]
    pub(crate) ends_next_day: bool,
    /// Hourly rate
    #[arg(long, value_parser = parse_money)]
    pub(crate) rate: Decimal,
    /// Break allowance in minutes
    #[arg(long, default_value_t = 0)]
    pub(crate) break_minutes: u32,
    /// The break is paid and does not reduce billable hours
    #[arg(long)]
    pub(crate) break_paid: bool,
    /// Number of slots to price
    #[arg(long, default_value_t = 1)]
    pub(crate) quantity: u32,
}

#[derive(Args, Debug)]
pub(crate) struct TimesheetQuoteArgs {
    /// Date the worker clocked in (YYYY-MM-DD)
    #[arg(long, value_parser = parse_date)]
    pub(crate) date: NaiveDate,
    /// Clock-in time (HH:MM)
    #[arg(long, value_parser = parse_clock)]
    pub(crate) clock_in: ClockTime,
    /// Clock-out time (HH:MM); a time before clock-in rolls into the next day
    #[arg(long, value_parser = parse_clock)]
    pub(crate) clock_out: ClockTime,
    /// Break actually taken, in minutes
    #[arg(long, default_value_t = 0)]
    pub(crate) break_minutes: u32,
    /// Planned shift length in hours, the overtime threshold
    #[arg(long, value_parser = parse_money)]
    pub(crate) scheduled_hours: Decimal,
    /// Hourly rate
    #[arg(long, value_parser = parse_money)]
    pub(crate) rate: Decimal,
}

pub(crate) fn run_shift_quote(args: ShiftQuoteArgs) -> Result<(), AppError> {
    let config = StaffingConfig::from(&AppConfig::load()?);
    let quote = price_shift(&args, &config)?;
    render_shift_quote(&args, &quote);
    Ok(())
}

pub(crate) fn run_timesheet_quote(args: TimesheetQuoteArgs) -> Result<(), AppError> {
    let config = StaffingConfig::from(&AppConfig::load()?);
    let pay = price_timesheet(&args, &config)?;
    render_timesheet_quote(&args, &pay);
    Ok(())
}

fn price_shift(args: &ShiftQuoteArgs, config: &StaffingConfig) -> Result<ShiftQuote, AppError> {
    let input = ScheduleInput {
        date: args.date,
        start: args.start,
        end: args.end,
        ends_next_day: args.ends_next_day.then_some(true),
    };
    let break_policy = BreakPolicy {
        minutes: args.break_minutes,
        paid: args.break_paid,
    };
    quote_shift(&input, break_policy, args.rate, args.quantity, &config.limits)
        .map_err(|err| StaffingError::from(err).into())
}

fn price_timesheet(
    args: &TimesheetQuoteArgs,
    config: &StaffingConfig,
) -> Result<ActualPay, AppError> {
    let (_, pay) = quote_worked_time(
        args.date,
        args.clock_in,
        args.clock_out,
        args.break_minutes,
        args.scheduled_hours,
        args.rate,
        &config.pay,
    )
    .map_err(StaffingError::from)?;
    Ok(pay)
}

fn render_shift_quote(args: &ShiftQuoteArgs, quote: &ShiftQuote) {
    println!("Shift quote");
    println!(
        "  Schedule: {} -> {}{}",
        quote.schedule.start,
        quote.schedule.end,
        if quote.schedule.rollover {
            " (ends next day)"
        } else {
            ""
        }
    );
    println!("  Scheduled hours: {}", quote.pay.scheduled_hours);
    println!(
        "  Billable hours: {} ({} minute {} break)",
        quote.pay.billable_hours,
        args.break_minutes,
        if args.break_paid { "paid" } else { "unpaid" }
    );
    println!("  Pay per slot: {} at {}/h", quote.pay.total_pay, args.rate);
    println!(
        "  Total for {} slot(s): {}",
        quote.quantity, quote.total_cost
    );
}

fn render_timesheet_quote(args: &TimesheetQuoteArgs, pay: &ActualPay) {
    println!("Timesheet quote");
    println!(
        "  Worked hours: {} ({} minute break)",
        pay.worked_hours, args.break_minutes
    );
    println!(
        "  Regular hours: {} (scheduled {})",
        pay.regular_hours, args.scheduled_hours
    );
    println!("  Overtime hours: {}", pay.overtime_hours);
    println!("  Total pay: {} at {}/h", pay.total_pay, args.rate);
}
