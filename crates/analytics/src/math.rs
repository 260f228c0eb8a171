//! Return-series statistics. Returns are expressed in percent throughout.

use rust_decimal::prelude::*;

pub fn mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<Decimal>() / Decimal::from(values.len()))
}

/// Sample standard deviation (n - 1 denominator).
pub fn sample_stdev(values: &[Decimal]) -> Option<Decimal> {
    if values.len() < 2 {
        return None;
    }
    let mean = mean(values)?;
    let variance = values
        .iter()
        .map(|v| (*v - mean) * (*v - mean))
        .sum::<Decimal>()
        / Decimal::from(values.len() - 1);
    variance.sqrt()
}

/// Root mean square of the negative returns over the whole series.
pub fn downside_deviation(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let squares: Decimal = values
        .iter()
        .filter(|v| v.is_sign_negative() && !v.is_zero())
        .map(|v| *v * *v)
        .sum();
    (squares / Decimal::from(values.len())).sqrt()
}

/// The compounded per-interval return of a percent series.
pub fn geometric_mean(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let mut growth = Decimal::ONE;
    for value in values {
        growth = growth.checked_mul(Decimal::ONE + *value / Decimal::ONE_HUNDRED)?;
    }
    if growth <= Decimal::ZERO {
        return None;
    }
    let exponent = Decimal::ONE / Decimal::from(values.len());
    Some((growth.checked_powd(exponent)? - Decimal::ONE) * Decimal::ONE_HUNDRED)
}

/// Compound annual growth rate in percent. `intervals_per_year` scales the
/// number of intervals the run covered into years.
pub fn cagr(
    initial: Decimal,
    last: Decimal,
    intervals: usize,
    intervals_per_year: Decimal,
) -> Option<Decimal> {
    if initial <= Decimal::ZERO || last < Decimal::ZERO || intervals == 0 || intervals_per_year <= Decimal::ZERO {
        return None;
    }
    let years = Decimal::from(intervals) / intervals_per_year;
    let exponent = Decimal::ONE.checked_div(years)?;
    let growth = (last / initial).checked_powd(exponent)?;
    Some((growth - Decimal::ONE) * Decimal::ONE_HUNDRED)
}

fn ratio(numerator: Decimal, denominator: Option<Decimal>) -> Option<Decimal> {
    denominator
        .filter(|d| !d.is_zero())
        .and_then(|d| numerator.checked_div(d))
}

pub fn sharpe(average: Decimal, risk_free: Decimal, returns: &[Decimal]) -> Option<Decimal> {
    ratio(average - risk_free, sample_stdev(returns))
}

pub fn sortino(average: Decimal, risk_free: Decimal, returns: &[Decimal]) -> Option<Decimal> {
    ratio(average - risk_free, downside_deviation(returns))
}

/// Mean active return over tracking error. `active` holds the per-interval
/// difference between the strategy and the benchmark.
pub fn information(average_active: Decimal, active: &[Decimal]) -> Option<Decimal> {
    ratio(average_active, sample_stdev(active))
}

pub fn calmar(cagr: Option<Decimal>, max_drawdown_percent: Option<Decimal>) -> Option<Decimal> {
    ratio(cagr?, max_drawdown_percent.map(|d| d.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn close(a: Decimal, b: Decimal) -> bool {
        (a - b).abs() < dec!(0.000001)
    }

    #[test]
    fn sample_deviation() {
        let values = [dec!(2), dec!(4), dec!(4), dec!(4), dec!(5), dec!(5), dec!(7), dec!(9)];
        assert_eq!(mean(&values), Some(dec!(5)));
        assert!(close(sample_stdev(&values).unwrap(), dec!(2.138089935)));
        assert_eq!(sample_stdev(&[dec!(1)]), None);
    }

    #[test]
    fn downside_only_counts_losses() {
        let values = [dec!(3), dec!(-4), dec!(0), dec!(3)];
        assert!(close(downside_deviation(&values).unwrap(), dec!(2)));
        assert_eq!(sortino(dec!(1), dec!(0), &[dec!(1), dec!(2)]), None);
    }

    #[test]
    fn compounding() {
        assert!(close(geometric_mean(&[dec!(10), dec!(10)]).unwrap(), dec!(10)));
        assert!(close(cagr(dec!(100), dec!(121), 2, dec!(1)).unwrap(), dec!(10)));
        assert_eq!(cagr(dec!(0), dec!(121), 2, dec!(1)), None);
        assert_eq!(geometric_mean(&[dec!(-100)]), None);
    }

    #[test]
    fn calmar_uses_the_drawdown_magnitude() {
        assert_eq!(calmar(Some(dec!(10)), Some(dec!(-20))), Some(dec!(0.5)));
        assert_eq!(calmar(Some(dec!(10)), None), None);
    }
}
