use crate::error::ProcessError;
use crate::rates::RateTable;

/// Five fixed salary categories; every posting lands in exactly one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SalaryBin {
    NotSpecified,
    Under100k,
    From100kTo200k,
    From200kTo300k,
    Over300k,
}

impl SalaryBin {
    pub fn label(&self) -> &'static str {
        match self {
            SalaryBin::NotSpecified => "not specified",
            SalaryBin::Under100k => "< 100k",
            SalaryBin::From100kTo200k => "100k–200k",
            SalaryBin::From200kTo300k => "200k–300k",
            SalaryBin::Over300k => "> 300k",
        }
    }
}

/// Single-figure estimate from the posted range: mean of both bounds, or the
/// one bound that is present.
pub fn point_estimate(from: Option<f64>, to: Option<f64>) -> Option<f64> {
    match (from, to) {
        (Some(lo), Some(hi)) => Some((lo + hi) / 2.0),
        (Some(lo), None) => Some(lo),
        (None, Some(hi)) => Some(hi),
        (None, None) => None,
    }
}

/// Convert the point estimate into the base currency using the injected
/// snapshot. A currency the snapshot cannot resolve is an error, never a
/// silent fallthrough to the base currency.
pub fn to_base_currency(
    point: Option<f64>,
    currency: Option<&str>,
    base_currency: &str,
    rates: &RateTable,
) -> Result<Option<f64>, ProcessError> {
    let Some(point) = point else {
        return Ok(None);
    };
    let Some(code) = currency else {
        return Ok(Some(point));
    };
    if code == base_currency {
        return Ok(Some(point));
    }
    let rate = rates.lookup(code).ok_or_else(|| ProcessError::UnknownCurrency {
        code: code.to_string(),
    })?;
    Ok(Some(point * rate.value / rate.nominal))
}

/// Strict `>` thresholds at 100k / 200k / 300k of the base currency.
pub fn bin(salary_base: Option<f64>) -> SalaryBin {
    match salary_base {
        None => SalaryBin::NotSpecified,
        Some(s) if s > 300_000.0 => SalaryBin::Over300k,
        Some(s) if s > 200_000.0 => SalaryBin::From200kTo300k,
        Some(s) if s > 100_000.0 => SalaryBin::From100kTo200k,
        Some(_) => SalaryBin::Under100k,
    }
}
