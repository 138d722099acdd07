//! Discount and price arithmetic.
//!
//! Pure functions over `f64`. Nothing here rounds: repeated conversions
//! between percent and currency must work on unrounded values, and rounding
//! is left to display formatting (`format_currency`, `format_percent`).

use sadio_model::{Discount, DiscountMode, PriceBreakdown};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum DiscountError {
    #[error("Discount percent {0} outside 0-{1}")]
    PercentOutOfRange(f64, f64),
    #[error("Discount amount {amount} outside 0-{max:.2}")]
    AmountOutOfRange { amount: f64, max: f64 },
}

/// Limits on discount input.
#[derive(Debug, Clone)]
pub struct PricingConfig {
    /// Upper bound of the percent input
    pub max_slider_percent: f64,
    /// Largest currency discount as a fraction of the base price
    pub max_amount_ratio: f64,
    /// Increment of the percent input; values snap to multiples of it
    pub slider_step: f64,
}

impl Default for PricingConfig {
    fn default() -> Self {
        Self {
            max_slider_percent: 50.0,
            max_amount_ratio: 0.9,
            slider_step: 0.5,
        }
    }
}

fn breakdown(base_price: f64, unit_price_after: f64, quantity: u32) -> PriceBreakdown {
    let total_after = unit_price_after * quantity as f64;
    let total_before = base_price * quantity as f64;
    PriceBreakdown {
        unit_price_after,
        total_after,
        total_before,
        discount_total: total_before - total_after,
    }
}

/// Price a line with a percentage discount.
///
/// The same arithmetic applies to case and unit sales; only the base price
/// the caller passes differs.
pub fn price_with_percent_discount(
    base_price: f64,
    quantity: u32,
    discount_percent: f64,
) -> PriceBreakdown {
    breakdown(base_price, base_price * (1.0 - discount_percent / 100.0), quantity)
}

/// Price a line with a currency discount per unit sold.
///
/// Does not floor the result at zero.
pub fn price_with_currency_discount(
    base_price: f64,
    discount_amount: f64,
    quantity: u32,
) -> PriceBreakdown {
    breakdown(base_price, base_price - discount_amount, quantity)
}

/// Percent equivalent of a currency discount; 0 for a non-positive base.
pub fn percent_from_currency_discount(discount_amount: f64, base_price: f64) -> f64 {
    if base_price > 0.0 {
        discount_amount / base_price * 100.0
    } else {
        0.0
    }
}

/// Currency equivalent of a percent discount.
pub fn currency_from_percent_discount(discount_percent: f64, base_price: f64) -> f64 {
    base_price * (discount_percent / 100.0)
}

/// Largest currency discount accepted for a base price.
pub fn max_discount_amount(base_price: f64, config: &PricingConfig) -> f64 {
    base_price * config.max_amount_ratio
}

/// Price a line with whichever representation the discount carries.
pub fn apply_discount(base_price: f64, quantity: u32, discount: Discount) -> PriceBreakdown {
    match discount {
        Discount::Percent(p) => price_with_percent_discount(base_price, quantity, p),
        Discount::Amount(a) => price_with_currency_discount(base_price, a, quantity),
    }
}

/// Check a discount against the input limits.
///
/// Percentages may go up to 100 here: a percent derived from a currency
/// discount can exceed the slider bound and is still valid.
pub fn validate_discount(
    discount: Discount,
    base_price: f64,
    config: &PricingConfig,
) -> Result<Discount, DiscountError> {
    match discount {
        Discount::Percent(p) if !(0.0..=100.0).contains(&p) => {
            Err(DiscountError::PercentOutOfRange(p, 100.0))
        }
        Discount::Amount(a) => {
            let max = max_discount_amount(base_price, config);
            if (0.0..=max).contains(&a) {
                Ok(discount)
            } else {
                Err(DiscountError::AmountOutOfRange { amount: a, max })
            }
        }
        Discount::Percent(_) => Ok(discount),
    }
}

/// A priced discount with both representations filled in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct DiscountQuote {
    pub base_price: f64,
    pub quantity: u32,
    /// Representation the user entered
    pub mode: DiscountMode,
    pub discount_percent: f64,
    pub discount_amount: f64,
    pub breakdown: PriceBreakdown,
}

/// Price a discount and derive its other representation.
pub fn quote(base_price: f64, quantity: u32, discount: Discount) -> DiscountQuote {
    let (discount_percent, discount_amount) = match discount {
        Discount::Percent(p) => (p, currency_from_percent_discount(p, base_price)),
        Discount::Amount(a) => (percent_from_currency_discount(a, base_price), a),
    };
    DiscountQuote {
        base_price,
        quantity,
        mode: discount.mode(),
        discount_percent,
        discount_amount,
        breakdown: apply_discount(base_price, quantity, discount),
    }
}

/// Last copy between the two discount inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum SyncDirection {
    AmountIntoPercent,
    PercentIntoAmount,
}

/// The percent and currency discount inputs, side by side.
///
/// Each input holds its own value; syncing copies the converted value of
/// one into the other, clamped to the target input's bounds.
#[derive(Debug, Clone, Default)]
pub struct DiscountEditor {
    percent: f64,
    amount: f64,
    last_sync: Option<SyncDirection>,
    config: PricingConfig,
}

impl DiscountEditor {
    pub fn new(config: PricingConfig) -> Self {
        Self {
            config,
            ..Default::default()
        }
    }

    pub fn percent(&self) -> f64 {
        self.percent
    }

    pub fn amount(&self) -> f64 {
        self.amount
    }

    pub fn last_sync(&self) -> Option<SyncDirection> {
        self.last_sync
    }

    /// Set the percent input (bounded by the slider range, snapped to the
    /// slider step).
    pub fn set_percent(&mut self, percent: f64) -> Result<(), DiscountError> {
        let max = self.config.max_slider_percent;
        if !(0.0..=max).contains(&percent) {
            return Err(DiscountError::PercentOutOfRange(percent, max));
        }
        let step = self.config.slider_step;
        self.percent = if step > 0.0 {
            ((percent / step).round() * step).min(max)
        } else {
            percent
        };
        Ok(())
    }

    /// Set the currency input (bounded by the base price).
    pub fn set_amount(&mut self, amount: f64, base_price: f64) -> Result<(), DiscountError> {
        validate_discount(Discount::Amount(amount), base_price, &self.config)?;
        self.amount = amount;
        Ok(())
    }

    /// Copy the currency input into the percent input.
    pub fn sync_amount_into_percent(&mut self, base_price: f64) {
        self.percent = percent_from_currency_discount(self.amount, base_price)
            .min(self.config.max_slider_percent);
        self.last_sync = Some(SyncDirection::AmountIntoPercent);
    }

    /// Copy the percent input into the currency input.
    pub fn sync_percent_into_amount(&mut self, base_price: f64) {
        self.amount = currency_from_percent_discount(self.percent, base_price)
            .min(max_discount_amount(base_price, &self.config));
        self.last_sync = Some(SyncDirection::PercentIntoAmount);
    }

    /// The discount of the chosen input.
    pub fn discount(&self, mode: DiscountMode) -> Discount {
        match mode {
            DiscountMode::Percent => Discount::Percent(self.percent),
            DiscountMode::Currency => Discount::Amount(self.amount),
        }
    }

    /// Live preview of the chosen input.
    pub fn preview(&self, base_price: f64, quantity: u32, mode: DiscountMode) -> DiscountQuote {
        quote(base_price, quantity, self.discount(mode))
    }

    pub fn reset(&mut self) {
        self.percent = 0.0;
        self.amount = 0.0;
        self.last_sync = None;
    }
}

/// Currency for display, two decimals.
pub fn format_currency(value: f64) -> String {
    format!("R$ {value:.2}")
}

/// Percent for display, one decimal.
pub fn format_percent(value: f64) -> String {
    format!("{value:.1}%")
}
