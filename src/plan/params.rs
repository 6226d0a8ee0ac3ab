use crate::error::ConfigurationError;
use chrono::{Duration, Local, NaiveDate};
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;

pub const DEFAULT_PAGE_OFFSET: u32 = 10;
pub const DEFAULT_PAGE_UPPER_LIMIT: u32 = 150;
pub const DEFAULT_CHECKOUT_OFFSET: i64 = 1;

/// Which kind of identifier the outer level of the plan varies over
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentifierDomain {
    /// Named places such as "Las Vegas"
    #[default]
    Location,
    /// Numeric destination ids
    DestinationId,
}

impl IdentifierDomain {
    /// The URL placeholder the identifier is bound to
    pub fn placeholder(self) -> &'static str {
        match self {
            Self::Location => "location",
            Self::DestinationId => "destination_id",
        }
    }
}

impl FromStr for IdentifierDomain {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "location" => Ok(Self::Location),
            "destination_id" => Ok(Self::DestinationId),
            other => Err(format!(
                "unknown identifier field {}, expected location or destination_id",
                other
            )),
        }
    }
}

/// Date range and pagination settings for generating request URLs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationParams {
    pub identifier_domain: IdentifierDomain,
    /// First checkin date
    pub start_date: NaiveDate,
    /// Exclusive end of the checkin range
    pub end_date: NaiveDate,
    /// Pagination step size
    pub page_offset: u32,
    /// Largest page value, inclusive
    pub page_upper_limit: u32,
    /// Nights per stay
    pub checkout_offset: i64,
}

impl GenerationParams {
    /// Defaults for a one-night range starting at `start_date`
    pub fn starting(start_date: NaiveDate) -> Self {
        Self {
            identifier_domain: IdentifierDomain::default(),
            start_date,
            end_date: start_date.succ_opt().unwrap_or(start_date),
            page_offset: DEFAULT_PAGE_OFFSET,
            page_upper_limit: DEFAULT_PAGE_UPPER_LIMIT,
            checkout_offset: DEFAULT_CHECKOUT_OFFSET,
        }
    }

    /// Reject settings the plan cannot be generated from.
    ///
    /// Every checkin and checkout date must be representable, so a valid
    /// plan never overflows while it is walked.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.page_offset == 0 {
            return Err(ConfigurationError::InvalidOption {
                name: "pageOffset",
                reason: "must be greater than zero".to_string(),
            });
        }
        let Some(end_date) = self.end_or_fallback() else {
            return Err(ConfigurationError::InvalidOption {
                name: "startDate",
                reason: format!("{} is the last representable date", self.start_date),
            });
        };

        let last_day = (end_date - self.start_date).num_days() - 1;
        if self.checkout_date(0).is_none() || self.checkout_date(last_day).is_none() {
            return Err(ConfigurationError::InvalidOption {
                name: "checkoutOffset",
                reason: format!(
                    "{} nights from {} is out of the representable date range",
                    self.checkout_offset, self.start_date
                ),
            });
        }
        Ok(())
    }

    fn end_or_fallback(&self) -> Option<NaiveDate> {
        if self.end_date > self.start_date {
            Some(self.end_date)
        } else {
            self.start_date.succ_opt()
        }
    }

    /// The end date actually used: `end_date` when it falls after
    /// `start_date`, otherwise the day after `start_date`.
    pub fn effective_end_date(&self) -> NaiveDate {
        let effective = self.end_or_fallback().unwrap_or(self.start_date);
        if effective != self.end_date {
            warn!(
                "Invalid scrape end date {}. Setting end date to {}",
                self.end_date, effective
            );
        }
        effective
    }

    /// Number of checkin days in `[start_date, end_date)`
    pub fn checkin_days(&self) -> i64 {
        (self.end_date - self.start_date).num_days().max(0)
    }

    /// Last checkin date in range, `start_date` when the range is empty
    pub fn last_checkin(&self) -> NaiveDate {
        self.checkin_date(self.checkin_days() - 1)
            .filter(|date| *date >= self.start_date)
            .unwrap_or(self.start_date)
    }

    pub fn checkin_date(&self, day: i64) -> Option<NaiveDate> {
        self.start_date
            .checked_add_signed(Duration::try_days(day)?)
    }

    pub fn checkout_date(&self, day: i64) -> Option<NaiveDate> {
        self.checkin_date(day.checked_add(self.checkout_offset)?)
    }

    /// Number of page values from 0 to `page_upper_limit` inclusive
    pub fn page_count(&self) -> u64 {
        u64::from(self.page_upper_limit / self.page_offset.max(1)) + 1
    }

    /// The `step`-th page value
    pub fn page(&self, step: u64) -> Option<u32> {
        u32::try_from(step)
            .ok()?
            .checked_mul(self.page_offset)
            .filter(|page| *page <= self.page_upper_limit)
    }

    pub fn pages(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.page_count()).map_while(|step| self.page(step))
    }
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self::starting(Local::now().date_naive())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_defaults() {
        let params = GenerationParams::starting(date(2024, 1, 1));
        assert_eq!(params.end_date, date(2024, 1, 2));
        assert_eq!(params.page_offset, 10);
        assert_eq!(params.page_upper_limit, 150);
        assert_eq!(params.checkout_offset, 1);
        assert_eq!(params.identifier_domain.placeholder(), "location");
    }

    #[test]
    fn test_end_date_not_after_start_falls_back() {
        let mut params = GenerationParams::starting(date(2024, 1, 5));
        params.end_date = date(2024, 1, 5);
        assert_eq!(params.effective_end_date(), date(2024, 1, 6));

        params.end_date = date(2024, 1, 1);
        assert_eq!(params.effective_end_date(), date(2024, 1, 6));

        params.end_date = date(2024, 1, 9);
        assert_eq!(params.effective_end_date(), date(2024, 1, 9));
    }

    #[test]
    fn test_pages_are_inclusive() {
        let mut params = GenerationParams::starting(date(2024, 1, 1));
        params.page_offset = 50;
        params.page_upper_limit = 100;
        assert_eq!(params.pages().collect::<Vec<_>>(), vec![0, 50, 100]);

        params.page_upper_limit = 120;
        assert_eq!(params.pages().collect::<Vec<_>>(), vec![0, 50, 100]);
    }

    #[test]
    fn test_zero_page_offset_is_rejected() {
        let mut params = GenerationParams::starting(date(2024, 1, 1));
        params.page_offset = 0;
        assert!(params.validate().is_err());
    }

    #[test]
    fn test_out_of_range_dates_are_none() {
        let mut params = GenerationParams::starting(date(2024, 1, 1));
        params.checkout_offset = 200_000_000;
        assert_eq!(params.checkin_date(1), Some(date(2024, 1, 2)));
        assert_eq!(params.checkout_date(0), None);
        assert_eq!(params.checkin_date(i64::MAX), None);

        params.checkout_offset = i64::MAX;
        assert_eq!(params.checkout_date(1), None);
    }

    #[test]
    fn test_out_of_range_checkout_offset_is_rejected() {
        let mut params = GenerationParams::starting(date(2024, 1, 1));
        params.checkout_offset = 200_000_000;
        assert!(matches!(
            params.validate(),
            Err(ConfigurationError::InvalidOption { name: "checkoutOffset", .. })
        ));

        params.checkout_offset = -3;
        assert!(params.validate().is_ok());
    }

    #[test]
    fn test_last_representable_start_date_is_rejected() {
        let params = GenerationParams::starting(NaiveDate::MAX);
        assert_eq!(params.end_date, NaiveDate::MAX);
        assert!(matches!(
            params.validate(),
            Err(ConfigurationError::InvalidOption { name: "startDate", .. })
        ));
        assert_eq!(params.effective_end_date(), NaiveDate::MAX);
    }

    #[test]
    fn test_page_steps_up_to_the_largest_limit() {
        let mut params = GenerationParams::starting(date(2024, 1, 1));
        params.page_offset = 1;
        params.page_upper_limit = u32::MAX;
        assert_eq!(params.page_count(), u64::from(u32::MAX) + 1);
        assert_eq!(params.page(u64::from(u32::MAX)), Some(u32::MAX));
        assert_eq!(params.page(u64::from(u32::MAX) + 1), None);
    }

    #[test]
    fn test_last_checkin() {
        let mut params = GenerationParams::starting(date(2024, 1, 1));
        assert_eq!(params.last_checkin(), date(2024, 1, 1));
        params.end_date = date(2024, 1, 8);
        assert_eq!(params.last_checkin(), date(2024, 1, 7));
        params.end_date = date(2023, 12, 1);
        assert_eq!(params.last_checkin(), date(2024, 1, 1));
    }
}
