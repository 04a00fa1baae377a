//! Product catalogue entries
//!
//! Catalogue files list each bank product with up to five rate steps named
//! `a` through `e`. Numbers arrive in whatever shape the catalogue was typed
//! in: JSON numbers, strings with thousands separators, decimal commas, or
//! null. Anything unreadable is treated as absent.

use serde::{Deserialize, Deserializer};
use serde_json::Value;

use crate::loan::{close_gaps, FeeSchedule, LoanConfig, LoanConfigBuilder, RateSegment};
use crate::scenario::LoanScenario;

fn lenient_number(value: Option<Value>) -> Option<f64> {
    match value? {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text
            .chars()
            .filter(|c| !c.is_whitespace())
            .map(|c| if c == ',' { '.' } else { c })
            .collect::<String>()
            .parse()
            .ok(),
        _ => None,
    }
}

fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    Option::<Value>::deserialize(deserializer).map(lenient_number)
}

/// Whole numbers only; "1,5" or "1.5" read as absent
fn lenient_u32<'de, D>(deserializer: D) -> Result<Option<u32>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(number)) => number.as_u64().and_then(|n| u32::try_from(n).ok()),
        Some(Value::String(text)) => text
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .parse()
            .ok(),
        _ => None,
    })
}

/// Catalogue row as it appears on disk
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProduct {
    navn: Option<String>,
    #[serde(deserialize_with = "lenient_u32")]
    kap_periode: Option<u32>,
    #[serde(deserialize_with = "lenient_u32")]
    max_avdragsfrihet: Option<u32>,
    #[serde(deserialize_with = "lenient_f64")]
    etableringsgebyr: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    depotgebyr: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    provisjon: Option<f64>,

    #[serde(deserialize_with = "lenient_f64")]
    min_belop_a: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    max_belop_a: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    termingebyr_1_a: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    nominell_rente_1_a: Option<f64>,

    #[serde(deserialize_with = "lenient_f64")]
    min_belop_b: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    max_belop_b: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    termingebyr_1_b: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    nominell_rente_1_b: Option<f64>,

    #[serde(deserialize_with = "lenient_f64")]
    min_belop_c: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    max_belop_c: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    termingebyr_1_c: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    nominell_rente_1_c: Option<f64>,

    #[serde(deserialize_with = "lenient_f64")]
    min_belop_d: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    max_belop_d: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    termingebyr_1_d: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    nominell_rente_1_d: Option<f64>,

    #[serde(deserialize_with = "lenient_f64")]
    min_belop_e: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    max_belop_e: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    termingebyr_1_e: Option<f64>,
    #[serde(deserialize_with = "lenient_f64")]
    nominell_rente_1_e: Option<f64>,
}

/// One rate step of a product
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateStep {
    pub min_amount: f64,
    pub max_amount: Option<f64>,
    pub periodic_fee: f64,
    pub annual_interest: f64,
}

/// A bank product from the catalogue
#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(from = "RawProduct")]
pub struct ProductRecord {
    pub name: String,
    /// Months between capitalizations; 0 when not given
    pub capitalization_months: u32,
    pub interest_only_years: u32,
    pub processing_fee: f64,
    pub document_fee: f64,
    /// Running fee per period in percent of the principal
    pub period_percentage: f64,
    /// Steps up to the first one without a rate
    pub steps: Vec<RateStep>,
}

impl From<RawProduct> for ProductRecord {
    fn from(raw: RawProduct) -> Self {
        let columns = [
            (raw.min_belop_a, raw.max_belop_a, raw.termingebyr_1_a, raw.nominell_rente_1_a),
            (raw.min_belop_b, raw.max_belop_b, raw.termingebyr_1_b, raw.nominell_rente_1_b),
            (raw.min_belop_c, raw.max_belop_c, raw.termingebyr_1_c, raw.nominell_rente_1_c),
            (raw.min_belop_d, raw.max_belop_d, raw.termingebyr_1_d, raw.nominell_rente_1_d),
            (raw.min_belop_e, raw.max_belop_e, raw.termingebyr_1_e, raw.nominell_rente_1_e),
        ];
        let steps = columns
            .into_iter()
            .map_while(|(min, max, fee, rate)| {
                rate.map(|annual_interest| RateStep {
                    min_amount: min.unwrap_or(0.0),
                    max_amount: max,
                    periodic_fee: fee.unwrap_or(0.0),
                    annual_interest,
                })
            })
            .collect();

        Self {
            name: raw.navn.unwrap_or_default(),
            capitalization_months: raw.kap_periode.unwrap_or(0),
            interest_only_years: raw.max_avdragsfrihet.unwrap_or(0),
            processing_fee: raw.etableringsgebyr.unwrap_or(0.0),
            document_fee: raw.depotgebyr.unwrap_or(0.0),
            period_percentage: raw.provisjon.unwrap_or(0.0),
            steps,
        }
    }
}

impl ProductRecord {
    /// Rate segments with the gaps between steps closed
    pub fn segments(&self) -> Vec<RateSegment> {
        let mut segments: Vec<RateSegment> = self
            .steps
            .iter()
            .map(|step| RateSegment {
                lower_limit: step.min_amount,
                upper_limit: step.max_amount.into(),
                periodic_fee: step.periodic_fee,
                annual_interest: step.annual_interest,
            })
            .collect();
        close_gaps(&mut segments);
        segments
    }

    /// Whether a new loan of `principal` meets the smallest step
    pub fn offers(&self, principal: f64) -> bool {
        self.steps
            .first()
            .is_some_and(|step| step.min_amount <= principal)
    }

    /// Capitalizations per year; 0 when the catalogue is silent
    pub fn capitalization_freq(&self) -> u32 {
        if self.capitalization_months == 0 {
            0
        } else {
            12 / self.capitalization_months
        }
    }

    pub fn fees(&self) -> FeeSchedule {
        FeeSchedule {
            processing: self.processing_fee,
            document: self.document_fee,
            percentage: 0.0,
            period_percentage: self.period_percentage,
        }
    }

    /// Loan settings for `scenario` with this product.
    ///
    /// `None` when the product does not offer the requested amount. Once a
    /// loan is granted it may be paid down below the smallest step, so the
    /// first lower limit is moved to zero.
    pub fn loan_builder(&self, scenario: &LoanScenario) -> Option<LoanConfigBuilder> {
        let principal = if scenario.ignore_origination {
            scenario.received
        } else {
            scenario.received + self.processing_fee + self.document_fee
        };
        if !self.offers(principal) {
            return None;
        }

        let mut segments = self.segments();
        if let Some(first) = segments.first_mut() {
            first.lower_limit = 0.0;
        }

        let mut builder = LoanConfig::builder()
            .received(scenario.received)
            .periods_per_year(scenario.periods_per_year)
            .capitalization_freq(self.capitalization_freq())
            .balloon(scenario.balloon)
            .interest_only(scenario.interest_only_periods, self.interest_only_years * 12)
            .rounding(scenario.rounding())
            .remainder(scenario.remainder)
            .ignore_origination(scenario.ignore_origination)
            .timing(scenario.timing)
            .fees(self.fees())
            .rate_changes_at_thresholds(scenario.rate_changes_at_thresholds)
            .rates_run_concurrently(scenario.rates_run_concurrently)
            .accuracy(scenario.accuracy)
            .segments(segments);
        if let Some(periods) = scenario.number_of_periods {
            builder = builder.number_of_periods(periods);
        }
        if let Some(amount) = scenario.first_payment {
            builder = builder.first_payment(amount);
        }
        Some(builder)
    }
}
