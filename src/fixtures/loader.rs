//! Load product catalogues, scenarios and expected results from disk

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use log::debug;

use crate::error::FixtureError;
use crate::scenario::LoanScenario;

use super::compare::ExpectedResult;
use super::product::ProductRecord;

fn open(path: &Path) -> Result<BufReader<File>, FixtureError> {
    File::open(path)
        .map(BufReader::new)
        .map_err(|source| FixtureError::Io {
            path: path.to_path_buf(),
            source,
        })
}

/// Load a JSON array of catalogue products
pub fn load_products(path: &Path) -> Result<Vec<ProductRecord>, FixtureError> {
    let products: Vec<ProductRecord> = serde_json::from_reader(open(path)?)?;
    debug!("loaded {} products from {}", products.len(), path.display());
    Ok(products)
}

/// Load a JSON array of expected results, one per offered product
pub fn load_expected(path: &Path) -> Result<Vec<ExpectedResult>, FixtureError> {
    let expected: Vec<ExpectedResult> = serde_json::from_reader(open(path)?)?;
    debug!("loaded {} expected results from {}", expected.len(), path.display());
    Ok(expected)
}

/// Load loan scenarios from a CSV file with a header row
pub fn load_scenarios(path: &Path) -> Result<Vec<LoanScenario>, FixtureError> {
    let scenarios = read_scenarios(open(path)?)?;
    debug!("loaded {} scenarios from {}", scenarios.len(), path.display());
    Ok(scenarios)
}

/// Read loan scenarios from any CSV source.
///
/// Columns are matched by header name; missing columns take their defaults
/// and an empty cell leaves an optional field unset.
pub fn read_scenarios<R: Read>(source: R) -> Result<Vec<LoanScenario>, FixtureError> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(source);
    let mut scenarios = Vec::new();
    for row in reader.deserialize::<LoanScenario>() {
        scenarios.push(row?);
    }
    Ok(scenarios)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{PaymentTiming, RoundDirection, RoundPrecision};
    use crate::scenario::LoanShape;

    const SCENARIOS: &str = "\
name,shape,received,balloon,number_of_periods,first_payment,periods_per_year,interest_only_periods,timing,round_direction,round_precision,rate_changes_at_thresholds
annuity1,annuity,1500000,0,240,,12,0,arrears,normal,cent,false
serial4,serial,1555555,1000,,60000,12,0,arrears,normal,cent,false
serial2,serial,89967890,50,45,,10,2,advance,up,integer,true
";

    #[test]
    fn test_read_scenarios() {
        let scenarios = read_scenarios(SCENARIOS.as_bytes()).unwrap();
        assert_eq!(scenarios.len(), 3);

        assert_eq!(scenarios[0].shape, LoanShape::Annuity);
        assert_eq!(scenarios[0].number_of_periods, Some(240));
        assert_eq!(scenarios[0].first_payment, None);

        assert_eq!(scenarios[1].number_of_periods, None);
        assert_eq!(scenarios[1].first_payment, Some(60_000.0));

        let advance = &scenarios[2];
        assert_eq!(advance.timing, PaymentTiming::Advance);
        assert_eq!(advance.round_direction, RoundDirection::Up);
        assert_eq!(advance.round_precision, RoundPrecision::Integer);
        assert!(advance.rate_changes_at_thresholds);
        // Not in the file
        assert!(!advance.rates_run_concurrently);
    }

    #[test]
    fn test_bad_scenario_row_is_reported() {
        let text = "name,shape,received,periods_per_year\nbad,balloon,1000,12\n";
        assert!(matches!(
            read_scenarios(text.as_bytes()),
            Err(FixtureError::Csv(_))
        ));
    }

    #[test]
    fn test_missing_file_names_the_path() {
        let path = Path::new("no/such/catalogue.json");
        let err = load_products(path).unwrap_err();
        assert!(matches!(err, FixtureError::Io { .. }));
        assert!(err.to_string().contains("no/such/catalogue.json"));
    }

    #[test]
    fn test_load_products_and_expected_from_disk() {
        let dir = std::env::temp_dir().join(format!("loan_rate_engine_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let products = dir.join("products.json");
        std::fs::write(
            &products,
            r#"[{"navn": "A", "kap_periode": 1, "min_belop_a": "0", "nominell_rente_1_a": "4,1"}]"#,
        )
        .unwrap();
        let expected = dir.join("expected.json");
        std::fs::write(
            &expected,
            r#"[{"effectiveInterestRate": 4.17, "resitude": "0.04 / 3", "paybackPeriodCount": 240, "periods": null},
                {"error": -1}]"#,
        )
        .unwrap();

        let loaded = load_products(&products).unwrap();
        assert_eq!(loaded.len(), 1);
        assert!((loaded[0].steps[0].annual_interest - 4.1).abs() < 1e-12);

        let results = load_expected(&expected).unwrap();
        assert_eq!(results.len(), 2);
        assert!((results[0].residue - 0.04).abs() < 1e-12);
        assert!(results[0].periods.is_empty());
        assert_eq!(results[1].error, -1);

        std::fs::remove_dir_all(&dir).unwrap();
    }
}
