use crate::error::LoadError;
use crate::types::{RawRow, SubscriptionRecord, REQUIRED_COLUMNS};
use crate::util::{parse_amount, parse_date, parse_i32};
use csv::ReaderBuilder;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use tracing::{debug, info};

pub fn load_records(
    path: &Path,
    date_format: Option<&str>,
) -> Result<Vec<SubscriptionRecord>, LoadError> {
    info!("Loading subscriptions from {}", path.display());
    let file = File::open(path).map_err(|e| LoadError::Open {
        path: path.display().to_string(),
        source: e,
    })?;
    let records = load_from_reader(file, date_format)?;
    info!("Loaded {} subscription records", records.len());
    Ok(records)
}

/// Read every row, failing on the first one that does not parse.
pub fn load_from_reader<R: Read>(
    reader: R,
    date_format: Option<&str>,
) -> Result<Vec<SubscriptionRecord>, LoadError> {
    let mut rdr = ReaderBuilder::new().trim(csv::Trim::Headers).from_reader(reader);

    let headers = rdr.headers().map_err(LoadError::Header)?.clone();
    for column in REQUIRED_COLUMNS {
        if !headers.iter().any(|h| h == column) {
            return Err(LoadError::MissingColumn(column));
        }
    }
    debug!("Header row: {:?}", headers);

    let mut records = Vec::new();
    for (idx, result) in rdr.deserialize::<RawRow>().enumerate() {
        let row = idx + 1;
        let raw = result.map_err(|source| LoadError::Row { row, source })?;
        records.push(parse_row(row, raw, date_format)?);
    }
    Ok(records)
}

fn parse_row(
    row: usize,
    raw: RawRow,
    date_format: Option<&str>,
) -> Result<SubscriptionRecord, LoadError> {
    let invalid = |column: &'static str, value: &str| LoadError::InvalidValue {
        row,
        column,
        value: value.to_string(),
    };

    let monthly_revenue =
        parse_amount(&raw.monthly_revenue)
            .ok_or_else(|| invalid("Monthly Revenue", &raw.monthly_revenue))?;
    let age = parse_i32(&raw.age).ok_or_else(|| invalid("Age", &raw.age))?;
    let join_date =
        parse_date(&raw.join_date, date_format)
            .ok_or_else(|| invalid("Join Date", &raw.join_date))?;
    let last_payment_date = parse_date(&raw.last_payment_date, date_format)
        .ok_or_else(|| invalid("Last Payment Date", &raw.last_payment_date))?;

    Ok(SubscriptionRecord {
        user_id: raw.user_id.map(|s| s.trim().to_string()),
        subscription_type: raw.subscription_type.trim().to_string(),
        monthly_revenue,
        join_date,
        last_payment_date,
        country: raw.country.trim().to_string(),
        age,
        gender: raw.gender.trim().to_string(),
        device: raw.device.trim().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use std::io::Write;

    const HEADER: &str = "User ID,Subscription Type,Monthly Revenue,Join Date,\
                          Last Payment Date,Country,Age,Gender,Device,Plan Duration";

    #[test]
    fn loads_typed_records() {
        let csv = format!(
            "{HEADER}\n1,Basic,10,15-01-22,10-06-23,United States,28,Male,Smartphone,1 Month\n\
             2,Premium,15,05-09-21,22-06-23,Canada,35,Female,Tablet,1 Month\n"
        );
        let records = load_from_reader(csv.as_bytes(), None).unwrap();
        assert_eq!(records.len(), 2);
        let first = &records[0];
        assert_eq!(first.user_id.as_deref(), Some("1"));
        assert_eq!(first.subscription_type, "Basic");
        assert_eq!(first.monthly_revenue, 10.0);
        assert_eq!(first.join_date, NaiveDate::from_ymd_opt(2022, 1, 15).unwrap());
        assert_eq!(first.last_payment_date, NaiveDate::from_ymd_opt(2023, 6, 10).unwrap());
        assert_eq!(first.country, "United States");
        assert_eq!(first.age, 28);
        assert_eq!(records[1].device, "Tablet");
    }

    #[test]
    fn user_id_column_is_optional() {
        let csv = "Subscription Type,Gender,Country,Age,Device,Monthly Revenue,\
                   Join Date,Last Payment Date\n\
                   Standard,Female,Spain,41,Laptop,12,2022-02-01,2022-03-01\n";
        let records = load_from_reader(csv.as_bytes(), None).unwrap();
        assert_eq!(records[0].user_id, None);
        assert_eq!(records[0].country, "Spain");
    }

    #[test]
    fn missing_column_is_fatal() {
        let csv = "Subscription Type,Gender,Country,Age,Device,Monthly Revenue,Join Date\n\
                   Basic,Male,US,30,TV,10,2022-01-01\n";
        let err = load_from_reader(csv.as_bytes(), None).unwrap_err();
        assert!(matches!(err, LoadError::MissingColumn("Last Payment Date")));
    }

    #[test]
    fn malformed_date_reports_row_and_column() {
        let csv = format!(
            "{HEADER}\n1,Basic,10,2022-01-01,2022-02-01,US,28,Male,TV,1 Month\n\
             2,Basic,10,someday,2022-02-01,US,28,Male,TV,1 Month\n"
        );
        match load_from_reader(csv.as_bytes(), None).unwrap_err() {
            LoadError::InvalidValue { row, column, value } => {
                assert_eq!(row, 2);
                assert_eq!(column, "Join Date");
                assert_eq!(value, "someday");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn explicit_date_format_is_honored() {
        let csv = format!("{HEADER}\n1,Basic,10,2022/01/03,2022/02/03,US,28,Male,TV,1 Month\n");
        let records = load_from_reader(csv.as_bytes(), Some("%Y/%d/%m")).unwrap();
        assert_eq!(records[0].join_date, NaiveDate::from_ymd_opt(2022, 3, 1).unwrap());
    }

    #[test]
    fn loads_from_path_and_rejects_missing_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "{HEADER}").unwrap();
        let row = "7,Premium,$15.00,2022-01-01,2022-01-31,UK,50,Female,Smart TV,1 Month";
        writeln!(file, "{}", row).unwrap();
        let records = load_records(file.path(), None).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].monthly_revenue, 15.0);

        let missing = Path::new("definitely/not/here.csv");
        assert!(matches!(load_records(missing, None), Err(LoadError::Open { .. })));
    }
}
