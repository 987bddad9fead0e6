use crate::types::{
    ArpuDisplayRow, ArpuRow, Crosstab, GroupValue, GroupValueRow, Leader, LeaderRow, MonthlyCount,
    MonthlyCountRow, Share, ShareRow,
};
use crate::util::{format_int, format_number};
use serde::Serialize;
use std::error::Error;
use std::path::Path;
use tabled::{builder::Builder, settings::Style, Table, Tabled};

type WriteResult = Result<(), Box<dyn Error + Send + Sync>>;

pub fn write_csv<T: Serialize>(path: &Path, rows: &[T]) -> WriteResult {
    let mut wtr = csv::Writer::from_path(path)?;
    for r in rows {
        wtr.serialize(r)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_crosstab_csv(path: &Path, table: &Crosstab) -> WriteResult {
    let mut wtr = csv::Writer::from_path(path)?;
    let header = std::iter::once(&table.row_label).chain(&table.columns);
    wtr.write_record(header)?;
    for (key, values) in &table.rows {
        let mut record = vec![key.clone()];
        record.extend(values.iter().map(|v| v.to_string()));
        wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_json<T: Serialize>(path: &Path, value: &T) -> WriteResult {
    let s = serde_json::to_string_pretty(value)?;
    std::fs::write(path, s)?;
    Ok(())
}

pub fn print_section(title: &str) {
    println!("\n== {} ==\n", title);
}

pub fn print_scalar(label: &str, value: f64, decimals: usize) {
    println!("{}: {}\n", label, format_number(value, decimals));
}

pub fn print_table<T>(rows: &[T])
where
    T: Tabled + Clone,
{
    if rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    let table_str = Table::new(rows.iter().cloned()).with(Style::markdown()).to_string();
    println!("{}\n", table_str);
}

pub fn print_crosstab(table: &Crosstab, decimals: usize) {
    if table.rows.is_empty() {
        println!("(no rows)\n");
        return;
    }
    println!("{}\n", render_crosstab(table, decimals));
}

pub fn render_crosstab(table: &Crosstab, decimals: usize) -> String {
    let mut builder = Builder::default();
    builder.push_record(
        std::iter::once(table.row_label.clone()).chain(table.columns.iter().cloned()),
    );
    for (key, values) in &table.rows {
        builder.push_record(
            std::iter::once(key.clone()).chain(values.iter().map(|v| format_number(*v, decimals))),
        );
    }
    builder.build().with(Style::markdown()).to_string()
}

pub fn group_value_rows(values: &[GroupValue], decimals: usize) -> Vec<GroupValueRow> {
    values
        .iter()
        .map(|v| GroupValueRow {
            group: v.group.clone(),
            value: format_number(v.value, decimals),
        })
        .collect()
}

pub fn share_rows(shares: &[Share]) -> Vec<ShareRow> {
    shares
        .iter()
        .map(|s| ShareRow {
            group: s.group.clone(),
            count: format_int(s.count),
            percent: format_number(s.percent, 2),
        })
        .collect()
}

pub fn leader_rows(leaders: &[Leader]) -> Vec<LeaderRow> {
    leaders
        .iter()
        .map(|l| LeaderRow {
            plan: l.plan.clone(),
            leader: l.leader.clone(),
            percent: format_number(l.percent, 2),
        })
        .collect()
}

pub fn monthly_rows(months: &[MonthlyCount]) -> Vec<MonthlyCountRow> {
    months
        .iter()
        .map(|m| MonthlyCountRow {
            month: m.month.to_string(),
            signups: format_int(m.signups),
        })
        .collect()
}

pub fn arpu_rows(rows: &[ArpuRow]) -> Vec<ArpuDisplayRow> {
    rows.iter()
        .map(|r| ArpuDisplayRow {
            country: r.country.clone(),
            plan: r.plan.clone(),
            subscribers: format_int(r.subscribers),
            revenue: format_number(r.revenue, 2),
            arpu: format_number(r.arpu, 2),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> Crosstab {
        Crosstab {
            row_label: "Device".into(),
            columns: vec!["Basic".into(), "Premium".into()],
            rows: vec![("mobile".into(), vec![0.5, 0.5]), ("tv".into(), vec![0.25, 0.75])],
        }
    }

    #[test]
    fn crosstab_renders_header_and_rows() {
        let rendered = render_crosstab(&table(), 2);
        let lines: Vec<&str> = rendered.lines().collect();
        assert!(lines[0].contains("Device") && lines[0].contains("Premium"));
        assert!(rendered.contains("mobile"));
        assert!(rendered.contains("0.75"));
    }

    #[test]
    fn display_rows_format_numbers() {
        let rows = group_value_rows(
            &[GroupValue {
                group: "Premium".into(),
                value: 12345.678,
            }],
            2,
        );
        assert_eq!(rows[0].value, "12,345.68");
        let shares = share_rows(&[Share {
            group: "US".into(),
            count: 1200,
            percent: f64::NAN,
        }]);
        assert_eq!(shares[0].count, "1,200");
        assert_eq!(shares[0].percent, "NaN");
    }

    #[test]
    fn exports_csv_and_json() {
        let dir = tempfile::tempdir().unwrap();
        let csv_path = dir.path().join("device_plan.csv");
        write_crosstab_csv(&csv_path, &table()).unwrap();
        let written = std::fs::read_to_string(&csv_path).unwrap();
        assert_eq!(written, "Device,Basic,Premium\nmobile,0.5,0.5\ntv,0.25,0.75\n");

        let rows_path = dir.path().join("revenue.csv");
        write_csv(
            &rows_path,
            &group_value_rows(
                &[GroupValue {
                    group: "Basic".into(),
                    value: 60.0,
                }],
                2,
            ),
        )
        .unwrap();
        let written = std::fs::read_to_string(&rows_path).unwrap();
        assert_eq!(written, "Group,Value\nBasic,60.00\n");

        let json_path = dir.path().join("summary.json");
        write_json(&json_path, &serde_json::json!({ "total_subscribers": 3 })).unwrap();
        let parsed: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&json_path).unwrap()).unwrap();
        assert_eq!(parsed["total_subscribers"], 3);
    }
}
