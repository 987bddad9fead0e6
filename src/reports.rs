use crate::derive::{age_group, join_month, tenure_days};
use crate::types::{
    AgeGroup, ArpuRow, Crosstab, GroupValue, JoinMonth, Leader, MonthlyCount, RecentPayments,
    Share, SubscriptionRecord, SummaryStats,
};
use crate::util::{argmax, mean, pearson, percent};
use chrono::Duration;
use std::collections::{BTreeMap, BTreeSet};

/// Count records per `(row, column)` pair. Rows and columns come out sorted.
fn count_pairs<'a, R, C>(
    data: &'a [SubscriptionRecord],
    mut key: impl FnMut(&'a SubscriptionRecord) -> Option<(R, C)>,
) -> (BTreeSet<C>, BTreeMap<R, BTreeMap<C, usize>>)
where
    R: Ord,
    C: Ord + Clone,
{
    let mut columns = BTreeSet::new();
    let mut counts: BTreeMap<R, BTreeMap<C, usize>> = BTreeMap::new();
    for r in data {
        let Some((row, col)) = key(r) else { continue };
        columns.insert(col.clone());
        *counts.entry(row).or_default().entry(col).or_insert(0) += 1;
    }
    (columns, counts)
}

/// Divide each row of a count table by its own total, times `scale`
/// (100 for percentages, 1 for fractions). Absent cells are zero.
fn normalize_rows<R, C>(
    row_label: &str,
    columns: &[C],
    counts: BTreeMap<R, BTreeMap<C, usize>>,
    scale: f64,
) -> Crosstab
where
    R: ToString,
    C: Ord + ToString,
{
    let rows = counts
        .into_iter()
        .map(|(row, cells)| {
            let total: usize = cells.values().sum();
            let values = columns
                .iter()
                .map(|c| cells.get(c).copied().unwrap_or(0) as f64 / total as f64 * scale)
                .collect();
            (row.to_string(), values)
        })
        .collect();
    Crosstab {
        row_label: row_label.to_string(),
        columns: columns.iter().map(ToString::to_string).collect(),
        rows,
    }
}

fn leaders(table: &Crosstab) -> Vec<Leader> {
    table
        .rows
        .iter()
        .filter_map(|(plan, values)| {
            let idx = argmax(values)?;
            Some(Leader {
                plan: plan.clone(),
                leader: table.columns[idx].clone(),
                percent: values[idx],
            })
        })
        .collect()
}

/// Count per key, most frequent first; ties fall back to key order.
fn shares(data: &[SubscriptionRecord], key: impl Fn(&SubscriptionRecord) -> &str) -> Vec<Share> {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for r in data {
        *counts.entry(key(r)).or_insert(0) += 1;
    }
    let mut out: Vec<Share> = counts
        .into_iter()
        .map(|(group, count)| Share {
            group: group.to_string(),
            count,
            percent: percent(count, data.len()),
        })
        .collect();
    out.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.group.cmp(&b.group)));
    out
}

fn sum_by(
    data: &[SubscriptionRecord],
    key: impl Fn(&SubscriptionRecord) -> &str,
    value: impl Fn(&SubscriptionRecord) -> f64,
) -> Vec<GroupValue> {
    let mut map: BTreeMap<&str, f64> = BTreeMap::new();
    for r in data {
        *map.entry(key(r)).or_insert(0.0) += value(r);
    }
    map.into_iter()
        .map(|(group, value)| GroupValue {
            group: group.to_string(),
            value,
        })
        .collect()
}

fn mean_by(
    data: &[SubscriptionRecord],
    key: impl Fn(&SubscriptionRecord) -> &str,
    value: impl Fn(&SubscriptionRecord) -> f64,
) -> Vec<GroupValue> {
    let mut map: BTreeMap<&str, Vec<f64>> = BTreeMap::new();
    for r in data {
        map.entry(key(r)).or_default().push(value(r));
    }
    map.into_iter()
        .map(|(group, values)| GroupValue {
            group: group.to_string(),
            value: mean(&values),
        })
        .collect()
}

fn plan(r: &SubscriptionRecord) -> &str {
    &r.subscription_type
}

pub fn gender_distribution_by_plan(data: &[SubscriptionRecord]) -> Crosstab {
    let (columns, counts) = count_pairs(data, |r| Some((plan(r), r.gender.as_str())));
    let columns: Vec<&str> = columns.into_iter().collect();
    normalize_rows("SubscriptionType", &columns, counts, 100.0)
}

pub fn users_by_country(data: &[SubscriptionRecord]) -> Vec<Share> {
    shares(data, |r| r.country.as_str())
}

/// Percentage of each plan's subscribers per age group. Every bucket is a
/// column, in bucket order, even when no one falls into it.
pub fn age_group_distribution_by_plan(data: &[SubscriptionRecord]) -> Crosstab {
    let (_, counts) = count_pairs(data, |r| age_group(r.age).map(|g| (plan(r), g)));
    normalize_rows("SubscriptionType", &AgeGroup::ALL[..], counts, 100.0)
}

pub fn age_group_leader_by_plan(data: &[SubscriptionRecord]) -> Vec<Leader> {
    leaders(&age_group_distribution_by_plan(data))
}

pub fn average_age_by_plan(data: &[SubscriptionRecord]) -> Vec<GroupValue> {
    mean_by(data, plan, |r| r.age as f64)
}

pub fn subscribers_by_plan(data: &[SubscriptionRecord]) -> Vec<Share> {
    shares(data, plan)
}

pub fn revenue_by_plan(data: &[SubscriptionRecord]) -> Vec<GroupValue> {
    sum_by(data, plan, |r| r.monthly_revenue)
}

pub fn average_duration_by_plan(data: &[SubscriptionRecord]) -> Vec<GroupValue> {
    mean_by(data, plan, |r| tenure_days(r) as f64)
}

pub fn average_join_to_last_payment(data: &[SubscriptionRecord]) -> f64 {
    let days: Vec<f64> = data.iter().map(|r| tenure_days(r) as f64).collect();
    mean(&days)
}

pub fn average_tenure_by_device(data: &[SubscriptionRecord]) -> Vec<GroupValue> {
    mean_by(data, |r| r.device.as_str(), |r| tenure_days(r) as f64)
}

/// Share of subscribers whose last payment is strictly newer than the
/// latest payment in the dataset minus 30 and 90 days.
pub fn recent_payment_share(data: &[SubscriptionRecord]) -> RecentPayments {
    let Some(latest) = data.iter().map(|r| r.last_payment_date).max() else {
        return RecentPayments {
            reference_date: None,
            within_30_days: f64::NAN,
            within_90_days: f64::NAN,
        };
    };
    let within = |days: i64| {
        let cutoff = latest - Duration::days(days);
        let n = data.iter().filter(|r| r.last_payment_date > cutoff).count();
        percent(n, data.len())
    };
    RecentPayments {
        reference_date: Some(latest),
        within_30_days: within(30),
        within_90_days: within(90),
    }
}

pub fn device_distribution_by_plan(data: &[SubscriptionRecord]) -> Crosstab {
    let (columns, counts) = count_pairs(data, |r| Some((plan(r), r.device.as_str())));
    let columns: Vec<&str> = columns.into_iter().collect();
    normalize_rows("SubscriptionType", &columns, counts, 100.0)
}

pub fn common_device_by_plan(data: &[SubscriptionRecord]) -> Vec<Leader> {
    leaders(&device_distribution_by_plan(data))
}

/// Device x plan contingency table; each device row holds the fraction of
/// that device's subscribers on each plan.
pub fn device_plan_crosstab(data: &[SubscriptionRecord]) -> Crosstab {
    let (columns, counts) = count_pairs(data, |r| Some((r.device.as_str(), plan(r))));
    let columns: Vec<&str> = columns.into_iter().collect();
    normalize_rows("Device", &columns, counts, 1.0)
}

pub fn monthly_signups(data: &[SubscriptionRecord]) -> Vec<MonthlyCount> {
    let mut map: BTreeMap<JoinMonth, usize> = BTreeMap::new();
    for r in data {
        *map.entry(join_month(r)).or_insert(0) += 1;
    }
    map.into_iter()
        .map(|(month, signups)| MonthlyCount { month, signups })
        .collect()
}

pub fn average_tenure(data: &[SubscriptionRecord]) -> f64 {
    average_join_to_last_payment(data)
}

pub fn revenue_by_country(data: &[SubscriptionRecord]) -> Vec<GroupValue> {
    sum_by(data, |r| r.country.as_str(), |r| r.monthly_revenue)
}

/// Pearson correlation between total revenue and subscriber count across
/// countries.
pub fn revenue_subscriber_correlation(data: &[SubscriptionRecord]) -> f64 {
    let mut map: BTreeMap<&str, (f64, usize)> = BTreeMap::new();
    for r in data {
        let e = map.entry(r.country.as_str()).or_insert((0.0, 0));
        e.0 += r.monthly_revenue;
        e.1 += 1;
    }
    let (revenue, subscribers): (Vec<f64>, Vec<f64>) =
        map.values().map(|(rev, n)| (*rev, *n as f64)).unzip();
    pearson(&revenue, &subscribers)
}

pub fn arpu_by_country_and_plan(data: &[SubscriptionRecord]) -> Vec<ArpuRow> {
    #[derive(Default)]
    struct Acc {
        subscribers: usize,
        revenue: f64,
    }
    let mut map: BTreeMap<(&str, &str), Acc> = BTreeMap::new();
    for r in data {
        let e = map.entry((r.country.as_str(), plan(r))).or_default();
        e.subscribers += 1;
        e.revenue += r.monthly_revenue;
    }
    map.into_iter()
        .map(|((country, plan), acc)| ArpuRow {
            country: country.to_string(),
            plan: plan.to_string(),
            subscribers: acc.subscribers,
            revenue: acc.revenue,
            arpu: acc.revenue / acc.subscribers as f64,
        })
        .collect()
}

pub fn summarize(data: &[SubscriptionRecord]) -> SummaryStats {
    let plans: BTreeSet<&str> = data.iter().map(plan).collect();
    let countries: BTreeSet<&str> = data.iter().map(|r| r.country.as_str()).collect();
    SummaryStats {
        total_subscribers: data.len(),
        plans: plans.len(),
        countries: countries.len(),
        total_monthly_revenue: data.iter().map(|r| r.monthly_revenue).sum(),
        average_tenure_days: average_tenure(data),
        revenue_subscriber_correlation: revenue_subscriber_correlation(data),
    }
}
