// Row-wise derived fields. Nothing here is cached or written back into the
// record, so a report can ask for the same field as often as it likes.

use crate::types::{AgeGroup, JoinMonth, SubscriptionRecord};
use crate::util::days_diff;
use chrono::Datelike;

/// Bucket an age. Ages outside `0..=100` have no bucket.
pub fn age_group(age: i32) -> Option<AgeGroup> {
    if age < 0 {
        return None;
    }
    AgeGroup::ALL.into_iter().find(|g| age <= g.upper_bound())
}

/// Days from join to last payment.
pub fn tenure_days(record: &SubscriptionRecord) -> i64 {
    days_diff(record.join_date, record.last_payment_date)
}

pub fn join_month(record: &SubscriptionRecord) -> JoinMonth {
    JoinMonth {
        year: record.join_date.year(),
        month: record.join_date.month(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(join: (i32, u32, u32), last: (i32, u32, u32)) -> SubscriptionRecord {
        SubscriptionRecord {
            user_id: None,
            subscription_type: "Basic".into(),
            monthly_revenue: 10.0,
            join_date: NaiveDate::from_ymd_opt(join.0, join.1, join.2).unwrap(),
            last_payment_date: NaiveDate::from_ymd_opt(last.0, last.1, last.2).unwrap(),
            country: "US".into(),
            age: 30,
            gender: "Male".into(),
            device: "Laptop".into(),
        }
    }

    #[test]
    fn age_buckets_are_right_inclusive() {
        assert_eq!(age_group(0), Some(AgeGroup::UpTo18));
        assert_eq!(age_group(18), Some(AgeGroup::UpTo18));
        assert_eq!(age_group(19), Some(AgeGroup::From19To25));
        assert_eq!(age_group(25), Some(AgeGroup::From19To25));
        assert_eq!(age_group(26), Some(AgeGroup::From26To35));
        assert_eq!(age_group(65), Some(AgeGroup::From56To65));
        assert_eq!(age_group(66), Some(AgeGroup::Over65));
        assert_eq!(age_group(100), Some(AgeGroup::Over65));
        assert_eq!(age_group(101), None);
        assert_eq!(age_group(-1), None);
    }

    #[test]
    fn every_age_lands_in_exactly_one_bucket() {
        for age in 0..=100 {
            let hits = AgeGroup::ALL
                .iter()
                .filter(|g| Some(**g) == age_group(age))
                .count();
            assert_eq!(hits, 1, "age {age}");
        }
    }

    #[test]
    fn tenure_is_zero_for_same_day() {
        assert_eq!(tenure_days(&record((2022, 3, 1), (2022, 3, 1))), 0);
        assert_eq!(tenure_days(&record((2022, 3, 1), (2022, 4, 1))), 31);
    }

    #[test]
    fn join_months_sort_chronologically() {
        let a = join_month(&record((2021, 12, 31), (2022, 1, 1)));
        let b = join_month(&record((2022, 1, 2), (2022, 2, 1)));
        assert!(a < b);
        assert_eq!(a.to_string(), "2021-12");
    }
}
