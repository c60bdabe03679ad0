use std::collections::BTreeSet;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, PartialEq, Default, Debug, Clone, Copy)]
pub struct Summary {
    pub sum: f64,
    pub average: f64,
    pub count: usize,
}

/// Sum, average and count of the selected values, average is 0 for no rows.
pub fn aggregate<T>(rows: &[T], selector: impl Fn(&T) -> f64) -> Summary {
    let (sum, count) = rows.iter()
        .fold((0.0, 0), |(sum, count), row| (sum + selector(row), count + 1));
    let average = if count == 0 { 0.0 } else { sum / count as f64 };
    Summary { sum, average, count }
}

#[derive(Serialize, Deserialize, PartialEq, Eq, Default, Debug, Clone, Copy)]
pub struct Streak {
    /// Run of consecutive active days ending today, or yesterday when today is not active yet.
    pub current: usize,
    pub longest: usize,
    pub active_days: usize,
}

pub fn streak(dates: impl IntoIterator<Item = NaiveDate>, today: NaiveDate) -> Streak {
    let days = dates.into_iter().collect::<BTreeSet<_>>();
    let mut longest = 0;
    let mut run = 0;
    let mut prev: Option<NaiveDate> = None;
    for &day in &days {
        run = match prev {
            Some(p) if p.succ_opt() == Some(day) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        prev = Some(day);
    }
    let mut current = 0;
    let mut day = if days.contains(&today) {
        Some(today)
    } else {
        today.pred_opt()
    };
    while let Some(d) = day.filter(|d| days.contains(d)) {
        current += 1;
        day = d.pred_opt();
    }
    Streak { current, longest, active_days: days.len() }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_aggregate() {
        let rows = [5.0, 6.0, 4.0];
        assert_eq!(aggregate(&rows, |v| *v), Summary { sum: 15.0, average: 5.0, count: 3 });
        let empty: [f64; 0] = [];
        assert_eq!(aggregate(&empty, |v| *v), Summary { sum: 0.0, average: 0.0, count: 0 });
    }

    #[test]
    fn test_aggregate_decoded_text_columns() {
        let stored = ["12.50", "7.5"];
        let summary = aggregate(&stored, |s| crate::decimal::decode_decimal(s).unwrap_or_default());
        assert_eq!(summary.sum, 20.0);
        assert_eq!(summary.average, 10.0);
    }

    #[test]
    fn test_streak() {
        let d = NaiveDate::from_ymd_opt(2024, 1, 15).unwrap();
        let day = |n: u64| d.checked_add_days(chrono::Days::new(n)).unwrap();
        let dates = [day(0), day(1), day(2), day(5), day(1)];
        assert_eq!(streak(dates, day(5)), Streak { current: 1, longest: 3, active_days: 4 });
        // today not active yet, yesterday counts
        assert_eq!(streak(dates, day(3)), Streak { current: 3, longest: 3, active_days: 4 });
        assert_eq!(streak(dates, day(9)), Streak { current: 0, longest: 3, active_days: 4 });
        assert_eq!(streak([], day(0)), Streak::default());
    }
}
