use crate::domain::series::PriceSeries;
use crate::domain::snapshot::NormalizedPoint;

/// Rebases every close to `close / first_close * 100`, keeping dates and order.
pub fn normalize(series: &PriceSeries) -> Vec<NormalizedPoint> {
    let base = series.first().close;
    series
        .points()
        .iter()
        .map(|p| NormalizedPoint::from((*p, p.close / base * 100.0)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::series::PricePoint;
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2025, 3, 3).unwrap();
        let points = closes
            .iter()
            .enumerate()
            .map(|(i, &close)| PricePoint {
                date: start + chrono::Duration::days(i as i64),
                close,
            })
            .collect();
        PriceSeries::try_new(points).unwrap()
    }

    #[test]
    fn starts_at_exactly_one_hundred() {
        for closes in [&[0.37][..], &[123.456, 1.0, 999.0][..], &[3.3, 3.3][..]] {
            let h = normalize(&series(closes));
            assert_eq!(h[0].price_norm, 100.0);
            assert_eq!(h.len(), closes.len());
        }
    }

    #[test]
    fn keeps_dates_and_relative_moves() {
        let s = series(&[50.0, 75.0, 25.0]);
        let h = normalize(&s);
        let prices: Vec<f64> = h.iter().map(|p| p.price_norm).collect();
        assert_eq!(prices, vec![100.0, 150.0, 50.0]);
        assert_eq!(h[2].date, s.points()[2].date);
    }
}
