use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

/// Adjusted-close series, ascending by date with no duplicate dates.
///
/// Always non-empty and every close is finite and positive, so downstream
/// arithmetic never has to deal with NaN or division by zero.
#[derive(Debug, Clone, PartialEq)]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn try_new(points: Vec<PricePoint>) -> anyhow::Result<Self> {
        anyhow::ensure!(!points.is_empty(), "price series must be non-empty");

        for p in &points {
            anyhow::ensure!(
                p.close.is_finite() && p.close > 0.0,
                "close must be positive and finite (date={}, close={})",
                p.date,
                p.close
            );
        }

        for w in points.windows(2) {
            anyhow::ensure!(
                w[0].date < w[1].date,
                "price series must be strictly ascending by date ({} then {})",
                w[0].date,
                w[1].date
            );
        }

        Ok(Self { points })
    }

    /// Sorts by date, keeps the last point per date and drops non-positive or
    /// non-finite closes before validating.
    pub fn from_unsorted(mut points: Vec<PricePoint>) -> anyhow::Result<Self> {
        points.retain(|p| p.close.is_finite() && p.close > 0.0);
        // Stable sort keeps provider order among equal dates; the last one wins below.
        points.sort_by_key(|p| p.date);

        let mut out: Vec<PricePoint> = Vec::with_capacity(points.len());
        for p in points {
            match out.last_mut() {
                Some(last) if last.date == p.date => *last = p,
                _ => out.push(p),
            }
        }

        Self::try_new(out)
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> &PricePoint {
        &self.points[0]
    }

    pub fn last(&self) -> &PricePoint {
        &self.points[self.points.len() - 1]
    }
}
