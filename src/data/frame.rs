//! # Price Frame
//!
//! Column-oriented panel of close prices indexed by trading date.

use std::io::Read;
use std::io::Write;
use std::path::Path;

use chrono::Datelike;
use chrono::NaiveDate;
use chrono::Weekday;
use csv::ReaderBuilder;
use nalgebra::DMatrix;

use super::returns::pct_change;
use crate::error::QuantError;
use crate::error::Result;

/// Historical prices, one column per ticker, rows in ascending date order.
#[derive(Clone, Debug, PartialEq)]
pub struct PriceFrame {
  dates: Vec<NaiveDate>,
  tickers: Vec<String>,
  columns: Vec<Vec<f64>>,
}

impl PriceFrame {
  /// Build a frame, checking that every column spans every date and that dates ascend.
  pub fn new(dates: Vec<NaiveDate>, tickers: Vec<String>, columns: Vec<Vec<f64>>) -> Result<Self> {
    if tickers.len() != columns.len() {
      return Err(QuantError::DimensionMismatch(format!(
        "{} tickers but {} columns",
        tickers.len(),
        columns.len()
      )));
    }
    if let Some(col) = columns.iter().position(|c| c.len() != dates.len()) {
      return Err(QuantError::DimensionMismatch(format!(
        "column '{}' has {} rows, expected {}",
        tickers[col],
        columns[col].len(),
        dates.len()
      )));
    }
    if dates.windows(2).any(|w| w[0] >= w[1]) {
      return Err(QuantError::InvalidParameter(
        "dates must be strictly ascending".to_string(),
      ));
    }

    Ok(Self {
      dates,
      tickers,
      columns,
    })
  }

  /// Single-asset frame.
  pub fn from_series(ticker: &str, dates: Vec<NaiveDate>, prices: Vec<f64>) -> Result<Self> {
    Self::new(dates, vec![ticker.to_string()], vec![prices])
  }

  /// Read a CSV whose first column is an ISO date and remaining columns are tickers.
  pub fn from_csv<P: AsRef<Path>>(path: P) -> Result<Self> {
    let rdr = ReaderBuilder::new().has_headers(true).from_path(path)?;
    Self::from_csv_reader(rdr)
  }

  /// Same as [`PriceFrame::from_csv`] for any reader.
  pub fn from_reader<R: Read>(reader: R) -> Result<Self> {
    let rdr = ReaderBuilder::new().has_headers(true).from_reader(reader);
    Self::from_csv_reader(rdr)
  }

  fn from_csv_reader<R: Read>(mut rdr: csv::Reader<R>) -> Result<Self> {
    let headers = rdr.headers()?.clone();
    if headers.len() < 2 {
      return Err(QuantError::Parse(
        "price csv needs a date column and at least one ticker".to_string(),
      ));
    }
    let tickers: Vec<String> = headers.iter().skip(1).map(|h| h.trim().to_string()).collect();

    let mut dates = Vec::new();
    let mut columns = vec![Vec::new(); tickers.len()];
    for record in rdr.records() {
      let record = record?;
      let raw_date = record.get(0).unwrap_or_default().trim();
      let date = parse_date(raw_date)?;
      dates.push(date);

      for (i, col) in columns.iter_mut().enumerate() {
        let field = record.get(i + 1).unwrap_or_default().trim();
        let value = field
          .parse::<f64>()
          .map_err(|e| QuantError::Parse(format!("{raw_date}/{}: {e}", tickers[i])))?;
        col.push(value);
      }
    }

    Self::new(dates, tickers, columns)
  }

  /// Write in the layout read by [`PriceFrame::from_csv`].
  pub fn to_csv<P: AsRef<Path>>(&self, path: P) -> Result<()> {
    let file = std::fs::File::create(path)?;
    self.to_writer(file)
  }

  pub fn to_writer<W: Write>(&self, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    let mut header = vec!["date".to_string()];
    header.extend(self.tickers.iter().cloned());
    wtr.write_record(&header)?;
    for (t, date) in self.dates.iter().enumerate() {
      let mut record = vec![date.format("%Y-%m-%d").to_string()];
      record.extend(self.columns.iter().map(|c| c[t].to_string()));
      wtr.write_record(&record)?;
    }
    wtr.flush()?;
    Ok(())
  }

  pub fn len(&self) -> usize {
    self.dates.len()
  }

  pub fn is_empty(&self) -> bool {
    self.dates.is_empty()
  }

  pub fn n_assets(&self) -> usize {
    self.tickers.len()
  }

  pub fn dates(&self) -> &[NaiveDate] {
    &self.dates
  }

  pub fn tickers(&self) -> &[String] {
    &self.tickers
  }

  pub fn columns(&self) -> &[Vec<f64>] {
    &self.columns
  }

  /// Prices for `ticker`, if present.
  pub fn column(&self, ticker: &str) -> Option<&[f64]> {
    self
      .tickers
      .iter()
      .position(|t| t == ticker)
      .map(|i| self.columns[i].as_slice())
  }

  pub fn first_date(&self) -> Option<NaiveDate> {
    self.dates.first().copied()
  }

  pub fn last_date(&self) -> Option<NaiveDate> {
    self.dates.last().copied()
  }

  /// Rows with `start <= date <= end`.
  pub fn slice(&self, start: NaiveDate, end: NaiveDate) -> PriceFrame {
    let lo = self.dates.partition_point(|d| *d < start);
    let hi = self.dates.partition_point(|d| *d <= end);
    let hi = hi.max(lo);

    PriceFrame {
      dates: self.dates[lo..hi].to_vec(),
      tickers: self.tickers.clone(),
      columns: self.columns.iter().map(|c| c[lo..hi].to_vec()).collect(),
    }
  }

  /// Simple returns per column.
  pub fn returns(&self) -> Vec<Vec<f64>> {
    self.columns.iter().map(|c| pct_change(c)).collect()
  }

  /// Returns as a `periods x assets` matrix.
  pub fn returns_matrix(&self) -> DMatrix<f64> {
    let returns = self.returns();
    let n_periods = self.len().saturating_sub(1);
    DMatrix::from_fn(n_periods, self.n_assets(), |t, j| returns[j][t])
  }

  /// Re-index onto `calendar`, carrying the last known price forward.
  ///
  /// Calendar dates before the first observation are `NaN`.
  pub fn forward_fill_to(&self, calendar: &[NaiveDate]) -> PriceFrame {
    let columns = self
      .columns
      .iter()
      .map(|col| {
        calendar
          .iter()
          .map(|d| {
            let idx = self.dates.partition_point(|x| x <= d);
            if idx == 0 {
              f64::NAN
            } else {
              col[idx - 1]
            }
          })
          .collect()
      })
      .collect();

    PriceFrame {
      dates: calendar.to_vec(),
      tickers: self.tickers.clone(),
      columns,
    }
  }

  /// Price row at position `t`.
  pub fn row(&self, t: usize) -> Vec<f64> {
    self.columns.iter().map(|c| c[t]).collect()
  }
}

pub(crate) fn parse_date(raw: &str) -> Result<NaiveDate> {
  let head = raw.get(..10).unwrap_or(raw);
  NaiveDate::parse_from_str(head, "%Y-%m-%d")
    .map_err(|e| QuantError::Parse(format!("invalid date '{raw}': {e}")))
}

/// Monday-to-Friday calendar covering `[start, end]`.
pub fn business_days(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
  let mut out = Vec::new();
  let mut d = start;
  while d <= end {
    if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
      out.push(d);
    }
    match d.succ_opt() {
      Some(next) => d = next,
      None => break,
    }
  }
  out
}

/// Seeded geometric Brownian motion paths on a business-day calendar.
#[cfg(test)]
pub(crate) fn gbm_frame(
  drifts: &[f64],
  vols: &[f64],
  start: NaiveDate,
  n_days: usize,
  seed: u64,
) -> PriceFrame {
  use rand::SeedableRng;
  use rand::rngs::StdRng;
  use rand_distr::Distribution;
  use rand_distr::Normal;

  let mut rng = StdRng::seed_from_u64(seed);
  let z = Normal::new(0.0, 1.0).unwrap();
  let dt = 1.0 / 252.0;

  let mut dates = Vec::with_capacity(n_days);
  let mut d = start;
  while dates.len() < n_days {
    if !matches!(d.weekday(), Weekday::Sat | Weekday::Sun) {
      dates.push(d);
    }
    d = d.succ_opt().unwrap();
  }

  let tickers = (0..drifts.len()).map(|i| format!("A{i}")).collect();
  let columns = drifts
    .iter()
    .zip(vols)
    .map(|(mu, sigma)| {
      let mut p = 100.0;
      (0..n_days)
        .map(|t| {
          if t > 0 {
            p *= ((mu - 0.5 * sigma * sigma) * dt + sigma * dt.sqrt() * z.sample(&mut rng)).exp();
          }
          p
        })
        .collect()
    })
    .collect();
  PriceFrame::new(dates, tickers, columns).unwrap()
}

#[cfg(test)]
mod tests {
  use super::*;

  fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
  }

  fn sample_frame() -> PriceFrame {
    PriceFrame::new(
      vec![date(2024, 1, 2), date(2024, 1, 3), date(2024, 1, 5)],
      vec!["AAA".into(), "BBB".into()],
      vec![vec![10.0, 11.0, 12.0], vec![20.0, 19.0, 21.0]],
    )
    .unwrap()
  }

  #[test]
  fn rejects_ragged_columns() {
    let err = PriceFrame::new(
      vec![date(2024, 1, 2), date(2024, 1, 3)],
      vec!["AAA".into()],
      vec![vec![1.0]],
    );
    assert!(matches!(err, Err(QuantError::DimensionMismatch(_))));
  }

  #[test]
  fn slice_is_inclusive() {
    let f = sample_frame();
    let s = f.slice(date(2024, 1, 3), date(2024, 1, 5));
    assert_eq!(s.len(), 2);
    assert_eq!(s.column("BBB").unwrap(), &[19.0, 21.0]);
  }

  #[test]
  fn forward_fill_carries_last_price() {
    let f = sample_frame();
    let cal = business_days(date(2024, 1, 1), date(2024, 1, 5));
    let filled = f.forward_fill_to(&cal);
    let aaa = filled.column("AAA").unwrap();
    assert!(aaa[0].is_nan());
    assert_eq!(&aaa[1..], &[10.0, 11.0, 11.0, 12.0]);
  }

  #[test]
  fn business_days_skip_weekends() {
    let days = business_days(date(2024, 1, 5), date(2024, 1, 8));
    assert_eq!(days, vec![date(2024, 1, 5), date(2024, 1, 8)]);
  }

  #[test]
  fn reads_csv_panel() {
    let csv = "date,AAA,BBB\n2024-01-02,1.0,2.0\n2024-01-03,1.5,2.5\n";
    let f = PriceFrame::from_reader(csv.as_bytes()).unwrap();
    assert_eq!(f.tickers(), &["AAA".to_string(), "BBB".to_string()]);
    assert_eq!(f.returns_matrix().nrows(), 1);
    assert!((f.returns_matrix()[(0, 1)] - 0.25).abs() < 1e-12);
  }

  #[test]
  fn csv_output_reads_back() {
    let mut buf = Vec::new();
    sample_frame().to_writer(&mut buf).unwrap();
    let text = String::from_utf8(buf.clone()).unwrap();
    assert!(text.starts_with("date,AAA,BBB\n2024-01-02,10,20\n"));
    let back = PriceFrame::from_reader(buf.as_slice()).unwrap();
    assert_eq!(back.dates(), sample_frame().dates());
  }
}

