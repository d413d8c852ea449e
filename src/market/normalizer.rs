//! Candle normalization
//!
//! Providers return rows in whatever order and granularity their API uses,
//! sometimes with duplicate buckets at page boundaries. Everything funnels
//! through `normalize` before leaving the engine: ascending timestamps,
//! first occurrence wins on duplicates, volume joined by index when it
//! arrives as a separate series.

use crate::market::candle::Candle;
use crate::providers::RawCandle;

/// Produce the canonical candle series from raw provider rows.
///
/// When `volumes` is supplied it is joined by index position (both series
/// share generation order); a missing index defaults the volume to zero.
/// Raw timestamps are unix seconds; output timestamps are unix milliseconds.
pub fn normalize(mut raw: Vec<RawCandle>, volumes: Option<&[f64]>) -> Vec<Candle> {
    if let Some(volumes) = volumes {
        for (idx, row) in raw.iter_mut().enumerate() {
            row.volume = volumes.get(idx).copied().unwrap_or(0.0);
        }
    }

    // Stable sort, so the first occurrence of a duplicated timestamp is the
    // one that survives dedup.
    raw.sort_by_key(|row| row.time);
    raw.dedup_by_key(|row| row.time);

    raw.into_iter()
        .map(|row| Candle {
            time: row.time * 1_000,
            open: row.open,
            high: row.high,
            low: row.low,
            close: row.close,
            volume: row.volume,
        })
        .collect()
}

/// Fold every `multiplier` consecutive rows into one coarser bucket:
/// open = first open, close = last close, high = max, low = min,
/// volume = sum. Used to synthesize timeframes a provider lacks natively.
/// Rows must already be in ascending time order; a trailing partial chunk
/// is folded as-is.
pub fn aggregate(raw: &[RawCandle], multiplier: usize) -> Vec<RawCandle> {
    if multiplier <= 1 {
        return raw.to_vec();
    }

    raw.chunks(multiplier)
        .map(|chunk| {
            let first = &chunk[0];
            let last = &chunk[chunk.len() - 1];
            RawCandle {
                time: first.time,
                open: first.open,
                high: chunk.iter().map(|c| c.high).fold(f64::MIN, f64::max),
                low: chunk.iter().map(|c| c.low).fold(f64::MAX, f64::min),
                close: last.close,
                volume: chunk.iter().map(|c| c.volume).sum(),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(time: i64, open: f64, high: f64, low: f64, close: f64, volume: f64) -> RawCandle {
        RawCandle {
            time,
            open,
            high,
            low,
            close,
            volume,
        }
    }

    #[test]
    fn test_sorts_out_of_order_input() {
        let raw = vec![
            row(300, 3.0, 3.0, 3.0, 3.0, 1.0),
            row(100, 1.0, 1.0, 1.0, 1.0, 1.0),
            row(200, 2.0, 2.0, 2.0, 2.0, 1.0),
        ];

        let candles = normalize(raw, None);

        let times: Vec<i64> = candles.iter().map(|c| c.time).collect();
        assert_eq!(times, vec![100_000, 200_000, 300_000]);
    }

    #[test]
    fn test_duplicate_timestamps_keep_first_occurrence() {
        let raw = vec![
            row(100, 1.0, 1.0, 1.0, 1.0, 1.0),
            row(200, 2.0, 2.0, 2.0, 2.0, 1.0),
            row(200, 9.0, 9.0, 9.0, 9.0, 9.0), // page-boundary duplicate
            row(300, 3.0, 3.0, 3.0, 3.0, 1.0),
        ];

        let candles = normalize(raw, None);

        assert_eq!(candles.len(), 3);
        assert_eq!(candles[1].time, 200_000);
        assert_eq!(candles[1].open, 2.0);
    }

    #[test]
    fn test_invariants_hold_for_adversarial_input() {
        // Duplicate-laden and out of order at the same time
        let raw = vec![
            row(500, 5.0, 5.0, 5.0, 5.0, 1.0),
            row(100, 1.0, 1.0, 1.0, 1.0, 1.0),
            row(500, 6.0, 6.0, 6.0, 6.0, 1.0),
            row(100, 2.0, 2.0, 2.0, 2.0, 1.0),
            row(300, 3.0, 3.0, 3.0, 3.0, 1.0),
        ];

        let candles = normalize(raw, None);

        for pair in candles.windows(2) {
            assert!(pair[0].time < pair[1].time, "timestamps not strictly increasing");
        }
    }

    #[test]
    fn test_volume_join_by_index() {
        let raw = vec![
            row(100, 1.0, 1.0, 1.0, 1.0, 0.0),
            row(200, 2.0, 2.0, 2.0, 2.0, 0.0),
            row(300, 3.0, 3.0, 3.0, 3.0, 0.0),
        ];
        let volumes = [10.0, 20.0];

        let candles = normalize(raw, Some(&volumes));

        assert_eq!(candles[0].volume, 10.0);
        assert_eq!(candles[1].volume, 20.0);
        // Length mismatch defaults missing volume to zero
        assert_eq!(candles[2].volume, 0.0);
    }

    #[test]
    fn test_aggregate_folds_buckets() {
        let raw = vec![
            row(0, 10.0, 12.0, 9.0, 11.0, 1.0),
            row(3600, 11.0, 15.0, 10.0, 14.0, 2.0),
            row(7200, 14.0, 14.5, 8.0, 9.0, 3.0),
            row(10800, 9.0, 10.0, 8.5, 9.5, 4.0),
        ];

        let folded = aggregate(&raw, 4);

        assert_eq!(folded.len(), 1);
        let bucket = &folded[0];
        assert_eq!(bucket.time, 0);
        assert_eq!(bucket.open, 10.0);
        assert_eq!(bucket.close, 9.5);
        assert_eq!(bucket.high, 15.0);
        assert_eq!(bucket.low, 8.0);
        assert_eq!(bucket.volume, 10.0);
    }

    #[test]
    fn test_aggregate_trailing_partial_chunk() {
        let raw = vec![
            row(0, 1.0, 2.0, 0.5, 1.5, 1.0),
            row(60, 1.5, 3.0, 1.0, 2.0, 1.0),
            row(120, 2.0, 2.5, 1.8, 2.2, 1.0),
        ];

        let folded = aggregate(&raw, 2);

        assert_eq!(folded.len(), 2);
        assert_eq!(folded[0].open, 1.0);
        assert_eq!(folded[0].close, 2.0);
        assert_eq!(folded[1].open, 2.0);
        assert_eq!(folded[1].close, 2.2);
    }

    #[test]
    fn test_aggregate_multiplier_one_is_identity() {
        let raw = vec![row(0, 1.0, 2.0, 0.5, 1.5, 1.0)];
        let folded = aggregate(&raw, 1);
        assert_eq!(folded.len(), 1);
        assert_eq!(folded[0].close, 1.5);
    }
}
