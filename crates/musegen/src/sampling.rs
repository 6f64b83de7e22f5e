use rand::Rng;
use std::collections::BTreeMap;

use crate::{Error, Result};

/// Weighted table: value -> unnormalised weight.
pub type WeightTable<K> = BTreeMap<K, f64>;

pub fn check_temperature(temperature: f64) -> Result<f64> {
    if temperature.is_finite() && temperature > 0.0 {
        Ok(temperature)
    } else {
        Err(Error::InvalidTemperature(temperature))
    }
}

/// Draw a key from `table` after raising every weight to `1 / temperature`.
///
/// Temperatures below 1 sharpen the distribution toward its heaviest entries,
/// above 1 flatten it. Returns `None` when no entry has positive weight.
pub fn sample_weighted<K: Copy + Ord, R: Rng>(
    rng: &mut R,
    table: &WeightTable<K>,
    temperature: f64,
) -> Option<K> {
    let exponent = 1.0 / temperature;
    let scaled: Vec<(K, f64)> = table
        .iter()
        .filter(|(_, w)| **w > 0.0 && w.is_finite())
        .map(|(&k, &w)| (k, w.powf(exponent)))
        .collect();

    let total: f64 = scaled.iter().map(|(_, w)| w).sum();
    if scaled.is_empty() || !total.is_finite() || total <= 0.0 {
        return None;
    }

    let mut x = rng.gen::<f64>() * total;
    for &(k, w) in &scaled {
        if x < w {
            return Some(k);
        }
        x -= w;
    }
    scaled.last().map(|&(k, _)| k)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn counts(table: &WeightTable<u8>, temperature: f64) -> BTreeMap<u8, usize> {
        let mut rng = ChaCha8Rng::seed_from_u64(7);
        let mut counts = BTreeMap::new();
        for _ in 0..10_000 {
            let k = sample_weighted(&mut rng, table, temperature).unwrap();
            *counts.entry(k).or_insert(0) += 1;
        }
        counts
    }

    #[test]
    fn zero_weights_are_never_drawn() {
        let table = WeightTable::from([(1u8, 0.0), (2, 1.0)]);
        assert_eq!(counts(&table, 1.0).get(&1), None);
    }

    #[test]
    fn empty_table_gives_none() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let table: WeightTable<u8> = WeightTable::new();
        assert_eq!(sample_weighted(&mut rng, &table, 1.0), None);
    }

    #[test]
    fn low_temperature_sharpens() {
        let table = WeightTable::from([(1u8, 1.0), (2, 3.0)]);
        let warm = counts(&table, 1.0)[&2];
        let cold = counts(&table, 0.5)[&2];
        // 3:1 at T=1 (75%), 9:1 at T=0.5 (90%)
        assert!(warm > 7000 && warm < 8000, "warm {warm}");
        assert!(cold > 8500, "cold {cold}");
    }

    #[test]
    fn same_seed_same_draws() {
        let table = WeightTable::from([(1u8, 1.0), (2, 1.0), (3, 1.0)]);
        assert_eq!(counts(&table, 1.2), counts(&table, 1.2));
    }

    #[test]
    fn temperature_must_be_positive() {
        assert!(check_temperature(0.0).is_err());
        assert!(check_temperature(f64::INFINITY).is_err());
        assert_eq!(check_temperature(0.8).unwrap(), 0.8);
    }
}
