//! Pairing a flat list of channel widths into per-layer (in, out) counts.

use crate::broadcast::Params;
use crate::error::{Error, Result};

/// Derives `in_channels`/`out_channels` sequences from adjacent widths.
///
/// `[3, 32, 64]` becomes `in_channels = [3, 32]`, `out_channels = [32, 64]`,
/// ready to broadcast over a factory that builds one layer per pair.
pub fn channels(widths: &[usize]) -> Result<Params> {
    channels_with_keys(widths, "in_channels", "out_channels")
}

/// [`channels`] with caller-chosen parameter names.
pub fn channels_with_keys(widths: &[usize], in_key: &str, out_key: &str) -> Result<Params> {
    if widths.len() < 2 {
        return Err(Error::TooFewChannels { got: widths.len() });
    }
    Ok(Params::new()
        .seq(in_key, widths[..widths.len() - 1].iter().copied())
        .seq(out_key, widths[1..].iter().copied()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::args::Arg;

    fn seq_values(params: &Params, key: &str) -> Vec<usize> {
        let mut rows = params.clone().rows().expect("rows");
        let mut out = Vec::new();
        while let Some(mut row) = rows.next() {
            match row.take(key) {
                Some(Arg::Usize(value)) => out.push(value),
                other => panic!("unexpected value: {other:?}"),
            }
        }
        out
    }

    #[test]
    fn pairs_adjacent_widths() -> Result<()> {
        let params = channels(&[1, 2, 3, 4])?;
        assert_eq!(seq_values(&params, "in_channels"), vec![1, 2, 3]);
        assert_eq!(seq_values(&params, "out_channels"), vec![2, 3, 4]);
        Ok(())
    }

    #[test]
    fn custom_keys() -> Result<()> {
        let params = channels_with_keys(&[1, 2, 3, 4], "a", "b")?;
        assert_eq!(seq_values(&params, "a"), vec![1, 2, 3]);
        assert_eq!(seq_values(&params, "b"), vec![2, 3, 4]);
        Ok(())
    }

    #[test]
    fn too_few_widths_fail() {
        assert!(matches!(
            channels(&[7]),
            Err(Error::TooFewChannels { got: 1 })
        ));
        assert!(matches!(
            channels(&[]),
            Err(Error::TooFewChannels { got: 0 })
        ));
    }
}
