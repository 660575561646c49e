//! Lightweight validation helpers shared across module primitives.
//!
//! These routines provide concise shape and value assertions that can be
//! wired into constructors or forward paths. They return
//! `candle_core::Result<()>` so call sites can propagate errors without
//! panicking.

use candle_core::{Error, Result, Tensor};

/// Ensures a tensor has exactly `expected` dimensions.
pub fn expect_input_rank(context: &str, tensor: &Tensor, expected: usize) -> Result<()> {
    let actual = tensor.dims().len();
    if actual == expected {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: expected a {expected}-d input, got {actual}-d with shape {:?}",
            tensor.dims()
        )))
    }
}

/// Ensures the channel dimension (dim 1) matches `channels`.
pub fn expect_channels(context: &str, tensor: &Tensor, channels: usize) -> Result<()> {
    let dims = tensor.dims();
    match dims.get(1) {
        Some(&actual) if actual == channels => Ok(()),
        _ => Err(Error::Msg(format!(
            "{context}: expected {channels} channels in dim 1, got shape {:?}",
            dims
        ))),
    }
}

/// Ensures a spatial rank is one the primitives support.
pub fn expect_spatial_rank(context: &str, rank: usize) -> Result<()> {
    if (1..=3).contains(&rank) {
        Ok(())
    } else {
        Err(Error::Msg(format!(
            "{context}: spatial rank must be 1, 2 or 3, got {rank}"
        )))
    }
}

/// Ensures a structural size (channel count, kernel size, ...) is non-zero.
pub fn expect_nonzero(context: &str, what: &str, value: usize) -> Result<()> {
    if value > 0 {
        Ok(())
    } else {
        Err(Error::Msg(format!("{context}: {what} must be non-zero")))
    }
}
