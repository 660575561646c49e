//! AlexNet assembled from synthesized factories.
//!
//! Run with `RUST_LOG=debug` to watch the traced units report their input
//! shapes as the forward pass walks the stack.

use anyhow::Result;
use candle_core::{Device, Tensor, D};
use wick::nn::{Flatten, Unit};
use wick::{channels, factory, make_layers, mlp_layers, unit_from_layers_traced, Layer, Params};

fn main() -> Result<()> {
    env_logger::init();
    let device = Device::Cpu;

    // The feature extractor repeats one conv block with per-layer
    // geometry; a pool_size of 1 skips the pooling stage entirely.
    let features = make_layers(
        factory("conv2_relu_maxpool_layer")?,
        channels(&[3, 96, 256, 384, 384, 256])?
            .seq("kernel_size", [11usize, 5, 3, 3, 3])
            .seq("stride", [4usize, 1, 1, 1, 1])
            .seq("padding", [0usize, 2, 1, 1, 1])
            .seq("pool_size", [3usize, 3, 1, 1, 3])
            .scalar("pool_stride", 2usize),
    )?;

    // The classifier head broadcasts linear+relu+dropout blocks over the
    // hidden widths, except for the final projection which stays a plain
    // linear layer.
    let classifier = mlp_layers(
        factory("linear_relu_dropout_layer")?,
        &[36 * 256, 4096, 4096],
        &[4096, 4096, 1000],
        Params::new(),
        &device,
    )?;

    let net = unit_from_layers_traced(vec![
        features.into(),
        Layer::from(Unit::from(Flatten::new())),
        classifier,
    ])?;

    // Demonstrate that the model works, i.e. it can make a prediction
    // given random input.
    let input = Tensor::randn(0f32, 1.0, (1, 3, 227, 227), &device)?;
    let logits = net.forward(&input)?;
    let class = logits.argmax(D::Minus1)?.flatten_all()?.to_vec1::<u32>()?;
    println!("predicted class: {}", class[0]);
    Ok(())
}
