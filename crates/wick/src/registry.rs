//! Factory synthesis from the layer naming grammar.
//!
//! A factory name is an underscore-joined list of module tags followed by
//! `_layer`: `conv2_bn_relu_layer` yields a rank-2 convolution, a batch
//! norm sized to the convolution's output, and a ReLU. Tags resolve
//! against a fixed registry, so every valid name is enumerable and an
//! unknown tag fails at synthesis time with a spelling suggestion.
//!
//! Invoking a synthesized factory produces units lazily, one per tag, in
//! tag order. Channel-bearing tags (`linear`, `conv*`) claim the
//! `in_channels`/`out_channels` arguments and record the output width and
//! rank for later `bn` and pooling tags; shared arguments (`bias`,
//! `kernel_size`, `pool_size`, ...) stay readable by every tag that
//! understands them. Arguments no tag consumed fail the stream after the
//! final unit.
//!
//! Bias handling looks exactly one tag ahead: a `linear`/`conv*` tag
//! immediately followed by `bn` defaults to bias-free, since the
//! normalisation recentres the output anyway. An explicit `bias` argument
//! always wins.

use candle_core::Device;

use wick_nn::{
    BatchNorm, BatchNormConfig, Conv, ConvConfig, Dropout, Linear, LinearConfig, PaddingMode,
    Pool, PoolConfig, PoolKind, Relu, Unit,
};

use crate::args::KwArgs;
use crate::error::{Error, Result};
use crate::flatten::Layer;
use crate::invoke::LayerFactory;

/// Suffix every factory name must carry.
const FACTORY_SUFFIX: &str = "_layer";

/// One entry of the tag registry: the tag string plus the function that
/// routes arguments and constructs the unit.
#[derive(Debug)]
struct TagSpec {
    name: &'static str,
    build: fn(&mut TagCtx<'_>) -> Result<Option<Unit>>,
}

/// The closed tag vocabulary.
const VOCABULARY: &[TagSpec] = &[
    TagSpec { name: "linear", build: build_linear },
    TagSpec { name: "conv1", build: build_conv1 },
    TagSpec { name: "conv2", build: build_conv2 },
    TagSpec { name: "conv3", build: build_conv3 },
    TagSpec { name: "relu", build: build_relu },
    TagSpec { name: "bn", build: build_bn },
    TagSpec { name: "dropout", build: build_dropout },
    TagSpec { name: "maxpool", build: build_maxpool },
    TagSpec { name: "avgpool", build: build_avgpool },
];

/// Every known tag, in registry order.
pub fn vocabulary() -> impl Iterator<Item = &'static str> {
    VOCABULARY.iter().map(|spec| spec.name)
}

fn lookup(tag: &str) -> Option<&'static TagSpec> {
    VOCABULARY.iter().find(|spec| spec.name == tag)
}

/// Synthesizes the factory for `name`.
///
/// The name must end in `_layer`; the remainder is split on underscores
/// and every piece must be a known tag. Unknown tags fail here — not at
/// invocation — with the closest known tag suggested when one is close.
pub fn factory(name: &str) -> Result<SynthFactory> {
    let Some(stem) = name.strip_suffix(FACTORY_SUFFIX) else {
        return Err(Error::UnknownFactory {
            name: name.to_owned(),
        });
    };
    let mut tags = Vec::new();
    for tag in stem.split('_') {
        match lookup(tag) {
            Some(spec) => tags.push(spec),
            None => {
                return Err(Error::UnknownTag {
                    factory: name.to_owned(),
                    tag: tag.to_owned(),
                    suggestion: suggest(tag).map(str::to_owned),
                })
            }
        }
    }
    Ok(SynthFactory {
        name: name.to_owned(),
        tags,
        device: Device::Cpu,
    })
}

/// A factory synthesized from the naming grammar.
///
/// Keeps the requested name as its identity and constructs units on a
/// caller-chosen device (CPU unless overridden).
#[derive(Debug)]
pub struct SynthFactory {
    name: String,
    tags: Vec<&'static TagSpec>,
    device: Device,
}

impl SynthFactory {
    /// The originally requested factory name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// The resolved tag list, in order.
    pub fn tags(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.tags.iter().map(|spec| spec.name)
    }

    /// Constructs future units on `device` instead of the CPU.
    pub fn on_device(mut self, device: Device) -> Self {
        self.device = device;
        self
    }
}

impl LayerFactory for SynthFactory {
    fn invoke(&self, kwargs: KwArgs) -> Result<Layer> {
        Ok(Layer::from_stream(SynthStream {
            factory: self.name.clone(),
            tags: self.tags.clone(),
            device: self.device.clone(),
            kwargs,
            state: ChannelState::NoChannel,
            index: 0,
            done: false,
        }))
    }
}

/// Whether a channel-producing tag has run yet in this invocation.
#[derive(Debug, Clone, Copy)]
enum ChannelState {
    NoChannel,
    Seen { rank: usize, channels: usize },
}

/// Lazy unit stream for one factory invocation.
struct SynthStream {
    factory: String,
    tags: Vec<&'static TagSpec>,
    device: Device,
    kwargs: KwArgs,
    state: ChannelState,
    index: usize,
    done: bool,
}

impl Iterator for SynthStream {
    type Item = Result<Unit>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        while self.index < self.tags.len() {
            let spec = self.tags[self.index];
            let next_tag = self.tags.get(self.index + 1).map(|spec| spec.name);
            self.index += 1;
            let mut ctx = TagCtx {
                factory: &self.factory,
                kwargs: &mut self.kwargs,
                next_tag,
                state: &mut self.state,
                device: &self.device,
            };
            match (spec.build)(&mut ctx) {
                Ok(Some(unit)) => return Some(Ok(unit)),
                Ok(None) => continue,
                Err(err) => {
                    self.done = true;
                    return Some(Err(err));
                }
            }
        }
        self.done = true;
        let unused = self.kwargs.unused();
        if unused.is_empty() {
            None
        } else {
            Some(Err(Error::UnexpectedArguments {
                factory: self.factory.clone(),
                keys: unused,
            }))
        }
    }
}

/// Per-tag view of one invocation's arguments and bookkeeping.
struct TagCtx<'a> {
    factory: &'a str,
    kwargs: &'a mut KwArgs,
    next_tag: Option<&'static str>,
    state: &'a mut ChannelState,
    device: &'a Device,
}

impl TagCtx<'_> {
    fn missing(&self, key: &str) -> Error {
        Error::MissingArgument {
            factory: self.factory.to_owned(),
            key: key.to_owned(),
        }
    }

    /// Claims a channel-count argument for the current tag.
    fn claim_channel(&mut self, key: &str) -> Result<usize> {
        self.kwargs
            .take_usize(key)?
            .ok_or_else(|| self.missing(key))
    }

    /// A shared argument that must be present.
    fn require_shared(&mut self, key: &str) -> Result<usize> {
        self.kwargs
            .get_usize(key)?
            .ok_or_else(|| self.missing(key))
    }

    /// The bias flag: explicit wins, otherwise disabled exactly when the
    /// immediately following tag is `bn`.
    fn bias(&mut self) -> Result<bool> {
        if let Some(bias) = self.kwargs.get_bool("bias")? {
            return Ok(bias);
        }
        Ok(self.next_tag != Some("bn"))
    }

    /// Fails unless a `linear`/`conv*` tag already ran in this invocation.
    fn seen_channel(&self, tag: &str) -> Result<(usize, usize)> {
        match *self.state {
            ChannelState::Seen { rank, channels } => Ok((rank, channels)),
            ChannelState::NoChannel => Err(Error::TagOrdering {
                tag: tag.to_owned(),
            }),
        }
    }
}

fn build_linear(ctx: &mut TagCtx<'_>) -> Result<Option<Unit>> {
    let in_features = ctx.claim_channel("in_channels")?;
    let out_features = ctx.claim_channel("out_channels")?;
    let mut config = LinearConfig::new(in_features, out_features);
    config.bias = ctx.bias()?;
    *ctx.state = ChannelState::Seen {
        rank: 1,
        channels: out_features,
    };
    Ok(Some(Unit::from(Linear::new(config, ctx.device)?)))
}

fn build_conv1(ctx: &mut TagCtx<'_>) -> Result<Option<Unit>> {
    build_conv(ctx, 1)
}

fn build_conv2(ctx: &mut TagCtx<'_>) -> Result<Option<Unit>> {
    build_conv(ctx, 2)
}

fn build_conv3(ctx: &mut TagCtx<'_>) -> Result<Option<Unit>> {
    build_conv(ctx, 3)
}

fn build_conv(ctx: &mut TagCtx<'_>, rank: usize) -> Result<Option<Unit>> {
    let in_channels = ctx.claim_channel("in_channels")?;
    let out_channels = ctx.claim_channel("out_channels")?;
    let kernel_size = ctx.require_shared("kernel_size")?;

    let mut config = ConvConfig::new(rank, in_channels, out_channels, kernel_size);
    if let Some(stride) = ctx.kwargs.get_usize("stride")? {
        config.stride = stride;
    }
    if let Some(padding) = ctx.kwargs.get_usize("padding")? {
        config.padding = padding;
    }
    if let Some(dilation) = ctx.kwargs.get_usize("dilation")? {
        config.dilation = dilation;
    }
    if let Some(groups) = ctx.kwargs.get_usize("groups")? {
        config.groups = groups;
    }
    if let Some(mode) = ctx.kwargs.get_str("padding_mode")? {
        config.padding_mode = parse_padding_mode(&mode)?;
    }
    config.bias = ctx.bias()?;
    *ctx.state = ChannelState::Seen {
        rank,
        channels: out_channels,
    };
    Ok(Some(Unit::from(Conv::new(config, ctx.device)?)))
}

fn build_relu(ctx: &mut TagCtx<'_>) -> Result<Option<Unit>> {
    let inplace = ctx.kwargs.get_bool("inplace")?.unwrap_or(true);
    Ok(Some(Unit::from(Relu::new(inplace))))
}

fn build_bn(ctx: &mut TagCtx<'_>) -> Result<Option<Unit>> {
    let (rank, channels) = ctx.seen_channel("bn")?;
    let mut config = BatchNormConfig::new(channels, rank);
    if let Some(eps) = ctx.kwargs.get_f64("bn_eps")? {
        config.eps = eps;
    }
    if let Some(momentum) = ctx.kwargs.get_f64("bn_momentum")? {
        config.momentum = momentum;
    }
    if let Some(affine) = ctx.kwargs.get_bool("bn_affine")? {
        config.affine = affine;
    }
    if let Some(track) = ctx.kwargs.get_bool("bn_track_running_stats")? {
        config.track_running_stats = track;
    }
    Ok(Some(Unit::from(BatchNorm::new(config, ctx.device)?)))
}

fn build_dropout(ctx: &mut TagCtx<'_>) -> Result<Option<Unit>> {
    let p = ctx.kwargs.get_f64("dropout_p")?.unwrap_or(0.5);
    Ok(Some(Unit::from(Dropout::new(p)?)))
}

fn build_maxpool(ctx: &mut TagCtx<'_>) -> Result<Option<Unit>> {
    build_pool(ctx, PoolKind::Max, "maxpool")
}

fn build_avgpool(ctx: &mut TagCtx<'_>) -> Result<Option<Unit>> {
    build_pool(ctx, PoolKind::Average, "avgpool")
}

fn build_pool(ctx: &mut TagCtx<'_>, kind: PoolKind, tag: &str) -> Result<Option<Unit>> {
    let (rank, _) = ctx.seen_channel(tag)?;
    let size = ctx.require_shared("pool_size")?;
    let stride = ctx.kwargs.get_usize("pool_stride")?;
    let padding = ctx.kwargs.get_usize("pool_padding")?;
    if size == 1 {
        // a unit window is the identity; the arguments still count as used
        return Ok(None);
    }
    let mut config = PoolConfig::new(rank, size);
    if let Some(stride) = stride {
        config.stride = stride;
    }
    if let Some(padding) = padding {
        config.padding = padding;
    }
    Ok(Some(Unit::from(Pool::new(kind, config)?)))
}

fn parse_padding_mode(mode: &str) -> Result<PaddingMode> {
    match mode {
        "zeros" => Ok(PaddingMode::Zeros),
        "replicate" => Ok(PaddingMode::Replicate),
        other => Err(Error::ArgumentType {
            key: "padding_mode".to_owned(),
            expected: "'zeros' or 'replicate'".to_owned(),
            got: format!("'{other}'"),
        }),
    }
}

/// Closest vocabulary entry, preferring shared prefixes over raw edit
/// distance.
fn suggest(tag: &str) -> Option<&'static str> {
    if tag.is_empty() {
        return None;
    }
    if let Some(spec) = VOCABULARY
        .iter()
        .find(|spec| spec.name.starts_with(tag) || tag.starts_with(spec.name))
    {
        return Some(spec.name);
    }
    VOCABULARY
        .iter()
        .map(|spec| (levenshtein(tag, spec.name), spec.name))
        .filter(|&(distance, _)| distance <= 2)
        .min_by_key(|&(distance, _)| distance)
        .map(|(_, name)| name)
}

fn levenshtein(a: &str, b: &str) -> usize {
    let b: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b.len()).collect();
    for (i, ca) in a.chars().enumerate() {
        let mut row = Vec::with_capacity(b.len() + 1);
        row.push(i + 1);
        for (j, &cb) in b.iter().enumerate() {
            let substitute = prev[j] + usize::from(ca != cb);
            let delete = prev[j + 1] + 1;
            let insert = row[j] + 1;
            row.push(substitute.min(delete).min(insert));
        }
        prev = row;
    }
    prev[b.len()]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resolves_tags_in_order() -> Result<()> {
        let factory = factory("conv2_bn_relu_layer")?;
        assert_eq!(factory.name(), "conv2_bn_relu_layer");
        assert_eq!(factory.tags().collect::<Vec<_>>(), vec!["conv2", "bn", "relu"]);
        Ok(())
    }

    #[test]
    fn names_without_the_suffix_are_not_factories() {
        assert!(matches!(
            factory("linear"),
            Err(Error::UnknownFactory { .. })
        ));
        assert!(matches!(
            factory("forward"),
            Err(Error::UnknownFactory { .. })
        ));
    }

    #[test]
    fn unknown_tags_fail_at_synthesis_with_a_suggestion() {
        let err = factory("linear_relu_max_pool_layer").unwrap_err();
        match err {
            Error::UnknownTag {
                factory,
                tag,
                suggestion,
            } => {
                assert_eq!(factory, "linear_relu_max_pool_layer");
                assert_eq!(tag, "max");
                assert_eq!(suggestion.as_deref(), Some("maxpool"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn suggestions_cover_typos() {
        assert_eq!(suggest("liner"), Some("linear"));
        assert_eq!(suggest("conv"), Some("conv1"));
        assert_eq!(suggest("dropuot"), Some("dropout"));
        assert_eq!(suggest("gru"), None);
    }

    #[test]
    fn edit_distance_is_symmetric_enough() {
        assert_eq!(levenshtein("bn", "bn"), 0);
        assert_eq!(levenshtein("liner", "linear"), 1);
        assert_eq!(levenshtein("", "relu"), 4);
        assert_eq!(levenshtein("conv4", "conv3"), 1);
    }

    #[test]
    fn vocabulary_is_enumerable() {
        let tags: Vec<_> = vocabulary().collect();
        assert!(tags.contains(&"linear"));
        assert!(tags.contains(&"conv3"));
        assert!(tags.contains(&"avgpool"));
        for tag in tags {
            // every vocabulary entry synthesizes; ordering rules apply at
            // invocation, not here
            assert!(factory(&format!("{tag}_layer")).is_ok());
        }
    }
}
