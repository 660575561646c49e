//! Error types emitted by the composition layer.
//!
//! All failures are programmer or configuration errors detected while a
//! model is being described, never during execution; they surface
//! immediately at the point of detection. Because layer sequences are
//! produced lazily, an error partway through a stream does not retract
//! units that were already yielded.

use thiserror::Error;

/// Composition-specific error category.
#[derive(Debug, Error)]
pub enum Error {
    /// Too few channel widths to derive (in, out) pairs.
    #[error("at least two channel widths are needed to derive pairs, got {got}")]
    TooFewChannels {
        /// Number of widths supplied.
        got: usize,
    },

    /// `mlp_layers` was handed an empty width list.
    #[error("mlp_layers() needs at least one (in, out) channel pair")]
    EmptyMlp,

    /// A cyclic parameter has nothing to repeat.
    #[error("parameter '{name}' cycles an empty sequence")]
    EmptyCycle {
        /// Offending parameter name.
        name: String,
    },

    /// Every sequence in the broadcast is cyclic, so no finite length
    /// bounds the output.
    #[error("cyclic parameters need at least one finite sequence to bound the broadcast")]
    UnboundedBroadcast,

    /// Finite parameter sequences disagree on their length under strict
    /// broadcasting.
    #[error("broadcast sequences must share one length, got {}", fmt_lengths(.lengths))]
    LengthMismatch {
        /// Every finite sequence with its length, in insertion order.
        lengths: Vec<(String, usize)>,
    },

    /// The requested name does not follow the factory naming grammar.
    #[error("no factory named '{name}': factory names end in '_layer'")]
    UnknownFactory {
        /// The requested name.
        name: String,
    },

    /// A tag in a factory name is not part of the vocabulary.
    #[error("{factory}() includes unknown module '{tag}'{}", fmt_suggestion(.suggestion))]
    UnknownTag {
        /// The full factory name.
        factory: String,
        /// The unresolvable tag.
        tag: String,
        /// Closest known tag, if one is close enough to suggest.
        suggestion: Option<String>,
    },

    /// A required argument was not supplied.
    #[error("{factory}() missing required argument: '{key}'")]
    MissingArgument {
        /// The factory being invoked.
        factory: String,
        /// The absent key.
        key: String,
    },

    /// Arguments were supplied that no tag consumed.
    #[error("{factory}() got unexpected keyword argument(s): {}", fmt_keys(.keys))]
    UnexpectedArguments {
        /// The factory being invoked.
        factory: String,
        /// Every unconsumed key, sorted.
        keys: Vec<String>,
    },

    /// A tag that needs a preceding channel-producing tag appeared without
    /// one.
    #[error("'{tag}' must come after 'linear' or 'conv'")]
    TagOrdering {
        /// The misplaced tag.
        tag: String,
    },

    /// An argument was supplied with an unusable type or value.
    #[error("argument '{key}' expects {expected}, got {got}")]
    ArgumentType {
        /// The offending key.
        key: String,
        /// What the consuming tag accepts.
        expected: String,
        /// What was supplied.
        got: String,
    },

    /// A failure propagated from unit construction or execution.
    #[error(transparent)]
    Unit(#[from] candle_core::Error),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

fn fmt_lengths(lengths: &[(String, usize)]) -> String {
    lengths
        .iter()
        .map(|(name, len)| format!("{name}: {len}"))
        .collect::<Vec<_>>()
        .join(", ")
}

fn fmt_suggestion(suggestion: &Option<String>) -> String {
    match suggestion {
        Some(tag) => format!("; did you mean '{tag}'?"),
        None => String::new(),
    }
}

fn fmt_keys(keys: &[String]) -> String {
    keys.iter()
        .map(|key| format!("'{key}'"))
        .collect::<Vec<_>>()
        .join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_mismatch_names_offenders() {
        let err = Error::LengthMismatch {
            lengths: vec![("a".into(), 2), ("b".into(), 3)],
        };
        assert_eq!(
            err.to_string(),
            "broadcast sequences must share one length, got a: 2, b: 3"
        );
    }

    #[test]
    fn unknown_tag_suggests_when_close() {
        let err = Error::UnknownTag {
            factory: "linear_relu_max_pool_layer".into(),
            tag: "max".into(),
            suggestion: Some("maxpool".into()),
        };
        assert_eq!(
            err.to_string(),
            "linear_relu_max_pool_layer() includes unknown module 'max'; did you mean 'maxpool'?"
        );
    }

    #[test]
    fn unused_keys_are_quoted_and_joined() {
        let err = Error::UnexpectedArguments {
            factory: "linear_layer".into(),
            keys: vec!["a".into(), "b".into()],
        };
        assert_eq!(
            err.to_string(),
            "linear_layer() got unexpected keyword argument(s): 'a', 'b'"
        );
    }
}
