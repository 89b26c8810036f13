use std::fmt;

/// One of the six networks in the pipeline, named for diagnostics only
/// (tracing spans, error messages) — never used to select behavior.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Network {
    Mel,
    Encoder,
    Predictor,
    Joint,
    Segmentation,
    Embedding,
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Network::Mel => "mel",
            Network::Encoder => "encoder",
            Network::Predictor => "predictor",
            Network::Joint => "joint",
            Network::Segmentation => "segmentation",
            Network::Embedding => "embedding",
        };
        f.write_str(name)
    }
}
