//! Claw Compactor: token-reducing compression for markdown memory files.
//!
//! Layers:
//! 1. Format: deterministic markdown normalization (the rule stages)
//! 2. Tokenizer: BPE-aware formatting rewrites
//! 3. Dictionary: high-frequency phrase → `$XX` code mapping
//! 4. RLE: workspace paths and IPv4 families → placeholders
//!
//! Layers 1 and 2 are lossy but keep every protected literal; layers 3 and
//! 4 are exactly reversible.

pub mod codec;
pub mod dedup;
pub mod layer1_format;
pub mod layer2_tokenizer;
pub mod layer3_dictionary;
pub mod layer4_rle;
pub mod pipeline;
pub mod preserve;
pub mod sections;

pub use codec::{write_atomic, TextCodec};
pub use layer3_dictionary::{build_codebook, build_codebook_with, Codebook};
pub use layer4_rle::{PrefixMap, RleCodec};
pub use pipeline::{
    generate_llm_prompt, rule_compress, rule_compress_with, CompactorPipeline, CompressionLevel,
    CompressionResult, RuleOutput, RulePipeline, RuleStage,
};
