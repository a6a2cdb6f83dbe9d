//! Matching an input format against a capability catalog.

use crate::catalog::{CapabilityCatalog, CodecRole};
use tracing::debug;
use vidbridge_core::format::{FormatDescriptor, VideoEncoding};

/// Compute the output formats a backend can produce for `input`.
///
/// The role decides which side of an entry is the "type" and which is the
/// "layout": a decoder's compressed encoding must match the input's
/// encoding and each supported layout becomes a raw output; an encoder's
/// supported layouts must include the input's layout and the compressed
/// encoding becomes the output. Dimensions travel from the input to every
/// output unchanged.
///
/// Matches are de-duplicated by format equality and discovery order is
/// preserved, so repeated calls over the same catalog return the same
/// ordered result and the first registered codec wins ties.
///
/// An empty result is a negotiation failure: the caller falls back to the
/// next candidate backend rather than failing the session.
pub fn negotiate(input: &FormatDescriptor, catalog: &CapabilityCatalog) -> Vec<FormatDescriptor> {
    let mut outputs: Vec<FormatDescriptor> = Vec::new();

    for entry in catalog.iter() {
        match entry.role {
            CodecRole::Decoder => {
                if input.encoding != entry.encoding {
                    continue;
                }
                for &layout in &entry.layouts {
                    let mut out = FormatDescriptor::raw(layout);
                    out.width = input.width;
                    out.height = input.height;
                    out.frame_rate = input.frame_rate;
                    if !outputs.contains(&out) {
                        outputs.push(out);
                    }
                }
            }
            CodecRole::Encoder => {
                if input.encoding != VideoEncoding::RawYuv {
                    continue;
                }
                let Some(layout) = input.layout else { continue };
                if !entry.layouts.contains(&layout) {
                    continue;
                }
                let mut out = FormatDescriptor::new(entry.encoding);
                out.width = input.width;
                out.height = input.height;
                out.frame_rate = input.frame_rate;
                if !outputs.contains(&out) {
                    outputs.push(out);
                }
            }
        }
    }

    debug!(
        input = %input,
        candidates = outputs.len(),
        "format negotiation complete"
    );
    outputs
}

/// One negotiated (input, output, role) binding.
#[derive(Debug, Clone, PartialEq)]
pub struct FormatPair {
    /// The input format handed to the stage.
    pub input: FormatDescriptor,
    /// The output format the stage produces.
    pub output: FormatDescriptor,
    /// True when the stage encodes, false when it decodes or passes through.
    pub encoder: bool,
}

/// The ordered outcome of one pipeline build's negotiation.
///
/// Created once per build and immutable afterward.
#[derive(Debug, Clone, Default)]
pub struct NegotiationResult {
    pairs: Vec<FormatPair>,
}

impl NegotiationResult {
    /// Record the negotiated pairs for one input format.
    pub fn build(input: &FormatDescriptor, outputs: &[FormatDescriptor], encoder: bool) -> Self {
        let pairs = outputs
            .iter()
            .map(|output| FormatPair {
                input: input.clone(),
                output: output.clone(),
                encoder,
            })
            .collect();
        Self { pairs }
    }

    /// The negotiated pairs, in negotiation order.
    pub fn pairs(&self) -> &[FormatPair] {
        &self.pairs
    }

    /// The winning pair: the first one discovered.
    pub fn selected(&self) -> Option<&FormatPair> {
        self.pairs.first()
    }

    /// Check if negotiation produced no match.
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}
