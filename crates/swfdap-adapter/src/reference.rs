//! Composite identifiers handed to the client.
//!
//! Frames and values are only meaningful together with the execution
//! context they belong to, so protocol handles pack the context id, the
//! frame index and (for variable references) the value id into one
//! integer:
//!
//! ```text
//! frame ref = frame * CONTEXT_BASE + context
//! value ref = value * VALUE_MULTIPLIER + frame * CONTEXT_BASE + context
//! ```

use swfdap_core::{ContextId, ValueId};
use thiserror::Error;

/// Exclusive upper bound for context ids.
pub const CONTEXT_BASE: i64 = 100;
/// Exclusive upper bound for frame indices.
pub const FRAME_BASE: i64 = 1000;
/// Multiplier of the value slot.
pub const VALUE_MULTIPLIER: i64 = CONTEXT_BASE * FRAME_BASE;
/// Reserved value id meaning "the locals of this frame".
pub const LOCALS_VALUE_ID: ValueId = 1;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ReferenceError {
    #[error("reference {0} is negative")]
    Negative(i64),

    #[error("context id {0} does not fit in a reference")]
    ContextOutOfRange(ContextId),

    #[error("frame index {0} does not fit in a reference")]
    FrameOutOfRange(usize),

    #[error("value id {0} does not fit in a reference")]
    ValueOutOfRange(ValueId),

    /// Value id 0 would collide with frame references.
    #[error("value id 0 cannot be referenced")]
    ZeroValue,

    #[error("reference {0} does not name a value")]
    NotAValue(i64),
}

/// A frame of one execution context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameRef {
    pub context: ContextId,
    pub frame: usize,
}

/// A value (or the locals sentinel) seen from a frame of a context.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValueRef {
    pub context: ContextId,
    pub frame: usize,
    pub value: ValueId,
}

impl ValueRef {
    pub fn is_locals(&self) -> bool {
        self.value == LOCALS_VALUE_ID
    }

    pub fn frame_ref(&self) -> FrameRef {
        FrameRef {
            context: self.context,
            frame: self.frame,
        }
    }
}

fn frame_part(context: ContextId, frame: usize) -> Result<i64, ReferenceError> {
    let context_slot = i64::from(context);
    if context_slot >= CONTEXT_BASE {
        return Err(ReferenceError::ContextOutOfRange(context));
    }
    let frame_slot = i64::try_from(frame)
        .ok()
        .filter(|f| *f < FRAME_BASE)
        .ok_or(ReferenceError::FrameOutOfRange(frame))?;
    Ok(frame_slot * CONTEXT_BASE + context_slot)
}

fn split_frame_part(part: i64) -> FrameRef {
    FrameRef {
        context: (part % CONTEXT_BASE) as ContextId,
        frame: (part / CONTEXT_BASE) as usize,
    }
}

pub fn encode_frame_ref(context: ContextId, frame: usize) -> Result<i64, ReferenceError> {
    frame_part(context, frame)
}

pub fn decode_frame_ref(reference: i64) -> Result<FrameRef, ReferenceError> {
    if reference < 0 {
        return Err(ReferenceError::Negative(reference));
    }
    if reference >= VALUE_MULTIPLIER {
        return Err(ReferenceError::FrameOutOfRange(
            (reference / CONTEXT_BASE) as usize,
        ));
    }
    Ok(split_frame_part(reference))
}

pub fn encode_value_ref(
    context: ContextId,
    frame: usize,
    value: ValueId,
) -> Result<i64, ReferenceError> {
    if value == 0 {
        return Err(ReferenceError::ZeroValue);
    }
    let base = frame_part(context, frame)?;
    i64::try_from(value)
        .ok()
        .and_then(|v| v.checked_mul(VALUE_MULTIPLIER))
        .and_then(|v| v.checked_add(base))
        .ok_or(ReferenceError::ValueOutOfRange(value))
}

pub fn decode_value_ref(reference: i64) -> Result<ValueRef, ReferenceError> {
    if reference < 0 {
        return Err(ReferenceError::Negative(reference));
    }
    let value = reference / VALUE_MULTIPLIER;
    if value == 0 {
        return Err(ReferenceError::NotAValue(reference));
    }
    let frame = split_frame_part(reference % VALUE_MULTIPLIER);
    Ok(ValueRef {
        context: frame.context,
        frame: frame.frame,
        value: value as ValueId,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_ref_round_trip_over_bounds() {
        for context in [0, 1, 7, 99] {
            for frame in [0usize, 1, 42, 500, 999] {
                let encoded = encode_frame_ref(context, frame).unwrap();
                assert_eq!(
                    decode_frame_ref(encoded).unwrap(),
                    FrameRef { context, frame },
                    "context {context} frame {frame}"
                );
            }
        }
    }

    #[test]
    fn value_ref_round_trip_over_bounds() {
        for context in [0, 3, 99] {
            for frame in [0usize, 12, 999] {
                for value in [LOCALS_VALUE_ID, 2, 12_345, 9_000_000_000] {
                    let encoded = encode_value_ref(context, frame, value).unwrap();
                    assert_eq!(
                        decode_value_ref(encoded).unwrap(),
                        ValueRef {
                            context,
                            frame,
                            value
                        }
                    );
                }
            }
        }
    }

    #[test]
    fn encoding_matches_positional_layout() {
        assert_eq!(encode_frame_ref(2, 3).unwrap(), 302);
        assert_eq!(encode_value_ref(2, 3, 5).unwrap(), 500_302);
        assert_eq!(encode_value_ref(0, 0, LOCALS_VALUE_ID).unwrap(), 100_000);
    }

    #[test]
    fn out_of_range_components_rejected() {
        assert_eq!(
            encode_frame_ref(100, 0),
            Err(ReferenceError::ContextOutOfRange(100))
        );
        assert_eq!(
            encode_frame_ref(0, 1000),
            Err(ReferenceError::FrameOutOfRange(1000))
        );
        assert_eq!(
            encode_value_ref(0, 0, u64::MAX),
            Err(ReferenceError::ValueOutOfRange(u64::MAX))
        );
        assert_eq!(encode_value_ref(0, 0, 0), Err(ReferenceError::ZeroValue));
    }

    #[test]
    fn negative_and_malformed_references_rejected() {
        assert_eq!(decode_frame_ref(-1), Err(ReferenceError::Negative(-1)));
        assert_eq!(decode_value_ref(-5), Err(ReferenceError::Negative(-5)));
        assert_eq!(decode_value_ref(302), Err(ReferenceError::NotAValue(302)));
        assert!(decode_frame_ref(VALUE_MULTIPLIER).is_err());
    }

    #[test]
    fn locals_sentinel() {
        let r = decode_value_ref(encode_value_ref(4, 1, LOCALS_VALUE_ID).unwrap()).unwrap();
        assert!(r.is_locals());
        assert_eq!(r.frame_ref(), FrameRef { context: 4, frame: 1 });
    }
}
