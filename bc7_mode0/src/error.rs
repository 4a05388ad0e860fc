use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum EncodeError {
    /// Every shortlisted shape's search somehow produced no candidate
    /// block. Unreachable for Mode 0 (`endpts_fit` is trivially true, see
    /// spec section 9), so a debug build asserts before this is ever
    /// constructed; release builds still surface it rather than panic.
    #[error("no candidate shape produced a block, which should never happen for mode 0")]
    NoCandidateShape,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("block mode bit at bit 0 is not set to 1; this is not a mode 0 block")]
    WrongMode,

    #[error("shape index {0} is out of range 0..16")]
    InvalidShapeIndex(u8),
}
