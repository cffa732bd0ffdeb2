//! Footer bytes.
//!
//! Every code ends with a footer byte naming the type that produced it and a variant within that
//! type. Each type reserves a contiguous run of footers, one per combination of its parts'
//! options, and the runs are handed out in [`CodecType::ALL`] order. That order is part of the
//! wire format: changing it means bumping [`Registry::VERSION`].

use crate::{
    error::{Error, Result},
    OPTIONS_PER_PART,
};

/// The value types a footer can name.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CodecType {
    Undefined,
    Null,
    False,
    True,
    ShortBytes,
    LongBytes,
    Duple,
    Variable,
    Str,
    Number,
    Date,
    Array,
    SparseArray,
    EmptyObject,
    Object,
}

impl CodecType {
    /// Registration order. Footer ranges are assigned in exactly this order.
    pub const ALL: [CodecType; 15] = [
        CodecType::Undefined,
        CodecType::Null,
        CodecType::False,
        CodecType::True,
        CodecType::ShortBytes,
        CodecType::LongBytes,
        CodecType::Duple,
        CodecType::Variable,
        CodecType::Str,
        CodecType::Number,
        CodecType::Date,
        CodecType::Array,
        CodecType::SparseArray,
        CodecType::EmptyObject,
        CodecType::Object,
    ];

    pub fn name(&self) -> &'static str {
        use self::CodecType::*;
        match self {
            Undefined => "undefined",
            Null => "null",
            False => "false",
            True => "true",
            ShortBytes => "bytes_short",
            LongBytes => "bytes_long",
            Duple => "duple",
            Variable => "variable",
            Str => "string",
            Number => "number",
            Date => "date",
            Array => "array",
            SparseArray => "sparse_array",
            EmptyObject => "empty_object",
            Object => "object",
        }
    }

    /// Number of part slots in a code of this type.
    pub fn slots(&self) -> usize {
        use self::CodecType::*;
        match self {
            Undefined | Null | False | True | ShortBytes | EmptyObject => 0,
            Duple => 2,
            LongBytes | Variable | Str | Number | Date | Array | SparseArray | Object => 1,
        }
    }

    /// Number of footers reserved for this type.
    pub fn variants(&self) -> usize {
        match self {
            // Short byte strings use the variant for their length instead of a part option
            CodecType::ShortBytes => crate::SHORT_BYTES_MAX + 1,
            _ => OPTIONS_PER_PART.pow(self.slots() as u32),
        }
    }
}

/// Split a variant into one option per slot, first slot first.
pub fn split_variant(variant: u8, slots: usize) -> Vec<u8> {
    let mut options = vec![0u8; slots];
    let mut rest = variant as usize;
    for option in options.iter_mut().rev() {
        *option = (rest % OPTIONS_PER_PART) as u8;
        rest /= OPTIONS_PER_PART;
    }
    options
}

/// Combine per-slot options, first slot first, into a variant.
pub fn join_options(options: &[u8]) -> u8 {
    options
        .iter()
        .fold(0usize, |acc, o| acc * OPTIONS_PER_PART + *o as usize) as u8
}

/// The fixed table between footer bytes and value types.
#[derive(Clone, Debug)]
pub struct Registry {
    base: [u8; CodecType::ALL.len()],
    by_footer: Vec<CodecType>,
}

impl Registry {
    /// Version of the registration order in [`CodecType::ALL`].
    pub const VERSION: u8 = 1;

    pub fn new() -> Self {
        let mut base = [0u8; CodecType::ALL.len()];
        let mut by_footer = Vec::new();
        for ty in CodecType::ALL {
            base[ty as usize] = by_footer.len() as u8;
            by_footer.extend(std::iter::repeat(ty).take(ty.variants()));
        }
        debug_assert!(by_footer.len() <= 256, "too many footers to store in one byte");
        Self { base, by_footer }
    }

    /// The first footer reserved for a type.
    pub fn base_footer(&self, ty: CodecType) -> u8 {
        self.base[ty as usize]
    }

    /// The footer for a type's variant.
    pub fn footer(&self, ty: CodecType, variant: u8) -> u8 {
        debug_assert!((variant as usize) < ty.variants());
        self.base_footer(ty) + variant
    }

    /// Total number of assigned footers. Everything at or above this is unassigned.
    pub fn footer_count(&self) -> usize {
        self.by_footer.len()
    }

    /// Find the type and variant a footer byte names.
    pub fn lookup(&self, footer: u8) -> Result<(CodecType, u8)> {
        let ty = *self.by_footer.get(footer as usize).ok_or_else(|| {
            Error::BadEncode(format!("Footer byte {} is not assigned to any type", footer))
        })?;
        Ok((ty, footer - self.base_footer(ty)))
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::new()
    }
}
