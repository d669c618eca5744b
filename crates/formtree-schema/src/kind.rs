use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Numeric storage kind. Carries the intrinsic bounds of the declared
/// representation; a schema node may narrow them further but never widen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NumericKind {
    Byte,
    Short,
    Int,
    Long,
    Float,
    Double,
}

impl NumericKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Byte => "byte",
            Self::Short => "short",
            Self::Int => "int",
            Self::Long => "long",
            Self::Float => "float",
            Self::Double => "double",
        }
    }

    pub fn is_integer(self) -> bool {
        !matches!(self, Self::Float | Self::Double)
    }

    /// Intrinsic (min, max) range of the representation.
    ///
    /// `Long` bounds are capped at the contiguous-integer range of `f64`
    /// because document numbers pass through `f64` on the way to storage.
    pub fn bounds(self) -> (f64, f64) {
        match self {
            Self::Byte => (0.0, u8::MAX as f64),
            Self::Short => (i16::MIN as f64, i16::MAX as f64),
            Self::Int => (i32::MIN as f64, i32::MAX as f64),
            Self::Long => (-(2f64.powi(53)), 2f64.powi(53)),
            Self::Float => (f32::MIN as f64, f32::MAX as f64),
            Self::Double => (f64::MIN, f64::MAX),
        }
    }

    /// Clamps `n` into the effective range: the intrinsic bounds of the
    /// kind, narrowed by the optional schema-declared `min`/`max`. Integer
    /// kinds also truncate the fraction.
    pub fn clamp(self, n: f64, min: Option<f64>, max: Option<f64>) -> f64 {
        let (lo, hi) = self.bounds();
        let lo = min.map_or(lo, |m| m.max(lo));
        let hi = max.map_or(hi, |m| m.min(hi));
        let n = if n.is_nan() { 0.0 } else { n.clamp(lo, hi) };
        if self.is_integer() {
            n.trunc()
        } else {
            n
        }
    }

    /// The clamped zero value, used as the kind's implicit default.
    pub fn zero(self, min: Option<f64>, max: Option<f64>) -> f64 {
        self.clamp(0.0, min, max)
    }
}

/// How a container lays its children out in the document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ContainerKind {
    /// JSON array; children are positional and carry indices.
    List,
    /// JSON object; children are keyed by (possibly dynamic) names.
    Map,
}

/// Declared kind of one schema position.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Bool,
    Number(NumericKind),
    String,
    /// String constrained to a declared suggestion list.
    Enum,
    /// Heterogeneous container; children instantiated from prefabs.
    Array,
    /// Fixed schema-declared children, or one uniform repeated child.
    Block,
    /// Kind the schema does not describe; edited as opaque data.
    Unknown,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Bool => "bool",
            Self::Number(_) => "number",
            Self::String => "string",
            Self::Enum => "enum",
            Self::Array => "array",
            Self::Block => "block",
            Self::Unknown => "unknown",
        }
    }

    pub fn is_leaf(self) -> bool {
        matches!(
            self,
            Self::Bool | Self::Number(_) | Self::String | Self::Enum
        )
    }
}

/// Outcome of testing a document value against a declared kind.
///
/// `Absent` (a null value) is neither a match nor an error: it marks a
/// position that exists but has not been given data yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeMatch {
    Match,
    Absent,
    Mismatch,
}

impl TypeMatch {
    pub fn is_mismatch(self) -> bool {
        matches!(self, Self::Mismatch)
    }
}

/// Tests a value's runtime type tag against a declared kind.
pub fn type_match(kind: NodeKind, value: &Value) -> TypeMatch {
    if value.is_null() {
        return TypeMatch::Absent;
    }
    let matched = match kind {
        NodeKind::Bool => value.is_boolean(),
        NodeKind::Number(_) => value.is_number(),
        NodeKind::String | NodeKind::Enum => value.is_string(),
        NodeKind::Array => value.is_array() || value.is_object(),
        NodeKind::Block => value.is_object() || value.is_array(),
        NodeKind::Unknown => true,
    };
    if matched {
        TypeMatch::Match
    } else {
        TypeMatch::Mismatch
    }
}
