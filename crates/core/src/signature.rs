// Handler signatures: the formal parameter list a handler is written
// against, and the inference of parameter specs from it

use crate::schema::{ParameterSpec, SemanticType};
use std::collections::{BTreeMap, HashMap};

/// Static kind of a formal parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeType {
    Integer,
    Float,
    Boolean,
    Text,
    Sequence,
    Mapping,
    Untyped,
}

impl NativeType {
    /// Narrow to the schema-level type: integer/float to number, sequences
    /// and mappings to object, everything else to string.
    pub fn semantic(self) -> SemanticType {
        match self {
            Self::Integer | Self::Float => SemanticType::Number,
            Self::Boolean => SemanticType::Boolean,
            Self::Sequence | Self::Mapping => SemanticType::Object,
            Self::Text | Self::Untyped => SemanticType::String,
        }
    }
}

/// Rust types usable as handler parameters.
pub trait TypeHint {
    const NATIVE: NativeType;
}

macro_rules! type_hint {
    ($native:ident: $($ty:ty),+ $(,)?) => {
        $(impl TypeHint for $ty {
            const NATIVE: NativeType = NativeType::$native;
        })+
    };
}

type_hint!(Integer: i8, i16, i32, i64, i128, isize, u8, u16, u32, u64, u128, usize);
type_hint!(Float: f32, f64);
type_hint!(Boolean: bool);
type_hint!(Text: String, &str, char);
type_hint!(Mapping: serde_json::Map<String, serde_json::Value>);

impl<T> TypeHint for Vec<T> {
    const NATIVE: NativeType = NativeType::Sequence;
}

impl<T> TypeHint for [T] {
    const NATIVE: NativeType = NativeType::Sequence;
}

impl<K, V> TypeHint for HashMap<K, V> {
    const NATIVE: NativeType = NativeType::Mapping;
}

impl<K, V> TypeHint for BTreeMap<K, V> {
    const NATIVE: NativeType = NativeType::Mapping;
}

/// One parameter of a handler signature
#[derive(Debug, Clone, PartialEq)]
pub struct FormalParameter {
    pub name: String,
    pub native: NativeType,
    pub default: Option<serde_json::Value>,
}

impl FormalParameter {
    pub fn new<T: TypeHint + ?Sized>(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native: T::NATIVE,
            default: None,
        }
    }

    pub fn untyped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            native: NativeType::Untyped,
            default: None,
        }
    }

    /// Give the parameter a default, which makes it optional.
    pub fn with_default(mut self, default: impl Into<serde_json::Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn is_optional(&self) -> bool {
        self.default.is_some()
    }
}

/// Derive one spec per formal parameter, in declaration order.
pub fn inspect(signature: &[FormalParameter]) -> Vec<ParameterSpec> {
    signature
        .iter()
        .map(|param| ParameterSpec {
            name: param.name.clone(),
            semantic_type: param.native.semantic(),
            description: String::new(),
            required: !param.is_optional(),
            default: param.default.clone(),
        })
        .collect()
}
